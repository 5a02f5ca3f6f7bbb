//! Asset loading for topo.
//!
//! [`Loader`](loader::Loader) runs extension-matched loader actions and
//! reports each finished file; [`Resources`](resources::Resources) collects
//! the results and turns them into `progress` and `ready` events.

pub mod loader;
pub mod resources;

pub use loader::{Loader, LoaderAction, TextureAction};
pub use resources::Resources;
