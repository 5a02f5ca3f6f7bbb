//! Core infrastructure for the topo scene demos.
//!
//! This crate provides the namespaced event bus that every subsystem talks
//! through, the [`Emitter`](emitter::Emitter) capability built on it, the
//! frame clock and viewport tracker that drive the render loop, and the
//! logging subsystem.

pub mod bus;
pub mod emitter;
pub mod logging;
pub mod name;
pub mod sizes;
pub mod time;

pub use bus::{BusError, EventBus, Listener};
pub use emitter::Emitter;
pub use name::{EventName, BASE_NAMESPACE};
