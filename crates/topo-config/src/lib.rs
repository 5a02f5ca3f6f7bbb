//! Configuration types and loaders for topo.
//!
//! This crate owns the on-disk `topo.toml` schema so the application and the
//! asset crates share a single source of truth.

pub mod app;

pub use app::{AppConfig, ClockConfig, ResourceSpec, ViewportConfig};
