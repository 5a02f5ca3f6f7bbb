//! Terminal presentation for topo.
//!
//! Provides the screen layout and the HUD widgets. All rendering uses
//! [`ratatui`]; this crate only draws what [`topo_core`] collaborators report.

pub mod hud;
pub mod layout;
