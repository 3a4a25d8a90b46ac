//! Geodesic planet terrain.
//!
//! Re-exports [`geodesic_terrain`] and adds the top level [`Config`] read by the binaries.

mod config;

pub use config::{Config, ExportConfig};
pub use geodesic_terrain::*;
