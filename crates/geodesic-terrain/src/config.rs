use crate::error::TerrainError;
use crate::skeleton::MAX_SUBDIV_LEVELS;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct TerrainConfig {
    /// Meters.
    pub radius: f64,
    /// Highest the terrain rises above `radius`, in meters.
    pub height: f64,
    /// Skeleton positions have `2^precision` units per meter.
    pub precision: u32,
    /// Skeleton triangles this deep never subdivide.
    pub max_subdiv_levels: u8,
    /// Each chunk edge is cut into `2^chunk_subdiv_level` segments.
    pub chunk_subdiv_level: u8,
    /// Defaults to an estimate from `max_subdiv_levels`.
    pub max_chunks: Option<usize>,
    /// Defaults to an estimate from `max_chunks`.
    pub max_shared_vertices: Option<usize>,
    /// How much farther than the subdivide distance a triangle must be to unsubdivide.
    pub unsubdiv_threshold_scale: f64,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            radius: 50_000.0,
            height: 2_000.0,
            precision: 10,
            max_subdiv_levels: 7,
            chunk_subdiv_level: 4,
            max_chunks: None,
            max_shared_vertices: None,
            unsubdiv_threshold_scale: 2.0,
        }
    }
}

impl TerrainConfig {
    pub fn validate(&self) -> Result<(), TerrainError> {
        let invalid = |msg: String| Err(TerrainError::InvalidConfig(msg));

        if self.radius.is_nan() || self.radius <= 0.0 {
            return invalid(format!("radius must be positive, got {}", self.radius));
        }
        if self.height < 0.0 {
            return invalid(format!("height can't be negative, got {}", self.height));
        }
        if usize::from(self.max_subdiv_levels) > MAX_SUBDIV_LEVELS {
            return invalid(format!(
                "max_subdiv_levels must be at most {}, got {}",
                MAX_SUBDIV_LEVELS, self.max_subdiv_levels
            ));
        }
        if !(1..=9).contains(&self.chunk_subdiv_level) {
            return invalid(format!(
                "chunk_subdiv_level must be in 1..=9, got {}",
                self.chunk_subdiv_level
            ));
        }
        // Skeleton positions must fit in an i64 with room for sums.
        let max_extent = (self.radius + self.height) * (1u64 << self.precision.min(62)) as f64;
        if self.precision > 40 || max_extent > (1u64 << 60) as f64 {
            return invalid(format!(
                "precision {} is too high for a radius of {}",
                self.precision, self.radius
            ));
        }
        if self.unsubdiv_threshold_scale < 1.0 {
            return invalid(format!(
                "unsubdiv_threshold_scale must be at least 1, got {}",
                self.unsubdiv_threshold_scale
            ));
        }
        if self.max_chunks == Some(0) || self.max_shared_vertices == Some(0) {
            return invalid("chunk and shared vertex capacities can't be zero".to_string());
        }
        Ok(())
    }

    pub fn chunk_width(&self) -> usize {
        1 << self.chunk_subdiv_level
    }

    pub fn max_chunks(&self) -> usize {
        self.max_chunks.unwrap_or(42 * usize::from(self.max_subdiv_levels) + 30)
    }

    pub fn max_shared_vertices(&self) -> usize {
        self.max_shared_vertices.unwrap_or_else(|| {
            (0.6 * (self.max_chunks() * 3 * self.chunk_width()) as f64) as usize
        })
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = TerrainConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_chunks(), 42 * 7 + 30);
        assert_eq!(config.max_shared_vertices(), (0.6 * (324 * 48) as f64) as usize);
    }

    #[test]
    fn rejects_out_of_range_levels() {
        let too_deep = TerrainConfig {
            max_subdiv_levels: 25,
            ..Default::default()
        };
        assert!(matches!(too_deep.validate(), Err(TerrainError::InvalidConfig(_))));

        let flat_chunks = TerrainConfig {
            chunk_subdiv_level: 0,
            ..Default::default()
        };
        assert!(flat_chunks.validate().is_err());

        let no_planet = TerrainConfig {
            radius: 0.0,
            ..Default::default()
        };
        assert!(no_planet.validate().is_err());
    }
}
