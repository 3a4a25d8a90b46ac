use geodesic_terrain::TerrainConfig;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct Config {
    pub terrain: TerrainConfig,
    pub output: ExportConfig,
}

impl Config {
    pub fn read_file(path: &str) -> Result<Self, ron::Error> {
        let reader = std::fs::File::open(path)?;

        ron::de::from_reader(reader)
    }
}

/// How `obj-export` flies towards the planet before writing the mesh.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ExportConfig {
    pub path: String,
    pub ticks: u32,
    /// Meters above the terrain the viewer starts at.
    pub start_altitude: f64,
    /// Planet-centered direction the viewer descends along.
    pub direction: [f64; 3],
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            path: "terrain.obj".to_string(),
            ticks: 20,
            start_altitude: 100_000.0,
            direction: [0.0, 0.0, 1.0],
        }
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
    fn parses_config_file_contents() {
        let text = r#"(
            terrain: (
                radius: 6000.0,
                height: 100.0,
                precision: 8,
                max_subdiv_levels: 5,
                chunk_subdiv_level: 3,
                max_chunks: Some(500),
                max_shared_vertices: None,
                unsubdiv_threshold_scale: 2.0,
            ),
            output: (
                path: "out.obj",
                ticks: 3,
                start_altitude: 500.0,
                direction: (1.0, 0.0, 0.0),
            ),
        )"#;
        let config: Config = ron::de::from_str(text).unwrap();

        assert_eq!(config.terrain.radius, 6000.0);
        assert_eq!(config.terrain.max_chunks(), 500);
        assert!(config.terrain.validate().is_ok());
        assert_eq!(config.output.path, "out.obj");
        assert_eq!(config.output.direction, [1.0, 0.0, 0.0]);
    }
}
