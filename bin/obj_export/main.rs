//! Flies a viewer down to the surface of a planet and writes the resulting mesh as an OBJ file.
//!
//! Usage: `obj-export [config.ron]`

use geodesic::geodesic_core::glam::{DVec3, I64Vec3};
use geodesic::{Config, Terrain};

use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Reading config from {}", path);
            Config::read_file(&path)?
        }
        None => Config::default(),
    };
    let Config { terrain: terrain_config, output } = config;

    let mut terrain = Terrain::new(&terrain_config)?;

    // Rolling hills that stay within the configured height.
    let amplitude = 0.5 * terrain_config.height;
    let wavelength = 0.01 * terrain_config.radius;
    let hills = move |p: DVec3| {
        let q = p / wavelength;
        amplitude * (1.0 + 0.5 * (q.x.sin() * q.y.cos() + (0.7 * q.z).sin()))
    };

    let dir = DVec3::from_array(output.direction)
        .try_normalize()
        .unwrap_or(DVec3::Z);
    let surface = terrain_config.radius + terrain_config.height;
    let ticks = output.ticks.max(1);
    for tick in 0..ticks {
        let remaining = 1.0 - f64::from(tick + 1) / f64::from(ticks);
        let viewer = terrain.to_skel_pos(dir * (surface + output.start_altitude * remaining));

        let stats = terrain.update(viewer, I64Vec3::ZERO, &hills)?;
        log::info!(
            "Tick {}: {} chunks, {} shared vertices, {} subdivisions, {} unsubdivisions",
            tick,
            stats.chunks,
            stats.shared_vertices,
            stats.subdivisions,
            stats.unsubdivisions
        );

        let (violations, mismatches) = terrain.debug_check_skeleton();
        if !violations.is_empty() || !mismatches.is_empty() {
            log::warn!(
                "Skeleton is inconsistent: {:?} {:?}",
                violations,
                mismatches
            );
        }
        let bad_normals = terrain.debug_check_normals();
        if !bad_normals.is_empty() {
            log::warn!("{} bad normals, first: {:?}", bad_normals.len(), bad_normals[0]);
        }
    }

    let mut out = BufWriter::new(File::create(&output.path)?);
    terrain.write_obj(&mut out)?;
    out.flush()?;
    log::info!("Wrote {}", output.path);

    Ok(())
}
