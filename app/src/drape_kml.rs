use anyhow::Context;
use clap::Parser;
use futures::executor::block_on;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kmldrape::csv_writer::{write_csv, CoordType};
use kmldrape::drape::DEFAULT_SAMPLE_LEVEL;
use kmldrape::kml_writer::write_kml;
use kmldrape::quantized_mesh_tile::MAX_TILE_LEVEL;
use kmldrape::terrain::{EllipsoidTerrain, QuantizedMeshTerrain, TerrainProvider};
use kmldrape::viewer::{Viewer, ViewerOptions};

/// Load a KML file and drape its relative-to-ground polygons over terrain
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// KML file to load
    kml: PathBuf,

    /// Quantized-mesh terrain directory (with layer.json). Flat ellipsoid when omitted
    #[arg(short, long)]
    terrain: Option<PathBuf>,

    /// Terrain level to sample
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_SAMPLE_LEVEL,
        value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_TILE_LEVEL))
    )]
    level: u32,

    /// Write the adjusted placemarks as KML
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the polygon vertices as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Use geocentric (ECEF) coordinates in the CSV output
    #[arg(long)]
    geocentric: bool,
}

fn run<P: TerrainProvider>(provider: P, args: &Args) -> anyhow::Result<()> {
    let options = ViewerOptions {
        sample_level: args.level,
        ..ViewerOptions::default()
    };
    let mut viewer = Viewer::with_options(provider, options);

    let report = block_on(viewer.load_kml(&args.kml))
        .with_context(|| format!("loading {}", args.kml.display()))?;

    for failure in &report.failures {
        warn!(entity = %failure.entity_id, ring = %failure.ring, "{}", failure.message);
    }
    info!(
        entities = report.entities,
        rings = report.rings,
        failures = report.failures.len(),
        "done"
    );

    let ellipsoid = *viewer.terrain_provider().ellipsoid();
    for data_source in viewer.data_sources() {
        if let Some(path) = &args.output {
            write_kml(&data_source.entities, path, &ellipsoid)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "wrote KML");
        }
        if let Some(path) = &args.csv {
            let coord_type = if args.geocentric {
                CoordType::Geocentric
            } else {
                CoordType::Geodetic
            };
            write_csv(&data_source.entities, path, coord_type, &ellipsoid)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "wrote CSV");
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    match &args.terrain {
        Some(root) => {
            let terrain = QuantizedMeshTerrain::open(root)
                .with_context(|| format!("opening terrain {}", root.display()))?;
            run(terrain, &args)
        }
        None => run(EllipsoidTerrain::default(), &args),
    }
}
