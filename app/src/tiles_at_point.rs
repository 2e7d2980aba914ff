use clap::{Parser, ValueEnum};
use kmldrape::geometry::GeodeticPoint2;
use kmldrape::quantized_mesh_tile::{tile_to_bounding_rectangle, tiles_for_point, TilingScheme, MAX_TILE_LEVEL};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Scheme {
    Tms,
    Slippy,
}

impl From<Scheme> for TilingScheme {
    fn from(scheme: Scheme) -> Self {
        match scheme {
            Scheme::Tms => TilingScheme::Tms,
            Scheme::Slippy => TilingScheme::Slippy,
        }
    }
}

/// List the geographic terrain tiles covering a point at every level
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Latitude in degrees
    #[arg(allow_negative_numbers = true)]
    lat: f64,

    /// Longitude in degrees
    #[arg(allow_negative_numbers = true)]
    lon: f64,

    /// Deepest level to list
    #[arg(
        short,
        long,
        default_value_t = 11,
        value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_TILE_LEVEL))
    )]
    zoom: u32,

    #[arg(short, long, value_enum, default_value_t = Scheme::Tms)]
    scheme: Scheme,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    anyhow::ensure!((-90.0..=90.0).contains(&args.lat), "latitude {} out of range", args.lat);
    anyhow::ensure!((-180.0..=180.0).contains(&args.lon), "longitude {} out of range", args.lon);

    let scheme = TilingScheme::from(args.scheme);
    let point = GeodeticPoint2::from_degrees(args.lon, args.lat); // Note the order (lon, lat)

    println!(
        "{:<8} {:<8} {:<5} {:>12} {:>12} {:>12} {:>12}",
        "X", "Y", "Zoom", "West", "South", "East", "North"
    );
    for (x, y, z) in tiles_for_point(&point, args.zoom, &scheme) {
        let (west, south, east, north) = tile_to_bounding_rectangle(&scheme, x, y, z).to_degrees();
        println!(
            "{:<8} {:<8} {:<5} {:>12.6} {:>12.6} {:>12.6} {:>12.6}",
            x, y, z, west, south, east, north
        );
    }
    Ok(())
}
