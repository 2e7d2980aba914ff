use crate::entity::EntityCollection;
use crate::error::Result;
use crate::geometry::{CartesianXY, CartesianZ, Ellipsoid, GeodeticHeight, GeodeticLatLon};
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordType {
    Geocentric,
    Geodetic,
}

/// One row per polygon vertex: entity id, ring, vertex index, coordinates
pub fn to_csv_string(collection: &EntityCollection, coord_type: CoordType, ellipsoid: &Ellipsoid) -> String {
    let mut rows = String::new();

    match coord_type {
        CoordType::Geocentric => rows.push_str("id, ring, index, x, y, z\n"),
        CoordType::Geodetic => rows.push_str("id, ring, index, lon, lat, height\n"),
    }

    for entity in collection.values() {
        let Some(polygon) = &entity.polygon else {
            continue;
        };
        for (ring, positions) in polygon.rings() {
            for (index, position) in positions.iter().enumerate() {
                let coordinates = match coord_type {
                    CoordType::Geocentric => {
                        format!("{:.6}, {:.6}, {:.6}", position.x(), position.y(), position.z())
                    }
                    CoordType::Geodetic => {
                        let p = position.to_geodetic(ellipsoid).to_degrees();
                        format!("{:.12}, {:.12}, {:.6}", p.lon(), p.lat(), p.height())
                    }
                };
                rows.push_str(&format!("{}, {ring}, {index}, {coordinates}\n", entity.id));
            }
        }
    }
    rows
}

pub fn write_csv(
    collection: &EntityCollection,
    file_path: &Path,
    coord_type: CoordType,
    ellipsoid: &Ellipsoid,
) -> Result<()> {
    let mut file = File::create(file_path)?;
    file.write_all(to_csv_string(collection, coord_type, ellipsoid).as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kml_reader::read_kml_str;
    use crate::test_utils::{kml_document, polygon_placemark, scratch_dir};

    fn collection() -> EntityCollection {
        let body = polygon_placemark(
            Some("lot"),
            "absolute",
            "0,0,10 1,0,10 1,1,10 0,0,10",
            &["0.2,0.2,0 0.4,0.2,0 0.2,0.2,0"],
        );
        read_kml_str(&kml_document(&body), None, &Ellipsoid::wgs84()).unwrap().entities
    }

    #[test]
    fn test_geodetic_rows() {
        let csv = to_csv_string(&collection(), CoordType::Geodetic, &Ellipsoid::wgs84());
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "id, ring, index, lon, lat, height");
        assert_eq!(lines.len(), 1 + 4 + 3);
        assert!(lines[1].starts_with("lot, outer, 0, "));
        assert!(lines[5].starts_with("lot, hole:0, 0, "));

        let fields: Vec<f64> = lines[2].split(", ").skip(3).map(|v| v.parse().unwrap()).collect();
        assert!((fields[0] - 1.0).abs() < 1e-9);
        assert!(fields[1].abs() < 1e-9);
        assert!((fields[2] - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_geocentric_file() {
        let dir = scratch_dir("csv_writer");
        let path = dir.join("lot.csv");
        write_csv(&collection(), &path, CoordType::Geocentric, &Ellipsoid::wgs84()).unwrap();

        let csv = std::fs::read_to_string(&path).unwrap();
        let first = csv.lines().nth(1).unwrap();
        let x: f64 = first.split(", ").nth(3).unwrap().parse().unwrap();
        assert!((x - 6378147.0).abs() < 1e-3);
    }
}
