use crate::entity::{EntityCollection, PolygonGraphics};
use crate::error::Result;
use crate::geometry::{ECEFPoint3, Ellipsoid, GeodeticHeight, GeodeticLatLon};
use quick_xml::escape::escape;
use std::fs::File;
use std::io::Write;
use std::path::Path;

fn push_coordinates(kml_data: &mut String, positions: &[ECEFPoint3], ellipsoid: &Ellipsoid) {
    kml_data.push_str("<coordinates>");
    for position in positions {
        let point = position.to_geodetic(ellipsoid).to_degrees();
        kml_data.push_str(&format!(
            "{:.9},{:.9},{:.3}\n",
            point.lon(),
            point.lat(),
            point.height()
        ));
    }
    kml_data.push_str("</coordinates>");
}

fn push_polygon(kml_data: &mut String, polygon: &PolygonGraphics, ellipsoid: &Ellipsoid) {
    // draped polygons carry absolute vertex heights now
    let altitude_mode = if polygon.per_position_height {
        "absolute"
    } else {
        polygon.altitude_mode.as_kml_str()
    };

    kml_data.push_str("<Polygon>");
    if polygon.extruded {
        kml_data.push_str("<extrude>1</extrude>");
    }
    kml_data.push_str(&format!("<altitudeMode>{altitude_mode}</altitudeMode>"));

    kml_data.push_str("<outerBoundaryIs><LinearRing>");
    push_coordinates(kml_data, &polygon.hierarchy.positions, ellipsoid);
    kml_data.push_str("</LinearRing></outerBoundaryIs>");

    for hole in &polygon.hierarchy.holes {
        kml_data.push_str("<innerBoundaryIs><LinearRing>");
        push_coordinates(kml_data, &hole.positions, ellipsoid);
        kml_data.push_str("</LinearRing></innerBoundaryIs>");
    }
    kml_data.push_str("</Polygon>");
}

/// Render the entities as a KML document, coordinates in degrees
pub fn to_kml_string(collection: &EntityCollection, ellipsoid: &Ellipsoid) -> String {
    let mut kml_data = String::new();

    kml_data.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    kml_data.push('\n');
    kml_data.push_str(r#"<kml xmlns="http://www.opengis.net/kml/2.2">"#);
    kml_data.push_str("<Document>\n");

    for entity in collection.values() {
        kml_data.push_str(&format!(r#"<Placemark id="{}">"#, escape(entity.id.as_str())));
        if let Some(name) = &entity.name {
            kml_data.push_str(&format!("<name>{}</name>", escape(name.as_str())));
        }
        if let Some(description) = &entity.description {
            kml_data.push_str(&format!("<description>{}</description>", escape(description.as_str())));
        }

        if let Some(polygon) = &entity.polygon {
            push_polygon(&mut kml_data, polygon, ellipsoid);
        }
        if let Some(position) = &entity.position {
            kml_data.push_str("<Point><altitudeMode>absolute</altitudeMode>");
            push_coordinates(&mut kml_data, std::slice::from_ref(position), ellipsoid);
            kml_data.push_str("</Point>");
        }

        kml_data.push_str("</Placemark>\n");
    }

    kml_data.push_str("</Document></kml>\n");
    kml_data
}

pub fn write_kml(collection: &EntityCollection, file_path: &Path, ellipsoid: &Ellipsoid) -> Result<()> {
    let mut file = File::create(file_path)?;
    file.write_all(to_kml_string(collection, ellipsoid).as_bytes())?;
    Ok(())
}
