//! Placemark loader: KML text to an entity collection.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entity::{AltitudeMode, Entity, EntityCollection, PolygonGraphics, PolygonHierarchy};
use crate::error::{DrapeError, Result};
use crate::geometry::{ECEFPoint3, Ellipsoid, GeodeticPoint3};
use crate::xml::{parse_document, XmlNode};

/// Entities loaded from one KML document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSource {
    pub name: Option<String>,
    pub source: Option<PathBuf>,
    pub entities: EntityCollection,
    /// Entity id of each `<Placemark>`, in document order
    pub placemark_ids: Vec<String>,
}

impl DataSource {
    /// Entity ids for a set of placemark indices (document order)
    pub fn entity_ids(&self, placemarks: &HashSet<usize>) -> HashSet<String> {
        self.placemark_ids
            .iter()
            .enumerate()
            .filter(|(index, _)| placemarks.contains(index))
            .map(|(_, id)| id.clone())
            .collect()
    }
}

pub fn fetch_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| DrapeError::Fetch {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_kml(path: &Path, ellipsoid: &Ellipsoid) -> Result<DataSource> {
    let text = fetch_document(path)?;
    read_kml_str(&text, Some(path), ellipsoid)
}

pub fn read_kml_str(text: &str, source: Option<&Path>, ellipsoid: &Ellipsoid) -> Result<DataSource> {
    let root = parse_document(text)?;

    let name = root
        .first_descendant("Document")
        .and_then(|doc| doc.child("name"))
        .map(|n| n.text().to_string());

    let mut entities = EntityCollection::new();
    let mut placemark_ids = Vec::new();
    for placemark in root.descendants("Placemark") {
        let entity = read_placemark(placemark, &entities, ellipsoid)?;
        placemark_ids.push(entity.id.clone());
        if let Err(entity) = entities.add(entity) {
            warn!(id = %entity.id, "dropping placemark with duplicate id");
        }
    }

    info!(
        source = ?source,
        entities = entities.len(),
        "loaded KML placemarks"
    );

    Ok(DataSource {
        name,
        source: source.map(Path::to_path_buf),
        entities,
        placemark_ids,
    })
}

fn read_placemark(
    placemark: &XmlNode,
    existing: &EntityCollection,
    ellipsoid: &Ellipsoid,
) -> Result<Entity> {
    let id = match placemark.attribute("id").filter(|id| !id.is_empty()) {
        Some(id) if !existing.contains(id) => id.to_string(),
        Some(id) => {
            let generated = Uuid::new_v4().to_string();
            debug!(duplicate = id, id = %generated, "placemark id already used, generating one");
            generated
        }
        None => Uuid::new_v4().to_string(),
    };

    let mut entity = Entity::new(id);
    entity.name = placemark.child("name").map(|n| n.text().to_string());
    entity.description = placemark.child("description").map(|n| n.text().to_string());

    if let Some(polygon) = placemark.first_descendant("Polygon") {
        entity.polygon = Some(read_polygon(polygon, &entity.id, ellipsoid)?);
    }

    if let Some(point) = placemark.first_descendant("Point") {
        let coordinates = point
            .child("coordinates")
            .map(XmlNode::text)
            .unwrap_or_default();
        entity.position = parse_coordinates(coordinates, &entity.id, ellipsoid)?
            .into_iter()
            .next();
    }

    Ok(entity)
}

fn read_polygon(polygon: &XmlNode, id: &str, ellipsoid: &Ellipsoid) -> Result<PolygonGraphics> {
    let altitude_mode = match polygon.child("altitudeMode").map(XmlNode::text) {
        None => AltitudeMode::default(),
        Some(value) => AltitudeMode::from_kml(value).unwrap_or_else(|| {
            warn!(placemark = id, value, "unknown altitudeMode, using clampToGround");
            AltitudeMode::default()
        }),
    };

    let outer = match polygon.child("outerBoundaryIs") {
        Some(boundary) => read_ring(boundary, id, ellipsoid)?,
        None => Vec::new(),
    };

    let holes = polygon
        .children_named("innerBoundaryIs")
        .map(|boundary| read_ring(boundary, id, ellipsoid).map(|p| PolygonHierarchy::new(p, vec![])))
        .collect::<Result<Vec<_>>>()?;

    let mut graphics = PolygonGraphics::new(PolygonHierarchy::new(outer, holes), altitude_mode);
    graphics.extruded = polygon
        .child("extrude")
        .is_some_and(|e| matches!(e.text(), "1" | "true"));
    Ok(graphics)
}

fn read_ring(boundary: &XmlNode, id: &str, ellipsoid: &Ellipsoid) -> Result<Vec<ECEFPoint3>> {
    let coordinates = boundary
        .child("LinearRing")
        .and_then(|ring| ring.child("coordinates"))
        .map(XmlNode::text)
        .unwrap_or_default();
    parse_coordinates(coordinates, id, ellipsoid)
}

/// Join tuples split by whitespace around commas, e.g. `10, 20, 5`.
fn normalize_tuples(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = true;
        } else if c == ',' {
            pending_space = false;
            out.push(c);
        } else {
            if pending_space && !out.is_empty() && !out.ends_with(',') {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        }
    }
    out
}

/// Parse KML `lon,lat[,alt]` tuples (degrees, metres) into ECEF positions.
pub fn parse_coordinates(text: &str, placemark: &str, ellipsoid: &Ellipsoid) -> Result<Vec<ECEFPoint3>> {
    let invalid = |message: String| DrapeError::InvalidCoordinates {
        placemark: placemark.to_string(),
        message,
    };

    normalize_tuples(text)
        .split_whitespace()
        .map(|tuple| {
            let values = tuple
                .split(',')
                .map(|v| v.parse::<f64>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| invalid(format!("'{tuple}': {e}")))?;

            let (lon, lat, height) = match values.as_slice() {
                [lon, lat] => (*lon, *lat, 0.0),
                [lon, lat, height] => (*lon, *lat, *height),
                _ => return Err(invalid(format!("'{tuple}' is not lon,lat[,alt]"))),
            };
            Ok(GeodeticPoint3::from_degrees(lon, lat, height).to_ecef(ellipsoid))
        })
        .collect()
}
