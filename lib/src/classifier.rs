//! Find the placemarks whose polygons are positioned relative to the ground.

use std::collections::HashSet;
use tracing::debug;

use crate::entity::AltitudeMode;
use crate::error::{DrapeError, Result};
use crate::xml::{parse_document, XmlNode};

/// Altitude mode of a placemark's first polygon, if it names one
fn polygon_altitude_mode(placemark: &XmlNode) -> Option<&str> {
    placemark
        .first_descendant("Polygon")?
        .first_descendant("altitudeMode")
        .map(XmlNode::text)
}

fn is_relative_to_ground(placemark: &XmlNode) -> bool {
    polygon_altitude_mode(placemark).and_then(AltitudeMode::from_kml) == Some(AltitudeMode::RelativeToGround)
}

fn parse_kml_root(text: &str) -> Result<XmlNode> {
    let root = parse_document(text)?;
    if root.name != "kml" {
        return Err(DrapeError::MalformedDocument(format!(
            "expected <kml> root element, found <{}>",
            root.name
        )));
    }
    Ok(root)
}

/// Document-order indices of the placemarks in `text` whose polygon
/// altitude mode is relative to ground. The document root must be `<kml>`.
pub fn relative_to_ground_placemarks(text: &str) -> Result<HashSet<usize>> {
    let root = parse_kml_root(text)?;

    let indices: HashSet<usize> = root
        .descendants("Placemark")
        .enumerate()
        .filter(|(_, placemark)| is_relative_to_ground(placemark))
        .map(|(index, _)| index)
        .collect();

    debug!(count = indices.len(), "classified relative-to-ground placemarks");
    Ok(indices)
}

/// Ids of the placemarks in `text` whose polygon altitude mode is
/// relative to ground. The document root must be `<kml>`.
pub fn relative_to_ground_ids(text: &str) -> Result<HashSet<String>> {
    let root = parse_kml_root(text)?;

    Ok(root
        .descendants("Placemark")
        .filter(|placemark| is_relative_to_ground(placemark))
        .filter_map(|placemark| placemark.attribute("id"))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{kml_document, polygon_placemark};

    const RING: &str = "1,1,10 2,1,10 2,2,10 1,1,10";

    #[test]
    fn test_only_relative_to_ground_matches() {
        let body = [
            polygon_placemark(Some("relative"), "relativeToGround", RING, &[]),
            polygon_placemark(Some("capitalised"), "RelativeToGround", RING, &[]),
            polygon_placemark(Some("absolute"), "Absolute", RING, &[]),
            polygon_placemark(Some("clamped"), "clampToGround", RING, &[]),
        ]
        .concat();

        let ids = relative_to_ground_ids(&kml_document(&body)).unwrap();
        let expected: HashSet<String> = ["relative", "capitalised"].iter().map(|s| s.to_string()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_missing_pieces_are_not_matched() {
        let body = [
            polygon_placemark(None, "relativeToGround", RING, &[]),
            r#"<Placemark id="no-polygon"><altitudeMode>relativeToGround</altitudeMode></Placemark>"#.to_string(),
            r#"<Placemark id="no-mode"><Polygon/></Placemark>"#.to_string(),
        ]
        .concat();

        let ids = relative_to_ground_ids(&kml_document(&body)).unwrap();
        assert!(ids.is_empty());
    }

    #[test]
    fn test_nested_altitude_mode_is_found() {
        let body = r#"<Placemark id="nested"><MultiGeometry><Polygon>
            <extrude>1</extrude><altitudeMode>relativeToGround</altitudeMode>
            </Polygon></MultiGeometry></Placemark>"#;
        let ids = relative_to_ground_ids(&kml_document(body)).unwrap();
        assert!(ids.contains("nested"));
    }

    #[test]
    fn test_placemark_indices_follow_document_order() {
        let body = [
            polygon_placemark(Some("dup"), "absolute", RING, &[]),
            polygon_placemark(Some("dup"), "relativeToGround", RING, &[]),
            polygon_placemark(None, "relativeToGround", RING, &[]),
        ]
        .concat();

        let indices = relative_to_ground_placemarks(&kml_document(&body)).unwrap();
        assert_eq!(indices, HashSet::from([1, 2]));
    }

    #[test]
    fn test_wrong_root_is_malformed() {
        let text = r#"<gpx><Placemark id="a"><Polygon><altitudeMode>relativeToGround</altitudeMode></Polygon></Placemark></gpx>"#;
        assert!(matches!(
            relative_to_ground_ids(text),
            Err(DrapeError::MalformedDocument(_))
        ));
        assert!(matches!(
            relative_to_ground_placemarks(text),
            Err(DrapeError::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_empty_document() {
        let ids = relative_to_ground_ids(&kml_document("")).unwrap();
        assert!(ids.is_empty());
    }
}
