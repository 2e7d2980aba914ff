//! Placemark entities as held by the viewer

use crate::geometry::ECEFPoint3;

/// How the heights of a KML geometry are interpreted
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AltitudeMode {
    #[default]
    ClampToGround,
    RelativeToGround,
    Absolute,
    ClampToSeaFloor,
    RelativeToSeaFloor,
}

impl AltitudeMode {
    /// Parse an `<altitudeMode>` value. Matching ignores ASCII case, so the
    /// nonstandard `RelativeToGround` spelling is accepted.
    pub fn from_kml(value: &str) -> Option<Self> {
        let value = value.trim();
        [
            AltitudeMode::ClampToGround,
            AltitudeMode::RelativeToGround,
            AltitudeMode::Absolute,
            AltitudeMode::ClampToSeaFloor,
            AltitudeMode::RelativeToSeaFloor,
        ]
        .into_iter()
        .find(|mode| mode.as_kml_str().eq_ignore_ascii_case(value))
    }

    pub fn as_kml_str(&self) -> &'static str {
        match self {
            AltitudeMode::ClampToGround => "clampToGround",
            AltitudeMode::RelativeToGround => "relativeToGround",
            AltitudeMode::Absolute => "absolute",
            AltitudeMode::ClampToSeaFloor => "clampToSeaFloor",
            AltitudeMode::RelativeToSeaFloor => "relativeToSeaFloor",
        }
    }
}

/// Outer boundary positions plus holes, each hole itself a hierarchy
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolygonHierarchy {
    pub positions: Vec<ECEFPoint3>,
    pub holes: Vec<PolygonHierarchy>,
}

impl PolygonHierarchy {
    pub fn new(positions: Vec<ECEFPoint3>, holes: Vec<PolygonHierarchy>) -> Self {
        Self { positions, holes }
    }
}

/// Boundary of a polygon: the outer ring or one of its holes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ring {
    Outer,
    Hole(usize),
}

impl std::fmt::Display for Ring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ring::Outer => write!(f, "outer"),
            Ring::Hole(index) => write!(f, "hole:{index}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolygonGraphics {
    pub hierarchy: PolygonHierarchy,
    pub altitude_mode: AltitudeMode,
    /// Fixed rendering height; `None` when the vertex heights are used.
    pub height: Option<f64>,
    pub per_position_height: bool,
    pub extruded: bool,
}

impl PolygonGraphics {
    pub fn new(hierarchy: PolygonHierarchy, altitude_mode: AltitudeMode) -> Self {
        let per_position_height = altitude_mode == AltitudeMode::Absolute;
        Self {
            hierarchy,
            altitude_mode,
            height: if per_position_height { None } else { Some(0.0) },
            per_position_height,
            extruded: false,
        }
    }

    /// Every ring of the polygon, outer boundary first
    pub fn rings(&self) -> impl Iterator<Item = (Ring, &[ECEFPoint3])> + '_ {
        std::iter::once((Ring::Outer, self.hierarchy.positions.as_slice())).chain(
            self.hierarchy
                .holes
                .iter()
                .enumerate()
                .map(|(index, hole)| (Ring::Hole(index), hole.positions.as_slice())),
        )
    }

    pub fn ring(&self, ring: Ring) -> Option<&[ECEFPoint3]> {
        match ring {
            Ring::Outer => Some(&self.hierarchy.positions),
            Ring::Hole(index) => self.hierarchy.holes.get(index).map(|h| h.positions.as_slice()),
        }
    }

    /// Replace one ring's positions, leaving the other rings untouched.
    /// Returns false when the hole does not exist.
    pub fn replace_ring(&mut self, ring: Ring, positions: Vec<ECEFPoint3>) -> bool {
        match ring {
            Ring::Outer => {
                self.hierarchy.positions = positions;
                true
            }
            Ring::Hole(index) => match self.hierarchy.holes.get_mut(index) {
                Some(hole) => {
                    hole.positions = positions;
                    true
                }
                None => false,
            },
        }
    }

    /// Render each vertex at its own height instead of a fixed height
    pub fn use_per_position_height(&mut self) {
        self.height = None;
        self.per_position_height = true;
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entity {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub polygon: Option<PolygonGraphics>,
    pub position: Option<ECEFPoint3>,
}

impl Entity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Entities in insertion order with unique ids
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityCollection {
    entities: Vec<Entity>,
}

impl EntityCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity. Returns it back when the id is already taken.
    pub fn add(&mut self, entity: Entity) -> std::result::Result<(), Entity> {
        if self.contains(&entity.id) {
            return Err(entity);
        }
        self.entities.push(entity);
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.iter().any(|e| e.id == id)
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn get_by_id_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id == id)
    }

    pub fn values(&self) -> &[Entity] {
        &self.entities
    }

    pub fn values_mut(&mut self) -> &mut [Entity] {
        &mut self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(offset: f64) -> Vec<ECEFPoint3> {
        vec![
            ECEFPoint3::new(offset, 0.0, 0.0),
            ECEFPoint3::new(offset + 1.0, 0.0, 0.0),
            ECEFPoint3::new(offset + 1.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn test_altitude_mode_parsing() {
        assert_eq!(AltitudeMode::from_kml("relativeToGround"), Some(AltitudeMode::RelativeToGround));
        assert_eq!(AltitudeMode::from_kml("RelativeToGround"), Some(AltitudeMode::RelativeToGround));
        assert_eq!(AltitudeMode::from_kml(" absolute "), Some(AltitudeMode::Absolute));
        assert_eq!(AltitudeMode::from_kml("onTheMoon"), None);
    }

    #[test]
    fn test_replace_hole_leaves_other_rings() {
        let hierarchy = PolygonHierarchy::new(
            square(0.0),
            vec![PolygonHierarchy::new(square(10.0), vec![]), PolygonHierarchy::new(square(20.0), vec![])],
        );
        let mut polygon = PolygonGraphics::new(hierarchy, AltitudeMode::RelativeToGround);
        let before = polygon.clone();

        assert!(polygon.replace_ring(Ring::Hole(1), square(30.0)));
        assert_eq!(polygon.ring(Ring::Outer), before.ring(Ring::Outer));
        assert_eq!(polygon.ring(Ring::Hole(0)), before.ring(Ring::Hole(0)));
        assert_eq!(polygon.ring(Ring::Hole(1)), Some(square(30.0).as_slice()));
        assert!(!polygon.replace_ring(Ring::Hole(2), square(40.0)));

        let labels: Vec<String> = polygon.rings().map(|(ring, _)| ring.to_string()).collect();
        assert_eq!(labels, vec!["outer", "hole:0", "hole:1"]);
    }

    #[test]
    fn test_height_mode_defaults() {
        let relative = PolygonGraphics::new(PolygonHierarchy::default(), AltitudeMode::RelativeToGround);
        assert_eq!(relative.height, Some(0.0));
        assert!(!relative.per_position_height);

        let absolute = PolygonGraphics::new(PolygonHierarchy::default(), AltitudeMode::Absolute);
        assert_eq!(absolute.height, None);
        assert!(absolute.per_position_height);
    }

    #[test]
    fn test_collection_rejects_duplicate_ids() {
        let mut collection = EntityCollection::new();
        assert!(collection.add(Entity::new("a")).is_ok());
        assert!(collection.add(Entity::new("a")).is_err());
        assert_eq!(collection.len(), 1);
        assert!(collection.get_by_id("a").is_some());
    }
}
