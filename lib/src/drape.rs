//! Drape relative-to-ground polygons over terrain.

use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::entity::{EntityCollection, Ring};
use crate::error::Result;
use crate::geometry::{ECEFPoint3, GeodeticHeight, GeodeticPoint3};
use crate::terrain::{sample_terrain, TerrainProvider};

/// Level at which terrain is sampled unless configured otherwise
pub const DEFAULT_SAMPLE_LEVEL: u32 = 11;

/// A ring whose terrain query failed and which kept its positions
#[derive(Debug, Clone, PartialEq)]
pub struct RingFailure {
    pub entity_id: String,
    pub ring: Ring,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrapeReport {
    pub entities: usize,
    pub rings: usize,
    pub failures: Vec<RingFailure>,
}

impl DrapeReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Lift a ring's vertices onto the terrain: each vertex keeps its
/// horizontal position and gets its own height plus the ground height.
pub async fn sample_ring_heights<P: TerrainProvider>(
    provider: &P,
    level: u32,
    positions: &[ECEFPoint3],
) -> Result<Vec<ECEFPoint3>> {
    let ellipsoid = *provider.ellipsoid();
    let cartographic: Vec<GeodeticPoint3> = positions.iter().map(|p| p.to_geodetic(&ellipsoid)).collect();

    let ground = sample_terrain(provider, level, &cartographic).await?;

    Ok(cartographic
        .iter()
        .zip(ground)
        .map(|(authored, ground)| ground.with_height(ground.height() + authored.height()).to_ecef(&ellipsoid))
        .collect())
}

/// Drape every polygon whose entity id is in `ids`. One terrain query is
/// issued per ring and all of them run concurrently; each result replaces
/// only its own ring. Failed rings are logged, reported and left as they
/// were.
pub async fn drape_relative_polygons<P: TerrainProvider>(
    entities: &mut EntityCollection,
    ids: &HashSet<String>,
    provider: &P,
    level: u32,
) -> DrapeReport {
    let mut report = DrapeReport::default();
    let mut queries = FuturesUnordered::new();

    for entity in entities.values_mut() {
        if !ids.contains(&entity.id) {
            continue;
        }
        let Some(polygon) = entity.polygon.as_mut() else {
            continue;
        };

        polygon.use_per_position_height();
        report.entities += 1;

        for (ring, positions) in polygon.rings() {
            let entity_id = entity.id.clone();
            let positions = positions.to_vec();
            queries.push(async move {
                let result = sample_ring_heights(provider, level, &positions).await;
                (entity_id, ring, result)
            });
        }
    }

    while let Some((entity_id, ring, result)) = queries.next().await {
        match result {
            Ok(positions) => {
                let replaced = entities
                    .get_by_id_mut(&entity_id)
                    .and_then(|entity| entity.polygon.as_mut())
                    .is_some_and(|polygon| polygon.replace_ring(ring, positions));
                if replaced {
                    report.rings += 1;
                }
            }
            Err(e) => {
                warn!(entity = %entity_id, %ring, error = %e, "terrain query failed, ring left unchanged");
                report.failures.push(RingFailure {
                    entity_id,
                    ring,
                    message: e.to_string(),
                });
            }
        }
    }

    info!(
        entities = report.entities,
        rings = report.rings,
        failures = report.failures.len(),
        "draped relative-to-ground polygons"
    );
    report
}
