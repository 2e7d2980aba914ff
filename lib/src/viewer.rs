//! Viewer context: terrain provider plus the loaded data sources.

use std::path::Path;
use tracing::info;

use crate::classifier::relative_to_ground_placemarks;
use crate::drape::{drape_relative_polygons, DrapeReport, DEFAULT_SAMPLE_LEVEL};
use crate::error::Result;
use crate::kml_reader::{fetch_document, read_kml_str, DataSource};
use crate::terrain::TerrainProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerOptions {
    /// Terrain level used when sampling ground heights
    pub sample_level: u32,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            sample_level: DEFAULT_SAMPLE_LEVEL,
        }
    }
}

pub struct Viewer<P> {
    terrain_provider: P,
    options: ViewerOptions,
    data_sources: Vec<DataSource>,
}

impl<P: TerrainProvider> Viewer<P> {
    pub fn new(terrain_provider: P) -> Self {
        Self::with_options(terrain_provider, ViewerOptions::default())
    }

    pub fn with_options(terrain_provider: P, options: ViewerOptions) -> Self {
        Self {
            terrain_provider,
            options,
            data_sources: Vec::new(),
        }
    }

    pub fn options(&self) -> &ViewerOptions {
        &self.options
    }

    pub fn terrain_provider(&self) -> &P {
        &self.terrain_provider
    }

    pub fn set_terrain_provider(&mut self, terrain_provider: P) {
        self.terrain_provider = terrain_provider;
    }

    pub fn data_sources(&self) -> &[DataSource] {
        &self.data_sources
    }

    /// Register a data source and return its index
    pub fn add_data_source(&mut self, data_source: DataSource) -> usize {
        self.data_sources.push(data_source);
        self.data_sources.len() - 1
    }

    /// Load placemarks from KML text, then drape the relative-to-ground
    /// polygons. The data source is registered before classification, so it
    /// stays in the viewer (unadjusted) when classification fails.
    pub async fn load_kml_str(&mut self, text: &str, source: Option<&Path>) -> Result<DrapeReport> {
        let data_source = read_kml_str(text, source, self.terrain_provider.ellipsoid())?;
        let index = self.add_data_source(data_source);

        let placemarks = relative_to_ground_placemarks(text)?;
        info!(matched = placemarks.len(), "relative-to-ground placemarks");

        let data_source = &mut self.data_sources[index];
        let ids = data_source.entity_ids(&placemarks);
        let report = drape_relative_polygons(
            &mut data_source.entities,
            &ids,
            &self.terrain_provider,
            self.options.sample_level,
        )
        .await;
        Ok(report)
    }

    pub async fn load_kml(&mut self, path: &Path) -> Result<DrapeReport> {
        let text = fetch_document(path)?;
        self.load_kml_str(&text, Some(path)).await
    }
}
