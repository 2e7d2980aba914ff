//! `layer.json` terrain descriptor.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{DrapeError, Result};
use crate::quantized_mesh_tile::TilingScheme;

pub const DEFAULT_TILE_TEMPLATE: &str = "{z}/{x}/{y}.terrain";
pub const GEOGRAPHIC_PROJECTION: &str = "EPSG:4326";

/// Inclusive range of available tiles at one level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileRange {
    pub start_x: u32,
    pub start_y: u32,
    pub end_x: u32,
    pub end_y: u32,
}

impl TileRange {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        (self.start_x..=self.end_x).contains(&x) && (self.start_y..=self.end_y).contains(&y)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LayerDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_tiles")]
    pub tiles: Vec<String>,
    #[serde(default = "default_projection")]
    pub projection: String,
    #[serde(default)]
    pub minzoom: Option<u32>,
    #[serde(default)]
    pub maxzoom: Option<u32>,
    /// Per level, the tile ranges present. Empty means "assume everything".
    #[serde(default)]
    pub available: Vec<Vec<TileRange>>,
    #[serde(default)]
    pub extensions: Vec<String>,
}

fn default_scheme() -> String {
    "tms".to_string()
}

fn default_tiles() -> Vec<String> {
    vec![DEFAULT_TILE_TEMPLATE.to_string()]
}

fn default_projection() -> String {
    GEOGRAPHIC_PROJECTION.to_string()
}

impl Default for LayerDescriptor {
    fn default() -> Self {
        Self {
            name: None,
            format: None,
            version: None,
            scheme: default_scheme(),
            tiles: default_tiles(),
            projection: default_projection(),
            minzoom: None,
            maxzoom: None,
            available: Vec::new(),
            extensions: Vec::new(),
        }
    }
}

impl LayerDescriptor {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| DrapeError::Fetch {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Only geographic quantized-mesh layers can be sampled.
    pub fn check_supported(&self) -> Result<()> {
        if self.projection != GEOGRAPHIC_PROJECTION {
            return Err(DrapeError::UnsupportedLayer(format!(
                "projection {} (only {GEOGRAPHIC_PROJECTION} is supported)",
                self.projection
            )));
        }
        match &self.format {
            Some(format) if !format.starts_with("quantized-mesh") => Err(
                DrapeError::UnsupportedLayer(format!("tile format {format}")),
            ),
            _ => Ok(()),
        }
    }

    pub fn tiling_scheme(&self) -> Result<TilingScheme> {
        match self.scheme.as_str() {
            "tms" => Ok(TilingScheme::Tms),
            "slippyMap" | "xyz" => Ok(TilingScheme::Slippy),
            other => Err(DrapeError::UnsupportedLayer(format!("tiling scheme {other}"))),
        }
    }

    /// Most detailed level the layer declares, if it declares one
    pub fn max_level(&self) -> Option<u32> {
        self.maxzoom.or_else(|| {
            self.available
                .len()
                .checked_sub(1)
                .and_then(|level| u32::try_from(level).ok())
        })
    }

    pub fn is_available(&self, zoom: u32, x: u32, y: u32) -> bool {
        if self.available.is_empty() {
            return self.max_level().map_or(true, |max| zoom <= max);
        }
        self.available
            .get(zoom as usize)
            .is_some_and(|ranges| ranges.iter().any(|range| range.contains(x, y)))
    }

    /// Location of a tile below `root`, from the first tile template.
    /// Query strings (`?v={version}`) are dropped.
    pub fn tile_path(&self, root: &Path, zoom: u32, x: u32, y: u32) -> PathBuf {
        let template = self
            .tiles
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_TILE_TEMPLATE);
        let template = template.split('?').next().unwrap_or(template);

        let relative = template
            .replace("{z}", &zoom.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
            .replace("{version}", self.version.as_deref().unwrap_or(""));

        root.join(relative)
    }
}
