//! Error types for loading, classifying and draping placemarks

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading KML, reading terrain or draping polygons
#[derive(Error, Debug)]
pub enum DrapeError {
    #[error("Failed to fetch {path}: {source}")]
    Fetch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Invalid coordinates in placemark {placemark}: {message}")]
    InvalidCoordinates { placemark: String, message: String },

    #[error("Terrain query failed at level {level}: {message}")]
    TerrainQuery { level: u32, message: String },

    #[error("Failed to decode terrain tile {path}: {message}")]
    TileDecode { path: PathBuf, message: String },

    #[error("Unsupported terrain layer: {0}")]
    UnsupportedLayer(String),

    #[error("Invalid layer descriptor: {0}")]
    Layer(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DrapeError>;
