//! # Tilelet
//!
//! Vector tiles served from a periodically refreshed remote GeoJSON dataset.
//!
//! A [`Source`] fetches one dataset (a GeoJSON document or a "lots" JSON
//! feed), builds a multi-resolution spatial index over it, keeps that index
//! in a TTL cache and slices gzipped Mapbox Vector Tiles out of it on demand.
//!
//! ```ignore
//! use tilelet::{Source, SourceConfig};
//!
//! let fallback = SourceConfig::caching("https://example.com/parking.json");
//! let source = Source::create("parking://?format=lots&layer=parking", fallback).await?;
//! let tile = source.get_tile(14, 8710, 5670).await?;
//! ```

pub mod core;
pub mod data;
pub mod fetch;
#[cfg(feature = "debug")]
pub mod logging;
pub mod prelude;
pub mod spatial;
pub mod tiles;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    config::{RetryConfig, SourceConfig, TileOptions},
    geo::{LatLng, Point, TileCoord},
};

pub use data::{
    formats::{normalize, SourceFormat},
    geojson::{Feature, FeatureCollection, Geometry, Position, Properties},
};

pub use fetch::{
    client::{HttpClient, HttpResponse, ReqwestClient, TransportError},
    retry::{RetryPolicy, RetryingFetcher},
};

pub use spatial::index::{SpatialIndex, TileContent, TileFeature, TileGeometry};

pub use tiles::{
    cache::{CacheEntry, CacheStats, CacheStatus, IndexLoader, TileIndexCache},
    encoder::{encode_tile, EncodedTile},
    loader::DatasetLoader,
    protocol::{register_protocols, ProtocolRegistry},
    source::{Descriptor, LayerDescriptor, Source},
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by a tile source.
///
/// Every variant is `Clone`: one failed index build is delivered to all the
/// requests that were waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Normalization error: {0}")]
    Normalization(#[from] NormalizationError),

    #[error("Index build error: {0}")]
    Build(String),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Construction error: {0}")]
    Construction(String),

    #[error("Invalid tile coordinate {z}/{x}/{y}")]
    InvalidTile { z: u8, x: u32, y: u32 },
}

/// Failure of the retrying fetcher
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// The server answered with a status that is not worth retrying
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// A transport failure the retry policy chose not to retry
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// Every attempt of the retry budget failed
    #[error("gave up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: String,
    },

    /// The HTTP client itself could not be set up
    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Malformed upstream payload
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizationError {
    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("payload has no `lots` array")]
    MissingLots,

    #[error("lot #{index} is invalid: {reason}")]
    InvalidLot { index: usize, reason: String },

    #[error("feature #{index} is invalid: {reason}")]
    InvalidFeature { index: usize, reason: String },

    #[error("unsupported GeoJSON root: {0}")]
    UnsupportedRoot(String),
}

/// Failure while turning an index slice into tile bytes
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EncodeError {
    #[error("tile codec error: {0}")]
    Codec(String),

    #[error("compression error: {0}")]
    Compression(String),
}

impl From<mvt::Error> for EncodeError {
    fn from(err: mvt::Error) -> Self {
        EncodeError::Codec(err.to_string())
    }
}

impl From<std::io::Error> for EncodeError {
    fn from(err: std::io::Error) -> Self {
        EncodeError::Compression(err.to_string())
    }
}

impl From<serde_json::Error> for NormalizationError {
    fn from(err: serde_json::Error) -> Self {
        NormalizationError::Json(err.to_string())
    }
}

impl Error {
    /// Whether the error came from the index build path and left no cache entry behind
    pub fn is_build_failure(&self) -> bool {
        matches!(
            self,
            Error::Fetch(_) | Error::Normalization(_) | Error::Build(_)
        )
    }
}
