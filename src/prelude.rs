//! Prelude module for common tilelet types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use tilelet::prelude::*;`

pub use crate::core::{
    config::{RetryConfig, SourceConfig, TileOptions},
    geo::{LatLng, TileCoord},
};

pub use crate::data::{normalize, Feature, FeatureCollection, Geometry, SourceFormat};

pub use crate::fetch::{HttpClient, HttpResponse, RetryPolicy, RetryingFetcher};

pub use crate::spatial::{SpatialIndex, TileContent};

pub use crate::tiles::{
    register_protocols, CacheStatus, Descriptor, EncodedTile, IndexLoader, ProtocolRegistry,
    Source, TileIndexCache,
};

pub use crate::{Error, Result};
