//! Canonical feature model and payload normalization

pub mod formats;
pub mod geojson;

pub use formats::{normalize, SourceFormat};
pub use geojson::{Feature, FeatureCollection, Geometry, Position, Properties};
