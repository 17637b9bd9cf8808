//! Projection, clipping and the multi-resolution tile index

pub mod clip;
pub mod index;
pub mod project;

pub use index::{SpatialIndex, TileContent, TileFeature, TileGeometry};
