//! Mapbox Vector Tile encoding of index slices

use crate::core::constants::{TILE_CONTENT_ENCODING, TILE_CONTENT_TYPE};
use crate::data::geojson::Properties;
use crate::spatial::index::{SpatialIndex, TileContent, TileGeometry};
use crate::{EncodeError, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use mvt::{GeomData, GeomEncoder, GeomType, Tile};
use serde_json::Value;
use std::io::Write;

/// Gzipped tile bytes plus the response metadata that goes with them
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedTile {
    pub data: Vec<u8>,
    pub content_type: &'static str,
    pub content_encoding: &'static str,
    pub cache_control: Option<String>,
    /// Number of features in the tile's layer
    pub feature_count: usize,
}

impl EncodedTile {
    /// Response headers as `(name, value)` pairs
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("content-type", self.content_type.to_string()),
            ("content-encoding", self.content_encoding.to_string()),
        ];
        if let Some(cache_control) = &self.cache_control {
            headers.push(("cache-control", cache_control.clone()));
        }
        headers
    }
}

/// Slices tile `z/x/y` out of `index` and encodes it under `layer_name`.
///
/// A tile without data becomes a valid tile holding one empty layer.
/// Compression runs on the blocking pool.
pub async fn encode_tile(
    index: &SpatialIndex,
    z: u8,
    x: u32,
    y: u32,
    layer_name: &str,
    cache_control: Option<String>,
) -> Result<EncodedTile> {
    let content = index.slice_tile(z, x, y);
    let feature_count = content.as_ref().map_or(0, TileContent::len);
    let raw = serialize_tile(content.as_ref(), index.options().extent, layer_name)?;

    let data = tokio::task::spawn_blocking(move || gzip(&raw))
        .await
        .map_err(|e| EncodeError::Compression(format!("compression task failed: {}", e)))??;

    log::trace!(
        "encoded tile {}/{}/{}: {} features, {} bytes",
        z,
        x,
        y,
        feature_count,
        data.len()
    );

    Ok(EncodedTile {
        data,
        content_type: TILE_CONTENT_TYPE,
        content_encoding: TILE_CONTENT_ENCODING,
        cache_control,
        feature_count,
    })
}

/// Serializes a slice into an uncompressed single-layer tile
pub fn serialize_tile(
    content: Option<&TileContent>,
    extent: u32,
    layer_name: &str,
) -> std::result::Result<Vec<u8>, EncodeError> {
    let mut tile = Tile::new(content.map_or(extent, |c| c.extent));
    let mut layer = tile.create_layer(layer_name);

    for feature in content.into_iter().flat_map(|c| c.features.iter()) {
        let geometry = encode_geometry(&feature.geometry)?;
        let mut encoded = layer.into_feature(geometry);
        if let Some(id) = feature.id {
            encoded.set_id(id);
        }
        add_properties(&mut encoded, &feature.properties);
        layer = encoded.into_layer();
    }

    tile.add_layer(layer)?;
    Ok(tile.to_bytes()?)
}

fn encode_geometry(geometry: &TileGeometry) -> std::result::Result<GeomData, EncodeError> {
    let encoder = match geometry {
        TileGeometry::Points(points) => {
            let mut encoder = GeomEncoder::new(GeomType::Point);
            for [x, y] in points {
                encoder = encoder.point(*x as f64, *y as f64)?;
            }
            encoder
        }
        TileGeometry::Lines(paths) => encode_paths(GeomType::Linestring, paths)?,
        TileGeometry::Polygons(rings) => encode_paths(GeomType::Polygon, rings)?,
    };
    Ok(encoder.encode()?)
}

fn encode_paths(
    geom_type: GeomType,
    paths: &[Vec<[i32; 2]>],
) -> std::result::Result<GeomEncoder<f64>, EncodeError> {
    let mut encoder = GeomEncoder::new(geom_type);
    for path in paths {
        for [x, y] in path {
            encoder = encoder.point(*x as f64, *y as f64)?;
        }
        encoder = encoder.complete()?;
    }
    Ok(encoder)
}

/// Scalars are encoded natively, nested values as JSON text, nulls skipped
fn add_properties(feature: &mut mvt::Feature, properties: &Properties) {
    for (key, value) in properties {
        match value {
            Value::Null => {}
            Value::Bool(b) => feature.add_tag_bool(key, *b),
            Value::String(s) => feature.add_tag_string(key, s),
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    feature.add_tag_uint(key, u);
                } else if let Some(i) = n.as_i64() {
                    feature.add_tag_sint(key, i);
                } else if let Some(f) = n.as_f64() {
                    feature.add_tag_double(key, f);
                }
            }
            nested => feature.add_tag_string(key, &nested.to_string()),
        }
    }
}

/// Gzips `bytes` with the default compression level
pub fn gzip(bytes: &[u8]) -> std::result::Result<Vec<u8>, EncodeError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}
