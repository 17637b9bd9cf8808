use crate::{
    core::{bounds::Bounds, config::TileOptions, geo::TileCoord},
    data::geojson::{FeatureCollection, Properties},
    spatial::{
        clip::{clip_to_tile, ClipBox},
        project::{project, simplified, unit_tolerance, ProjectedGeometry, TileTransform},
    },
    Error, Result,
};

use rstar::{RTree, RTreeObject, AABB};
use std::fmt;
use std::sync::Arc;

/// Geometry of one feature in tile-local integer coordinates
#[derive(Debug, Clone, PartialEq)]
pub enum TileGeometry {
    Points(Vec<[i32; 2]>),
    Lines(Vec<Vec<[i32; 2]>>),
    /// Open rings; a positive-area exterior ring is followed by its negative-area holes
    Polygons(Vec<Vec<[i32; 2]>>),
}

/// A feature clipped to one tile
#[derive(Debug, Clone, PartialEq)]
pub struct TileFeature {
    pub id: Option<u64>,
    pub geometry: TileGeometry,
    pub properties: Arc<Properties>,
}

/// Features of one tile, ordered as in the source collection
#[derive(Debug, Clone, PartialEq)]
pub struct TileContent {
    pub coord: TileCoord,
    pub extent: u32,
    pub features: Vec<TileFeature>,
}

impl TileContent {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// One geometry part at one zoom level
#[derive(Debug, Clone)]
struct IndexedPart {
    feature: usize,
    part: usize,
    bounds: Bounds,
    geometry: Arc<ProjectedGeometry>,
    properties: Arc<Properties>,
    id: Option<u64>,
}

// --- rstar integration -------------------------------------------------------------------------

impl RTreeObject for IndexedPart {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.bounds.to_aabb()
    }
}

/// Multi-resolution index over a feature collection.
///
/// Holds one R-tree per zoom level in `0..=max_zoom`, each over geometry
/// simplified for that level. Immutable once built; requests deeper than
/// `max_zoom` are answered from the `max_zoom` level.
pub struct SpatialIndex {
    levels: Vec<RTree<IndexedPart>>,
    max_zoom: u8,
    options: TileOptions,
    feature_count: usize,
    bounds: Option<Bounds>,
}

impl SpatialIndex {
    /// Builds the index. CPU-bound and blocking; performs no I/O.
    pub fn build(collection: &FeatureCollection, max_zoom: u8, options: &TileOptions) -> Result<Self> {
        if max_zoom > TileCoord::MAX_ZOOM {
            return Err(Error::Build(format!(
                "maxzoom {} exceeds {}",
                max_zoom,
                TileCoord::MAX_ZOOM
            )));
        }
        if options.extent == 0 {
            return Err(Error::Build("tile extent must be positive".to_string()));
        }
        if !options.tolerance.is_finite() || options.tolerance < 0.0 {
            return Err(Error::Build(format!(
                "invalid simplification tolerance {}",
                options.tolerance
            )));
        }

        let mut parts = Vec::new();
        let mut bounds: Option<Bounds> = None;
        for (feature, source) in collection.iter().enumerate() {
            let properties = Arc::new(source.properties.clone());
            let id = source.numeric_id();

            for (part, geometry) in project(&source.geometry).into_iter().enumerate() {
                let part_bounds = match geometry.bounds() {
                    Some(b) => b,
                    None => continue,
                };
                match bounds.as_mut() {
                    Some(b) => b.extend_bounds(&part_bounds),
                    None => bounds = Some(part_bounds),
                }
                parts.push(IndexedPart {
                    feature,
                    part,
                    bounds: part_bounds,
                    geometry: Arc::new(geometry),
                    properties: Arc::clone(&properties),
                    id,
                });
            }
        }

        let levels = (0..=max_zoom)
            .map(|zoom| {
                let epsilon = unit_tolerance(options.tolerance, options.extent, zoom);
                let items = parts
                    .iter()
                    .filter_map(|part| {
                        let geometry = simplified(&part.geometry, epsilon)?;
                        let bounds = geometry.bounds()?;
                        Some(IndexedPart {
                            bounds,
                            geometry,
                            ..part.clone()
                        })
                    })
                    .collect();
                RTree::bulk_load(items)
            })
            .collect();

        log::debug!(
            "indexed {} features ({} parts) over zooms 0..={}",
            collection.len(),
            parts.len(),
            max_zoom
        );

        Ok(Self {
            levels,
            max_zoom,
            options: options.clone(),
            feature_count: collection.len(),
            bounds,
        })
    }

    /// Slices the features intersecting tile `z/x/y`.
    ///
    /// Returns `None` when no feature intersects the buffered tile or the
    /// coordinate does not exist at that zoom.
    pub fn slice_tile(&self, z: u8, x: u32, y: u32) -> Option<TileContent> {
        let coord = TileCoord::new(x, y, z);
        if !coord.is_valid() {
            return None;
        }
        let level = self.levels.get(z.min(self.max_zoom) as usize)?;

        let (min, max) = coord.unit_bounds();
        let margin = self.options.buffer as f64 / self.options.extent as f64 / coord.tiles_per_axis() as f64;
        let query = Bounds::new(min, max).expanded(margin);

        let mut hits: Vec<&IndexedPart> = level
            .locate_in_envelope_intersecting(&query.to_aabb())
            .collect();
        hits.sort_by_key(|part| (part.feature, part.part));

        let transform = TileTransform::new(z, x, y, self.options.extent);
        let clip = ClipBox::new(self.options.extent, self.options.buffer);
        let features: Vec<TileFeature> = hits
            .into_iter()
            .filter_map(|part| {
                Some(TileFeature {
                    id: part.id,
                    geometry: clip_to_tile(&part.geometry, &transform, &clip)?,
                    properties: Arc::clone(&part.properties),
                })
            })
            .collect();

        log::trace!("sliced {} features for tile {}", features.len(), coord);
        if features.is_empty() {
            None
        } else {
            Some(TileContent {
                coord,
                extent: self.options.extent,
                features,
            })
        }
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    pub fn options(&self) -> &TileOptions {
        &self.options
    }

    /// Number of features the index was built from
    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// Unit-space bounds of all indexed geometry
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }
}

impl fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("max_zoom", &self.max_zoom)
            .field("feature_count", &self.feature_count)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::geojson::{Feature, Geometry, Position};
    use serde_json::json;

    fn point_feature(lng: f64, lat: f64, name: &str) -> Feature {
        let properties = json!({ "name": name }).as_object().cloned().unwrap();
        Feature::new(Geometry::point(lng, lat), properties)
    }

    fn two_points() -> FeatureCollection {
        // North-west and north-east quadrants at z=1
        FeatureCollection::new(vec![
            point_feature(-90.0, 45.0, "west"),
            point_feature(90.0, 45.0, "east"),
        ])
    }

    fn build(collection: &FeatureCollection, max_zoom: u8) -> SpatialIndex {
        SpatialIndex::build(collection, max_zoom, &TileOptions::default()).unwrap()
    }

    fn names(content: &TileContent) -> Vec<String> {
        content
            .features
            .iter()
            .map(|f| f.properties["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_world_tile_holds_everything() {
        let index = build(&two_points(), 14);
        let content = index.slice_tile(0, 0, 0).unwrap();
        assert_eq!(names(&content), vec!["west", "east"]);
        assert_eq!(
            content.features[0].geometry,
            TileGeometry::Points(vec![[1024, project_lat(45.0, 0)]])
        );
    }

    fn project_lat(lat: f64, z: u8) -> i32 {
        let y = crate::core::geo::project_y(lat) * 2f64.powi(z as i32);
        ((y - y.floor()) * 4096.0).round() as i32
    }

    #[test]
    fn test_disjoint_tiles_at_zoom_one() {
        let index = build(&two_points(), 14);

        assert_eq!(names(&index.slice_tile(1, 0, 0).unwrap()), vec!["west"]);
        assert_eq!(names(&index.slice_tile(1, 1, 0).unwrap()), vec!["east"]);
        assert!(index.slice_tile(1, 1, 1).is_none());
        assert!(index.slice_tile(1, 0, 1).is_none());
    }

    #[test]
    fn test_invalid_coordinates_are_absent() {
        let index = build(&two_points(), 14);
        assert!(index.slice_tile(1, 2, 0).is_none());
        assert!(index.slice_tile(40, 0, 0).is_none());
    }

    #[test]
    fn test_zoom_beyond_max_reuses_deepest_level() {
        let collection = FeatureCollection::new(vec![Feature::new(
            Geometry::LineString {
                coordinates: vec![Position::new(9.9, 48.4), Position::new(9.91, 48.41)],
            },
            Default::default(),
        )]);
        let index = build(&collection, 5);

        let tile = crate::core::geo::TileCoord::from_lat_lng(&crate::LatLng::new(48.4, 9.9), 18);
        let content = index.slice_tile(18, tile.x, tile.y).unwrap();
        assert_eq!(content.coord, tile);
        assert!(matches!(content.features[0].geometry, TileGeometry::Lines(_)));
    }

    #[test]
    fn test_build_is_deterministic() {
        let collection = FeatureCollection::new(vec![
            point_feature(9.9, 48.4, "a"),
            Feature::new(
                Geometry::Polygon {
                    coordinates: vec![vec![
                        Position::new(9.0, 48.0),
                        Position::new(10.5, 48.0),
                        Position::new(10.5, 49.0),
                        Position::new(9.0, 49.0),
                        Position::new(9.0, 48.0),
                    ]],
                },
                Default::default(),
            ),
            point_feature(9.95, 48.45, "b"),
        ]);

        let first = build(&collection, 10);
        let second = build(&collection, 10);
        for z in 0..=12u8 {
            let center = crate::core::geo::TileCoord::from_lat_lng(&crate::LatLng::new(48.4, 9.9), z);
            for dx in 0..2u32 {
                for dy in 0..2u32 {
                    let (x, y) = (center.x.saturating_sub(dx), center.y.saturating_sub(dy));
                    assert_eq!(first.slice_tile(z, x, y), second.slice_tile(z, x, y));
                }
            }
        }
    }

    #[test]
    fn test_feature_ids_are_carried() {
        let mut feature = point_feature(9.9, 48.4, "a");
        feature.id = Some(json!(42));
        let index = build(&FeatureCollection::new(vec![feature]), 4);
        let content = index.slice_tile(0, 0, 0).unwrap();
        assert_eq!(content.features[0].id, Some(42));
    }

    #[test]
    fn test_empty_collection() {
        let index = build(&FeatureCollection::default(), 20);
        assert!(index.is_empty());
        assert!(index.slice_tile(0, 0, 0).is_none());
        assert_eq!(index.feature_count(), 0);
    }

    #[test]
    fn test_rejects_bad_options() {
        let options = TileOptions {
            extent: 0,
            ..TileOptions::default()
        };
        let err = SpatialIndex::build(&two_points(), 4, &options).unwrap_err();
        assert!(matches!(err, Error::Build(_)));
        assert!(SpatialIndex::build(&two_points(), 32, &TileOptions::default()).is_err());
    }
}
