//! Projection of GeoJSON geometry into unit web-mercator space
//!
//! The whole world maps onto the square `[0, 1] x [0, 1]`, `(0, 0)` being the
//! north-west corner. Tile `(z, x, y)` then covers
//! `[x / 2^z, (x + 1) / 2^z] x [y / 2^z, (y + 1) / 2^z]`, which keeps slicing a
//! matter of scaling and translating.

use crate::core::bounds::Bounds;
use crate::core::geo::{LatLng, Point};
use crate::data::geojson::{Geometry, Position};
use geo::Simplify;
use geo_types::{Coord, LineString};
use std::sync::Arc;

/// One homogeneous part of a feature, in unit space
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectedGeometry {
    Points(Vec<Point>),
    Lines(Vec<Vec<Point>>),
    /// Polygons, each an exterior ring followed by its holes
    Polygons(Vec<Vec<Vec<Point>>>),
}

impl ProjectedGeometry {
    pub fn bounds(&self) -> Option<Bounds> {
        match self {
            ProjectedGeometry::Points(points) => Bounds::from_points(points),
            ProjectedGeometry::Lines(lines) => Bounds::from_points(lines.iter().flatten()),
            // Holes lie inside their exterior ring
            ProjectedGeometry::Polygons(polygons) => {
                Bounds::from_points(polygons.iter().filter_map(|rings| rings.first()).flatten())
            }
        }
    }
}

/// Projects a GeoJSON geometry into its unit-space parts.
///
/// Geometry collections are flattened; empty multi-geometries yield no part.
pub fn project(geometry: &Geometry) -> Vec<ProjectedGeometry> {
    let mut parts = Vec::new();
    project_into(geometry, &mut parts);
    parts
}

fn project_into(geometry: &Geometry, parts: &mut Vec<ProjectedGeometry>) {
    let part = match geometry {
        Geometry::Point { coordinates } => ProjectedGeometry::Points(vec![to_unit(coordinates)]),
        Geometry::MultiPoint { coordinates } => {
            ProjectedGeometry::Points(coordinates.iter().map(to_unit).collect())
        }
        Geometry::LineString { coordinates } => ProjectedGeometry::Lines(vec![project_ring(coordinates)]),
        Geometry::MultiLineString { coordinates } => {
            ProjectedGeometry::Lines(coordinates.iter().map(|line| project_ring(line)).collect())
        }
        Geometry::Polygon { coordinates } => {
            ProjectedGeometry::Polygons(vec![project_rings(coordinates)])
        }
        Geometry::MultiPolygon { coordinates } => ProjectedGeometry::Polygons(
            coordinates.iter().map(|polygon| project_rings(polygon)).collect(),
        ),
        Geometry::GeometryCollection { geometries } => {
            for geometry in geometries {
                project_into(geometry, parts);
            }
            return;
        }
    };

    let empty = match &part {
        ProjectedGeometry::Points(points) => points.is_empty(),
        ProjectedGeometry::Lines(lines) => lines.is_empty(),
        ProjectedGeometry::Polygons(polygons) => polygons.is_empty(),
    };
    if !empty {
        parts.push(part);
    }
}

fn to_unit(position: &Position) -> Point {
    LatLng::new(position.lat, position.lng).to_unit()
}

fn project_ring(positions: &[Position]) -> Vec<Point> {
    positions.iter().map(to_unit).collect()
}

fn project_rings(rings: &[Vec<Position>]) -> Vec<Vec<Point>> {
    rings.iter().map(|ring| project_ring(ring)).collect()
}

/// Douglas-Peucker tolerance in unit space for a zoom level
pub fn unit_tolerance(tolerance: f64, extent: u32, zoom: u8) -> f64 {
    tolerance / (extent as f64 * 2f64.powi(zoom as i32))
}

/// Geometry simplified for one zoom level.
///
/// Returns the same `Arc` when simplification changes nothing and `None`
/// when the geometry collapses entirely at this tolerance.
pub fn simplified(geometry: &Arc<ProjectedGeometry>, epsilon: f64) -> Option<Arc<ProjectedGeometry>> {
    let result = match geometry.as_ref() {
        ProjectedGeometry::Points(_) => return Some(Arc::clone(geometry)),
        ProjectedGeometry::Lines(lines) => {
            let lines: Vec<_> = lines
                .iter()
                .map(|line| simplify_path(line, epsilon))
                .filter(|line| line.len() >= 2)
                .collect();
            if lines.is_empty() {
                return None;
            }
            ProjectedGeometry::Lines(lines)
        }
        ProjectedGeometry::Polygons(polygons) => {
            let polygons: Vec<_> = polygons
                .iter()
                .filter_map(|rings| simplify_polygon(rings, epsilon))
                .collect();
            if polygons.is_empty() {
                return None;
            }
            ProjectedGeometry::Polygons(polygons)
        }
    };

    if result == **geometry {
        Some(Arc::clone(geometry))
    } else {
        Some(Arc::new(result))
    }
}

fn simplify_polygon(rings: &[Vec<Point>], epsilon: f64) -> Option<Vec<Vec<Point>>> {
    let mut rings = rings.iter().map(|ring| simplify_path(ring, epsilon));
    let exterior = rings.next().filter(|ring| ring.len() >= 4)?;

    let mut simplified = vec![exterior];
    simplified.extend(rings.filter(|ring| ring.len() >= 4));
    Some(simplified)
}

fn simplify_path(path: &[Point], epsilon: f64) -> Vec<Point> {
    if path.len() <= 2 || epsilon <= 0.0 {
        return path.to_vec();
    }
    let line: LineString<f64> = path.iter().map(|p| Coord { x: p.x, y: p.y }).collect();
    line.simplify(&epsilon)
        .into_iter()
        .map(|c| Point::new(c.x, c.y))
        .collect()
}

/// Maps unit space onto the local coordinates of one tile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileTransform {
    scale: f64,
    x: f64,
    y: f64,
    extent: f64,
}

impl TileTransform {
    pub fn new(z: u8, x: u32, y: u32, extent: u32) -> Self {
        Self {
            scale: 2f64.powi(z as i32),
            x: x as f64,
            y: y as f64,
            extent: extent as f64,
        }
    }

    pub fn apply(&self, point: &Point) -> Point {
        Point::new(
            (point.x * self.scale - self.x) * self.extent,
            (point.y * self.scale - self.y) * self.extent,
        )
    }
}
