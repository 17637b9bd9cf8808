//! Clipping of projected geometry to one buffered tile
//!
//! Everything here works in tile-local coordinates: `[0, extent]` is the
//! tile itself and the clip box is that square grown by `buffer` on every
//! side. Output is rounded to the integer grid of the encoded tile.

use crate::core::geo::Point;
use crate::spatial::index::TileGeometry;
use crate::spatial::project::{ProjectedGeometry, TileTransform};

/// Square clip box `[min, max] x [min, max]` in tile-local units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipBox {
    pub min: f64,
    pub max: f64,
}

impl ClipBox {
    pub fn new(extent: u32, buffer: u32) -> Self {
        Self {
            min: -(buffer as f64),
            max: extent as f64 + buffer as f64,
        }
    }

    fn contains(&self, point: &Point) -> bool {
        point.x >= self.min && point.x <= self.max && point.y >= self.min && point.y <= self.max
    }
}

/// Transforms and clips `geometry` into one tile, `None` when nothing is left.
pub fn clip_to_tile(
    geometry: &ProjectedGeometry,
    transform: &TileTransform,
    clip: &ClipBox,
) -> Option<TileGeometry> {
    let local = |points: &[Point]| -> Vec<Point> { points.iter().map(|p| transform.apply(p)).collect() };

    match geometry {
        ProjectedGeometry::Points(points) => {
            let points: Vec<[i32; 2]> = points
                .iter()
                .map(|p| transform.apply(p))
                .filter(|p| clip.contains(p))
                .map(round)
                .collect();
            (!points.is_empty()).then_some(TileGeometry::Points(points))
        }
        ProjectedGeometry::Lines(lines) => {
            let lines: Vec<Vec<[i32; 2]>> = lines
                .iter()
                .flat_map(|line| clip_line(&local(line), clip))
                .map(|piece| dedup(piece.iter().copied().map(round).collect()))
                .filter(|piece| piece.len() >= 2)
                .collect();
            (!lines.is_empty()).then_some(TileGeometry::Lines(lines))
        }
        ProjectedGeometry::Polygons(polygons) => {
            let mut rings = Vec::new();
            for polygon in polygons {
                let mut polygon_rings = polygon.iter().map(|ring| {
                    let clipped = clip_ring(&local(ring), clip);
                    clean_ring(clipped.into_iter().map(round).collect())
                });
                let exterior = match polygon_rings.next().flatten() {
                    Some(exterior) => exterior,
                    None => continue,
                };
                rings.push(rewind(exterior, false));
                rings.extend(polygon_rings.flatten().map(|hole| rewind(hole, true)));
            }
            (!rings.is_empty()).then_some(TileGeometry::Polygons(rings))
        }
    }
}

fn round(point: Point) -> [i32; 2] {
    [point.x.round() as i32, point.y.round() as i32]
}

fn dedup(mut points: Vec<[i32; 2]>) -> Vec<[i32; 2]> {
    points.dedup();
    points
}

/// Result of clipping one segment against the box
struct ClippedSegment {
    start: Point,
    end: Point,
    /// The segment leaves the box before reaching its end point
    exits: bool,
}

/// Liang-Barsky clipping of the segment `a -> b`
fn clip_segment(a: Point, b: Point, clip: &ClipBox) -> Option<ClippedSegment> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;

    for (p, q) in [
        (-dx, a.x - clip.min),
        (dx, clip.max - a.x),
        (-dy, a.y - clip.min),
        (dy, clip.max - a.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    let at = |t: f64| Point::new(a.x + t * dx, a.y + t * dy);
    Some(ClippedSegment {
        start: if t0 > 0.0 { at(t0) } else { a },
        end: if t1 < 1.0 { at(t1) } else { b },
        exits: t1 < 1.0,
    })
}

/// Clips a polyline, splitting it wherever it leaves the box.
pub fn clip_line(line: &[Point], clip: &ClipBox) -> Vec<Vec<Point>> {
    let mut pieces = Vec::new();
    let mut current: Vec<Point> = Vec::new();

    for segment in line.windows(2) {
        match clip_segment(segment[0], segment[1], clip) {
            Some(clipped) => {
                if current.is_empty() {
                    current.push(clipped.start);
                }
                current.push(clipped.end);
                if clipped.exits {
                    pieces.push(std::mem::take(&mut current));
                }
            }
            None if !current.is_empty() => pieces.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Sutherland-Hodgman clipping of a ring against the four box edges
pub fn clip_ring(ring: &[Point], clip: &ClipBox) -> Vec<Point> {
    let (min, max) = (clip.min, clip.max);

    let output = clip_against_edge(ring, |p| p.x >= min, |a, b| {
        let t = (min - a.x) / (b.x - a.x);
        Point::new(min, a.y + t * (b.y - a.y))
    });
    let output = clip_against_edge(&output, |p| p.x <= max, |a, b| {
        let t = (max - a.x) / (b.x - a.x);
        Point::new(max, a.y + t * (b.y - a.y))
    });
    let output = clip_against_edge(&output, |p| p.y >= min, |a, b| {
        let t = (min - a.y) / (b.y - a.y);
        Point::new(a.x + t * (b.x - a.x), min)
    });
    clip_against_edge(&output, |p| p.y <= max, |a, b| {
        let t = (max - a.y) / (b.y - a.y);
        Point::new(a.x + t * (b.x - a.x), max)
    })
}

fn clip_against_edge<F, I>(ring: &[Point], inside: F, intersect: I) -> Vec<Point>
where
    F: Fn(&Point) -> bool,
    I: Fn(&Point, &Point) -> Point,
{
    let mut output = Vec::with_capacity(ring.len());
    let n = ring.len();

    for i in 0..n {
        let current = &ring[i];
        let next = &ring[(i + 1) % n];

        match (inside(current), inside(next)) {
            (true, true) => output.push(*next),
            (true, false) => output.push(intersect(current, next)),
            (false, true) => {
                output.push(intersect(current, next));
                output.push(*next);
            }
            (false, false) => {}
        }
    }
    output
}

/// Drops repeated vertices and the closing point; `None` for degenerate rings.
fn clean_ring(ring: Vec<[i32; 2]>) -> Option<Vec<[i32; 2]>> {
    let mut ring = dedup(ring);
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    (ring.len() >= 3 && signed_area(&ring) != 0).then_some(ring)
}

/// Twice the shoelace area of an open ring.
///
/// With y pointing down, as in tile space, positive means clockwise on screen.
pub fn signed_area(ring: &[[i32; 2]]) -> i64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let [x0, y0] = ring[i];
            let [x1, y1] = ring[(i + 1) % n];
            x0 as i64 * y1 as i64 - x1 as i64 * y0 as i64
        })
        .sum()
}

/// Exterior rings get a positive area, holes a negative one.
fn rewind(mut ring: Vec<[i32; 2]>, hole: bool) -> Vec<[i32; 2]> {
    if (signed_area(&ring) > 0) == hole {
        ring.reverse();
    }
    ring
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIP: ClipBox = ClipBox {
        min: -64.0,
        max: 4160.0,
    };

    fn pts(coords: &[(f64, f64)]) -> Vec<Point> {
        coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    fn rounded(pieces: Vec<Vec<Point>>) -> Vec<Vec<[i32; 2]>> {
        pieces
            .into_iter()
            .map(|piece| piece.into_iter().map(round).collect())
            .collect()
    }

    #[test]
    fn test_line_inside_is_untouched() {
        let line = pts(&[(0.0, 0.0), (100.0, 100.0), (200.0, 0.0)]);
        assert_eq!(clip_line(&line, &CLIP), vec![line]);
    }

    #[test]
    fn test_line_crossing_the_box_is_cut() {
        let line = pts(&[(-1000.0, 100.0), (5000.0, 100.0)]);
        assert_eq!(
            rounded(clip_line(&line, &CLIP)),
            vec![vec![[-64, 100], [4160, 100]]]
        );
    }

    #[test]
    fn test_line_leaving_and_reentering_splits() {
        let line = pts(&[
            (100.0, 100.0),
            (100.0, -500.0),
            (200.0, -500.0),
            (200.0, 100.0),
        ]);
        assert_eq!(
            rounded(clip_line(&line, &CLIP)),
            vec![vec![[100, 100], [100, -64]], vec![[200, -64], [200, 100]]]
        );
    }

    #[test]
    fn test_line_outside_is_dropped() {
        let line = pts(&[(-500.0, -500.0), (-100.0, -300.0)]);
        assert!(clip_line(&line, &CLIP).is_empty());
    }

    #[test]
    fn test_ring_covering_the_tile_becomes_the_box() {
        let ring = pts(&[
            (-10000.0, -10000.0),
            (10000.0, -10000.0),
            (10000.0, 10000.0),
            (-10000.0, 10000.0),
        ]);
        let clipped = clean_ring(clip_ring(&ring, &CLIP).into_iter().map(round).collect()).unwrap();
        assert_eq!(clipped.len(), 4);
        for [x, y] in &clipped {
            assert!(*x == -64 || *x == 4160);
            assert!(*y == -64 || *y == 4160);
        }
    }

    #[test]
    fn test_clean_ring() {
        let ring = vec![[0, 0], [10, 0], [10, 0], [10, 10], [0, 0]];
        assert_eq!(clean_ring(ring), Some(vec![[0, 0], [10, 0], [10, 10]]));
        assert_eq!(clean_ring(vec![[0, 0], [5, 5], [10, 10], [0, 0]]), None);
        assert_eq!(clean_ring(vec![[1, 1], [1, 1], [1, 1]]), None);
    }

    #[test]
    fn test_rewind() {
        // Counter-clockwise on screen: negative area in tile space
        let ccw = vec![[0, 0], [0, 10], [10, 10], [10, 0]];
        assert!(signed_area(&ccw) < 0);
        assert!(signed_area(&rewind(ccw.clone(), false)) > 0);
        assert!(signed_area(&rewind(ccw, true)) < 0);
    }

    #[test]
    fn test_polygon_with_hole() {
        let polygon = ProjectedGeometry::Polygons(vec![vec![
            pts(&[(0.0, 0.0), (0.5, 0.0), (0.5, 0.5), (0.0, 0.5), (0.0, 0.0)]),
            pts(&[(0.1, 0.1), (0.2, 0.1), (0.2, 0.2), (0.1, 0.2), (0.1, 0.1)]),
        ]]);
        let transform = TileTransform::new(0, 0, 0, 4096);
        let geometry = clip_to_tile(&polygon, &transform, &CLIP).unwrap();
        let rings = match geometry {
            TileGeometry::Polygons(rings) => rings,
            other => panic!("expected polygons, got {:?}", other),
        };
        assert_eq!(rings.len(), 2);
        assert!(signed_area(&rings[0]) > 0);
        assert!(signed_area(&rings[1]) < 0);
        assert!(rings[0].contains(&[0, 0]));
        assert!(rings[1].contains(&[410, 410]));
    }

    #[test]
    fn test_points_outside_buffer_are_dropped() {
        let points = ProjectedGeometry::Points(pts(&[(0.25, 0.25), (0.9, 0.9)]));
        let transform = TileTransform::new(1, 0, 0, 4096);
        assert_eq!(
            clip_to_tile(&points, &transform, &CLIP),
            Some(TileGeometry::Points(vec![[2048, 2048]]))
        );

        let transform = TileTransform::new(1, 0, 1, 4096);
        let far = ProjectedGeometry::Points(pts(&[(0.25, 0.25)]));
        assert_eq!(clip_to_tile(&far, &transform, &CLIP), None);
    }
}
