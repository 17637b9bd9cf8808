use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Latitude limit of the square web-mercator world
pub const MAX_LATITUDE: f64 = 85.0511287798;

/// WGS84 position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validates that the coordinates are finite and within valid ranges
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lng >= -180.0
            && self.lng <= 180.0
    }

    /// Clamps latitude to the web-mercator range
    pub fn clamp_lat(lat: f64) -> f64 {
        lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
    }

    /// Projects to the unit web-mercator square, `(0, 0)` being the north-west corner
    pub fn to_unit(&self) -> Point {
        Point::new(project_x(self.lng), project_y(self.lat))
    }

    /// Inverse of [`LatLng::to_unit`]
    pub fn from_unit(point: Point) -> Self {
        let lng = point.x * 360.0 - 180.0;
        let lat = (PI * (1.0 - 2.0 * point.y)).sinh().atan().to_degrees();
        Self::new(lat, lng)
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Longitude to unit x in `[0, 1]`.
pub fn project_x(lng: f64) -> f64 {
    lng / 360.0 + 0.5
}

/// Latitude to unit y in `[0, 1]`, clamped at the poles.
pub fn project_y(lat: f64) -> f64 {
    let sin = lat.to_radians().sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;
    y.clamp(0.0, 1.0)
}

/// Represents a point in projected or tile-local coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// `z/x/y` address of a tile, `y` growing southwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    /// Deepest zoom level a `TileCoord` can address with `u32` columns
    pub const MAX_ZOOM: u8 = 31;

    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Tile containing `lat_lng` at `zoom`; latitudes beyond the mercator limit land in the edge row
    pub fn from_lat_lng(lat_lng: &LatLng, zoom: u8) -> Self {
        let n = 2_f64.powi(zoom as i32);
        let unit = LatLng::new(LatLng::clamp_lat(lat_lng.lat), lat_lng.lng).to_unit();
        let max = (n as u64).saturating_sub(1) as f64;

        let x = (unit.x * n).floor().clamp(0.0, max) as u32;
        let y = (unit.y * n).floor().clamp(0.0, max) as u32;

        Self::new(x, y, zoom)
    }

    /// Number of tiles along one axis at this zoom
    pub fn tiles_per_axis(&self) -> u64 {
        1u64 << self.z.min(Self::MAX_ZOOM)
    }

    /// North-west corner of the tile
    pub fn to_lat_lng(&self) -> LatLng {
        let n = self.tiles_per_axis() as f64;
        LatLng::from_unit(Point::new(self.x as f64 / n, self.y as f64 / n))
    }

    /// Bounds of the tile in unit web-mercator space as `(min, max)`
    pub fn unit_bounds(&self) -> (Point, Point) {
        let n = self.tiles_per_axis() as f64;
        (
            Point::new(self.x as f64 / n, self.y as f64 / n),
            Point::new((self.x as f64 + 1.0) / n, (self.y as f64 + 1.0) / n),
        )
    }

    /// Checks if the tile is valid for its zoom level
    pub fn is_valid(&self) -> bool {
        if self.z > Self::MAX_ZOOM {
            return false;
        }
        let max_coord = self.tiles_per_axis();
        (self.x as u64) < max_coord && (self.y as u64) < max_coord
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lat_lng_validity() {
        let coord = LatLng::new(48.4, 9.9);
        assert_eq!(coord.lat, 48.4);
        assert_eq!(coord.lng, 9.9);
        assert!(coord.is_valid());
        assert!(!LatLng::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_unit_projection_round_trip() {
        let lat_lng = LatLng::new(60.17, 24.94);
        let back = LatLng::from_unit(lat_lng.to_unit());

        assert!((back.lat - lat_lng.lat).abs() < 1e-9);
        assert!((back.lng - lat_lng.lng).abs() < 1e-9);
    }

    #[test]
    fn test_projection_origin_and_poles() {
        let origin = LatLng::new(0.0, 0.0).to_unit();
        assert!((origin.x - 0.5).abs() < 1e-12);
        assert!((origin.y - 0.5).abs() < 1e-12);
        assert_eq!(project_y(90.0), 0.0);
        assert_eq!(project_y(-90.0), 1.0);
    }

    #[test]
    fn test_tile_of_position() {
        let ulm = LatLng::new(48.4, 9.9);
        let tile = TileCoord::from_lat_lng(&ulm, 10);
        assert_eq!(tile, TileCoord::new(540, 354, 10));

        let corner = tile.to_lat_lng();
        assert!(corner.lat > ulm.lat && corner.lng < ulm.lng);
        assert_eq!(TileCoord::from_lat_lng(&LatLng::new(89.0, 180.0), 2), TileCoord::new(3, 0, 2));
    }

    #[test]
    fn test_tile_validity() {
        assert!(TileCoord::new(0, 0, 0).is_valid());
        assert!(!TileCoord::new(1, 0, 0).is_valid());
        assert!(TileCoord::new(1, 1, 1).is_valid());
        assert!(!TileCoord::new(0, 2, 1).is_valid());
        assert!(!TileCoord::new(0, 0, 40).is_valid());
    }
}
