//! Core constants shared by the fetch, index and encode stages.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

use std::time::Duration;

/// Tile-local coordinate range of an encoded vector tile.
pub const DEFAULT_EXTENT: u32 = 4096;

/// Extra tile-local units kept around each tile edge when clipping.
pub const DEFAULT_BUFFER: u32 = 64;

/// Douglas-Peucker tolerance, in tile-local pixels at each zoom.
pub const DEFAULT_TOLERANCE: f64 = 3.0;

/// Finest zoom at which features are still subdivided.
pub const DEFAULT_MAX_ZOOM: u8 = 20;

/// Retry budget of the dataset fetcher.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;

/// Fixed pause between two fetch attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Timeout of one HTTP request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifetime of a built index in the TTL-caching configuration.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Downstream cache hint attached when a TTL is configured.
pub const DEFAULT_CACHE_CONTROL: &str = "public,max-age=120";

/// Layer name used when none is configured.
pub const DEFAULT_LAYER_NAME: &str = "features";

/// Tile format identifier reported by `getInfo`.
pub const TILE_FORMAT: &str = "pbf";

/// Content type of an encoded tile.
pub const TILE_CONTENT_TYPE: &str = "application/x-protobuf";

/// Content encoding of an encoded tile.
pub const TILE_CONTENT_ENCODING: &str = "gzip";
