//! Index cache, tile encoding and the source facade

pub mod cache;
pub mod encoder;
pub mod loader;
pub mod protocol;
pub mod source;

// Re-exports for convenience
pub use cache::{CacheEntry, CacheStats, CacheStatus, IndexLoader, TileIndexCache};
pub use encoder::{encode_tile, EncodedTile};
pub use loader::DatasetLoader;
pub use protocol::{register_protocols, ProtocolRegistry};
pub use source::{Descriptor, LayerDescriptor, Source};
