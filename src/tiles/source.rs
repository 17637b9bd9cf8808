//! The tile source facade
//!
//! A [`Source`] is what a host tile server talks to: it is built from a URI,
//! answers `get_tile` with gzipped vector tiles and `get_info` with static
//! metadata. Everything between the dataset and the tile bytes is delegated
//! to the index cache and the encoder.

use crate::core::config::SourceConfig;
use crate::core::constants::TILE_FORMAT;
use crate::core::geo::TileCoord;
use crate::fetch::client::{HttpClient, ReqwestClient};
use crate::fetch::retry::{RetryPolicy, RetryingFetcher};
use crate::tiles::cache::{IndexLoader, TileIndexCache};
use crate::tiles::encoder::{encode_tile, EncodedTile};
use crate::tiles::loader::DatasetLoader;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// TileJSON-like capability metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub format: String,
    pub minzoom: u8,
    pub maxzoom: u8,
    pub vector_layers: Vec<LayerDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub id: String,
    pub description: String,
}

pub struct Source {
    config: SourceConfig,
    cache: TileIndexCache,
}

impl Source {
    /// Creates a source from `uri` overlaid on `fallback`.
    ///
    /// Lazy unless the resolved configuration says `eager`: the first fetch
    /// then happens on the first tile request.
    pub async fn create(uri: &str, fallback: SourceConfig) -> Result<Self> {
        let config = SourceConfig::from_uri(uri, fallback)?;
        Self::from_config(config).await
    }

    /// Like [`Source::create`], but builds the index before returning and
    /// fails construction if that build fails.
    pub async fn create_eager(uri: &str, fallback: SourceConfig) -> Result<Self> {
        let mut config = SourceConfig::from_uri(uri, fallback)?;
        config.eager = true;
        Self::from_config(config).await
    }

    /// Creates a source from an already resolved configuration
    pub async fn from_config(config: SourceConfig) -> Result<Self> {
        let client = ReqwestClient::new(config.retry.request_timeout())
            .map_err(|e| Error::Construction(e.to_string()))?;
        Self::with_client(config, Arc::new(client)).await
    }

    /// Creates a source fetching through `client`
    pub async fn with_client(config: SourceConfig, client: Arc<dyn HttpClient>) -> Result<Self> {
        config.validate()?;
        let fetcher = RetryingFetcher::new(client, RetryPolicy::from(&config.retry));
        let loader = DatasetLoader::new(fetcher, &config);
        Self::with_loader(config, Arc::new(loader)).await
    }

    /// Creates a source whose index comes from `loader`
    pub async fn with_loader(config: SourceConfig, loader: Arc<dyn IndexLoader>) -> Result<Self> {
        let cache = TileIndexCache::new(loader, config.ttl()).with_serve_stale(config.serve_stale);
        let source = Self { config, cache };

        log::info!(
            "created source {} ({}, layer {}, maxzoom {}, ttl {:?})",
            source.config.source_url,
            source.config.format,
            source.config.layer_name,
            source.config.max_zoom,
            source.config.ttl()
        );

        if source.config.eager {
            source.cache.get().await.map_err(|e| {
                log::error!("initial index build for {} failed: {}", source.config.source_url, e);
                e
            })?;
        }
        Ok(source)
    }

    /// Returns tile `z/x/y` as gzipped vector tile bytes.
    ///
    /// A tile without data is a valid empty tile. Coordinates outside the
    /// tile pyramid are rejected before the index is touched.
    pub async fn get_tile(&self, z: u8, x: u32, y: u32) -> Result<EncodedTile> {
        if !TileCoord::new(x, y, z).is_valid() {
            return Err(Error::InvalidTile { z, x, y });
        }

        let entry = self.cache.get().await?;
        encode_tile(
            &entry.index,
            z,
            x,
            y,
            &self.config.layer_name,
            self.config.cache_control_header(),
        )
        .await
    }

    /// Static capability metadata; never performs I/O
    pub fn get_info(&self) -> Descriptor {
        Descriptor {
            format: TILE_FORMAT.to_string(),
            minzoom: 0,
            maxzoom: self.config.max_zoom,
            vector_layers: vec![LayerDescriptor {
                id: self.config.layer_name.clone(),
                description: self.config.layer_description.clone(),
            }],
        }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn cache(&self) -> &TileIndexCache {
        &self.cache
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("config", &self.config)
            .field("status", &self.cache.status())
            .finish()
    }
}
