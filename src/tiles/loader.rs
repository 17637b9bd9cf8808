use crate::core::config::{SourceConfig, TileOptions};
use crate::data::formats::{normalize, SourceFormat};
use crate::fetch::retry::RetryingFetcher;
use crate::spatial::index::SpatialIndex;
use crate::tiles::cache::IndexLoader;
use crate::{Error, Result};
use async_trait::async_trait;

/// Fetches the dataset, normalizes it and builds the spatial index.
///
/// The build is CPU-bound and runs on the blocking pool so it never stalls
/// the tasks serving other tile requests.
pub struct DatasetLoader {
    fetcher: RetryingFetcher,
    url: String,
    format: SourceFormat,
    max_zoom: u8,
    options: TileOptions,
}

impl DatasetLoader {
    pub fn new(fetcher: RetryingFetcher, config: &SourceConfig) -> Self {
        Self {
            fetcher,
            url: config.source_url.clone(),
            format: config.format,
            max_zoom: config.max_zoom,
            options: config.tile.clone(),
        }
    }
}

#[async_trait]
impl IndexLoader for DatasetLoader {
    async fn load(&self) -> Result<SpatialIndex> {
        log::debug!("loading {} dataset from {}", self.format, self.url);
        let raw = self.fetcher.fetch(&self.url).await?;

        let format = self.format;
        let max_zoom = self.max_zoom;
        let options = self.options.clone();
        tokio::task::spawn_blocking(move || -> Result<SpatialIndex> {
            let collection = normalize(&raw, format)?;
            SpatialIndex::build(&collection, max_zoom, &options)
        })
        .await
        .map_err(|e| Error::Build(format!("index build task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::client::{HttpClient, HttpResponse, TransportError};
    use crate::fetch::retry::RetryPolicy;
    use crate::NormalizationError;
    use std::sync::Arc;
    use std::time::Duration;

    struct FixedClient(u16, &'static str);

    #[async_trait]
    impl HttpClient for FixedClient {
        async fn get(&self, _url: &str) -> std::result::Result<HttpResponse, TransportError> {
            Ok(HttpResponse::new(self.0, self.1))
        }
    }

    fn loader(status: u16, body: &'static str, format: SourceFormat) -> DatasetLoader {
        let fetcher = RetryingFetcher::new(
            Arc::new(FixedClient(status, body)),
            RetryPolicy::new(2, Duration::from_millis(1)),
        );
        let config = SourceConfig {
            format,
            max_zoom: 6,
            ..SourceConfig::caching("https://example.com/lots")
        };
        DatasetLoader::new(fetcher, &config)
    }

    #[tokio::test]
    async fn test_loads_lots_feed() {
        let index = loader(
            200,
            r#"{"lots":[{"coords":{"lat":48.4,"lng":9.9},"name":"A"}]}"#,
            SourceFormat::Lots,
        )
        .load()
        .await
        .unwrap();
        assert_eq!(index.feature_count(), 1);
        assert_eq!(index.max_zoom(), 6);
    }

    #[tokio::test]
    async fn test_normalization_error_surfaces() {
        let err = loader(200, r#"{"parking":[]}"#, SourceFormat::Lots)
            .load()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Normalization(NormalizationError::MissingLots)));
    }

    #[tokio::test]
    async fn test_fetch_error_surfaces() {
        let err = loader(404, "", SourceFormat::GeoJson).load().await.unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
    }
}
