//! Configuration of a tile source
//!
//! Every knob of the pipeline lives in [`SourceConfig`]. Values are resolved
//! once, at construction, from a source URI overlaid on a fallback config
//! (usually [`SourceConfig::default`] or [`SourceConfig::from_env`]).
//! Pipeline components only ever see the resolved structs.

use crate::core::constants::*;
use crate::data::formats::SourceFormat;
use crate::{Error, Result};
use reqwest::Url;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Environment variables read by [`SourceConfig::from_env`].
pub const ENV_SOURCE_URL: &str = "TILELET_SOURCE_URL";
pub const ENV_FORMAT: &str = "TILELET_FORMAT";
pub const ENV_MAX_ZOOM: &str = "TILELET_MAX_ZOOM";
pub const ENV_TTL_SECONDS: &str = "TILELET_TTL_SECONDS";
pub const ENV_LAYER: &str = "TILELET_LAYER";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Where the dataset is fetched from
    pub source_url: String,
    /// Shape of the payload behind `source_url`
    pub format: SourceFormat,
    /// Finest zoom level that is still subdivided
    pub max_zoom: u8,
    /// Index lifetime in seconds; `0` builds once and never expires
    pub ttl_seconds: u64,
    /// Name of the single layer in every tile
    pub layer_name: String,
    /// Human description of the layer, reported by `getInfo`
    pub layer_description: String,
    /// Explicit `cache-control` header; derived from the TTL when unset
    pub cache_control: Option<String>,
    /// Keep answering from an expired index while its replacement builds
    pub serve_stale: bool,
    /// Build the index during construction instead of on first request
    pub eager: bool,
    pub tile: TileOptions,
    pub retry: RetryConfig,
}

impl SourceConfig {
    /// Index lifetime, `None` meaning the index never expires
    pub fn ttl(&self) -> Option<Duration> {
        match self.ttl_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// `cache-control` header value, only present in TTL-caching configurations
    pub fn cache_control_header(&self) -> Option<String> {
        self.ttl()?;
        Some(
            self.cache_control
                .clone()
                .unwrap_or_else(|| DEFAULT_CACHE_CONTROL.to_string()),
        )
    }

    /// TTL-caching preset: 60s index lifetime, lazy first build
    pub fn caching(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            ttl_seconds: DEFAULT_TTL.as_secs(),
            ..Self::default()
        }
    }

    /// Build-once preset: eager first build, index never expires
    pub fn build_once(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            ttl_seconds: 0,
            eager: true,
            ..Self::default()
        }
    }

    /// Reads a fallback configuration from `TILELET_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        let vars = [
            (ENV_SOURCE_URL, "url"),
            (ENV_FORMAT, "format"),
            (ENV_MAX_ZOOM, "maxzoom"),
            (ENV_TTL_SECONDS, "ttl"),
            (ENV_LAYER, "layer"),
        ];
        for (var, key) in vars {
            if let Ok(value) = std::env::var(var) {
                config.apply(key, &value)?;
            }
        }
        Ok(config)
    }

    /// Resolves a configuration from a source URI overlaid on `fallback`.
    ///
    /// Recognised query parameters: `url`, `format`, `maxzoom`, `ttl`,
    /// `layer`, `description`, `cache_control`, `serve_stale`, `eager`.
    /// Unknown parameters are ignored so hosts can carry their own options.
    pub fn from_uri(uri: &str, fallback: SourceConfig) -> Result<Self> {
        let parsed = Url::parse(uri)
            .map_err(|e| Error::Construction(format!("invalid source URI {}: {}", uri, e)))?;

        let mut config = fallback;
        for (key, value) in parsed.query_pairs() {
            config.apply(&key, &value)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks the resolved configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.source_url.is_empty() {
            return Err(Error::Construction("no source URL configured".to_string()));
        }
        Url::parse(&self.source_url).map_err(|e| {
            Error::Construction(format!("invalid source URL {}: {}", self.source_url, e))
        })?;
        if self.layer_name.is_empty() {
            return Err(Error::Construction("layer name must not be empty".to_string()));
        }
        if self.max_zoom > crate::core::geo::TileCoord::MAX_ZOOM {
            return Err(Error::Construction(format!(
                "maxzoom {} exceeds {}",
                self.max_zoom,
                crate::core::geo::TileCoord::MAX_ZOOM
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Construction("retry budget must be at least 1".to_string()));
        }
        Ok(())
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "url" => self.source_url = value.to_string(),
            "format" => self.format = SourceFormat::from_str(value)?,
            "maxzoom" => self.max_zoom = parse_option(key, value)?,
            "ttl" => self.ttl_seconds = parse_option(key, value)?,
            "layer" => self.layer_name = value.to_string(),
            "description" => self.layer_description = value.to_string(),
            "cache_control" => self.cache_control = Some(value.to_string()),
            "serve_stale" => self.serve_stale = parse_option(key, value)?,
            "eager" => self.eager = parse_option(key, value)?,
            _ => log::debug!("ignoring unknown source option {}={}", key, value),
        }
        Ok(())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            source_url: String::new(),
            format: SourceFormat::GeoJson,
            max_zoom: DEFAULT_MAX_ZOOM,
            ttl_seconds: 0,
            layer_name: DEFAULT_LAYER_NAME.to_string(),
            layer_description: String::new(),
            cache_control: None,
            serve_stale: false,
            eager: false,
            tile: TileOptions::default(),
            retry: RetryConfig::default(),
        }
    }
}

fn parse_option<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Construction(format!("invalid value for {}: {:?}", key, value)))
}

/// Geometry options of the sliced tiles
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TileOptions {
    /// Tile-local coordinate range
    pub extent: u32,
    /// Tile-local units kept beyond each tile edge
    pub buffer: u32,
    /// Simplification tolerance in tile-local pixels
    pub tolerance: f64,
}

impl Default for TileOptions {
    fn default() -> Self {
        Self {
            extent: DEFAULT_EXTENT,
            buffer: DEFAULT_BUFFER,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// Retry policy of the dataset fetcher
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_ms: u64,
}

impl RetryConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SourceConfig::default();
        assert_eq!(config.max_zoom, 20);
        assert_eq!(config.ttl(), None);
        assert_eq!(config.cache_control_header(), None);
        assert_eq!(config.retry.max_attempts, 20);
        assert_eq!(config.retry.retry_delay(), Duration::from_secs(30));
        assert_eq!(config.tile.extent, 4096);
    }

    #[test]
    fn test_caching_preset_sets_cache_control() {
        let config = SourceConfig::caching("https://example.com/lots.json");
        assert_eq!(config.ttl(), Some(Duration::from_secs(60)));
        assert_eq!(
            config.cache_control_header().as_deref(),
            Some("public,max-age=120")
        );
    }

    #[test]
    fn test_from_uri_overlays_fallback() {
        let fallback = SourceConfig {
            source_url: "https://example.com/default.geojson".to_string(),
            ..SourceConfig::default()
        };
        let config = SourceConfig::from_uri(
            "parking://?url=https%3A%2F%2Fdata.example.com%2Flots&format=lots&maxzoom=14&ttl=60&layer=parking",
            fallback,
        )
        .unwrap();

        assert_eq!(config.source_url, "https://data.example.com/lots");
        assert_eq!(config.format, SourceFormat::Lots);
        assert_eq!(config.max_zoom, 14);
        assert_eq!(config.ttl(), Some(Duration::from_secs(60)));
        assert_eq!(config.layer_name, "parking");
    }

    #[test]
    fn test_from_uri_keeps_fallback_without_query() {
        let fallback = SourceConfig::build_once("https://example.com/data.geojson");
        let config = SourceConfig::from_uri("ticketsales://", fallback.clone()).unwrap();
        assert_eq!(config, fallback);
    }

    #[test]
    fn test_from_uri_rejects_bad_values() {
        let fallback = SourceConfig::caching("https://example.com/data.geojson");
        assert!(SourceConfig::from_uri("geojson://?maxzoom=abc", fallback.clone()).is_err());
        assert!(SourceConfig::from_uri("geojson://?maxzoom=40", fallback.clone()).is_err());
        assert!(SourceConfig::from_uri("geojson://?format=shapefile", fallback.clone()).is_err());
        assert!(SourceConfig::from_uri("not a uri", fallback).is_err());
    }

    #[test]
    fn test_missing_source_url_is_a_construction_error() {
        let err = SourceConfig::from_uri("geojson://", SourceConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Construction(_)));
    }

    /// Only test touching the `TILELET_*` variables, so parallel tests never see them
    #[test]
    fn test_from_env() {
        let vars = [
            (ENV_SOURCE_URL, "https://example.com/env.geojson"),
            (ENV_FORMAT, "lots"),
            (ENV_MAX_ZOOM, "12"),
            (ENV_TTL_SECONDS, "90"),
            (ENV_LAYER, "env-layer"),
        ];
        for (var, value) in vars {
            std::env::set_var(var, value);
        }

        let config = SourceConfig::from_env().unwrap();
        assert_eq!(config.source_url, "https://example.com/env.geojson");
        assert_eq!(config.format, SourceFormat::Lots);
        assert_eq!(config.max_zoom, 12);
        assert_eq!(config.ttl(), Some(Duration::from_secs(90)));
        assert_eq!(config.layer_name, "env-layer");

        std::env::set_var(ENV_MAX_ZOOM, "abc");
        let err = SourceConfig::from_env().unwrap_err();
        assert!(matches!(err, Error::Construction(_)));

        for (var, _) in vars {
            std::env::remove_var(var);
        }
        assert_eq!(SourceConfig::from_env().unwrap(), SourceConfig::default());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: SourceConfig = serde_json::from_str(
            r#"{"source_url": "https://example.com/x.geojson", "ttl_seconds": 30, "retry": {"max_attempts": 3}}"#,
        )
        .unwrap();
        assert_eq!(config.ttl(), Some(Duration::from_secs(30)));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.retry_delay_ms, 30_000);
        assert_eq!(config.layer_name, DEFAULT_LAYER_NAME);
    }
}
