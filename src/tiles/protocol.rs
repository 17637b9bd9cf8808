//! URI-scheme registry used by hosts to discover sources

use crate::core::config::SourceConfig;
use crate::tiles::source::Source;
use crate::{Error, Result};
use futures::future::{BoxFuture, FutureExt};
use fxhash::FxHashMap;
use std::future::Future;
use std::sync::Arc;

/// Builds a source from the full URI it was opened with
pub type SourceFactory = Arc<dyn Fn(String) -> BoxFuture<'static, Result<Source>> + Send + Sync>;

/// Maps URI schemes such as `parking:` to source constructors
#[derive(Clone, Default)]
pub struct ProtocolRegistry {
    protocols: FxHashMap<String, SourceFactory>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` for `scheme`, replacing any previous registration.
    ///
    /// The scheme is accepted with or without its trailing colon.
    pub fn register<F, Fut>(&mut self, scheme: &str, factory: F)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Source>> + Send + 'static,
    {
        let scheme = normalize_scheme(scheme);
        log::debug!("registering protocol {}", scheme);
        self.protocols
            .insert(scheme, Arc::new(move |uri| factory(uri).boxed()));
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.protocols.contains_key(&normalize_scheme(scheme))
    }

    /// Registered schemes in sorted order
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.protocols.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    /// Opens `uri` with the constructor registered for its scheme
    pub async fn open(&self, uri: &str) -> Result<Source> {
        let (scheme, _) = uri
            .split_once(':')
            .ok_or_else(|| Error::Construction(format!("source URI {} has no scheme", uri)))?;
        let factory = self
            .protocols
            .get(&normalize_scheme(scheme))
            .cloned()
            .ok_or_else(|| Error::Construction(format!("no source registered for {}:", scheme)))?;
        factory(uri.to_string()).await
    }
}

impl std::fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolRegistry")
            .field("schemes", &self.schemes())
            .finish()
    }
}

fn normalize_scheme(scheme: &str) -> String {
    format!("{}:", scheme.trim_end_matches(':').to_ascii_lowercase())
}

/// Installs the [`Source`] constructor under `scheme`.
///
/// Sources opened through the registry resolve their URI over `fallback`.
pub fn register_protocols(registry: &mut ProtocolRegistry, scheme: &str, fallback: SourceConfig) {
    registry.register(scheme, move |uri: String| {
        let fallback = fallback.clone();
        async move { Source::create(&uri, fallback).await }
    });
}
