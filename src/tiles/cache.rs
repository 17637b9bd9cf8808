//! TTL cache of the built spatial index with single-flight rebuilds
//!
//! The cache moves through four observable states:
//!
//! * `Empty`: nothing built yet, or the last build failed.
//! * `Building`: one build is in flight; every request joins it.
//! * `Ready`: an entry younger than its TTL answers requests directly.
//! * `Stale`: the entry outlived its TTL; the next request starts a rebuild.
//!
//! A build runs as its own tokio task and its outcome is shared with every
//! waiter through [`futures::future::Shared`]. Requests that give up waiting
//! do not cancel the build.

use crate::spatial::index::SpatialIndex;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Produces a fresh spatial index: fetch, normalize and build
#[async_trait]
pub trait IndexLoader: Send + Sync {
    async fn load(&self) -> Result<SpatialIndex>;
}

/// A successfully built index and the moment it was built
#[derive(Debug)]
pub struct CacheEntry {
    pub index: SpatialIndex,
    pub built_at: Instant,
    /// `None` never expires
    pub ttl: Option<Duration>,
}

impl CacheEntry {
    pub fn new(index: SpatialIndex, ttl: Option<Duration>) -> Self {
        Self {
            index,
            built_at: Instant::now(),
            ttl,
        }
    }

    pub fn age(&self) -> Duration {
        self.built_at.elapsed()
    }

    /// Whether `now - built_at >= ttl`
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.saturating_duration_since(self.built_at) >= ttl,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Empty,
    Building,
    Ready,
    Stale,
}

/// Counters of cache activity since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Builds that produced an entry
    pub builds: u64,
    /// Builds that failed
    pub failures: u64,
    /// Requests answered from an existing entry
    pub hits: u64,
    /// Requests that joined a build somebody else started
    pub coalesced: u64,
}

type BuildFuture = Shared<BoxFuture<'static, Result<Arc<CacheEntry>>>>;

enum State {
    Empty,
    Building {
        build: BuildFuture,
        /// Entry being replaced, if any
        previous: Option<Arc<CacheEntry>>,
    },
    Ready(Arc<CacheEntry>),
}

struct Inner {
    state: State,
    stats: CacheStats,
    /// Bumped for every build and invalidation; results of outdated builds are not installed
    generation: u64,
}

/// Holds one built index per source and rebuilds it at most once at a time
pub struct TileIndexCache {
    loader: Arc<dyn IndexLoader>,
    ttl: Option<Duration>,
    serve_stale: bool,
    inner: Arc<Mutex<Inner>>,
}

impl TileIndexCache {
    pub fn new(loader: Arc<dyn IndexLoader>, ttl: Option<Duration>) -> Self {
        Self {
            loader,
            ttl,
            serve_stale: false,
            inner: Arc::new(Mutex::new(Inner {
                state: State::Empty,
                stats: CacheStats::default(),
                generation: 0,
            })),
        }
    }

    /// Answer from an expired entry while its replacement builds
    pub fn with_serve_stale(mut self, serve_stale: bool) -> Self {
        self.serve_stale = serve_stale;
        self
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Returns a fresh entry, building one if needed.
    ///
    /// Concurrent callers during a build all receive that build's outcome,
    /// success or error.
    pub async fn get(&self) -> Result<Arc<CacheEntry>> {
        let build = {
            let mut guard = lock(&self.inner);
            let inner = &mut *guard;

            match &inner.state {
                State::Ready(entry) if !entry.is_expired(Instant::now()) => {
                    inner.stats.hits += 1;
                    return Ok(Arc::clone(entry));
                }
                State::Building { build, previous } => match previous {
                    Some(previous) if self.serve_stale => {
                        inner.stats.hits += 1;
                        return Ok(Arc::clone(previous));
                    }
                    _ => {
                        inner.stats.coalesced += 1;
                        log::debug!("joining index build in flight");
                        build.clone()
                    }
                },
                State::Ready(stale) => {
                    let stale = Arc::clone(stale);
                    log::info!("index expired after {:?}, rebuilding", stale.age());
                    let build = self.start_build(inner, Some(Arc::clone(&stale)));
                    if self.serve_stale {
                        inner.stats.hits += 1;
                        return Ok(stale);
                    }
                    build
                }
                State::Empty => self.start_build(inner, None),
            }
        };

        build.await
    }

    fn start_build(&self, inner: &mut Inner, previous: Option<Arc<CacheEntry>>) -> BuildFuture {
        inner.generation += 1;
        let generation = inner.generation;
        let ttl = self.ttl;
        log::info!("starting index build #{}", generation);

        let loader = Arc::clone(&self.loader);
        let task = tokio::spawn(async move {
            let started = Instant::now();
            let index = loader.load().await?;
            log::info!(
                "built index of {} features in {:?}",
                index.feature_count(),
                started.elapsed()
            );
            Ok::<_, Error>(Arc::new(CacheEntry::new(index, ttl)))
        });

        let shared_inner = Arc::clone(&self.inner);
        let fallback = previous.clone();
        let build: BuildFuture = async move {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => Err(Error::Build(format!("index build task failed: {}", e))),
            };

            let mut guard = lock(&shared_inner);
            let inner = &mut *guard;
            match &result {
                Ok(_) => inner.stats.builds += 1,
                Err(e) => {
                    inner.stats.failures += 1;
                    log::error!("index build failed: {}", e);
                }
            }
            if inner.generation == generation {
                inner.state = match &result {
                    Ok(entry) => State::Ready(Arc::clone(entry)),
                    Err(_) => fallback.map_or(State::Empty, State::Ready),
                };
            }
            result
        }
        .boxed()
        .shared();

        // Drives the build to completion even when no request awaits it
        tokio::spawn(build.clone());

        inner.state = State::Building {
            build: build.clone(),
            previous,
        };
        build
    }

    pub fn status(&self) -> CacheStatus {
        match &lock(&self.inner).state {
            State::Empty => CacheStatus::Empty,
            State::Building { .. } => CacheStatus::Building,
            State::Ready(entry) if entry.is_expired(Instant::now()) => CacheStatus::Stale,
            State::Ready(_) => CacheStatus::Ready,
        }
    }

    pub fn stats(&self) -> CacheStats {
        lock(&self.inner).stats
    }

    /// Current entry, fresh or stale, without triggering a build
    pub fn peek(&self) -> Option<Arc<CacheEntry>> {
        match &lock(&self.inner).state {
            State::Ready(entry) => Some(Arc::clone(entry)),
            State::Building { previous, .. } => previous.clone(),
            State::Empty => None,
        }
    }

    /// Drops the current entry; the next request rebuilds.
    ///
    /// A build already in flight still answers its waiters but its result is
    /// not kept.
    pub fn invalidate(&self) {
        let mut inner = lock(&self.inner);
        inner.generation += 1;
        inner.state = State::Empty;
        log::debug!("index cache invalidated");
    }
}

/// Locks the state, recovering it if a holder panicked
fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
