//! Shared HTTP plumbing for provider lookups: a per-provider circuit breaker
//! and a TTL'd LRU cache of successful resolutions.
//!
//! ## Circuit
//! Each provider has its own circuit. `FAILURE_THRESHOLD` transport failures
//! in a row (network errors, timeouts, 5xx) open it; while open, lookups for
//! that provider fail fast with [`ResolveError::CircuitOpen`]. After
//! `OPEN_DURATION` a single probe is let through: success closes the
//! circuit, failure keeps it open for another period.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::ResolveError;
use crate::{MetadataLines, Provider, ProviderMatch};

/// Consecutive transport failures that open a provider's circuit.
const FAILURE_THRESHOLD: u32 = 5;

/// How long an open circuit refuses requests before letting one through.
const OPEN_DURATION: Duration = Duration::from_secs(60);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Build the HTTP client shared by all providers.
pub fn build_http_client(timeout: Duration, user_agent: &str) -> Result<reqwest::Client, ResolveError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| ResolveError::Unavailable(format!("failed to build HTTP client: {e}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Circuit {
    /// Requests flow; counts failures since the last success.
    Closed { failures: u32 },
    /// Requests are refused until `retry_at`, then one probe is let through.
    Open { retry_at: Instant },
}

impl Circuit {
    fn permits(&self, now: Instant) -> bool {
        match *self {
            Circuit::Closed { .. } => true,
            Circuit::Open { retry_at } => now >= retry_at,
        }
    }

    fn on_success(&mut self) {
        *self = Circuit::Closed { failures: 0 };
    }

    /// Returns `true` when this failure moved the circuit from closed to open.
    fn on_failure(&mut self, now: Instant) -> bool {
        match *self {
            Circuit::Closed { failures } if failures + 1 < FAILURE_THRESHOLD => {
                *self = Circuit::Closed {
                    failures: failures + 1,
                };
                false
            }
            Circuit::Closed { .. } => {
                *self = Circuit::Open {
                    retry_at: now + OPEN_DURATION,
                };
                true
            }
            // Failed probe: stay open for another period
            Circuit::Open { .. } => {
                *self = Circuit::Open {
                    retry_at: now + OPEN_DURATION,
                };
                false
            }
        }
    }
}

/// HTTP access to one provider, guarded by its own circuit breaker.
pub struct ProviderClient {
    provider: Provider,
    http: reqwest::Client,
    circuit: Mutex<Circuit>,
}

impl ProviderClient {
    pub fn new(provider: Provider, http: reqwest::Client) -> Self {
        Self {
            provider,
            http,
            circuit: Mutex::new(Circuit::Closed { failures: 0 }),
        }
    }

    /// Start a GET request against `url`.
    pub fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http.get(url)
    }

    fn record_failure(&self) {
        if lock(&self.circuit).on_failure(Instant::now()) {
            warn!(
                provider = %self.provider,
                threshold = FAILURE_THRESHOLD,
                open_secs = OPEN_DURATION.as_secs(),
                "Provider circuit opened"
            );
        }
    }

    /// Send `request`, mapping transport failures and non-success statuses to
    /// [`ResolveError`] and feeding the provider's circuit.
    pub async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, ResolveError> {
        if !lock(&self.circuit).permits(Instant::now()) {
            debug!(provider = %self.provider, "Circuit open, skipping fetch");
            return Err(ResolveError::CircuitOpen);
        }

        match request.send().await {
            Ok(resp) if resp.status().is_success() => {
                lock(&self.circuit).on_success();
                Ok(resp)
            }
            Ok(resp) => {
                let status = resp.status();
                if status.is_server_error() {
                    self.record_failure();
                } else {
                    // 4xx means the provider answered; the resource is just not there.
                    lock(&self.circuit).on_success();
                }
                Err(ResolveError::Unavailable(format!("HTTP {status}")))
            }
            Err(e) => {
                self.record_failure();
                Err(e.into())
            }
        }
    }
}

/// Cache entry with expiration.
#[derive(Clone, Debug)]
struct CacheEntry {
    lines: MetadataLines,
    inserted_at: Instant,
}

/// LRU cache of resolved lines keyed by provider and resource id.
///
/// Only successful resolutions are stored. A capacity of zero disables caching.
pub struct MetadataCache {
    entries: Option<Mutex<LruCache<String, CacheEntry>>>,
    ttl: Duration,
}

impl MetadataCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            ttl,
        }
    }

    pub fn get(&self, link: &ProviderMatch) -> Option<MetadataLines> {
        let mut cache = lock(self.entries.as_ref()?);
        let key = link.cache_key();
        if cache.get(&key)?.inserted_at.elapsed() > self.ttl {
            // Expired, drop and re-fetch
            cache.pop(&key);
            return None;
        }
        debug!(key = %key, "Metadata cache hit");
        cache.get(&key).map(|entry| entry.lines.clone())
    }

    pub fn put(&self, link: &ProviderMatch, lines: &MetadataLines) {
        if let Some(entries) = &self.entries {
            lock(entries).put(
                link.cache_key(),
                CacheEntry {
                    lines: lines.clone(),
                    inserted_at: Instant::now(),
                },
            );
        }
    }
}
