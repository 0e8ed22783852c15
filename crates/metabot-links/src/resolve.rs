//! Provider dispatch: one resolver per [`Provider`] variant.
//!
//! Every failure below this boundary is logged and collapsed to `None`, so
//! callers only ever see "lines" or "nothing to say".

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use crate::client::{build_http_client, MetadataCache, ProviderClient};
use crate::error::ResolveError;
use crate::image::{ImageConfig, ImageResolver};
use crate::video::{VideoConfig, VideoResolver};
use crate::{MetadataLines, Provider, ProviderMatch};

/// Shared lookup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Upper bound for every provider request, in seconds.
    pub timeout_secs: u64,
    /// Maximum cached resolutions (0 disables the cache).
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
    pub user_agent: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            cache_capacity: 256,
            cache_ttl_secs: 300,
            user_agent: concat!("metabot/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Per-provider settings, `[providers.*]` in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub video: VideoConfig,
    pub image: ImageConfig,
}

/// Turns a [`ProviderMatch`] into display lines.
///
/// `None` means "stay silent": no data, or any provider failure.
pub trait LinkResolver: Send + Sync + 'static {
    fn resolve(&self, link: &ProviderMatch) -> impl Future<Output = Option<MetadataLines>> + Send;
}

/// Resolver over the closed set of known providers.
pub struct ProviderResolver {
    video: VideoResolver,
    image: ImageResolver,
    cache: MetadataCache,
}

impl ProviderResolver {
    pub fn new(config: &ResolverConfig, providers: ProvidersConfig) -> Result<Self, ResolveError> {
        let http = build_http_client(config.timeout(), &config.user_agent)?;

        Ok(Self {
            video: VideoResolver::new(
                providers.video,
                ProviderClient::new(Provider::Video, http.clone()),
            ),
            image: ImageResolver::new(providers.image, ProviderClient::new(Provider::Image, http)),
            cache: MetadataCache::new(
                config.cache_capacity,
                Duration::from_secs(config.cache_ttl_secs),
            ),
        })
    }

    async fn dispatch(&self, link: &ProviderMatch) -> Result<MetadataLines, ResolveError> {
        match link.provider {
            Provider::Video => self.video.resolve(&link.resource_id).await,
            Provider::Image => self.image.resolve(&link.resource_id).await,
        }
    }
}

impl LinkResolver for ProviderResolver {
    #[instrument(skip(self), fields(provider = %link.provider, id = %link.resource_id))]
    async fn resolve(&self, link: &ProviderMatch) -> Option<MetadataLines> {
        if let Some(lines) = self.cache.get(link) {
            return Some(lines);
        }

        let start = Instant::now();
        match self.dispatch(link).await {
            Ok(lines) => {
                debug!(
                    line_count = lines.len(),
                    elapsed_ms = format!("{:.1}", start.elapsed().as_secs_f64() * 1000.0),
                    "Link resolved"
                );
                self.cache.put(link, &lines);
                Some(lines)
            }
            Err(ResolveError::Disabled) => {
                debug!("Provider disabled, not resolving");
                None
            }
            Err(e) => {
                warn!(error = %e, "Link resolution failed");
                None
            }
        }
    }
}
