//! Metabot link metadata
//!
//! Detects the first URL in a chat line, classifies it against a fixed table
//! of content providers and resolves it into a few short display lines.
//!
//! ## Pipeline
//!
//! ```text
//! "check this http://youtu.be/dQw4w9WgXcQ"
//!     -> extract()            ProviderMatch { provider: Video, resource_id: "dQw4w9WgXcQ" }
//!     -> ProviderResolver     ["Title: ...", "Author: ...", "Time: ..."]
//! ```
//!
//! Resolution is **fail-silent**: every provider-side failure (timeout, HTTP
//! error, missing fields, malformed document) collapses to `None`, and the
//! caller replies with nothing at all.

pub mod client;
pub mod detect;
pub mod image;
pub mod resolve;
pub mod sanitize;
pub mod video;

mod error;

pub use detect::{classify, extract};
pub use error::{ExtractError, ResolveError};
pub use image::{ImageConfig, ImageResolver};
pub use resolve::{LinkResolver, ProviderResolver, ProvidersConfig, ResolverConfig};
pub use video::{FeedSchema, VideoConfig, VideoResolver};

use std::fmt;

/// Content providers the bot knows how to summarize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Video platform (youtube.com, youtu.be).
    Video,
    /// Image host (imgur.com).
    Image,
}

impl Provider {
    /// Short lowercase name, used in logs and cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Video => "video",
            Provider::Image => "image",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A URL recognized as belonging to a provider, reduced to the token that
/// provider's API is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderMatch {
    pub provider: Provider,
    /// Opaque provider token. Never empty.
    pub resource_id: String,
}

impl ProviderMatch {
    pub fn new(provider: Provider, resource_id: impl Into<String>) -> Self {
        Self {
            provider,
            resource_id: resource_id.into(),
        }
    }

    pub(crate) fn cache_key(&self) -> String {
        format!("{}/{}", self.provider, self.resource_id)
    }
}

/// Ordered display lines produced for one resolved link.
///
/// Lines are always emitted as one contiguous block, in this order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataLines(Vec<String>);

impl MetadataLines {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a `"<label>: <value>"` line.
    pub fn push_field(&mut self, label: &str, value: &str) {
        self.0.push(format!("{label}: {value}"));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for MetadataLines {
    fn from(lines: Vec<String>) -> Self {
        Self(lines)
    }
}

impl IntoIterator for MetadataLines {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
