//! Provider URL detection in chat text.
//!
//! Only the first `http://` / `https://` URL of a line is considered. Its host
//! is classified against [`PROVIDERS`] in order, then the provider's identifier
//! pattern is applied to the full URL to pull out the resource token.

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;
use url::Url;

use crate::error::ExtractError;
use crate::{Provider, ProviderMatch};

/// Host classification and token extraction rules for one provider.
struct ProviderMatcher {
    provider: Provider,
    /// Substrings of the lowercased host that identify the provider.
    host_markers: &'static [&'static str],
    /// Pattern whose first capture group is the resource token.
    id_pattern: fn() -> &'static Regex,
}

impl ProviderMatcher {
    fn matches_host(&self, host: &str) -> bool {
        self.host_markers.iter().any(|marker| host.contains(marker))
    }
}

/// Known providers, first match wins. Host markers are mutually exclusive.
const PROVIDERS: &[ProviderMatcher] = &[
    ProviderMatcher {
        provider: Provider::Video,
        host_markers: &["youtube", "youtu.be"],
        id_pattern: video_id_regex,
    },
    ProviderMatcher {
        provider: Provider::Image,
        host_markers: &["imgur"],
        id_pattern: image_slug_regex,
    },
];

/// First URL-looking token in a line.
fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)https?://\S+").expect("URL regex is valid"))
}

/// Video ids are exactly 11 characters and may appear as:
/// - `youtu.be/<id>`
/// - `youtube.com/watch?v=<id>` (also `youtube-nocookie.com`, `&v=` later in the query)
/// - `youtube.com/embed/<id>`, `/v/<id>`, `/e/<id>`
fn video_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)(?:youtube(?:-nocookie)?\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?)/|.*[?&]v=)|youtu\.be/)([^"&?/ ]{11})"#,
        )
        .expect("video id regex is valid")
    })
}

/// Image slugs are alphanumeric, optionally followed by a file extension.
/// Gallery and album paths (`imgur.com/gallery/...`) do not match.
fn image_slug_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^https?://(?:www\.|i\.)?imgur\.com/([A-Za-z0-9]+)(?:\.[jpgt]|$)")
            .expect("image slug regex is valid")
    })
}

/// Classify the first URL in `text`, explaining why nothing matched.
pub fn classify(text: &str) -> Result<ProviderMatch, ExtractError> {
    let url = url_regex()
        .find(text)
        .map(|m| m.as_str())
        .ok_or(ExtractError::NoUrlFound)?;

    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .ok_or_else(|| ExtractError::UnrecognizedProvider(url.to_string()))?;

    let matcher = PROVIDERS
        .iter()
        .find(|m| m.matches_host(&host))
        .ok_or_else(|| ExtractError::UnrecognizedProvider(host.clone()))?;

    let resource_id = (matcher.id_pattern)()
        .captures(url)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str())
        .filter(|id| !id.is_empty())
        .ok_or(ExtractError::MalformedResourceId(matcher.provider))?;

    Ok(ProviderMatch::new(matcher.provider, resource_id))
}

/// Return the provider match for the first URL in `text`, if any.
///
/// Pure and deterministic; performs no I/O.
pub fn extract(text: &str) -> Option<ProviderMatch> {
    match classify(text) {
        Ok(m) => Some(m),
        Err(reason) => {
            debug!(%reason, "No actionable link in message");
            None
        }
    }
}
