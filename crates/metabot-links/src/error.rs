//! Error types for link extraction and resolution.

use thiserror::Error;

use crate::Provider;

/// Why a chat line produced no actionable link. All variants are benign.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// No `http://` or `https://` substring in the text.
    #[error("no URL found")]
    NoUrlFound,

    /// A URL was found but its host belongs to no known provider.
    #[error("unrecognized provider host: {0}")]
    UnrecognizedProvider(String),

    /// The host matched a provider but the resource token could not be extracted.
    #[error("malformed {0} resource id")]
    MalformedResourceId(Provider),
}

/// Provider-side lookup failures. Collapsed to "no reply" at the resolver boundary.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The lookup exceeded the configured timeout.
    #[error("provider request timed out")]
    Timeout,

    /// Network failure or non-success HTTP status.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// A required field is absent from an otherwise successful response.
    #[error("provider response missing {0}")]
    DataMissing(&'static str),

    /// The response body could not be parsed.
    #[error("malformed provider response: {0}")]
    Malformed(String),

    /// Too many recent failures; the provider is temporarily skipped.
    #[error("provider circuit breaker open")]
    CircuitOpen,

    /// The provider is turned off in configuration.
    #[error("provider disabled")]
    Disabled,
}

impl From<reqwest::Error> for ResolveError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ResolveError::Timeout
        } else if e.is_decode() {
            ResolveError::Malformed(e.to_string())
        } else {
            ResolveError::Unavailable(e.to_string())
        }
    }
}
