//! Image provider: JSON API lookup keyed by the image slug.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::client::ProviderClient;
use crate::error::ResolveError;
use crate::sanitize::to_ascii_lossy;
use crate::MetadataLines;

/// Environment variable consulted when no client id is configured.
pub const CLIENT_ID_ENV: &str = "IMGUR_CLIENT_ID";

/// Image provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub enabled: bool,
    /// API URL template; `{id}` is replaced by the image slug.
    pub endpoint: String,
    /// Application client id sent as `Authorization: Client-ID <id>`.
    #[serde(skip_serializing)]
    pub client_id: Option<String>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.imgur.com/3/image/{id}".into(),
            client_id: None,
        }
    }
}

impl ImageConfig {
    /// Configured client id, falling back to `IMGUR_CLIENT_ID`.
    pub fn effective_client_id(&self) -> Option<String> {
        self.client_id
            .clone()
            .or_else(|| std::env::var(CLIENT_ID_ENV).ok())
            .filter(|id| !id.is_empty())
    }
}

/// Image API response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageEnvelope {
    pub data: ImageInfo,
}

/// Image metadata from the API. Only the title is surfaced.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageInfo {
    pub title: Option<String>,
}

/// Resolves image slugs to a single `Title` line.
pub struct ImageResolver {
    config: ImageConfig,
    client_id: Option<String>,
    client: ProviderClient,
}

impl ImageResolver {
    pub fn new(config: ImageConfig, client: ProviderClient) -> Self {
        let client_id = config.effective_client_id();
        if client_id.is_none() {
            debug!("Image resolver initialized without client id");
        }
        Self {
            config,
            client_id,
            client,
        }
    }

    #[instrument(skip(self))]
    pub async fn resolve(&self, slug: &str) -> Result<MetadataLines, ResolveError> {
        if !self.config.enabled {
            return Err(ResolveError::Disabled);
        }

        let url = self.config.endpoint.replace("{id}", slug);
        let mut req = self.client.get(&url);
        if let Some(ref client_id) = self.client_id {
            req = req.header("Authorization", format!("Client-ID {client_id}"));
        }

        let resp = self.client.execute(req).await?;
        let envelope = resp.json::<ImageEnvelope>().await?;
        lines_from_info(envelope.data)
    }
}

fn lines_from_info(info: ImageInfo) -> Result<MetadataLines, ResolveError> {
    let title = info
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or(ResolveError::DataMissing("title"))?;

    let mut lines = MetadataLines::new();
    lines.push_field("Title", &to_ascii_lossy(title.trim()));
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<MetadataLines, ResolveError> {
        let envelope: ImageEnvelope = serde_json::from_str(json).unwrap();
        lines_from_info(envelope.data)
    }

    #[test]
    fn test_title_line() {
        let lines = parse(r#"{"data":{"id":"aB3dE9","title":"Sunset","views":12},"success":true,"status":200}"#)
            .unwrap();
        assert_eq!(lines.into_vec(), vec!["Title: Sunset"]);
    }

    #[test]
    fn test_null_title_is_absent() {
        let err = parse(r#"{"data":{"id":"aB3dE9","title":null}}"#).unwrap_err();
        assert!(matches!(err, ResolveError::DataMissing("title")));
    }

    #[test]
    fn test_empty_title_is_absent() {
        assert!(parse(r#"{"data":{"title":""}}"#).is_err());
        assert!(parse(r#"{"data":{}}"#).is_err());
    }

    #[test]
    fn test_configured_client_id_wins() {
        let config = ImageConfig {
            client_id: Some("abc123".into()),
            ..ImageConfig::default()
        };
        assert_eq!(config.effective_client_id().as_deref(), Some("abc123"));
    }
}
