//! Video provider: feed-document lookup keyed by the 11-character video id.
//!
//! The endpoint and the document schema are configuration, not code. The
//! defaults describe the legacy Atom video feed:
//!
//! ```xml
//! <entry xmlns='http://www.w3.org/2005/Atom' xmlns:media='http://search.yahoo.com/mrss/'>
//!   <title>Cat Video</title>
//!   <content type='application/x-shockwave-flash' src='...'/>
//!   <author><name>Jane</name></author>
//!   <media:group>
//!     <media:content url='...' duration='PT1M30S'/>
//!   </media:group>
//! </entry>
//! ```
//!
//! Elements are matched by local name, first match in document order. The
//! duration element is additionally matched by namespace (the Atom feed has
//! its own `<content>`) and must carry the duration attribute.
//!
//! Documents without a default namespace are accepted and parsed as if they
//! declared [`UNQUALIFIED_NS`].

use minidom::Element;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::client::ProviderClient;
use crate::error::ResolveError;
use crate::sanitize::to_ascii_lossy;
use crate::MetadataLines;

/// Media RSS namespace, home of `media:content`.
pub const MEDIA_RSS_NS: &str = "http://search.yahoo.com/mrss/";

/// Namespace assigned to feeds that declare none.
pub const UNQUALIFIED_NS: &str = "urn:metabot:unqualified";

/// Element and attribute names read from a video feed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSchema {
    /// Element holding the video title (required).
    pub title_element: String,
    /// Element wrapping the uploader.
    pub author_element: String,
    /// Child of `author_element` holding the uploader's display name.
    pub author_name_element: String,
    /// Element carrying the duration attribute.
    pub duration_element: String,
    /// Namespace of `duration_element`; empty matches any namespace.
    pub duration_namespace: String,
    /// Attribute of `duration_element` holding the duration.
    pub duration_attribute: String,
}

impl Default for FeedSchema {
    fn default() -> Self {
        Self {
            title_element: "title".into(),
            author_element: "author".into(),
            author_name_element: "name".into(),
            duration_element: "content".into(),
            duration_namespace: MEDIA_RSS_NS.into(),
            duration_attribute: "duration".into(),
        }
    }
}

/// Video provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub enabled: bool,
    /// Feed URL template; `{id}` is replaced by the video id.
    pub endpoint: String,
    pub schema: FeedSchema,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://gdata.youtube.com/feeds/api/videos/{id}?v=2".into(),
            schema: FeedSchema::default(),
        }
    }
}

/// Resolves video ids to `Title` / `Author` / `Time` lines.
pub struct VideoResolver {
    config: VideoConfig,
    client: ProviderClient,
}

impl VideoResolver {
    pub fn new(config: VideoConfig, client: ProviderClient) -> Self {
        Self { config, client }
    }

    #[instrument(skip(self))]
    pub async fn resolve(&self, video_id: &str) -> Result<MetadataLines, ResolveError> {
        if !self.config.enabled {
            return Err(ResolveError::Disabled);
        }

        let url = self.config.endpoint.replace("{id}", video_id);
        let resp = self.client.execute(self.client.get(&url)).await?;
        let body = resp.text().await?;

        let lines = parse_feed(&body, &self.config.schema)?;
        debug!(line_count = lines.len(), "Resolved video metadata");
        Ok(lines)
    }
}

/// First element named `name` strictly below `element`, in document order.
fn find_descendant<'a>(element: &'a Element, name: &str) -> Option<&'a Element> {
    element
        .children()
        .find_map(|child| find_first(child, &|e: &Element| e.name() == name))
}

/// First element in pre-order (starting at `root`) satisfying `pred`.
fn find_first<'a, P>(root: &'a Element, pred: &P) -> Option<&'a Element>
where
    P: Fn(&Element) -> bool,
{
    if pred(root) {
        return Some(root);
    }
    root.children().find_map(|child| find_first(child, pred))
}

fn find_named<'a>(root: &'a Element, name: &str) -> Option<&'a Element> {
    find_first(root, &|e: &Element| e.name() == name)
}

/// Parse `body`, tolerating a root element without a namespace.
fn parse_document(body: &str) -> Result<Element, ResolveError> {
    match body.parse::<Element>() {
        Ok(root) => Ok(root),
        Err(minidom::Error::MissingNamespace) => {
            let qualified = with_default_namespace(body)
                .ok_or_else(|| ResolveError::Malformed("no root element".into()))?;
            qualified
                .parse()
                .map_err(|e: minidom::Error| ResolveError::Malformed(e.to_string()))
        }
        Err(e) => Err(ResolveError::Malformed(e.to_string())),
    }
}

/// Insert `xmlns='<UNQUALIFIED_NS>'` into the root start tag.
fn with_default_namespace(body: &str) -> Option<String> {
    let bytes = body.as_bytes();
    let start = (0..bytes.len().saturating_sub(1))
        .find(|&i| bytes[i] == b'<' && bytes[i + 1].is_ascii_alphabetic())?;
    let name_end = body[start + 1..]
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .map(|offset| start + 1 + offset)?;

    let mut qualified = String::with_capacity(body.len() + UNQUALIFIED_NS.len() + 10);
    qualified.push_str(&body[..name_end]);
    qualified.push_str(" xmlns='");
    qualified.push_str(UNQUALIFIED_NS);
    qualified.push('\'');
    qualified.push_str(&body[name_end..]);
    Some(qualified)
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Extract display lines from a feed document.
///
/// The title is required. Author and duration are included when present.
pub fn parse_feed(body: &str, schema: &FeedSchema) -> Result<MetadataLines, ResolveError> {
    let root = parse_document(body)?;

    let title = find_named(&root, &schema.title_element)
        .and_then(|e| non_empty(e.text()))
        .ok_or(ResolveError::DataMissing("title"))?;

    let mut lines = MetadataLines::new();
    lines.push_field("Title", &to_ascii_lossy(&title));

    let author = find_named(&root, &schema.author_element)
        .and_then(|e| find_descendant(e, &schema.author_name_element))
        .and_then(|e| non_empty(e.text()));
    if let Some(author) = author {
        lines.push_field("Author", &to_ascii_lossy(&author));
    }

    let duration = find_first(&root, &|e: &Element| {
        e.name() == schema.duration_element
            && (schema.duration_namespace.is_empty() || e.ns() == schema.duration_namespace)
            && e.attr(&schema.duration_attribute).is_some()
    })
    .and_then(|e| e.attr(&schema.duration_attribute))
    .and_then(|d| non_empty(d.to_string()));
    if let Some(duration) = duration {
        lines.push_field("Time", &to_ascii_lossy(&duration));
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_FEED: &str = r#"<entry xmlns='http://www.w3.org/2005/Atom' xmlns:media='http://search.yahoo.com/mrss/'>
  <id>tag:youtube.com,2008:video:dQw4w9WgXcQ</id>
  <title>Cat Video</title>
  <author><name>Jane</name><uri>https://example.com/jane</uri></author>
  <media:group>
    <media:title>Cat Video (media)</media:title>
    <media:content url='https://example.com/v' duration='PT1M30S'/>
  </media:group>
</entry>"#;

    #[test]
    fn test_parse_full_feed() {
        let lines = parse_feed(FULL_FEED, &FeedSchema::default()).unwrap();
        assert_eq!(
            lines.into_vec(),
            vec!["Title: Cat Video", "Author: Jane", "Time: PT1M30S"]
        );
    }

    #[test]
    fn test_atom_content_before_media_group() {
        let xml = r#"<entry xmlns='http://www.w3.org/2005/Atom' xmlns:media='http://search.yahoo.com/mrss/' xmlns:yt='http://gdata.youtube.com/schemas/2007'>
  <title>Cat Video</title>
  <content type='application/x-shockwave-flash' src='https://www.youtube.com/v/dQw4w9WgXcQ'/>
  <author><name>Jane</name></author>
  <media:group>
    <media:content url='https://www.youtube.com/v/dQw4w9WgXcQ' type='application/x-shockwave-flash' duration='90'/>
    <yt:duration seconds='90'/>
  </media:group>
</entry>"#;
        let lines = parse_feed(xml, &FeedSchema::default()).unwrap();
        assert_eq!(
            lines.into_vec(),
            vec!["Title: Cat Video", "Author: Jane", "Time: 90"]
        );
    }

    #[test]
    fn test_duration_namespace_must_match() {
        let xml = r#"<entry xmlns='http://www.w3.org/2005/Atom'>
  <title>Atom only</title>
  <content duration='12'/>
</entry>"#;
        let lines = parse_feed(xml, &FeedSchema::default()).unwrap();
        assert_eq!(lines.into_vec(), vec!["Title: Atom only"]);
    }

    #[test]
    fn test_document_without_namespace() {
        let xml = "<?xml version='1.0'?>\n<entry><title>Plain</title><author><name>Jane</name></author></entry>";
        let lines = parse_feed(xml, &FeedSchema::default()).unwrap();
        assert_eq!(lines.into_vec(), vec!["Title: Plain", "Author: Jane"]);

        let schema = FeedSchema {
            duration_element: "length".into(),
            duration_namespace: String::new(),
            duration_attribute: "seconds".into(),
            ..FeedSchema::default()
        };
        let xml = "<video><title>Plain</title><length seconds='75'/></video>";
        let lines = parse_feed(xml, &schema).unwrap();
        assert_eq!(lines.into_vec(), vec!["Title: Plain", "Time: 75"]);
    }

    #[test]
    fn test_default_namespace_inserted_into_root_tag() {
        assert_eq!(
            with_default_namespace("<?xml version='1.0'?><entry><title/></entry>").as_deref(),
            Some("<?xml version='1.0'?><entry xmlns='urn:metabot:unqualified'><title/></entry>")
        );
        assert_eq!(
            with_default_namespace("<entry/>").as_deref(),
            Some("<entry xmlns='urn:metabot:unqualified'/>")
        );
        assert_eq!(with_default_namespace("no markup"), None);
    }

    #[test]
    fn test_missing_title_is_absent() {
        let xml = r#"<entry xmlns='http://www.w3.org/2005/Atom'>
  <author><name>Jane</name></author>
</entry>"#;
        let err = parse_feed(xml, &FeedSchema::default()).unwrap_err();
        assert!(matches!(err, ResolveError::DataMissing("title")));
    }

    #[test]
    fn test_empty_title_is_absent() {
        let xml = r#"<entry xmlns='http://www.w3.org/2005/Atom'><title>  </title></entry>"#;
        assert!(parse_feed(xml, &FeedSchema::default()).is_err());
    }

    #[test]
    fn test_author_and_duration_best_effort() {
        let xml = r#"<entry xmlns='http://www.w3.org/2005/Atom'><title>Only a title</title></entry>"#;
        let lines = parse_feed(xml, &FeedSchema::default()).unwrap();
        assert_eq!(lines.into_vec(), vec!["Title: Only a title"]);

        let xml = r#"<entry xmlns='http://www.w3.org/2005/Atom' xmlns:media='http://search.yahoo.com/mrss/'>
  <title>No author</title>
  <media:content duration='42'/>
</entry>"#;
        let lines = parse_feed(xml, &FeedSchema::default()).unwrap();
        assert_eq!(lines.into_vec(), vec!["Title: No author", "Time: 42"]);
    }

    #[test]
    fn test_non_ascii_dropped() {
        let xml = r#"<entry xmlns='http://www.w3.org/2005/Atom'>
  <title>Café – Live</title>
  <author><name>Zoë</name></author>
</entry>"#;
        let lines = parse_feed(xml, &FeedSchema::default()).unwrap();
        assert_eq!(lines.into_vec(), vec!["Title: Caf  Live", "Author: Zo"]);
    }

    #[test]
    fn test_malformed_document() {
        let err = parse_feed("<<not xml", &FeedSchema::default()).unwrap_err();
        assert!(matches!(err, ResolveError::Malformed(_)));
    }

    #[test]
    fn test_custom_schema() {
        let schema = FeedSchema {
            title_element: "name".into(),
            author_element: "channel".into(),
            author_name_element: "label".into(),
            duration_element: "length".into(),
            duration_namespace: String::new(),
            duration_attribute: "value".into(),
        };
        let xml = r#"<video xmlns='urn:example:video'>
  <name>Renamed</name>
  <channel><label>Chan</label></channel>
  <length value='10'/>
</video>"#;
        let lines = parse_feed(xml, &schema).unwrap();
        assert_eq!(
            lines.into_vec(),
            vec!["Title: Renamed", "Author: Chan", "Time: 10"]
        );
    }
}
