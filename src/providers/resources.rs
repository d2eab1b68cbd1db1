//! Resource descriptors and URI handling shared by every resource source.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Serialize;
use url::Url;

use crate::error::ProviderError;

/// Characters escaped when a name is embedded as one URI path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// MIME type of note and file resources.
pub const TEXT_PLAIN: &str = "text/plain";

/// MIME type of database table resources.
pub const APPLICATION_SQL: &str = "application/sql";

/// A resource as advertised by `listResources`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Scheme-qualified address used by `readResource`.
    pub uri: String,
    /// Human-readable name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// MIME type of the content.
    pub mime_type: String,
}

/// The content returned by `readResource`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    /// The URI that was read.
    pub uri: String,
    /// MIME type of `text`.
    pub mime_type: String,
    /// The content itself.
    pub text: String,
}

/// A parsed resource URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceUri {
    /// The original text.
    pub raw: String,
    /// Lower-case scheme without `://`.
    pub scheme: String,
    /// Host component, empty when absent.
    pub host: String,
    /// Decoded path segments, empty segments dropped.
    pub segments: Vec<String>,
}

impl ResourceUri {
    /// Parses a scheme-qualified URI.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidArgument`] if the text is not a URI.
    pub fn parse(raw: &str) -> Result<Self, ProviderError> {
        let url = Url::parse(raw).map_err(|e| {
            ProviderError::InvalidArgument(format!("Invalid resource URI '{raw}': {e}"))
        })?;

        // `Url` drops dot-segments, so segments come from the text as written
        let segments = raw_path(raw)
            .split('/')
            .filter(|s| !s.is_empty())
            .map(decode_segment)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: raw.to_string(),
            scheme: url.scheme().to_string(),
            host: url.host_str().unwrap_or_default().to_string(),
            segments,
        })
    }

    /// The whole path with leading slashes stripped, decoded.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidArgument`] if the path is not UTF-8
    /// after decoding.
    pub fn path_name(&self) -> Result<String, ProviderError> {
        decode_segment(raw_path(&self.raw).trim_start_matches('/'))
    }
}

/// Builds `<scheme>://<host>/<segment>/...` with each segment escaped.
#[must_use]
pub fn build_uri(scheme: &str, host: &str, segments: &[&str]) -> String {
    let mut uri = format!("{scheme}://{host}");
    for segment in segments {
        uri.push('/');
        uri.extend(utf8_percent_encode(segment, SEGMENT));
    }
    uri
}

/// The undecoded path of `raw`, without authority, query or fragment.
fn raw_path(raw: &str) -> &str {
    let rest = raw.split_once("://").map_or(raw, |(_, rest)| rest);
    let path = rest.find('/').map_or("", |start| &rest[start..]);
    path.split(['?', '#']).next().unwrap_or_default()
}

fn decode_segment(segment: &str) -> Result<String, ProviderError> {
    percent_decode_str(segment)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| ProviderError::InvalidArgument(format!("Invalid resource URI: {e}")))
}
