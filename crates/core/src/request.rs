//! Request records as seen by the interception layer.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// How the page issued the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RequestMode {
    /// Top-level document navigation.
    Navigate,
    /// Anything else: scripts, styles, XHR/fetch, images.
    #[default]
    #[serde(alias = "cors", alias = "no-cors", alias = "same-origin")]
    Subresource,
}

/// An intercepted fetch.
///
/// Transient: lives only for the duration of handling one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub mode: RequestMode,
    pub headers: Vec<(String, String)>,
}

impl Request {
    /// Build a request, normalizing the method and dropping the URL fragment.
    pub fn new(method: &str, mut url: Url, mode: RequestMode) -> Self {
        url.set_fragment(None);
        Self { method: method.trim().to_ascii_uppercase(), url, mode, headers: Vec::new() }
    }

    /// A plain sub-resource GET.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url, RequestMode::Subresource)
    }

    /// A top-level navigation GET.
    pub fn navigate(url: Url) -> Self {
        Self::new("GET", url, RequestMode::Navigate)
    }

    /// Parse an absolute URL string into a GET request.
    pub fn parse(method: &str, url: &str, mode: RequestMode) -> Result<Self, Error> {
        let parsed = Url::parse(url.trim()).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self::new(method, parsed, mode))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    pub fn is_http(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }
}
