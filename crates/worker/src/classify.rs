//! Request classification.
//!
//! Classification is a pure function of the URL: no stored state, no I/O.

use nimbus_core::Request;
use serde::Serialize;
use url::Url;

/// Path suffixes served cache-first: markup, stylesheets, scripts, structured data.
const STATIC_EXTENSIONS: &[&str] = &[".html", ".css", ".js", ".json"];

/// URL fragments that mark live data.
const DYNAMIC_MARKERS: &[&str] = &["/api/", "weather", "forecast"];

/// Content class of a request; selects the strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentClass {
    Static,
    Dynamic,
    Default,
}

/// Why a request was not intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bypass {
    /// Scheme other than http(s).
    NonHttp,
    /// URL matches the excluded set.
    Excluded,
    /// The worker does not control pages yet.
    NotControlling,
}

impl Bypass {
    pub fn as_str(self) -> &'static str {
        match self {
            Bypass::NonHttp => "non_http",
            Bypass::Excluded => "excluded",
            Bypass::NotControlling => "not_controlling",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Classifier {
    root_path: String,
    never_cache: Vec<String>,
}

impl Classifier {
    pub fn new(scope: &Url, never_cache: Vec<String>) -> Self {
        Self { root_path: scope.path().to_string(), never_cache }
    }

    /// True if the URL contains any excluded substring.
    pub fn is_excluded(&self, request: &Request) -> bool {
        let url = request.url.as_str();
        self.never_cache.iter().any(|pattern| url.contains(pattern.as_str()))
    }

    /// Checked before classification; `Some` means the request goes straight
    /// to the network and never touches a partition.
    pub fn bypass(&self, request: &Request) -> Option<Bypass> {
        if !request.is_http() {
            return Some(Bypass::NonHttp);
        }
        if self.is_excluded(request) {
            return Some(Bypass::Excluded);
        }
        None
    }

    pub fn classify(&self, request: &Request) -> ContentClass {
        let path = request.url.path();
        if path == "/" || path == self.root_path || STATIC_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            return ContentClass::Static;
        }

        let url = request.url.as_str();
        if DYNAMIC_MARKERS.iter().any(|marker| url.contains(marker)) {
            return ContentClass::Dynamic;
        }

        ContentClass::Default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_core::RequestMode;

    fn classifier() -> Classifier {
        let scope = Url::parse("http://localhost:8080/").unwrap();
        Classifier::new(&scope, vec!["/api/analytics".into(), "/api/tracking".into()])
    }

    fn get(url: &str) -> Request {
        Request::parse("GET", url, RequestMode::Subresource).unwrap()
    }

    #[test]
    fn test_static_assets() {
        let c = classifier();
        for url in [
            "http://localhost:8080/",
            "http://localhost:8080/app.html",
            "http://localhost:8080/styles.css",
            "http://localhost:8080/script.js",
            "http://localhost:8080/manifest.json",
        ] {
            assert_eq!(c.classify(&get(url)), ContentClass::Static, "{url}");
        }
    }

    #[test]
    fn test_extension_wins_over_dynamic_marker() {
        let c = classifier();
        assert_eq!(c.classify(&get("http://localhost:8080/api/weather.json")), ContentClass::Static);
    }

    #[test]
    fn test_dynamic_content() {
        let c = classifier();
        assert_eq!(c.classify(&get("http://localhost:8080/api/cities?q=par")), ContentClass::Dynamic);
        assert_eq!(c.classify(&get("http://localhost:8080/weather/paris")), ContentClass::Dynamic);
        assert_eq!(c.classify(&get("https://tiles.example.com/forecast?d=3")), ContentClass::Dynamic);
    }

    #[test]
    fn test_default_content() {
        let c = classifier();
        assert_eq!(c.classify(&get("http://localhost:8080/icon-192.png")), ContentClass::Default);
    }

    #[test]
    fn test_nested_scope_root_is_static() {
        let scope = Url::parse("https://example.com/meteo/").unwrap();
        let c = Classifier::new(&scope, Vec::new());
        assert_eq!(c.classify(&get("https://example.com/meteo/")), ContentClass::Static);
        assert_eq!(c.classify(&get("https://example.com/meteo/icons/sun.svg")), ContentClass::Default);
    }

    #[test]
    fn test_bypass_rules() {
        let c = classifier();
        assert_eq!(c.bypass(&get("http://localhost:8080/api/analytics?e=view")), Some(Bypass::Excluded));
        assert_eq!(c.bypass(&get("http://localhost:8080/api/tracking")), Some(Bypass::Excluded));
        assert_eq!(c.bypass(&get("chrome-extension://abc/inject.js")), Some(Bypass::NonHttp));
        assert_eq!(c.bypass(&get("http://localhost:8080/api/forecast")), None);
    }
}
