//! Worker-scoped settings resolved from the application configuration.

use nimbus_client::resolve;
use nimbus_core::{AppConfig, Error, PartitionNames};
use url::Url;

use crate::notify::NotificationDefaults;

/// Everything the worker needs to know about its deployment.
///
/// Relative manifest entries are resolved against `scope` once, here, so
/// the request path only ever compares absolute URLs.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub scope: Url,
    pub names: PartitionNames,
    pub precache: Vec<Url>,
    pub shell: Url,
    pub never_cache: Vec<String>,
    pub notification: NotificationDefaults,
}

impl WorkerSettings {
    /// Resolve settings from configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if the scope or any manifest entry does not
    /// resolve, and `Error::InvalidInput` for an unusable partition prefix.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let scope = Url::parse(&config.scope).map_err(|e| Error::InvalidUrl(format!("scope {}: {e}", config.scope)))?;
        let names = config.partition_names().map_err(|e| Error::InvalidInput(e.to_string()))?;

        let precache = config
            .precache
            .iter()
            .map(|entry| resolve(&scope, entry).map_err(Error::from))
            .collect::<Result<Vec<_>, _>>()?;
        let shell = resolve(&scope, &config.shell_document)?;

        let notification = NotificationDefaults {
            title: config.notification_title.clone(),
            body: config.notification_body.clone(),
            ..Default::default()
        };

        Ok(Self { scope, names, precache, shell, never_cache: config.never_cache.clone(), notification })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_default_config() {
        let settings = WorkerSettings::from_config(&AppConfig::default()).unwrap();
        assert_eq!(settings.scope.as_str(), "http://localhost:8080/");
        assert_eq!(settings.shell.as_str(), "http://localhost:8080/app.html");
        assert_eq!(settings.precache[0].as_str(), "http://localhost:8080/");
        assert_eq!(settings.precache.len(), 5);
        assert_eq!(settings.names.static_name(), "weather-app-static-v1.2");
    }

    #[test]
    fn test_nested_scope() {
        let config = AppConfig { scope: "https://example.com/meteo/".into(), ..Default::default() };
        let settings = WorkerSettings::from_config(&config).unwrap();
        assert_eq!(settings.shell.as_str(), "https://example.com/meteo/app.html");
    }

    #[test]
    fn test_empty_version_rejected() {
        let config = AppConfig { cache_version: String::new(), ..Default::default() };
        assert!(matches!(WorkerSettings::from_config(&config), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_invalid_scope() {
        let config = AppConfig { scope: "not a url".into(), ..Default::default() };
        assert!(matches!(WorkerSettings::from_config(&config), Err(Error::InvalidUrl(_))));
    }
}
