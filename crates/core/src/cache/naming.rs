//! Partition naming convention.
//!
//! Partition names embed the application prefix, a logical role and a
//! version tag: `{prefix}{role}-{version}`, e.g. `weather-app-static-v1.2`.
//! Every partition whose name starts with the prefix is owned by this
//! application, including ones left behind by previous versions.

use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Logical role of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Pre-cached application assets, written at install.
    Static,
    /// Runtime responses, created lazily on first write.
    Dynamic,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Static => "static",
            Role::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A partition name split back into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    /// `None` for owned names that carry no role (legacy single-cache names).
    pub role: Option<Role>,
    pub version: String,
}

/// Names of the current partitions for one application version.
#[derive(Debug, Clone)]
pub struct PartitionNames {
    prefix: String,
    version: String,
    pattern: Regex,
}

impl PartitionNames {
    /// Build the naming scheme for `prefix` and `version`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if either part is empty.
    pub fn new(prefix: &str, version: &str) -> Result<Self, Error> {
        if prefix.is_empty() || version.is_empty() {
            return Err(Error::InvalidInput("partition prefix and version must not be empty".into()));
        }

        let pattern = Regex::new(&format!(r"^{}(?:(static|dynamic)-)?(.+)$", regex::escape(prefix)))
            .map_err(|e| Error::InvalidInput(format!("invalid partition prefix: {e}")))?;

        Ok(Self { prefix: prefix.to_string(), version: version.to_string(), pattern })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Current name for `role`.
    pub fn name(&self, role: Role) -> String {
        format!("{}{}-{}", self.prefix, role, self.version)
    }

    pub fn static_name(&self) -> String {
        self.name(Role::Static)
    }

    pub fn dynamic_name(&self) -> String {
        self.name(Role::Dynamic)
    }

    /// The set of partitions that survive activation.
    pub fn current(&self) -> HashSet<String> {
        HashSet::from([self.static_name(), self.dynamic_name()])
    }

    /// Whether the partition belongs to this application (any version).
    pub fn is_owned(&self, name: &str) -> bool {
        name.starts_with(&self.prefix)
    }

    /// Split an owned name into role and version.
    ///
    /// Returns `None` for names outside the prefix.
    pub fn parse(&self, name: &str) -> Option<ParsedName> {
        let caps = self.pattern.captures(name)?;
        let role = caps.get(1).map(|m| match m.as_str() {
            "static" => Role::Static,
            _ => Role::Dynamic,
        });
        let version = caps.get(2)?.as_str().to_string();
        Some(ParsedName { role, version })
    }
}
