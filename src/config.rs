//! Directory connection and layout configuration.
//!
//! [`DirectoryConfig`] is built once (from a TOML file, the builder, or
//! defaults) and then shared read-only by the connector and the executor.
//!
//! ```toml
//! url = "ldap://localhost:10389"
//! bind_dn = "uid=admin,ou=system"
//! bind_password = "secret"
//! users_base = "ou=users,dc=example,dc=com"
//! groups_base = "ou=groups,dc=example,dc=com"
//! connect_timeout_secs = 10
//! ```

use crate::error::{ConfigError, ConfigResult};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Object classes given to every new user entry.
pub const USER_OBJECT_CLASSES: &[&str] = &["inetOrgPerson", "organizationalPerson", "person", "top"];

/// Object classes given to every new group entry.
pub const GROUP_OBJECT_CLASSES: &[&str] = &["groupOfNames", "top"];

/// Immutable directory configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirectoryConfig {
    /// Server URL, `ldap://` or `ldaps://`
    pub url: String,

    /// DN used for the simple bind
    pub bind_dn: String,

    /// Password used for the simple bind
    pub bind_password: String,

    /// Container holding all user entries
    pub users_base: String,

    /// Container holding all group entries
    pub groups_base: String,

    /// Initial `userPassword` for new users. When unset each user gets a
    /// random one.
    pub initial_password: Option<String>,

    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: "ldap://localhost:10389".to_string(),
            bind_dn: "uid=admin,ou=system".to_string(),
            bind_password: String::new(),
            users_base: "ou=users,dc=example,dc=com".to_string(),
            groups_base: "ou=groups,dc=example,dc=com".to_string(),
            initial_password: None,
            connect_timeout_secs: 10,
        }
    }
}

impl DirectoryConfig {
    /// Start a builder seeded with the defaults.
    pub fn builder() -> DirectoryConfigBuilder {
        DirectoryConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load and validate a TOML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML configuration file without validating it, so callers can
    /// layer overrides first.
    pub fn read_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Toml {
            path: path.display().to_string(),
            source,
        })
    }

    /// Continue building from this configuration.
    pub fn into_builder(self) -> DirectoryConfigBuilder {
        DirectoryConfigBuilder { config: self }
    }

    /// Check the configuration for internal consistency.
    ///
    /// Users and groups must live in two distinct containers that share a
    /// root, and neither container may sit inside the other.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.url.starts_with("ldap://") || self.url.starts_with("ldaps://")) {
            return Err(ConfigError::invalid(format!(
                "url must start with ldap:// or ldaps://, got '{}'",
                self.url
            )));
        }
        if self.bind_dn.trim().is_empty() {
            return Err(ConfigError::invalid("bind_dn cannot be empty"));
        }

        let users = normalize_dn(&self.users_base);
        let groups = normalize_dn(&self.groups_base);
        if users.is_empty() || groups.is_empty() {
            return Err(ConfigError::invalid(
                "users_base and groups_base cannot be empty",
            ));
        }
        if users == groups {
            return Err(ConfigError::invalid(format!(
                "users_base and groups_base must be distinct containers, both are '{}'",
                self.users_base
            )));
        }
        if is_descendant(&users, &groups) || is_descendant(&groups, &users) {
            return Err(ConfigError::invalid(
                "users_base and groups_base must not be nested inside each other",
            ));
        }
        if parent_dn(&users) != parent_dn(&groups) || parent_dn(&users).is_empty() {
            return Err(ConfigError::invalid(format!(
                "users_base '{}' and groups_base '{}' must share a common root",
                self.users_base, self.groups_base
            )));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::invalid("connect_timeout_secs must be positive"));
        }
        Ok(())
    }

    /// DN of the user entry for `login`.
    pub fn user_dn(&self, login: &str) -> String {
        format!("cn={},{}", escape_rdn_value(login), self.users_base)
    }

    /// DN of the group entry for `identifier`.
    pub fn group_dn(&self, identifier: &str) -> String {
        format!("cn={},{}", escape_rdn_value(identifier), self.groups_base)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Builder for [`DirectoryConfig`].
#[derive(Debug, Clone)]
pub struct DirectoryConfigBuilder {
    config: DirectoryConfig,
}

impl DirectoryConfigBuilder {
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    pub fn bind_dn(mut self, bind_dn: impl Into<String>) -> Self {
        self.config.bind_dn = bind_dn.into();
        self
    }

    pub fn bind_password(mut self, password: impl Into<String>) -> Self {
        self.config.bind_password = password.into();
        self
    }

    pub fn users_base(mut self, dn: impl Into<String>) -> Self {
        self.config.users_base = dn.into();
        self
    }

    pub fn groups_base(mut self, dn: impl Into<String>) -> Self {
        self.config.groups_base = dn.into();
        self
    }

    pub fn initial_password(mut self, password: impl Into<String>) -> Self {
        self.config.initial_password = Some(password.into());
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> ConfigResult<DirectoryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Lowercase a DN and drop spaces around separators, for comparisons.
pub(crate) fn normalize_dn(dn: &str) -> String {
    dn.split(',')
        .map(|rdn| {
            rdn.split('=')
                .map(|part| part.trim().to_lowercase())
                .collect::<Vec<_>>()
                .join("=")
        })
        .filter(|rdn| !rdn.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

fn parent_dn(normalized: &str) -> &str {
    normalized.split_once(',').map_or("", |(_, parent)| parent)
}

fn is_descendant(candidate: &str, ancestor: &str) -> bool {
    candidate.ends_with(&format!(",{ancestor}"))
}

/// Escape the characters RFC 4514 reserves inside an RDN value.
///
/// Values that passed field validation never contain any of them.
fn escape_rdn_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut escaped = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '#' if i == 0 => escaped.push_str("\\#"),
            ' ' if i == 0 || i == last => escaped.push_str("\\ "),
            _ => escaped.push(c),
        }
    }
    escaped
}
