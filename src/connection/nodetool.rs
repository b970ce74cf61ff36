//! nodetool connection parameters
//!
//! No network validation happens here; a wrong host or bad credentials only
//! surface once nodetool runs.

use serde::{Deserialize, Serialize};

use super::fqdn::local_fqdn;

/// JMX connection settings shared by every nodetool operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// JMX host; the local FQDN is used when unset
    #[serde(default)]
    pub host: Option<String>,

    /// JMX port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Preferred over `password` when both are present
    #[serde(default)]
    pub password_file: Option<String>,

    /// Directory holding the nodetool binary
    #[serde(default, alias = "nodetool_path")]
    pub binary_path: Option<String>,

    /// Extra flags placed between the binary and `--host`
    #[serde(default = "default_flags", alias = "nodetool_flags")]
    pub extra_flags: Option<String>,
}

fn default_port() -> u16 {
    7199
}

fn default_flags() -> Option<String> {
    Some(DEFAULT_NODETOOL_FLAGS.to_string())
}

/// Flags passed to nodetool unless overridden
pub const DEFAULT_NODETOOL_FLAGS: &str = "-Dcom.sun.jndi.rmiURLParsing=legacy";

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_port(),
            username: None,
            password: None,
            password_file: None,
            binary_path: None,
            extra_flags: default_flags(),
        }
    }
}

/// How nodetool is told about the password
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials<'a> {
    None,
    Password { username: &'a str, password: &'a str },
    PasswordFile { username: &'a str, file: &'a str },
}

impl ConnectionConfig {
    /// Config for `host:port` with no flags or credentials
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port,
            extra_flags: None,
            ..Self::default()
        }
    }

    pub fn with_binary_path(mut self, path: impl Into<String>) -> Self {
        self.binary_path = Some(path.into());
        self
    }

    pub fn with_password(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_password_file(mut self, username: impl Into<String>, file: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password_file = Some(file.into());
        self
    }

    pub fn with_flags(mut self, flags: impl Into<String>) -> Self {
        self.extra_flags = Some(flags.into());
        self
    }

    /// Host to connect to: the configured one or the local FQDN
    pub fn resolve_host(&self) -> String {
        match self.host.as_deref().map(str::trim) {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => local_fqdn().unwrap_or_else(|| "127.0.0.1".to_string()),
        }
    }

    /// Credential mode; the password file wins over an inline password
    pub fn credentials(&self) -> Credentials<'_> {
        let username = match self.username.as_deref() {
            Some(u) if !u.is_empty() => u,
            _ => return Credentials::None,
        };
        if let Some(file) = self.password_file.as_deref() {
            return Credentials::PasswordFile { username, file };
        }
        Credentials::Password {
            username,
            password: self.password.as_deref().unwrap_or(""),
        }
    }

    /// Binary path with a trailing separator, or empty
    pub fn binary_prefix(&self) -> String {
        match self.binary_path.as_deref() {
            Some(p) if !p.is_empty() => {
                if p.ends_with('/') {
                    p.to_string()
                } else {
                    format!("{}/", p)
                }
            }
            _ => String::new(),
        }
    }

    /// Copy with the resolved host pinned, so repeated renders agree
    pub fn normalized(&self) -> Self {
        let mut cfg = self.clone();
        cfg.host = Some(self.resolve_host());
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ConnectionConfig::default();
        assert_eq!(cfg.port, 7199);
        assert_eq!(cfg.extra_flags.as_deref(), Some(DEFAULT_NODETOOL_FLAGS));
        assert_eq!(cfg.credentials(), Credentials::None);
    }

    #[test]
    fn test_password_file_wins() {
        let cfg = ConnectionConfig::new("h", 7199)
            .with_password("cassandra", "secret")
            .with_password_file("cassandra", "/etc/jmx.pw");
        assert_eq!(
            cfg.credentials(),
            Credentials::PasswordFile {
                username: "cassandra",
                file: "/etc/jmx.pw"
            }
        );
    }

    #[test]
    fn test_password_without_username_is_ignored() {
        let mut cfg = ConnectionConfig::new("h", 7199);
        cfg.password = Some("secret".into());
        assert_eq!(cfg.credentials(), Credentials::None);
    }

    #[test]
    fn test_binary_prefix() {
        let cfg = ConnectionConfig::new("h", 7199).with_binary_path("/opt/cassandra/bin");
        assert_eq!(cfg.binary_prefix(), "/opt/cassandra/bin/");

        let cfg = ConnectionConfig::new("h", 7199).with_binary_path("/opt/cassandra/bin/");
        assert_eq!(cfg.binary_prefix(), "/opt/cassandra/bin/");

        let cfg = ConnectionConfig::new("h", 7199).with_binary_path("");
        assert_eq!(cfg.binary_prefix(), "");
    }

    #[test]
    fn test_resolve_host_falls_back_when_unset() {
        let cfg = ConnectionConfig::default();
        assert!(!cfg.resolve_host().is_empty());

        let cfg = ConnectionConfig::new("10.0.0.5", 7199);
        assert_eq!(cfg.resolve_host(), "10.0.0.5");
    }

    #[test]
    fn test_deserialize_aliases() {
        let cfg: ConnectionConfig = serde_json::from_str(
            r#"{"host": "db1", "nodetool_path": "/usr/bin", "nodetool_flags": ""}"#,
        )
        .unwrap();
        assert_eq!(cfg.binary_path.as_deref(), Some("/usr/bin"));
        assert_eq!(cfg.extra_flags.as_deref(), Some(""));
        assert_eq!(cfg.port, 7199);
    }
}
