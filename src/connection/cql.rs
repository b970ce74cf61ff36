//! CQL connection parameters used by cqlsh and the schema operations

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::fqdn::local_fqdn;

/// Certificate verification mode for TLS connections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyMode {
    None,
    Optional,
    #[default]
    Required,
}

impl VerifyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyMode::None => "none",
            VerifyMode::Optional => "optional",
            VerifyMode::Required => "required",
        }
    }
}

/// TLS settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// CA bundle used to verify the server certificate
    #[serde(default)]
    pub ca_bundle: Option<String>,

    #[serde(default)]
    pub verify: VerifyMode,
}

/// Native-protocol connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CqlConnectionConfig {
    /// Contact points handed to the driver
    #[serde(default, alias = "login_host")]
    pub hosts: Vec<String>,

    #[serde(default = "default_cql_port", alias = "login_port")]
    pub port: u16,

    #[serde(default, alias = "login_user")]
    pub username: Option<String>,

    #[serde(default, alias = "login_password")]
    pub password: Option<String>,

    #[serde(default)]
    pub tls: Option<TlsConfig>,

    /// cqlsh executable
    #[serde(default = "default_cqlsh_cmd")]
    pub cqlsh_cmd: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout: u32,
}

fn default_cql_port() -> u16 {
    9042
}

fn default_cqlsh_cmd() -> String {
    "cqlsh".to_string()
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_request_timeout() -> u32 {
    10
}

impl Default for CqlConnectionConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            port: default_cql_port(),
            username: None,
            password: None,
            tls: None,
            cqlsh_cmd: default_cqlsh_cmd(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl CqlConnectionConfig {
    pub fn new(hosts: Vec<String>, port: u16) -> Self {
        Self {
            hosts,
            port,
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Contact points to try.
    ///
    /// With none configured: 127.0.0.1 if something listens on the port
    /// locally, otherwise the local FQDN.
    pub fn resolve_hosts(&self) -> Vec<String> {
        let hosts: Vec<String> = self
            .hosts
            .iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();
        if !hosts.is_empty() {
            return hosts;
        }

        if port_open("127.0.0.1", self.port) {
            vec!["127.0.0.1".to_string()]
        } else {
            vec![local_fqdn().unwrap_or_else(|| "127.0.0.1".to_string())]
        }
    }
}

fn port_open(host: &str, port: u16) -> bool {
    let addrs: Vec<SocketAddr> = match (host, port).to_socket_addrs() {
        Ok(a) => a.collect(),
        Err(_) => return false,
    };
    addrs
        .iter()
        .any(|addr| TcpStream::connect_timeout(addr, Duration::from_millis(500)).is_ok())
}
