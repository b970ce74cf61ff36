//! cqlsh command line
//!
//! Positional host and port come first, then the optional flags in a fixed
//! order, then any free-form additional arguments.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connection::{CqlConnectionConfig, TlsConfig, VerifyMode};
use crate::executor::Command;

/// Everything needed to render one cqlsh invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CqlshConfig {
    #[serde(default = "default_host", alias = "login_host")]
    pub host: String,
    #[serde(default = "default_port", alias = "login_port")]
    pub port: u16,
    #[serde(default, alias = "login_user")]
    pub username: Option<String>,
    #[serde(default, alias = "login_password")]
    pub password: Option<String>,
    #[serde(default)]
    pub keyspace: Option<String>,
    /// CQL file to run instead of `execute`
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub execute: Option<String>,
    #[serde(default = "default_encoding")]
    pub encoding: Option<String>,
    #[serde(default)]
    pub cqlshrc: Option<String>,
    #[serde(default)]
    pub protocol_version: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Option<u32>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Option<u32>,
    #[serde(default)]
    pub tty: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub no_compact: bool,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    #[serde(default = "default_cqlsh_cmd")]
    pub cqlsh_cmd: String,
    /// Extra `--key [value]` flags; `true` renders a bare flag
    #[serde(default)]
    pub additional_args: BTreeMap<String, Value>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    9042
}

fn default_encoding() -> Option<String> {
    Some("utf-8".to_string())
}

fn default_connect_timeout() -> Option<u32> {
    Some(5)
}

fn default_request_timeout() -> Option<u32> {
    Some(10)
}

fn default_cqlsh_cmd() -> String {
    "cqlsh".to_string()
}

impl Default for CqlshConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: None,
            password: None,
            keyspace: None,
            file: None,
            execute: None,
            encoding: default_encoding(),
            cqlshrc: None,
            protocol_version: None,
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            tty: false,
            debug: false,
            no_compact: false,
            ssl: false,
            tls: None,
            cqlsh_cmd: default_cqlsh_cmd(),
            additional_args: BTreeMap::new(),
        }
    }
}

impl CqlshConfig {
    /// Settings for talking to `host` with the shared CQL connection config
    pub fn for_host(conn: &CqlConnectionConfig, host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: conn.port,
            username: conn.username.clone(),
            password: conn.password.clone(),
            connect_timeout: Some(conn.connect_timeout),
            request_timeout: Some(conn.request_timeout),
            ssl: conn.tls.is_some(),
            tls: conn.tls.clone(),
            cqlsh_cmd: conn.cqlsh_cmd.clone(),
            ..Self::default()
        }
    }

    pub fn with_execute(mut self, cql: impl Into<String>) -> Self {
        self.execute = Some(cql.into());
        self
    }

    /// Render the invocation, one argument per token; the password token is
    /// marked secret
    pub fn build(&self) -> Command {
        let mut tokens = vec![
            self.cqlsh_cmd.clone(),
            self.host.clone(),
            self.port.to_string(),
        ];
        let mut secret = None;

        let opt = |tokens: &mut Vec<String>, flag: &str, value: Option<String>| {
            if let Some(v) = value {
                tokens.push(flag.to_string());
                tokens.push(v);
            }
        };

        opt(&mut tokens, "--username", self.username.clone());
        if let Some(pw) = &self.password {
            tokens.push("--password".to_string());
            secret = Some(tokens.len());
            tokens.push(pw.clone());
        }
        opt(&mut tokens, "--keyspace", self.keyspace.clone());
        opt(&mut tokens, "--file", self.file.clone());
        opt(&mut tokens, "--execute", self.execute.clone());
        opt(&mut tokens, "--encoding", self.encoding.clone());
        opt(&mut tokens, "--cqlshrc", self.cqlshrc.clone());
        opt(&mut tokens, "--protocol-version", self.protocol_version.clone());
        opt(&mut tokens, "--connect-timeout", self.connect_timeout.map(|t| t.to_string()));
        opt(&mut tokens, "--request-timeout", self.request_timeout.map(|t| t.to_string()));

        for (flag, on) in [
            ("--tty", self.tty),
            ("--debug", self.debug),
            ("--no-compact", self.no_compact),
            ("--ssl", self.ssl),
        ] {
            if on {
                tokens.push(flag.to_string());
            }
        }

        for (key, value) in &self.additional_args {
            match value {
                Value::Bool(true) => tokens.push(format!("--{}", key)),
                Value::String(s) => {
                    tokens.push(format!("--{}", key));
                    tokens.push(s.clone());
                }
                Value::Number(n) => {
                    tokens.push(format!("--{}", key));
                    tokens.push(n.to_string());
                }
                _ => {}
            }
        }

        let mut command = Command::new(tokens);
        if let Some(i) = secret {
            command = command.with_secret(i);
        }
        if let Some(tls) = &self.tls {
            if let Some(ca) = &tls.ca_bundle {
                command = command.with_env("SSL_CERTFILE", ca.clone());
            }
            let validate = if tls.verify == VerifyMode::None { "false" } else { "true" };
            command = command.with_env("SSL_VALIDATE", validate);
        }
        command
    }
}
