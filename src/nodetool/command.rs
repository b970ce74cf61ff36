//! nodetool command line rendering
//!
//! `<path>nodetool <flags> --host H --port P [--username U
//! [--password-file F | --password 'P']] <subcommand...>`

use crate::connection::{ConnectionConfig, Credentials};
use crate::executor::{split_words, Command};

/// Renders full nodetool command lines for one connection
#[derive(Debug, Clone)]
pub struct CommandBuilder<'a> {
    config: &'a ConnectionConfig,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(config: &'a ConnectionConfig) -> Self {
        Self { config }
    }

    /// Render `subcommand` against the configured node.
    ///
    /// Extra flags and the subcommand are split into arguments with
    /// [`split_words`]; the password is passed as one argument, whatever it
    /// holds.
    pub fn build(&self, subcommand: &str) -> Command {
        let cfg = self.config;
        let mut tokens = Vec::with_capacity(10);
        let mut secret = None;

        tokens.push(format!("{}nodetool", cfg.binary_prefix()));
        if let Some(flags) = cfg.extra_flags.as_deref() {
            tokens.extend(split_words(flags));
        }
        tokens.push("--host".to_string());
        tokens.push(cfg.resolve_host());
        tokens.push("--port".to_string());
        tokens.push(cfg.port.to_string());

        match cfg.credentials() {
            Credentials::None => {}
            Credentials::PasswordFile { username, file } => {
                tokens.push("--username".to_string());
                tokens.push(username.to_string());
                tokens.push("--password-file".to_string());
                tokens.push(file.to_string());
            }
            Credentials::Password { username, password } => {
                tokens.push("--username".to_string());
                tokens.push(username.to_string());
                tokens.push("--password".to_string());
                secret = Some(tokens.len());
                tokens.push(password.to_string());
            }
        }

        tokens.extend(split_words(subcommand));

        let command = Command::new(tokens);
        match secret {
            Some(i) => command.with_secret(i),
            None => command,
        }
    }
}

/// Append an optional keyspace and table list to a subcommand
pub fn with_targets(subcommand: &str, keyspace: Option<&str>, tables: &[String]) -> String {
    let mut cmd = subcommand.to_string();
    if let Some(ks) = keyspace {
        cmd.push(' ');
        cmd.push_str(ks);
        for t in tables {
            cmd.push(' ');
            cmd.push_str(t);
        }
    }
    cmd
}

/// Like `with_targets`, with `-j <jobs>` placed before the targets
pub fn with_jobs_and_targets(
    subcommand: &str,
    jobs: u32,
    keyspace: Option<&str>,
    tables: &[String],
) -> String {
    with_targets(&format!("{} -j {}", subcommand, jobs), keyspace, tables)
}
