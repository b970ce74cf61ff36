//! CLI argument definitions using clap
//!
//! Global flags select connection settings and run mode; each subcommand
//! maps to one operation.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::cql::table::NamedValue;
use crate::cql::Presence;
use crate::cqlsh::Transform;
use crate::nodetool::DesiredState;
use crate::ops::fullquerylog::{FqlState, RollCycle};
use crate::ops::maintenance::{CacheKind, Granularity, ReloadTarget};
use crate::ops::{ConcurrencyType, Stage, TimeoutType};

/// Idempotent Cassandra node and schema operations
#[derive(Parser, Debug)]
#[command(name = "cassandra-ops")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags shared by every subcommand. Connection flags override the
/// configuration file.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Path to a JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Report what would change without changing it
    #[arg(long, global = true)]
    pub check_mode: bool,

    /// Include rendered commands and raw output; log at trace level
    #[arg(long, global = true)]
    pub debug: bool,

    /// JMX host for nodetool
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// JMX port for nodetool
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// JMX username
    #[arg(long, global = true)]
    pub username: Option<String>,

    /// JMX password
    #[arg(long, global = true, env = "CASSANDRA_OPS_JMX_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// JMX password file, preferred over --password
    #[arg(long, global = true)]
    pub password_file: Option<String>,

    /// Directory containing the nodetool binary
    #[arg(long, global = true)]
    pub nodetool_path: Option<String>,

    /// Flags placed before --host on every nodetool call
    #[arg(long, global = true, allow_hyphen_values = true)]
    pub nodetool_flags: Option<String>,

    /// CQL contact points, comma separated
    #[arg(long, global = true, value_delimiter = ',')]
    pub login_host: Vec<String>,

    /// CQL native port
    #[arg(long, global = true)]
    pub login_port: Option<u16>,

    /// CQL username
    #[arg(long, global = true)]
    pub login_user: Option<String>,

    /// CQL password
    #[arg(long, global = true, env = "CASSANDRA_OPS_CQL_PASSWORD", hide_env_values = true)]
    pub login_password: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct StateArgs {
    #[arg(long, value_enum, default_value = "enabled")]
    pub state: DesiredState,
}

/// A keyspace with optional tables
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    #[arg(long)]
    pub keyspace: Option<String>,

    /// Table within --keyspace; repeatable
    #[arg(long = "table")]
    pub tables: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct PollArgs {
    /// Maximum attempts; defaults to the configuration file's value
    #[arg(long)]
    pub poll: Option<u32>,

    /// Seconds between attempts
    #[arg(long)]
    pub interval: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Native transport (CQL) on or off
    Binary(StateArgs),
    Gossip(StateArgs),
    Thrift(StateArgs),
    /// Hinted handoff on or off
    Handoff(StateArgs),
    /// Incremental backups on or off
    Backup(StateArgs),

    /// Start a major compaction, or stop running compactions when disabled
    Compact(StateArgs),

    /// Enable or disable autocompaction
    Autocompaction {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        state: StateArgs,
    },

    /// Compaction throughput in MB/s
    Compactionthroughput { value: u32 },

    /// Stream throughput in Mb/s
    Streamthroughput { value: u32 },

    /// Batchlog replay throttle in KB/s
    Batchlogreplaythrottle { value: u32 },

    /// Max hint window in ms
    Maxhintwindow { value: u64 },

    /// Trace probability between 0 and 1
    Traceprobability { value: f64 },

    /// Timeout of one type in ms
    Timeout {
        #[arg(long, value_enum)]
        timeout_type: TimeoutType,
        value: u64,
    },

    /// Min and max compaction thresholds of a table
    Compactionthreshold {
        keyspace: String,
        table: String,
        #[arg(long)]
        min: u32,
        #[arg(long)]
        max: u32,
    },

    /// Concurrency of a stage, compactors or view builders
    Concurrency {
        #[arg(long, value_enum, default_value = "default")]
        concurrency_type: ConcurrencyType,
        #[arg(long, value_enum)]
        stage: Option<Stage>,
        value: i64,
    },

    /// Flush memtables and stop accepting writes
    Drain,

    /// Delete all stored hints
    Truncatehints,

    /// Reload local schema, seeds, SSL certificates or triggers
    Reload {
        #[arg(value_enum)]
        target: ReloadTarget,
    },

    /// Forcefully remove an endpoint from gossip
    Assassinate { ip_address: String },

    /// Stop the Cassandra daemon
    Stopdaemon,

    /// Take a snapshot
    Snapshot {
        /// Keyspace to snapshot; repeatable
        #[arg(long = "keyspace")]
        keyspaces: Vec<String>,
        /// Single table; needs exactly one --keyspace
        #[arg(long)]
        table: Option<String>,
        /// keyspace.table pairs; repeatable
        #[arg(long = "keyspace-table")]
        keyspace_tables: Vec<String>,
        #[arg(long)]
        skip_flush: bool,
        /// Snapshot tag
        #[arg(long)]
        name: Option<String>,
    },

    /// Remove snapshots
    Clearsnapshot {
        /// Snapshot tag; all snapshots when unset
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "keyspace")]
        keyspaces: Vec<String>,
    },

    /// Remove deleted data from sstables
    Garbagecollect {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long, value_enum, default_value = "ROW")]
        granularity: Granularity,
        #[arg(long, default_value_t = 1)]
        jobs: u32,
    },

    /// Verify sstable checksums
    Verify {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long)]
        extended: bool,
    },

    /// Rewrite sstables not on the current version
    Upgradesstables {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long, default_value_t = 2)]
        jobs: u32,
    },

    /// Flush memtables to disk
    Flush {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Decommission this node
    Decommission,

    /// Remove a dead node by host id
    Removenode {
        host_id: String,
        /// Force completion of a pending removal
        #[arg(long)]
        force: bool,
    },

    /// Invalidate a cache when it holds entries
    Invalidatecache {
        #[arg(value_enum)]
        cache: CacheKind,
    },

    /// Wait until every node is UP/NORMAL
    Status {
        /// Down nodes accepted once attempts run out
        #[arg(long, default_value_t = 0)]
        down: usize,
        #[command(flatten)]
        poll: PollArgs,
    },

    /// Wait until every node agrees on one schema version
    Schema {
        /// Schema version the cluster should settle on
        #[arg(long)]
        expected: Option<String>,
        #[command(flatten)]
        poll: PollArgs,
    },

    /// Configure the full query log
    Fullquerylog {
        #[arg(long, value_enum, default_value = "enabled")]
        state: FqlState,
        #[arg(long, alias = "path")]
        log_dir: Option<String>,
        #[arg(long)]
        archive_command: Option<String>,
        #[arg(long, value_enum, default_value = "HOURLY")]
        roll_cycle: RollCycle,
        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        blocking: bool,
        #[arg(long)]
        max_log_size: Option<u64>,
        #[arg(long)]
        max_queue_weight: Option<u64>,
        #[arg(long)]
        max_archive_retries: Option<u64>,
    },

    /// Run cqlsh against the first contact point
    Cqlsh(CqlshArgs),

    /// Create, alter or drop a keyspace
    Keyspace {
        name: String,
        #[arg(long, value_enum, default_value = "present")]
        state: Presence,
        #[arg(long, default_value_t = 1)]
        replication_factor: u32,
        /// dc=factor; repeatable, selects NetworkTopologyStrategy
        #[arg(long = "data-centre", value_parser = parse_key_value)]
        data_centres: Vec<(String, String)>,
        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        durable_writes: bool,
    },

    /// Create, alter or drop a role and reconcile its grants
    Role(RoleArgs),

    /// Create or drop a table or user-defined type
    Table(TableArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CqlshArgs {
    #[arg(long)]
    pub keyspace: Option<String>,
    /// File of statements to run
    #[arg(long)]
    pub file: Option<String>,
    /// Statement to run
    #[arg(long)]
    pub execute: Option<String>,
    #[arg(long, value_enum, default_value = "auto")]
    pub transform: Transform,
    /// Separator for the split transform
    #[arg(long, default_value = " ")]
    pub split_char: String,
    #[arg(long)]
    pub encoding: Option<String>,
    #[arg(long)]
    pub cqlshrc: Option<String>,
    #[arg(long)]
    pub protocol_version: Option<String>,
    #[arg(long)]
    pub tty: bool,
    /// Pass --debug to cqlsh
    #[arg(long)]
    pub cqlsh_debug: bool,
    #[arg(long)]
    pub no_compact: bool,
    /// Extra cqlsh flag as key=value, or key alone for a switch; repeatable
    #[arg(long = "arg")]
    pub additional_args: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RoleArgs {
    pub name: String,
    #[arg(long, value_enum, default_value = "present")]
    pub state: Presence,
    #[arg(long)]
    pub super_user: bool,
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    pub login: bool,
    #[arg(long = "role-password", env = "CASSANDRA_OPS_ROLE_PASSWORD", hide_env_values = true)]
    pub role_password: Option<String>,
    /// Role option as key=value; repeatable
    #[arg(long = "option", value_parser = parse_key_value)]
    pub options: Vec<(String, String)>,
    /// Datacenters the role may access, or ALL
    #[arg(long, value_delimiter = ',')]
    pub data_centers: Option<Vec<String>>,
    /// keyspace=PERMISSION; repeatable. Use all_keyspaces for every keyspace
    #[arg(long = "permission", value_parser = parse_key_value)]
    pub permissions: Option<Vec<(String, String)>>,
    /// Roles to be a member of, comma separated; unset leaves memberships alone
    #[arg(long, value_delimiter = ',')]
    pub roles: Option<Vec<String>>,
}

#[derive(Args, Debug, Clone)]
pub struct TableArgs {
    pub keyspace: String,
    pub name: String,
    #[arg(long, value_enum, default_value = "present")]
    pub state: Presence,
    /// name:type; repeatable
    #[arg(long = "column")]
    pub columns: Vec<NamedValue>,
    #[arg(long, value_delimiter = ',')]
    pub primary_key: Vec<String>,
    #[arg(long, value_delimiter = ',')]
    pub partition_key: Vec<String>,
    /// column:ASC|DESC; repeatable
    #[arg(long = "clustering")]
    pub clustering: Vec<NamedValue>,
    /// Table option as key=value; repeatable
    #[arg(long = "option", value_parser = parse_key_value)]
    pub table_options: Vec<(String, String)>,
    /// Manage a user-defined type
    #[arg(long)]
    pub is_type: bool,
}

/// Parse `key=value`
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.trim().to_string())),
        _ => Err(format!("expected key=value, got {:?}", s)),
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
