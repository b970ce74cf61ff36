//! CLI command implementations
//!
//! Every subcommand resolves to one operation call. The outcome, or the
//! failure, is printed as one JSON object on stdout.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::config::Config;
use crate::cql::{
    ensure_keyspace, ensure_role, ensure_table, CqlSession, KeyspaceRequest, RoleRequest,
    ScyllaSession, TableRequest,
};
use crate::cqlsh::{run_cqlsh, CqlshConfig};
use crate::errors::{OpsError, OpsResult};
use crate::executor::{Executor, ProcessExecutor};
use crate::nodetool::poll::{PollSettings, Sleeper, ThreadSleeper};
use crate::nodetool::{DesiredState, Nodetool};
use crate::observability::{Logger, Severity};
use crate::ops::maintenance::{self, SnapshotRequest};
use crate::ops::{self, settings, toggles, Feature, FullQueryLogRequest};
use crate::outcome::{ModuleOutcome, RunOptions};

use super::args::{Cli, Command, CqlshArgs, GlobalArgs, PollArgs, RoleArgs, TableArgs, TargetArgs};
use super::errors::CliResult;
use super::io::{write_failure, write_outcome};

/// Parse arguments, run the operation against real processes and print
/// the result
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_cli(&cli, &ProcessExecutor::new(), &ThreadSleeper)
}

/// Run a parsed command line with the given collaborators
pub fn run_cli(cli: &Cli, executor: &dyn Executor, sleeper: &dyn Sleeper) -> CliResult<()> {
    if cli.global.debug {
        Logger::set_min_severity(Severity::Trace);
    }
    let result = Context::load(&cli.global)
        .and_then(|ctx| run_command(&ctx, &cli.command, executor, sleeper));
    match result {
        Ok(outcome) => write_outcome(&outcome),
        Err(e) => {
            write_failure(&e, cli.global.debug)?;
            Err(e.into())
        }
    }
}

/// Resolved configuration for one invocation
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub config: Config,
    pub options: RunOptions,
}

impl Context {
    /// Read the configuration file, if any, and apply flag overrides
    pub fn load(args: &GlobalArgs) -> OpsResult<Self> {
        let mut config = match &args.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        apply_overrides(args, &mut config);
        Ok(Self {
            config,
            options: RunOptions {
                check_mode: args.check_mode,
                debug: args.debug,
            },
        })
    }

    fn nodetool<'a>(&self, executor: &'a dyn Executor) -> Nodetool<'a> {
        Nodetool::new(&self.config.nodetool, executor, self.options)
            .with_sentinels(self.config.sentinel_table())
    }

    fn poll(&self, args: &PollArgs) -> PollSettings {
        PollSettings::new(
            args.poll.unwrap_or(self.config.poll.poll),
            args.interval.unwrap_or(self.config.poll.interval),
        )
    }
}

fn apply_overrides(args: &GlobalArgs, config: &mut Config) {
    let nt = &mut config.nodetool;
    if args.host.is_some() {
        nt.host = args.host.clone();
    }
    if let Some(port) = args.port {
        nt.port = port;
    }
    if args.username.is_some() {
        nt.username = args.username.clone();
    }
    if args.password.is_some() {
        nt.password = args.password.clone();
    }
    if args.password_file.is_some() {
        nt.password_file = args.password_file.clone();
    }
    if args.nodetool_path.is_some() {
        nt.binary_path = args.nodetool_path.clone();
    }
    if args.nodetool_flags.is_some() {
        nt.extra_flags = args.nodetool_flags.clone();
    }

    let cql = &mut config.cql;
    if !args.login_host.is_empty() {
        cql.hosts = args.login_host.clone();
    }
    if let Some(port) = args.login_port {
        cql.port = port;
    }
    if args.login_user.is_some() {
        cql.username = args.login_user.clone();
    }
    if args.login_password.is_some() {
        cql.password = args.login_password.clone();
    }
}

fn target(t: &TargetArgs) -> (Option<&str>, &[String]) {
    (t.keyspace.as_deref(), &t.tables)
}

/// Dispatch a parsed command
pub fn run_command(
    ctx: &Context,
    command: &Command,
    executor: &dyn Executor,
    sleeper: &dyn Sleeper,
) -> OpsResult<ModuleOutcome> {
    let nt = ctx.nodetool(executor);

    match command {
        Command::Binary(a) => toggles::ensure_feature(&nt, Feature::Binary, a.state),
        Command::Gossip(a) => toggles::ensure_feature(&nt, Feature::Gossip, a.state),
        Command::Thrift(a) => toggles::ensure_feature(&nt, Feature::Thrift, a.state),
        Command::Handoff(a) => toggles::ensure_feature(&nt, Feature::Handoff, a.state),
        Command::Backup(a) => toggles::ensure_feature(&nt, Feature::Backup, a.state),
        Command::Compact(a) => toggles::compaction(&nt, a.state == DesiredState::Enabled),
        Command::Autocompaction { target: t, state } => {
            let (ks, tables) = target(t);
            toggles::autocompaction(&nt, ks, tables, state.state)
        }

        Command::Compactionthroughput { value } => settings::compaction_throughput(&nt, *value),
        Command::Streamthroughput { value } => settings::stream_throughput(&nt, *value),
        Command::Batchlogreplaythrottle { value } => settings::batchlog_replay_throttle(&nt, *value),
        Command::Maxhintwindow { value } => settings::max_hint_window(&nt, *value),
        Command::Traceprobability { value } => settings::trace_probability(&nt, *value),
        Command::Timeout { timeout_type, value } => settings::timeout(&nt, *timeout_type, *value),
        Command::Compactionthreshold {
            keyspace,
            table,
            min,
            max,
        } => settings::compaction_threshold(&nt, keyspace, table, *min, *max),
        Command::Concurrency {
            concurrency_type,
            stage,
            value,
        } => settings::concurrency(&nt, *concurrency_type, *stage, *value),

        Command::Drain => maintenance::drain(&nt),
        Command::Truncatehints => maintenance::truncate_hints(&nt),
        Command::Reload { target } => maintenance::reload(&nt, *target),
        Command::Assassinate { ip_address } => maintenance::assassinate(&nt, ip_address),
        Command::Stopdaemon => maintenance::stop_daemon(&nt),
        Command::Snapshot {
            keyspaces,
            table,
            keyspace_tables,
            skip_flush,
            name,
        } => maintenance::snapshot(
            &nt,
            &SnapshotRequest {
                keyspaces: keyspaces.clone(),
                table: table.clone(),
                keyspace_tables: keyspace_tables.clone(),
                skip_flush: *skip_flush,
                name: name.clone(),
            },
        ),
        Command::Clearsnapshot { name, keyspaces } => {
            maintenance::clear_snapshot(&nt, name.as_deref(), keyspaces)
        }
        Command::Garbagecollect {
            target: t,
            granularity,
            jobs,
        } => {
            let (ks, tables) = target(t);
            maintenance::garbage_collect(&nt, ks, tables, *granularity, *jobs)
        }
        Command::Verify { target: t, extended } => {
            let (ks, tables) = target(t);
            maintenance::verify(&nt, ks, tables, *extended)
        }
        Command::Upgradesstables { target: t, jobs } => {
            let (ks, tables) = target(t);
            maintenance::upgrade_sstables(&nt, ks, tables, *jobs)
        }
        Command::Flush { target: t } => {
            let (ks, tables) = target(t);
            maintenance::flush(&nt, ks, tables)
        }
        Command::Decommission => maintenance::decommission(&nt),
        Command::Removenode { host_id, force } => maintenance::remove_node(&nt, host_id, *force),
        Command::Invalidatecache { cache } => maintenance::invalidate_cache(&nt, *cache),

        Command::Status { down, poll } => ops::cluster_status(&nt, sleeper, *down, &ctx.poll(poll)),
        Command::Schema { expected, poll } => {
            ops::schema_agreement(&nt, sleeper, expected.as_deref(), &ctx.poll(poll))
        }

        Command::Fullquerylog {
            state,
            log_dir,
            archive_command,
            roll_cycle,
            blocking,
            max_log_size,
            max_queue_weight,
            max_archive_retries,
        } => {
            let defaults = FullQueryLogRequest::default();
            let request = FullQueryLogRequest {
                state: *state,
                log_dir: log_dir.clone(),
                archive_command: archive_command.clone(),
                roll_cycle: *roll_cycle,
                blocking: *blocking,
                max_log_size: max_log_size.unwrap_or(defaults.max_log_size),
                max_queue_weight: max_queue_weight.unwrap_or(defaults.max_queue_weight),
                max_archive_retries: max_archive_retries.unwrap_or(defaults.max_archive_retries),
            };
            ops::full_query_log(&nt, &request)
        }

        Command::Cqlsh(args) => cqlsh(ctx, args, executor),

        Command::Keyspace { .. } | Command::Role(_) | Command::Table(_) => {
            let request = schema_request(command)?;
            let session = ScyllaSession::connect(&ctx.config.cql)?;
            request.run(&session, ctx.options)
        }
    }
}

/// A schema change, validated before any connection is made
#[derive(Debug, Clone)]
pub enum SchemaRequest {
    Keyspace(KeyspaceRequest),
    Role(RoleRequest),
    Table(TableRequest),
}

impl SchemaRequest {
    pub fn run(&self, session: &dyn CqlSession, options: RunOptions) -> OpsResult<ModuleOutcome> {
        match self {
            SchemaRequest::Keyspace(r) => ensure_keyspace(session, r, options),
            SchemaRequest::Role(r) => ensure_role(session, r, options),
            SchemaRequest::Table(r) => ensure_table(session, r, options),
        }
    }
}

/// Build the schema request for a keyspace, role or table command
pub fn schema_request(command: &Command) -> OpsResult<SchemaRequest> {
    match command {
        Command::Keyspace {
            name,
            state,
            replication_factor,
            data_centres,
            durable_writes,
        } => Ok(SchemaRequest::Keyspace(KeyspaceRequest {
            state: *state,
            replication_factor: *replication_factor,
            durable_writes: *durable_writes,
            data_centres: data_centre_factors(data_centres)?,
            ..KeyspaceRequest::new(name.as_str())
        })),
        Command::Role(args) => Ok(SchemaRequest::Role(role_request(args))),
        Command::Table(args) => {
            let request = table_request(args);
            request.validate()?;
            Ok(SchemaRequest::Table(request))
        }
        _ => Err(OpsError::Validation("not a schema command".to_string())),
    }
}

fn cqlsh(ctx: &Context, args: &CqlshArgs, executor: &dyn Executor) -> OpsResult<ModuleOutcome> {
    let hosts = ctx.config.cql.resolve_hosts();
    let host = hosts
        .first()
        .cloned()
        .ok_or_else(|| OpsError::Connection("no contact points configured".to_string()))?;

    let mut config = CqlshConfig::for_host(&ctx.config.cql, host);
    config.keyspace = args.keyspace.clone();
    config.file = args.file.clone();
    config.execute = args.execute.clone();
    if args.encoding.is_some() {
        config.encoding = args.encoding.clone();
    }
    config.cqlshrc = args.cqlshrc.clone();
    config.protocol_version = args.protocol_version.clone();
    config.tty = args.tty;
    config.debug = args.cqlsh_debug;
    config.no_compact = args.no_compact;
    config.additional_args = args
        .additional_args
        .iter()
        .map(|a| match a.split_once('=') {
            Some((k, v)) => (k.to_string(), Value::String(v.to_string())),
            None => (a.clone(), Value::Bool(true)),
        })
        .collect();

    run_cqlsh(executor, &config, args.transform, &args.split_char, ctx.options)
}

fn data_centre_factors(pairs: &[(String, String)]) -> OpsResult<Option<BTreeMap<String, u32>>> {
    if pairs.is_empty() {
        return Ok(None);
    }
    pairs
        .iter()
        .map(|(dc, factor)| {
            factor.parse::<u32>().map(|f| (dc.clone(), f)).map_err(|_| {
                OpsError::Validation(format!("replication factor for {} must be an integer, got '{}'", dc, factor))
            })
        })
        .collect::<OpsResult<BTreeMap<_, _>>>()
        .map(Some)
}

fn role_request(args: &RoleArgs) -> RoleRequest {
    let options = (!args.options.is_empty()).then(|| {
        args.options
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect()
    });
    let keyspace_permissions = args.permissions.as_ref().map(|pairs| {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (keyspace, permission) in pairs {
            grouped.entry(keyspace.clone()).or_default().push(permission.clone());
        }
        grouped
    });
    RoleRequest {
        state: args.state,
        super_user: args.super_user,
        login: args.login,
        password: args.role_password.clone(),
        options,
        data_centers: args.data_centers.clone(),
        keyspace_permissions,
        roles: args.roles.clone(),
        ..RoleRequest::new(args.name.as_str())
    }
}

fn table_request(args: &TableArgs) -> TableRequest {
    TableRequest {
        state: args.state,
        columns: args.columns.clone(),
        primary_key: args.primary_key.clone(),
        partition_key: args.partition_key.clone(),
        clustering: args.clustering.clone(),
        table_options: args
            .table_options
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
        is_type: args.is_type,
        ..TableRequest::new(args.keyspace.as_str(), args.name.as_str())
    }
}
