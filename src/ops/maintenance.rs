//! One-shot maintenance commands
//!
//! Most of these have no observable state to compare against and always
//! report a change on success. Decommission, removenode and
//! invalidatecache read state first and only act when there is work.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{OpsError, OpsResult};
use crate::nodetool::parsers::{hosts_in_ring, parse_cache_info, snapshot_directory};
use crate::nodetool::variants::{run_simple, Simple};
use crate::nodetool::{with_jobs_and_targets, with_targets, Nodetool};
use crate::observability::{log_event_with_fields, Event};
use crate::outcome::{ExecutionResult, ModuleOutcome};

/// Run `cmd` and fail on a non-zero exit unless `accept` says otherwise
fn run_action<A>(nt: &Nodetool<'_>, name: &str, cmd: String, accept: A) -> OpsResult<(ModuleOutcome, ExecutionResult)>
where
    A: Fn(&ExecutionResult) -> bool,
{
    if nt.options().check_mode {
        log_event_with_fields(Event::CheckModeSkipped, &[("cmd", cmd.as_str())]);
        let skipped = ExecutionResult::ok("");
        return Ok((
            ModuleOutcome::changed(format!("nodetool {} executed successfully (check mode)", name)),
            skipped,
        ));
    }

    let result = run_simple(nt, &Simple { cmd: cmd.clone() })?;
    if !(result.success() || accept(&result)) {
        return Err(nt.failure(
            format!("nodetool {} did not execute successfully", name),
            &cmd,
            &result,
        ));
    }
    log_event_with_fields(Event::StateChanged, &[("cmd", cmd.as_str())]);
    let outcome = ModuleOutcome::changed(format!("nodetool {} executed successfully", name))
        .with_debug(nt.options().debug, &result);
    Ok((outcome, result))
}

fn simple_action(nt: &Nodetool<'_>, name: &str, cmd: String) -> OpsResult<ModuleOutcome> {
    run_action(nt, name, cmd, |_| false).map(|(outcome, _)| outcome)
}

/// Flush memtables and stop accepting writes
pub fn drain(nt: &Nodetool<'_>) -> OpsResult<ModuleOutcome> {
    simple_action(nt, "drain", "drain".to_string())
}

/// Drop all hints stored on this node
pub fn truncate_hints(nt: &Nodetool<'_>) -> OpsResult<ModuleOutcome> {
    simple_action(nt, "truncatehints", "truncatehints".to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lower")]
pub enum ReloadTarget {
    LocalSchema,
    Seeds,
    Ssl,
    Triggers,
}

impl ReloadTarget {
    pub fn subcommand(&self) -> &'static str {
        match self {
            ReloadTarget::LocalSchema => "reloadlocalschema",
            ReloadTarget::Seeds => "reloadseeds",
            ReloadTarget::Ssl => "reloadssl",
            ReloadTarget::Triggers => "reloadtriggers",
        }
    }
}

pub fn reload(nt: &Nodetool<'_>, target: ReloadTarget) -> OpsResult<ModuleOutcome> {
    let cmd = target.subcommand();
    simple_action(nt, cmd, cmd.to_string())
}

/// Forcefully remove a dead endpoint from gossip
pub fn assassinate(nt: &Nodetool<'_>, ip_address: &str) -> OpsResult<ModuleOutcome> {
    let ip: IpAddr = ip_address.trim().parse().map_err(|_| {
        OpsError::Validation(format!("ip_address '{}' is not a valid IP address", ip_address))
    })?;
    let (mut outcome, _) =
        run_action(nt, "assassinate", format!("assassinate -- {}", ip), |_| false)?;
    if !nt.options().check_mode {
        outcome.msg = format!("nodetool assassinate executed successfully for endpoint: {}", ip);
    }
    Ok(outcome)
}

/// Stop the Cassandra daemon.
///
/// Older releases exit 2 after printing `Cassandra has shutdown.`, which
/// counts as success.
pub fn stop_daemon(nt: &Nodetool<'_>) -> OpsResult<ModuleOutcome> {
    run_action(nt, "stopdaemon", "stopdaemon".to_string(), |r| {
        r.rc == 2 && r.trimmed_stdout() == "Cassandra has shutdown."
    })
    .map(|(outcome, _)| outcome)
}

/// Arguments for `nodetool snapshot`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRequest {
    #[serde(default)]
    pub keyspaces: Vec<String>,
    /// Single table (`-cf`); needs exactly one keyspace
    #[serde(default)]
    pub table: Option<String>,
    /// `keyspace.table` pairs (`-kt`)
    #[serde(default)]
    pub keyspace_tables: Vec<String>,
    #[serde(default)]
    pub skip_flush: bool,
    /// Snapshot tag (`-t`)
    #[serde(default)]
    pub name: Option<String>,
}

impl SnapshotRequest {
    pub fn subcommand(&self) -> String {
        let mut cmd = String::from("snapshot");
        if self.skip_flush {
            cmd.push_str(" -sf");
        }
        if let Some(name) = &self.name {
            cmd.push_str(&format!(" -t {}", name));
        }
        if let Some(table) = &self.table {
            cmd.push_str(&format!(" -cf {}", table));
        }
        if !self.keyspace_tables.is_empty() {
            let pairs: Vec<String> = self
                .keyspace_tables
                .iter()
                .map(|kt| kt.replace(' ', ""))
                .collect();
            cmd.push_str(&format!(" -kt {}", pairs.join(",")));
        }
        if !self.keyspaces.is_empty() {
            cmd.push(' ');
            cmd.push_str(&self.keyspaces.join(" "));
        }
        cmd
    }
}

/// Take a snapshot; the payload carries `snapshot_dir`
pub fn snapshot(nt: &Nodetool<'_>, request: &SnapshotRequest) -> OpsResult<ModuleOutcome> {
    let (outcome, result) = run_action(nt, "snapshot", request.subcommand(), |_| false)?;
    if nt.options().check_mode {
        return Ok(outcome);
    }
    Ok(outcome.with("snapshot_dir", snapshot_directory(&result.stdout)))
}

/// Remove a named snapshot, or every snapshot when `name` is `None`
pub fn clear_snapshot(
    nt: &Nodetool<'_>,
    name: Option<&str>,
    keyspaces: &[String],
) -> OpsResult<ModuleOutcome> {
    let mut cmd = match name {
        Some(n) => format!("clearsnapshot -t {}", n),
        None => "clearsnapshot --all".to_string(),
    };
    if !keyspaces.is_empty() {
        cmd.push(' ');
        cmd.push_str(&keyspaces.join(" "));
    }
    simple_action(nt, "clearsnapshot", cmd)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
#[value(rename_all = "UPPER")]
pub enum Granularity {
    #[default]
    Row,
    Cell,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Row => "ROW",
            Granularity::Cell => "CELL",
        }
    }
}

/// Remove deleted data from SSTables
pub fn garbage_collect(
    nt: &Nodetool<'_>,
    keyspace: Option<&str>,
    tables: &[String],
    granularity: Granularity,
    jobs: u32,
) -> OpsResult<ModuleOutcome> {
    let base = format!("garbagecollect --granularity {} --jobs {}", granularity.as_str(), jobs);
    simple_action(nt, "garbagecollect", with_targets(&base, keyspace, tables))
}

/// Verify SSTable checksums, optionally with the extended check
pub fn verify(
    nt: &Nodetool<'_>,
    keyspace: Option<&str>,
    tables: &[String],
    extended: bool,
) -> OpsResult<ModuleOutcome> {
    let base = if extended { "verify -e" } else { "verify" };
    simple_action(nt, "verify", with_targets(base, keyspace, tables))
}

pub fn upgrade_sstables(
    nt: &Nodetool<'_>,
    keyspace: Option<&str>,
    tables: &[String],
    jobs: u32,
) -> OpsResult<ModuleOutcome> {
    simple_action(
        nt,
        "upgradesstables",
        with_jobs_and_targets("upgradesstables", jobs, keyspace, tables),
    )
}

pub fn flush(nt: &Nodetool<'_>, keyspace: Option<&str>, tables: &[String]) -> OpsResult<ModuleOutcome> {
    simple_action(nt, "flush", with_targets("flush", keyspace, tables))
}

/// Decommission this node if it is still part of the ring
pub fn decommission(nt: &Nodetool<'_>) -> OpsResult<ModuleOutcome> {
    let ring = nt.exec("ring")?;
    if !ring.success() {
        return Err(nt.failure("decommission command failed", "ring", &ring));
    }

    let host = nt.config().resolve_host();
    if !hosts_in_ring(&ring.stdout, &host) {
        return Ok(ModuleOutcome::unchanged("Node appears to be already decommissioned")
            .with_debug(nt.options().debug, &ring));
    }

    if nt.options().check_mode {
        log_event_with_fields(Event::CheckModeSkipped, &[("cmd", "decommission")]);
        return Ok(ModuleOutcome::changed("decommission command succeeded"));
    }
    let result = nt.exec("decommission")?;
    if !result.success() {
        return Err(nt.failure("decommission command failed", "decommission", &result));
    }
    Ok(ModuleOutcome::changed("decommission command succeeded").with_debug(nt.options().debug, &result))
}

/// Remove a dead node by host id.
///
/// The id must be a hyphenated UUID; anything else is rejected before
/// nodetool runs.
pub fn remove_node(nt: &Nodetool<'_>, host_id: &str, force: bool) -> OpsResult<ModuleOutcome> {
    let id = host_id.trim();
    let valid = id.len() == 36 && Uuid::parse_str(id).is_ok();
    if !valid {
        return Err(OpsError::Validation("host_id is not a valid uuid".to_string()));
    }

    let status = nt.exec("status")?;
    if !status.success() {
        return Err(nt.failure("removenode command failed", "status", &status));
    }
    if !status.stdout.contains(id) {
        return Ok(ModuleOutcome::unchanged("host_id does not exist in the cluster")
            .with_debug(nt.options().debug, &status));
    }

    let cmd = if force {
        format!("removenode -- force {}", id)
    } else {
        format!("removenode -- {}", id)
    };
    if nt.options().check_mode {
        log_event_with_fields(Event::CheckModeSkipped, &[("cmd", cmd.as_str())]);
        return Ok(ModuleOutcome::changed("removenode command succeeded"));
    }
    let result = nt.exec(&cmd)?;
    if !result.success() {
        return Err(nt.failure("removenode command failed", &cmd, &result));
    }
    Ok(ModuleOutcome::changed("removenode command succeeded").with_debug(nt.options().debug, &result))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    Key,
    Row,
    Counter,
}

impl CacheKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Key => "key",
            CacheKind::Row => "row",
            CacheKind::Counter => "counter",
        }
    }
}

/// Invalidate a cache, but only when it holds entries
pub fn invalidate_cache(nt: &Nodetool<'_>, cache: CacheKind) -> OpsResult<ModuleOutcome> {
    let info = nt.exec("info")?;
    if !info.success() {
        return Err(nt.failure("info command failed", "info", &info));
    }
    let counts = parse_cache_info(&info.stdout)?;
    let entries = match cache {
        CacheKind::Key => counts.key_cache_entries,
        CacheKind::Row => counts.row_cache_entries,
        CacheKind::Counter => counts.counter_cache_entries,
    };

    if entries == 0 {
        return Ok(ModuleOutcome::unchanged(format!("The {} cache is empty", cache.as_str()))
            .with("cache_info", counts)
            .with_debug(nt.options().debug, &info));
    }

    let cmd = format!("invalidate{}cache", cache.as_str());
    if !nt.options().check_mode {
        let result = nt.exec(&cmd)?;
        if !result.success() {
            return Err(nt.failure(
                format!("Failed invalidating the {} cache", cache.as_str()),
                &cmd,
                &result,
            ));
        }
    }
    Ok(ModuleOutcome::changed(format!("The {} cache was invalidated", cache.as_str()))
        .with("cache_info", counts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionConfig;
    use crate::executor::MockExecutor;
    use crate::outcome::RunOptions;

    fn cfg() -> ConnectionConfig {
        ConnectionConfig::new("10.0.0.1", 7199)
    }

    #[test]
    fn test_stop_daemon_rc2_is_success() {
        let exec = MockExecutor::with_results(vec![ExecutionResult::new(
            2,
            "Cassandra has shutdown.\n",
            "",
        )]);
        let config = cfg();
        let nt = Nodetool::new(&config, &exec, RunOptions::default());
        assert!(stop_daemon(&nt).unwrap().changed);
    }

    #[test]
    fn test_stop_daemon_other_rc2_fails() {
        let exec = MockExecutor::with_results(vec![ExecutionResult::new(2, "error", "")]);
        let config = cfg();
        let nt = Nodetool::new(&config, &exec, RunOptions::default());
        assert_eq!(stop_daemon(&nt).unwrap_err().code(), "CASS_TOOL_FAILED");
    }

    #[test]
    fn test_snapshot_subcommand_and_dir() {
        let request = SnapshotRequest {
            keyspaces: vec!["app".into()],
            skip_flush: true,
            name: Some("nightly".into()),
            ..Default::default()
        };
        assert_eq!(request.subcommand(), "snapshot -sf -t nightly app");

        let exec = MockExecutor::with_results(vec![ExecutionResult::ok(
            "Requested creating snapshot(s) for [app] with snapshot name [nightly]\nSnapshot directory: nightly",
        )]);
        let config = cfg();
        let nt = Nodetool::new(&config, &exec, RunOptions::default());
        let outcome = snapshot(&nt, &request).unwrap();
        assert_eq!(outcome.get("snapshot_dir").unwrap(), "nightly");
    }

    #[test]
    fn test_keyspace_tables_joined() {
        let request = SnapshotRequest {
            keyspace_tables: vec!["app.users".into(), "app. events".into()],
            ..Default::default()
        };
        assert_eq!(request.subcommand(), "snapshot -kt app.users,app.events");
    }

    #[test]
    fn test_garbage_collect_command() {
        let exec = MockExecutor::new();
        let config = cfg();
        let nt = Nodetool::new(&config, &exec, RunOptions::default());
        garbage_collect(&nt, Some("app"), &["users".to_string()], Granularity::Cell, 4).unwrap();
        assert_eq!(exec.count_matching("garbagecollect --granularity CELL --jobs 4 app users"), 1);
    }

    #[test]
    fn test_simple_failure_is_error() {
        let exec = MockExecutor::with_results(vec![ExecutionResult::failed(1, "boom")]);
        let config = cfg();
        let nt = Nodetool::new(&config, &exec, RunOptions::default());
        let err = drain(&nt).unwrap_err();
        assert_eq!(err.to_string(), "nodetool drain did not execute successfully");
    }

    #[test]
    fn test_check_mode_runs_nothing() {
        let exec = MockExecutor::new();
        let config = cfg();
        let nt = Nodetool::new(&config, &exec, RunOptions::check());
        assert!(flush(&nt, None, &[]).unwrap().changed);
        assert_eq!(exec.count(), 0);
    }

    #[test]
    fn test_assassinate_rejects_bad_ip() {
        let exec = MockExecutor::new();
        let config = cfg();
        let nt = Nodetool::new(&config, &exec, RunOptions::default());
        assert!(assassinate(&nt, "not-an-ip").unwrap_err().is_validation());
        assert_eq!(exec.count(), 0);
    }

    #[test]
    fn test_decommission_only_when_in_ring() {
        let exec = MockExecutor::with_results(vec![ExecutionResult::ok("10.0.0.2  rack1  Up")]);
        let config = cfg();
        let nt = Nodetool::new(&config, &exec, RunOptions::default());
        assert!(!decommission(&nt).unwrap().changed);
        assert_eq!(exec.count(), 1);

        let exec = MockExecutor::with_results(vec![ExecutionResult::ok("10.0.0.1  rack1  Up")]);
        let nt = Nodetool::new(&config, &exec, RunOptions::default());
        assert!(decommission(&nt).unwrap().changed);
        assert_eq!(exec.count_matching("decommission"), 1);
    }

    #[test]
    fn test_remove_node_invalid_uuid_runs_nothing() {
        let exec = MockExecutor::new();
        let config = cfg();
        let nt = Nodetool::new(&config, &exec, RunOptions::default());
        for bad in ["not-a-uuid", "d4f18346f81f3786aed440e03558b299", ""] {
            assert!(remove_node(&nt, bad, false).unwrap_err().is_validation());
        }
        assert_eq!(exec.count(), 0);
    }

    #[test]
    fn test_remove_node_force() {
        let id = "8d1fbe3c-7c8d-4e2b-8f7a-0f3c1a2b3c4d";
        let exec = MockExecutor::with_results(vec![ExecutionResult::ok(format!(
            "DN  10.0.0.9  1 KiB  16  ?  {}  rack1",
            id
        ))]);
        let config = cfg();
        let nt = Nodetool::new(&config, &exec, RunOptions::default());
        assert!(remove_node(&nt, id, true).unwrap().changed);
        assert_eq!(exec.count_matching(&format!("removenode -- force {}", id)), 1);
    }

    #[test]
    fn test_invalidate_cache_skips_empty() {
        let info = "Key Cache : entries 5, size 1\nRow Cache : entries 0, size 0\nCounter Cache : entries 0, size 0\n";
        let exec = MockExecutor::new();
        exec.respond_to(" info", ExecutionResult::ok(info));
        let config = cfg();
        let nt = Nodetool::new(&config, &exec, RunOptions::default());

        assert!(!invalidate_cache(&nt, CacheKind::Row).unwrap().changed);
        assert!(invalidate_cache(&nt, CacheKind::Key).unwrap().changed);
        assert_eq!(exec.count_matching("invalidatekeycache"), 1);
        assert_eq!(exec.count_matching("invalidaterowcache"), 0);
    }
}
