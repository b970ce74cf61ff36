//! On/off node features

use serde::{Deserialize, Serialize};

use crate::errors::OpsResult;
use crate::nodetool::variants::{ensure_state, toggle, EnableDisable, StatusEnableDisable};
use crate::nodetool::{with_targets, DesiredState, Nodetool};
use crate::outcome::ModuleOutcome;

/// Features with a status subcommand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    /// Native transport (CQL)
    Binary,
    Gossip,
    Thrift,
    /// Hinted handoff
    Handoff,
    /// Incremental backups
    Backup,
}

impl Feature {
    pub fn name(&self) -> &'static str {
        match self {
            Feature::Binary => "binary",
            Feature::Gossip => "gossip",
            Feature::Thrift => "thrift",
            Feature::Handoff => "handoff",
            Feature::Backup => "backup",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Feature::Binary => "native transport",
            Feature::Gossip => "gossip",
            Feature::Thrift => "thrift",
            Feature::Handoff => "hinted handoff",
            Feature::Backup => "incremental backup",
        }
    }

    pub fn variant(&self) -> StatusEnableDisable {
        let name = self.name();
        StatusEnableDisable {
            label: self.label().to_string(),
            status: format!("status{}", name),
            enable: format!("enable{}", name),
            disable: format!("disable{}", name),
        }
    }
}

/// Bring `feature` to `desired`, touching it only when it differs
pub fn ensure_feature(
    nt: &Nodetool<'_>,
    feature: Feature,
    desired: DesiredState,
) -> OpsResult<ModuleOutcome> {
    ensure_state(nt, &feature.variant(), desired)
}

fn compaction_variant() -> StatusEnableDisable {
    StatusEnableDisable {
        label: "compaction".to_string(),
        status: "compactionstats".to_string(),
        enable: "compact".to_string(),
        disable: "stop COMPACTION".to_string(),
    }
}

/// Start a major compaction when none is pending, or stop running ones
pub fn compaction(nt: &Nodetool<'_>, compact: bool) -> OpsResult<ModuleOutcome> {
    ensure_state(nt, &compaction_variant(), DesiredState::from(compact))
}

/// Enable or disable autocompaction for a keyspace and optional tables.
///
/// There is no status subcommand, so this always runs and reports a change.
pub fn autocompaction(
    nt: &Nodetool<'_>,
    keyspace: Option<&str>,
    tables: &[String],
    desired: DesiredState,
) -> OpsResult<ModuleOutcome> {
    let v = EnableDisable {
        label: "autocompaction".to_string(),
        enable: with_targets("enableautocompaction", keyspace, tables),
        disable: with_targets("disableautocompaction", keyspace, tables),
    };
    toggle(nt, &v, desired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionConfig;
    use crate::executor::MockExecutor;
    use crate::outcome::{ExecutionResult, RunOptions};

    #[test]
    fn test_feature_subcommands() {
        let v = Feature::Backup.variant();
        assert_eq!(v.status, "statusbackup");
        assert_eq!(v.enable, "enablebackup");
        assert_eq!(v.disable, "disablebackup");
    }

    #[test]
    fn test_handoff_long_sentinel() {
        let exec = MockExecutor::with_results(vec![ExecutionResult::ok(
            "Hinted handoff is running\n",
        )]);
        let cfg = ConnectionConfig::new("h", 7199);
        let nt = Nodetool::new(&cfg, &exec, RunOptions::default());

        let outcome = ensure_feature(&nt, Feature::Handoff, DesiredState::Enabled).unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.msg, "hinted handoff is already enabled");
    }

    #[test]
    fn test_compaction_stop_when_pending() {
        let exec = MockExecutor::with_results(vec![ExecutionResult::ok(
            "pending tasks: 2\n- ks.t: 2",
        )]);
        let cfg = ConnectionConfig::new("h", 7199);
        let nt = Nodetool::new(&cfg, &exec, RunOptions::default());

        assert!(compaction(&nt, false).unwrap().changed);
        assert_eq!(exec.count_matching("stop COMPACTION"), 1);
    }

    #[test]
    fn test_compaction_start_when_idle() {
        let exec = MockExecutor::with_results(vec![ExecutionResult::ok("pending tasks: 0")]);
        let cfg = ConnectionConfig::new("h", 7199);
        let nt = Nodetool::new(&cfg, &exec, RunOptions::default());

        assert!(compaction(&nt, true).unwrap().changed);
        assert_eq!(exec.count_matching(" compact"), 1);
    }

    #[test]
    fn test_autocompaction_targets() {
        let exec = MockExecutor::new();
        let cfg = ConnectionConfig::new("h", 7199);
        let nt = Nodetool::new(&cfg, &exec, RunOptions::default());
        let tables = vec!["users".to_string()];

        autocompaction(&nt, Some("app"), &tables, DesiredState::Disabled).unwrap();
        assert_eq!(exec.count_matching("disableautocompaction app users"), 1);
    }
}
