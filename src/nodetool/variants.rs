//! Command shapes and the idempotence logic that drives them
//!
//! Each shape owns its subcommand strings and lives for one operation.
//! The free functions below are the only place a mutating subcommand is
//! issued, and only after the observed state has been compared with the
//! desired one.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{OpsError, OpsResult};
use crate::observability::{log_event_with_fields, Event};
use crate::outcome::{ExecutionResult, ModuleOutcome};

use super::parsers::last_integer;
use super::sentinels::Observed;
use super::Nodetool;

/// Desired on/off state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    Enabled,
    Disabled,
}

impl DesiredState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DesiredState::Enabled => "enabled",
            DesiredState::Disabled => "disabled",
        }
    }

    fn observed(&self) -> Observed {
        match self {
            DesiredState::Enabled => Observed::Active,
            DesiredState::Disabled => Observed::Inactive,
        }
    }
}

impl From<bool> for DesiredState {
    fn from(enabled: bool) -> Self {
        if enabled {
            DesiredState::Enabled
        } else {
            DesiredState::Disabled
        }
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One subcommand, run once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Simple {
    pub cmd: String,
}

/// Two mutually exclusive subcommands with no status check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnableDisable {
    pub label: String,
    pub enable: String,
    pub disable: String,
}

/// Status-checked enable/disable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEnableDisable {
    pub label: String,
    pub status: String,
    pub enable: String,
    pub disable: String,
}

/// Status-checked enable/disable plus reset; enable takes extra arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEnableDisableReset {
    pub label: String,
    pub status: String,
    pub enable: String,
    pub disable: String,
    pub reset: String,
    pub extra_args: String,
}

impl StatusEnableDisableReset {
    /// Enable subcommand with the extra arguments appended
    pub fn enable_command(&self) -> String {
        let extra = self.extra_args.trim();
        if extra.is_empty() {
            self.enable.clone()
        } else {
            format!("{} {}", self.enable, extra)
        }
    }
}

/// How a get subcommand's output is compared with the desired value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Trimmed output must equal this sentence exactly
    Sentence(String),
    /// The last whitespace-separated token must be this integer
    LastInteger(i64),
}

/// Read a value, write it only on mismatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetSet {
    pub label: String,
    pub value: String,
    pub get: String,
    pub set: String,
    pub matcher: Matcher,
}

/// The command shapes nodetool operations are built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandVariant {
    Simple(Simple),
    EnableDisable(EnableDisable),
    StatusEnableDisable(StatusEnableDisable),
    StatusEnableDisableReset(StatusEnableDisableReset),
    GetSet(GetSet),
}

impl CommandVariant {
    pub fn kind(&self) -> &'static str {
        match self {
            CommandVariant::Simple(_) => "simple",
            CommandVariant::EnableDisable(_) => "enable_disable",
            CommandVariant::StatusEnableDisable(_) => "status_enable_disable",
            CommandVariant::StatusEnableDisableReset(_) => "status_enable_disable_reset",
            CommandVariant::GetSet(_) => "get_set",
        }
    }

    /// Every subcommand this variant may issue
    pub fn subcommands(&self) -> Vec<&str> {
        match self {
            CommandVariant::Simple(v) => vec![&v.cmd],
            CommandVariant::EnableDisable(v) => vec![&v.enable, &v.disable],
            CommandVariant::StatusEnableDisable(v) => vec![&v.status, &v.enable, &v.disable],
            CommandVariant::StatusEnableDisableReset(v) => {
                vec![&v.status, &v.enable, &v.disable, &v.reset]
            }
            CommandVariant::GetSet(v) => vec![&v.get, &v.set],
        }
    }
}

impl From<Simple> for CommandVariant {
    fn from(v: Simple) -> Self {
        CommandVariant::Simple(v)
    }
}

impl From<EnableDisable> for CommandVariant {
    fn from(v: EnableDisable) -> Self {
        CommandVariant::EnableDisable(v)
    }
}

impl From<StatusEnableDisable> for CommandVariant {
    fn from(v: StatusEnableDisable) -> Self {
        CommandVariant::StatusEnableDisable(v)
    }
}

impl From<StatusEnableDisableReset> for CommandVariant {
    fn from(v: StatusEnableDisableReset) -> Self {
        CommandVariant::StatusEnableDisableReset(v)
    }
}

impl From<GetSet> for CommandVariant {
    fn from(v: GetSet) -> Self {
        CommandVariant::GetSet(v)
    }
}

/// Run a simple subcommand and hand back the raw result
pub fn run_simple(nt: &Nodetool<'_>, v: &Simple) -> OpsResult<ExecutionResult> {
    nt.exec(&v.cmd)
}

/// Issue the enable or disable subcommand unconditionally
pub fn toggle(nt: &Nodetool<'_>, v: &EnableDisable, desired: DesiredState) -> OpsResult<ModuleOutcome> {
    let cmd = match desired {
        DesiredState::Enabled => &v.enable,
        DesiredState::Disabled => &v.disable,
    };

    if nt.options().check_mode {
        log_event_with_fields(Event::CheckModeSkipped, &[("cmd", cmd.as_str())]);
        return Ok(ModuleOutcome::changed(format!("{} {} (check mode)", v.label, desired)));
    }

    let result = nt.exec(cmd)?;
    if !result.success() {
        let verb = if desired == DesiredState::Enabled { "enable" } else { "disable" };
        return Err(nt.failure(format!("{} command failed", verb), cmd, &result));
    }
    log_event_with_fields(Event::StateChanged, &[("cmd", cmd.as_str())]);
    Ok(ModuleOutcome::changed(format!("{} {}", v.label, desired)).with_debug(nt.options().debug, &result))
}

/// Read the status and issue enable/disable only when it differs
pub fn ensure_state(
    nt: &Nodetool<'_>,
    v: &StatusEnableDisable,
    desired: DesiredState,
) -> OpsResult<ModuleOutcome> {
    let status = nt.exec(&v.status)?;
    if !status.success() {
        return Err(nt.failure("status command failed", &v.status, &status));
    }
    let observed = nt.sentinels().classify(&v.status, &status.stdout)?;
    let debug = nt.options().debug;

    if observed == desired.observed() {
        log_event_with_fields(Event::StateSatisfied, &[("cmd", v.status.as_str()), ("state", desired.as_str())]);
        return Ok(ModuleOutcome::unchanged(format!("{} is already {}", v.label, desired))
            .with_debug(debug, &status));
    }

    let cmd = match desired {
        DesiredState::Enabled => &v.enable,
        DesiredState::Disabled => &v.disable,
    };

    if nt.options().check_mode {
        log_event_with_fields(Event::CheckModeSkipped, &[("cmd", cmd.as_str())]);
        return Ok(ModuleOutcome::changed(format!("{} {} (check mode)", v.label, desired))
            .with_debug(debug, &status));
    }

    let result = nt.exec(cmd)?;
    if !result.success() {
        let verb = if desired == DesiredState::Enabled { "enable" } else { "disable" };
        return Err(nt.failure(format!("{} command failed", verb), cmd, &result));
    }
    log_event_with_fields(Event::StateChanged, &[("cmd", cmd.as_str()), ("state", desired.as_str())]);
    Ok(ModuleOutcome::changed(format!("{} {}", v.label, desired)).with_debug(debug, &result))
}

/// Run one verb of a reset-capable variant, failing on a non-zero rc
pub fn run_verb(nt: &Nodetool<'_>, cmd: &str) -> OpsResult<ExecutionResult> {
    let result = nt.exec(cmd)?;
    if !result.success() {
        let name = cmd.split_whitespace().next().unwrap_or(cmd);
        return Err(nt.failure(format!("{} command failed", name), cmd, &result));
    }
    Ok(result)
}

/// Issue the reset verb; always reports a change
pub fn reset(nt: &Nodetool<'_>, v: &StatusEnableDisableReset) -> OpsResult<ModuleOutcome> {
    if nt.options().check_mode {
        log_event_with_fields(Event::CheckModeSkipped, &[("cmd", v.reset.as_str())]);
        return Ok(ModuleOutcome::changed(format!("{} succeeded check mode", v.reset)));
    }
    let result = nt.exec(&v.reset)?;
    if !result.success() {
        return Err(nt.failure(format!("{} command failed", v.reset), &v.reset, &result));
    }
    log_event_with_fields(Event::StateChanged, &[("cmd", v.reset.as_str())]);
    Ok(ModuleOutcome::changed(format!("{} succeeded", v.reset)).with_debug(nt.options().debug, &result))
}

/// Read a value and issue the set subcommand only on mismatch
pub fn ensure_value(nt: &Nodetool<'_>, v: &GetSet) -> OpsResult<ModuleOutcome> {
    let get = nt.exec(&v.get)?;
    if !get.success() {
        return Err(nt.failure("get command failed", &v.get, &get));
    }
    let debug = nt.options().debug;

    let matches = match &v.matcher {
        Matcher::Sentence(expected) => get.trimmed_stdout() == expected,
        Matcher::LastInteger(expected) => {
            let current = last_integer(&get.stdout).ok_or_else(|| {
                OpsError::Parse(format!("Failure parsing {} output", v.get.trim()))
            })?;
            current == *expected
        }
    };

    if matches {
        log_event_with_fields(Event::StateSatisfied, &[("cmd", v.get.as_str()), ("value", v.value.as_str())]);
        return Ok(ModuleOutcome::unchanged(format!("{} is already {}", v.label, v.value))
            .with_debug(debug, &get));
    }

    if nt.options().check_mode {
        log_event_with_fields(Event::CheckModeSkipped, &[("cmd", v.set.as_str())]);
        return Ok(ModuleOutcome::changed(format!("{} updated to {} (check mode)", v.label, v.value))
            .with_debug(debug, &get));
    }

    let set = nt.exec(&v.set)?;
    if !set.success() {
        return Err(nt.failure("set command failed", &v.set, &set));
    }
    log_event_with_fields(Event::StateChanged, &[("cmd", v.set.as_str()), ("value", v.value.as_str())]);
    Ok(ModuleOutcome::changed(format!("{} updated to {}", v.label, v.value)).with_debug(debug, &set))
}
