//! Full query log (Cassandra 4.0+)

use serde::{Deserialize, Serialize};

use crate::errors::{OpsError, OpsResult};
use crate::executor::quote_word;
use crate::nodetool::parsers::{parse_fullquerylog, FullQueryLogConfig};
use crate::nodetool::variants::{reset, run_verb, StatusEnableDisableReset};
use crate::nodetool::Nodetool;
use crate::observability::{log_event_with_fields, Event};
use crate::outcome::ModuleOutcome;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FqlState {
    #[default]
    Enabled,
    Disabled,
    /// Disable and delete all log files
    Reset,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
#[value(rename_all = "UPPER")]
pub enum RollCycle {
    Minutely,
    #[default]
    Hourly,
    Daily,
}

impl RollCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            RollCycle::Minutely => "MINUTELY",
            RollCycle::Hourly => "HOURLY",
            RollCycle::Daily => "DAILY",
        }
    }
}

/// Desired full query log configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullQueryLogRequest {
    #[serde(default)]
    pub state: FqlState,
    #[serde(default, alias = "path")]
    pub log_dir: Option<String>,
    /// Archiving script; `%path` is replaced with the rolled file
    #[serde(default)]
    pub archive_command: Option<String>,
    #[serde(default)]
    pub roll_cycle: RollCycle,
    #[serde(default = "default_blocking", alias = "block")]
    pub blocking: bool,
    #[serde(default = "default_max_log_size")]
    pub max_log_size: u64,
    #[serde(default = "default_max_queue_weight")]
    pub max_queue_weight: u64,
    #[serde(default = "default_max_archive_retries")]
    pub max_archive_retries: u64,
}

fn default_blocking() -> bool {
    true
}

fn default_max_log_size() -> u64 {
    17_179_869_184
}

fn default_max_queue_weight() -> u64 {
    268_435_456
}

fn default_max_archive_retries() -> u64 {
    10
}

impl Default for FullQueryLogRequest {
    fn default() -> Self {
        Self {
            state: FqlState::default(),
            log_dir: None,
            archive_command: None,
            roll_cycle: RollCycle::default(),
            blocking: default_blocking(),
            max_log_size: default_max_log_size(),
            max_queue_weight: default_max_queue_weight(),
            max_archive_retries: default_max_archive_retries(),
        }
    }
}

impl FullQueryLogRequest {
    /// Arguments appended to `enablefullquerylog`
    pub fn extra_args(&self) -> String {
        if self.state != FqlState::Enabled {
            return String::new();
        }
        let mut args = String::new();
        if let Some(cmd) = &self.archive_command {
            args.push_str(&format!("--archive-command {}", quote_word(cmd)));
        }
        args.push_str(&format!(" --blocking {}", self.blocking));
        args.push_str(&format!(" --max-archive-retries {}", self.max_archive_retries));
        args.push_str(&format!(" --max-log-size {}", self.max_log_size));
        args.push_str(&format!(" --max-queue-weight {}", self.max_queue_weight));
        args.push_str(&format!(" --roll-cycle {}", self.roll_cycle.as_str()));
        if let Some(dir) = &self.log_dir {
            args.push_str(&format!(" --path {}", quote_word(dir)));
        }
        args.trim_start().to_string()
    }

    /// Whether `current` differs from an enabled log with this configuration
    pub fn differs(&self, current: &FullQueryLogConfig) -> bool {
        !current.enabled
            || current.log_dir != self.log_dir
            || current.archive_command != self.archive_command
            || current.roll_cycle.as_deref() != Some(self.roll_cycle.as_str())
            || current.block != self.blocking
            || current.max_log_size != Some(self.max_log_size)
            || current.max_queue_weight != Some(self.max_queue_weight)
            || current.max_archive_retries != Some(self.max_archive_retries)
    }

    fn variant(&self) -> StatusEnableDisableReset {
        StatusEnableDisableReset {
            label: "fullquerylog".to_string(),
            status: "getfullquerylog".to_string(),
            enable: "enablefullquerylog".to_string(),
            disable: "disablefullquerylog".to_string(),
            reset: "resetfullquerylog".to_string(),
            extra_args: self.extra_args(),
        }
    }
}

/// Enable, disable or reset the full query log.
///
/// Enabling only runs when the current configuration differs; reset
/// always runs and always reports a change.
pub fn full_query_log(nt: &Nodetool<'_>, request: &FullQueryLogRequest) -> OpsResult<ModuleOutcome> {
    if request.state == FqlState::Enabled && request.log_dir.is_none() {
        return Err(OpsError::Validation(
            "state is enabled but all of the following are missing: log_dir".to_string(),
        ));
    }

    let v = request.variant();
    if request.state == FqlState::Reset {
        return reset(nt, &v);
    }

    let status = nt.exec(&v.status)?;
    if !status.success() {
        return Err(nt.failure("status command failed", &v.status, &status));
    }
    let current = parse_fullquerylog(&status.stdout)?;
    let check = nt.options().check_mode;
    let debug = nt.options().debug;

    let outcome = match request.state {
        FqlState::Disabled if !current.enabled => {
            ModuleOutcome::unchanged("fullquerylog is already disabled").with_debug(debug, &status)
        }
        FqlState::Disabled => {
            if check {
                log_event_with_fields(Event::CheckModeSkipped, &[("cmd", v.disable.as_str())]);
                ModuleOutcome::changed("check mode")
            } else {
                let result = run_verb(nt, &v.disable)?;
                ModuleOutcome::changed("fullquerylog disabled").with_debug(debug, &result)
            }
        }
        _ if !request.differs(&current) => {
            ModuleOutcome::unchanged("fullquerylog state unchanged").with_debug(debug, &status)
        }
        _ => {
            let cmd = v.enable_command();
            if check {
                log_event_with_fields(Event::CheckModeSkipped, &[("cmd", cmd.as_str())]);
                ModuleOutcome::changed("check mode")
            } else {
                let result = run_verb(nt, &cmd)?;
                ModuleOutcome::changed("fullquerylog reconfigured").with_debug(debug, &result)
            }
        }
    };

    let outcome = outcome.with("fullquerylog_config", &current);
    if debug {
        return Ok(outcome.with("additional_args", &v.extra_args));
    }
    Ok(outcome)
}
