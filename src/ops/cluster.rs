//! Cluster-wide convergence checks
//!
//! Both checks poll a read-only subcommand until the cluster looks healthy
//! or the attempt budget runs out. Neither ever changes anything.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::errors::{OpsError, OpsResult};
use crate::nodetool::parsers::{down_count, parse_describecluster, parse_status};
use crate::nodetool::poll::{poll_until, PollReport, PollSettings, PollState, Probe, Sleeper};
use crate::nodetool::Nodetool;
use crate::outcome::ModuleOutcome;

/// Shared payload: last parsed value plus per-attempt history when debugging
fn poll_details<T: Serialize>(
    report: &PollReport<T>,
    value_key: &str,
    list_key: &str,
    debug: bool,
) -> Map<String, Value> {
    let mut details = Map::new();
    details.insert(value_key.to_string(), json!(report.last_value()));
    details.insert("iterations".to_string(), json!(report.iterations()));

    if debug {
        let results = report.attempts.iter().map(|a| &a.result);
        details.insert(list_key.to_string(), json!(report.values()));
        details.insert(
            "return_codes".to_string(),
            json!(results.clone().map(|r| r.rc).collect::<Vec<_>>()),
        );
        details.insert(
            "stdout_list".to_string(),
            json!(results.clone().map(|r| r.trimmed_stdout()).collect::<Vec<_>>()),
        );
        details.insert(
            "stderr_list".to_string(),
            json!(results.map(|r| r.trimmed_stderr()).collect::<Vec<_>>()),
        );
    }
    details
}

fn tool_error<T>(nt: &Nodetool<'_>, subcommand: &str, report: &PollReport<T>) -> OpsError {
    match report.last_result() {
        Some(last) => nt.failure(
            format!("nodetool error: {}", last.trimmed_stderr()),
            subcommand,
            last,
        ),
        None => OpsError::Parse(format!("{} produced no result", subcommand)),
    }
}

fn outcome_with(msg: &str, details: Map<String, Value>) -> ModuleOutcome {
    let mut outcome = ModuleOutcome::unchanged(msg);
    outcome.payload = details;
    outcome
}

/// Wait for every node to report UP/NORMAL.
///
/// When attempts run out, up to `down_tolerance` down nodes are accepted.
pub fn cluster_status(
    nt: &Nodetool<'_>,
    sleeper: &dyn Sleeper,
    down_tolerance: usize,
    poll: &PollSettings,
) -> OpsResult<ModuleOutcome> {
    let report = poll_until(poll, sleeper, |_| {
        let result = nt.exec("status")?;
        if !result.success() {
            return Ok(Probe::Failed(result));
        }
        let status = parse_status(&result.stdout)?;
        let converged = down_count(&status) == 0;
        Ok(Probe::Observed {
            result,
            value: status,
            converged,
        })
    })?;

    let details = poll_details(&report, "cluster_status", "cluster_status_list", nt.options().debug);

    match report.state {
        PollState::Converged => Ok(outcome_with("All nodes are in an UP/NORMAL state", details)),
        PollState::ToolError => Err(tool_error(nt, "status", &report)),
        PollState::MaxAttemptsReached | PollState::Polling => {
            let down = report.last_value().map(down_count).unwrap_or_default();
            if down > down_tolerance {
                Err(OpsError::NotConverged {
                    message: "Too many nodes are in a DOWN state".to_string(),
                    details: Value::Object(details),
                })
            } else {
                Ok(outcome_with("Down nodes are within the tolerated level", details))
            }
        }
    }
}

fn strip_braces(version: &str) -> &str {
    version.trim_start_matches('{').trim_end_matches('}')
}

/// Wait for every node to agree on one schema version.
///
/// With `expected` set, the message says whether the agreed version is it.
pub fn schema_agreement(
    nt: &Nodetool<'_>,
    sleeper: &dyn Sleeper,
    expected: Option<&str>,
    poll: &PollSettings,
) -> OpsResult<ModuleOutcome> {
    let report = poll_until(poll, sleeper, |_| {
        let result = nt.exec("describecluster")?;
        if !result.success() {
            return Ok(Probe::Failed(result));
        }
        let versions: BTreeMap<String, Vec<String>> = parse_describecluster(&result.stdout)?;
        let converged = versions.len() == 1;
        Ok(Probe::Observed {
            result,
            value: versions,
            converged,
        })
    })?;

    let mut details = poll_details(&report, "schema_status", "cluster_schema_list", nt.options().debug);
    if report.iterations() <= 1 {
        details.remove("iterations");
    }

    match report.state {
        PollState::Converged => {
            let matches_expected = match (expected, report.last_value()) {
                (Some(want), Some(versions)) => versions
                    .keys()
                    .any(|v| strip_braces(v).eq_ignore_ascii_case(strip_braces(want.trim()))),
                _ => false,
            };
            let msg = if matches_expected {
                "The cluster has reached consensus with the expected version"
            } else {
                "The cluster has reached schema consensus"
            };
            Ok(outcome_with(msg, details))
        }
        PollState::ToolError => Err(tool_error(nt, "describecluster", &report)),
        PollState::MaxAttemptsReached | PollState::Polling => Err(OpsError::NotConverged {
            message: "The cluster has not reached consensus on the schema".to_string(),
            details: Value::Object(details),
        }),
    }
}
