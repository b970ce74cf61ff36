//! Runtime settings read with a get subcommand and written with a set
//!
//! Most settings compare the get output against the exact sentence
//! nodetool prints for the desired value. Concurrency compares the
//! trailing integer instead, since its wording varies by stage.

use serde::{Deserialize, Serialize};

use crate::errors::{OpsError, OpsResult};
use crate::nodetool::variants::{ensure_value, GetSet, Matcher};
use crate::nodetool::Nodetool;
use crate::outcome::ModuleOutcome;

fn sentence(label: &str, value: String, get: &str, set: String, expected: String) -> GetSet {
    GetSet {
        label: label.to_string(),
        value,
        get: get.to_string(),
        set,
        matcher: Matcher::Sentence(expected),
    }
}

/// Compaction throughput in MB/s
pub fn compaction_throughput(nt: &Nodetool<'_>, value: u32) -> OpsResult<ModuleOutcome> {
    let v = sentence(
        "compaction throughput",
        value.to_string(),
        "getcompactionthroughput",
        format!("setcompactionthroughput {}", value),
        format!("Current compaction throughput: {} MB/s", value),
    );
    ensure_value(nt, &v)
}

/// Stream throughput in Mb/s
pub fn stream_throughput(nt: &Nodetool<'_>, value: u32) -> OpsResult<ModuleOutcome> {
    let v = sentence(
        "stream throughput",
        value.to_string(),
        "getstreamthroughput",
        format!("setstreamthroughput {}", value),
        format!("Current stream throughput: {} Mb/s", value),
    );
    ensure_value(nt, &v)
}

/// Batchlog replay throttle in KB/s
pub fn batchlog_replay_throttle(nt: &Nodetool<'_>, value: u32) -> OpsResult<ModuleOutcome> {
    let v = sentence(
        "batchlog replay throttle",
        value.to_string(),
        "getbatchlogreplaythrottle",
        format!("setbatchlogreplaythrottle {}", value),
        format!("Batchlog replay throttle: {} KB/s", value),
    );
    ensure_value(nt, &v)
}

/// Max hint window in milliseconds
pub fn max_hint_window(nt: &Nodetool<'_>, value: u64) -> OpsResult<ModuleOutcome> {
    let v = sentence(
        "max hint window",
        value.to_string(),
        "getmaxhintwindow",
        format!("setmaxhintwindow -- {}", value),
        format!("Current max hint window: {} ms", value),
    );
    ensure_value(nt, &v)
}

/// Render a probability the way the JVM prints a double (`1.0`, `0.25`)
fn jvm_double(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Trace probability, which must lie in `[0, 1]`
pub fn trace_probability(nt: &Nodetool<'_>, value: f64) -> OpsResult<ModuleOutcome> {
    if !(0.0..=1.0).contains(&value) {
        return Err(OpsError::Validation(format!(
            "trace probability must be between 0 and 1, got {}",
            value
        )));
    }
    let rendered = jvm_double(value);
    let v = sentence(
        "trace probability",
        rendered.clone(),
        "gettraceprobability",
        format!("settraceprobability {}", rendered),
        format!("Current trace probability: {}", rendered),
    );
    ensure_value(nt, &v)
}

/// Internode and client request timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lower")]
pub enum TimeoutType {
    Read,
    Range,
    Write,
    CounterWrite,
    CasContention,
    Truncate,
    InternodeConnect,
    InternodeUser,
    InternodeStreamingUser,
    Misc,
}

impl TimeoutType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeoutType::Read => "read",
            TimeoutType::Range => "range",
            TimeoutType::Write => "write",
            TimeoutType::CounterWrite => "counterwrite",
            TimeoutType::CasContention => "cascontention",
            TimeoutType::Truncate => "truncate",
            TimeoutType::InternodeConnect => "internodeconnect",
            TimeoutType::InternodeUser => "internodeuser",
            TimeoutType::InternodeStreamingUser => "internodestreaminguser",
            TimeoutType::Misc => "misc",
        }
    }
}

/// Timeout of `kind` in milliseconds
pub fn timeout(nt: &Nodetool<'_>, kind: TimeoutType, value: u64) -> OpsResult<ModuleOutcome> {
    let t = kind.as_str();
    let v = sentence(
        &format!("{} timeout", t),
        value.to_string(),
        &format!("gettimeout {}", t),
        format!("settimeout {} {}", t, value),
        format!("Current timeout for type {}: {} ms", t, value),
    );
    ensure_value(nt, &v)
}

/// Min/max compaction thresholds of one table
pub fn compaction_threshold(
    nt: &Nodetool<'_>,
    keyspace: &str,
    table: &str,
    min: u32,
    max: u32,
) -> OpsResult<ModuleOutcome> {
    if min > max {
        return Err(OpsError::Validation(format!(
            "min threshold {} is greater than max threshold {}",
            min, max
        )));
    }
    let v = sentence(
        &format!("compaction thresholds for {}/{}", keyspace, table),
        format!("{}/{}", min, max),
        &format!("getcompactionthreshold {} {}", keyspace, table),
        format!("setcompactionthreshold {} {} {} {}", keyspace, table, min, max),
        format!(
            "Current compaction thresholds for {}/{}: \n min = {},  max = {}",
            keyspace, table, min, max
        ),
    );
    ensure_value(nt, &v)
}

/// What a concurrency value applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyType {
    /// A thread pool stage; needs a `Stage`
    Default,
    Compactors,
    Viewbuilders,
}

/// Thread pool stages accepted by `setconcurrency`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[value(rename_all = "verbatim")]
pub enum Stage {
    AntiEntropyStage,
    CounterMutationStage,
    GossipStage,
    ImmediateStage,
    InternalResponseStage,
    MigrationStage,
    MiscStage,
    MutationStage,
    ReadStage,
    RequestResponseStage,
    TracingStage,
    ViewMutationStage,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::AntiEntropyStage => "AntiEntropyStage",
            Stage::CounterMutationStage => "CounterMutationStage",
            Stage::GossipStage => "GossipStage",
            Stage::ImmediateStage => "ImmediateStage",
            Stage::InternalResponseStage => "InternalResponseStage",
            Stage::MigrationStage => "MigrationStage",
            Stage::MiscStage => "MiscStage",
            Stage::MutationStage => "MutationStage",
            Stage::ReadStage => "ReadStage",
            Stage::RequestResponseStage => "RequestResponseStage",
            Stage::TracingStage => "TracingStage",
            Stage::ViewMutationStage => "ViewMutationStage",
        }
    }
}

/// Concurrency of a stage, the compactors or the view builders
pub fn concurrency(
    nt: &Nodetool<'_>,
    kind: ConcurrencyType,
    stage: Option<Stage>,
    value: i64,
) -> OpsResult<ModuleOutcome> {
    let v = match kind {
        ConcurrencyType::Default => {
            let stage = stage.ok_or_else(|| {
                OpsError::Validation(
                    "concurrency_type is default but concurrency_stage is missing".to_string(),
                )
            })?;
            GetSet {
                label: format!("default/{}", stage.as_str()),
                value: value.to_string(),
                get: format!("getconcurrency -- {}", stage.as_str()),
                set: format!("setconcurrency -- {} {}", stage.as_str(), value),
                matcher: Matcher::LastInteger(value),
            }
        }
        ConcurrencyType::Compactors | ConcurrencyType::Viewbuilders => {
            let name = if kind == ConcurrencyType::Compactors {
                "compactors"
            } else {
                "viewbuilders"
            };
            GetSet {
                label: name.to_string(),
                value: value.to_string(),
                get: format!("getconcurrent{}", name),
                set: format!("setconcurrent{} -- {}", name, value),
                matcher: Matcher::LastInteger(value),
            }
        }
    };
    ensure_value(nt, &v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionConfig;
    use crate::executor::MockExecutor;
    use crate::outcome::{ExecutionResult, RunOptions};

    fn run<F>(stdout: &str, f: F) -> (OpsResult<ModuleOutcome>, MockExecutor)
    where
        F: FnOnce(&Nodetool<'_>) -> OpsResult<ModuleOutcome>,
    {
        let exec = MockExecutor::with_results(vec![ExecutionResult::ok(stdout)]);
        let cfg = ConnectionConfig::new("h", 7199);
        let result = {
            let nt = Nodetool::new(&cfg, &exec, RunOptions::default());
            f(&nt)
        };
        (result, exec)
    }

    #[test]
    fn test_stream_throughput_sentence() {
        let (res, exec) = run("Current stream throughput: 200 Mb/s", |nt| {
            stream_throughput(nt, 200)
        });
        assert!(!res.unwrap().changed);
        assert_eq!(exec.count(), 1);
    }

    #[test]
    fn test_max_hint_window_sets_on_mismatch() {
        let (res, exec) = run("Current max hint window: 10800000 ms", |nt| {
            max_hint_window(nt, 3600000)
        });
        assert!(res.unwrap().changed);
        assert_eq!(exec.count_matching("setmaxhintwindow -- 3600000"), 1);
    }

    #[test]
    fn test_trace_probability_formatting() {
        assert_eq!(jvm_double(1.0), "1.0");
        assert_eq!(jvm_double(0.0), "0.0");
        assert_eq!(jvm_double(0.25), "0.25");

        let (res, _) = run("Current trace probability: 0.1", |nt| trace_probability(nt, 0.1));
        assert!(!res.unwrap().changed);
    }

    #[test]
    fn test_trace_probability_out_of_range() {
        let (res, exec) = run("", |nt| trace_probability(nt, 1.5));
        assert!(res.unwrap_err().is_validation());
        assert_eq!(exec.count(), 0);
    }

    #[test]
    fn test_timeout_sentence() {
        let (res, _) = run("Current timeout for type counterwrite: 5000 ms\n", |nt| {
            timeout(nt, TimeoutType::CounterWrite, 5000)
        });
        assert!(!res.unwrap().changed);
    }

    #[test]
    fn test_compaction_threshold_multiline_sentence() {
        let out = "Current compaction thresholds for app/users: \n min = 4,  max = 32\n";
        let (res, exec) = run(out, |nt| compaction_threshold(nt, "app", "users", 4, 32));
        assert!(!res.unwrap().changed);
        assert_eq!(exec.count(), 1);

        let (res, exec) = run(out, |nt| compaction_threshold(nt, "app", "users", 2, 32));
        assert!(res.unwrap().changed);
        assert_eq!(exec.count_matching("setcompactionthreshold app users 2 32"), 1);
    }

    #[test]
    fn test_concurrency_stage_required() {
        let (res, exec) = run("", |nt| concurrency(nt, ConcurrencyType::Default, None, 8));
        assert!(res.unwrap_err().is_validation());
        assert_eq!(exec.count(), 0);
    }

    #[test]
    fn test_concurrency_stage_commands() {
        let out = "Stage                 CorePoolSize  MaximumPoolSize\nReadStage             32            32";
        let (res, exec) = run(out, |nt| {
            concurrency(nt, ConcurrencyType::Default, Some(Stage::ReadStage), 64)
        });
        assert!(res.unwrap().changed);
        assert_eq!(exec.count_matching("setconcurrency -- ReadStage 64"), 1);
    }
}
