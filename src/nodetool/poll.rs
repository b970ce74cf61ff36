//! Bounded polling with a fixed interval
//!
//! States: `Polling` → `Converged` | `MaxAttemptsReached` | `ToolError`.
//! A failed tool run with attempts left sleeps and retries; the last
//! attempt is terminal whatever it returns. No sleep follows convergence
//! or the final attempt.

use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::OpsResult;
use crate::observability::{log_event_with_fields, Event};
use crate::outcome::ExecutionResult;

/// Attempt budget and spacing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    /// Maximum number of attempts; values below one are treated as one
    #[serde(default = "default_poll")]
    pub poll: u32,
    /// Seconds between attempts
    #[serde(default = "default_interval")]
    pub interval: u64,
}

fn default_poll() -> u32 {
    1
}

fn default_interval() -> u64 {
    30
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            poll: default_poll(),
            interval: default_interval(),
        }
    }
}

impl PollSettings {
    pub fn new(poll: u32, interval: u64) -> Self {
        Self { poll, interval }
    }

    fn attempts(&self) -> u32 {
        self.poll.max(1)
    }

    fn pause(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}

/// Blocks the calling thread between attempts
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Real sleeper
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Records requested sleeps without blocking
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.sleeps().len()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
    }
}

/// Polling state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    Polling,
    Converged,
    MaxAttemptsReached,
    ToolError,
}

/// What a single attempt saw
#[derive(Debug, Clone)]
pub enum Probe<T> {
    /// The tool exited non-zero
    Failed(ExecutionResult),
    /// The tool succeeded and its output parsed
    Observed {
        result: ExecutionResult,
        value: T,
        converged: bool,
    },
}

/// One recorded attempt
#[derive(Debug, Clone)]
pub struct Attempt<T> {
    pub result: ExecutionResult,
    pub value: Option<T>,
}

/// Terminal state plus per-attempt history
#[derive(Debug, Clone)]
pub struct PollReport<T> {
    pub state: PollState,
    pub attempts: Vec<Attempt<T>>,
}

impl<T> PollReport<T> {
    pub fn iterations(&self) -> usize {
        self.attempts.len()
    }

    pub fn last_result(&self) -> Option<&ExecutionResult> {
        self.attempts.last().map(|a| &a.result)
    }

    /// Value parsed from the last successful attempt
    pub fn last_value(&self) -> Option<&T> {
        self.attempts.iter().rev().find_map(|a| a.value.as_ref())
    }

    pub fn values(&self) -> Vec<&T> {
        self.attempts.iter().filter_map(|a| a.value.as_ref()).collect()
    }
}

/// Drive `check` until it converges or the attempt budget is spent.
///
/// `check` receives the 1-based attempt number. An error from `check`
/// (a spawn or parse failure) ends polling immediately.
pub fn poll_until<T, F>(
    settings: &PollSettings,
    sleeper: &dyn Sleeper,
    mut check: F,
) -> OpsResult<PollReport<T>>
where
    F: FnMut(u32) -> OpsResult<Probe<T>>,
{
    let max = settings.attempts();
    let mut attempts = Vec::new();
    let mut state = PollState::Polling;

    for n in 1..=max {
        let attempt = n.to_string();
        log_event_with_fields(Event::PollAttempt, &[("attempt", attempt.as_str())]);

        let (converged, failed) = match check(n)? {
            Probe::Failed(result) => {
                attempts.push(Attempt {
                    result,
                    value: None,
                });
                (false, true)
            }
            Probe::Observed {
                result,
                value,
                converged,
            } => {
                attempts.push(Attempt {
                    result,
                    value: Some(value),
                });
                (converged, false)
            }
        };

        if converged {
            state = PollState::Converged;
            log_event_with_fields(Event::PollConverged, &[("attempt", attempt.as_str())]);
            break;
        }

        if n == max {
            state = if failed {
                PollState::ToolError
            } else {
                PollState::MaxAttemptsReached
            };
            log_event_with_fields(Event::PollExhausted, &[("attempt", attempt.as_str())]);
            break;
        }

        sleeper.sleep(settings.pause());
    }

    Ok(PollReport { state, attempts })
}
