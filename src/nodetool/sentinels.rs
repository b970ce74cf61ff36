//! Status sentinel table
//!
//! Maps a status subcommand to the literal outputs that mean "active" or
//! "inactive". Spellings differ between Cassandra versions, so each side is
//! a list; a new wording is a table entry, not a code change. Matching is
//! exact on the trimmed output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{OpsError, OpsResult};

/// State reported by a status subcommand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Observed {
    Active,
    Inactive,
}

/// Accepted spellings for one status subcommand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentinels {
    #[serde(default)]
    pub active: Vec<String>,
    #[serde(default)]
    pub inactive: Vec<String>,
    /// State assumed when neither list matches; `None` makes it a parse error
    #[serde(default)]
    pub otherwise: Option<Observed>,
}

impl Sentinels {
    pub fn new(active: &[&str], inactive: &[&str]) -> Self {
        Self {
            active: active.iter().map(|s| s.to_string()).collect(),
            inactive: inactive.iter().map(|s| s.to_string()).collect(),
            otherwise: None,
        }
    }

    pub fn otherwise(mut self, observed: Observed) -> Self {
        self.otherwise = Some(observed);
        self
    }

    /// Classify raw tool output
    pub fn classify(&self, output: &str) -> Option<Observed> {
        let out = output.trim();
        if self.active.iter().any(|s| s == out) {
            return Some(Observed::Active);
        }
        if self.inactive.iter().any(|s| s == out) {
            return Some(Observed::Inactive);
        }
        self.otherwise
    }
}

/// Status subcommand → sentinels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SentinelTable {
    entries: BTreeMap<String, Sentinels>,
}

impl Default for SentinelTable {
    fn default() -> Self {
        let mut entries = BTreeMap::new();
        let running = || Sentinels::new(&["running"], &["not running"]);

        entries.insert("statusbinary".to_string(), running());
        entries.insert("statusgossip".to_string(), running());
        entries.insert("statusthrift".to_string(), running());
        entries.insert("statusbackup".to_string(), running());
        entries.insert(
            "statushandoff".to_string(),
            Sentinels::new(
                &["Hinted handoff is running", "running"],
                &["Hinted handoff is not running", "not running"],
            ),
        );
        entries.insert(
            "compactionstats".to_string(),
            Sentinels::new(&[], &["pending tasks: 0"]).otherwise(Observed::Active),
        );

        Self { entries }
    }
}

impl SentinelTable {
    /// An empty table
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn get(&self, status_cmd: &str) -> Option<&Sentinels> {
        self.entries.get(status_cmd)
    }

    pub fn insert(&mut self, status_cmd: impl Into<String>, sentinels: Sentinels) {
        self.entries.insert(status_cmd.into(), sentinels);
    }

    /// Overlay `other`, replacing entries with the same key
    pub fn merge(&mut self, other: SentinelTable) {
        self.entries.extend(other.entries);
    }

    /// Classify output of `status_cmd`
    pub fn classify(&self, status_cmd: &str, output: &str) -> OpsResult<Observed> {
        let sentinels = self.get(status_cmd).ok_or_else(|| {
            OpsError::Parse(format!("no status sentinels configured for '{}'", status_cmd))
        })?;
        sentinels.classify(output).ok_or_else(|| {
            OpsError::Parse(format!(
                "unable to parse {} output: '{}'",
                status_cmd,
                output.trim()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_sentinels() {
        let table = SentinelTable::default();
        assert_eq!(table.classify("statusgossip", "running\n").unwrap(), Observed::Active);
        assert_eq!(table.classify("statusgossip", "not running").unwrap(), Observed::Inactive);
    }

    #[test]
    fn test_handoff_accepts_both_spellings() {
        let table = SentinelTable::default();
        for out in ["Hinted handoff is running", "running"] {
            assert_eq!(table.classify("statushandoff", out).unwrap(), Observed::Active);
        }
        for out in ["Hinted handoff is not running", "not running"] {
            assert_eq!(table.classify("statushandoff", out).unwrap(), Observed::Inactive);
        }
    }

    #[test]
    fn test_compactionstats_defaults_to_active() {
        let table = SentinelTable::default();
        assert_eq!(
            table.classify("compactionstats", "pending tasks: 0").unwrap(),
            Observed::Inactive
        );
        assert_eq!(
            table.classify("compactionstats", "pending tasks: 3\n- ks.tbl: 3").unwrap(),
            Observed::Active
        );
    }

    #[test]
    fn test_unknown_output_is_parse_error() {
        let table = SentinelTable::default();
        let err = table.classify("statusbinary", "starting").unwrap_err();
        assert_eq!(err.code(), "CASS_PARSE_FAILED");

        let err = table.classify("statusnothing", "running").unwrap_err();
        assert!(err.to_string().contains("statusnothing"));
    }

    #[test]
    fn test_merge_overrides_entry() {
        let mut table = SentinelTable::default();
        let overrides: SentinelTable = serde_json::from_str(
            r#"{"statusbinary": {"active": ["up"], "inactive": ["down"]}}"#,
        )
        .unwrap();
        table.merge(overrides);

        assert_eq!(table.classify("statusbinary", "up").unwrap(), Observed::Active);
        assert!(table.classify("statusbinary", "running").is_err());
        assert_eq!(table.classify("statusgossip", "running").unwrap(), Observed::Active);
    }
}
