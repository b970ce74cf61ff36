//! Configuration file
//!
//! A single JSON document holding connection settings and overrides. Every
//! section is optional; command-line flags are applied on top afterwards.
//!
//! ```json
//! {
//!   "nodetool": { "host": "db1", "port": 7199, "username": "ops", "password_file": "/etc/jmx.pw" },
//!   "cql": { "hosts": ["db1", "db2"], "username": "cassandra", "password": "..." },
//!   "sentinels": { "statusbackup": { "active": ["running"], "inactive": ["not running"] } },
//!   "poll": { "poll": 10, "interval": 30 }
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::connection::{ConnectionConfig, CqlConnectionConfig};
use crate::errors::{OpsError, OpsResult};
use crate::nodetool::poll::PollSettings;
use crate::nodetool::SentinelTable;
use crate::observability::{log_event_with_fields, Event};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub nodetool: ConnectionConfig,

    #[serde(default)]
    pub cql: CqlConnectionConfig,

    /// Overlaid on the built-in sentinel table
    #[serde(default)]
    pub sentinels: Option<SentinelTable>,

    /// Default attempt budget for the polling operations
    #[serde(default)]
    pub poll: PollSettings,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> OpsResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            OpsError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_json(&content)?;
        log_event_with_fields(Event::ConfigLoaded, &[("path", path.display().to_string().as_str())]);
        Ok(config)
    }

    pub fn from_json(content: &str) -> OpsResult<Self> {
        let config: Config = serde_json::from_str(content)
            .map_err(|e| OpsError::Config(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> OpsResult<()> {
        if self.nodetool.port == 0 {
            return Err(OpsError::Config("nodetool.port must be > 0".to_string()));
        }
        if self.cql.port == 0 {
            return Err(OpsError::Config("cql.port must be > 0".to_string()));
        }
        if self.cql.username.is_some() != self.cql.password.is_some() {
            return Err(OpsError::Config(
                "cql.username and cql.password must be given together".to_string(),
            ));
        }
        Ok(())
    }

    /// Built-in sentinels with the file's overrides applied
    pub fn sentinel_table(&self) -> SentinelTable {
        let mut table = SentinelTable::default();
        if let Some(overrides) = &self.sentinels {
            table.merge(overrides.clone());
        }
        table
    }
}
