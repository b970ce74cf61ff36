//! nodetool output parsers
//!
//! Each parser assumes the exact layout printed by nodetool and fails
//! with `OpsError::Parse` when that layout is absent. There is no fuzzy
//! matching.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{OpsError, OpsResult};

/// Up/down hosts of one datacenter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatacenterStatus {
    pub up: Vec<String>,
    pub down: Vec<String>,
}

/// Datacenter name → host lists
pub type ClusterStatus = BTreeMap<String, DatacenterStatus>;

/// Count of down hosts across all datacenters
pub fn down_count(status: &ClusterStatus) -> usize {
    status.values().map(|dc| dc.down.len()).sum()
}

fn ipv4() -> OpsResult<Regex> {
    Regex::new(r"[0-9]+(?:\.[0-9]+){3}").map_err(|e| OpsError::Parse(e.to_string()))
}

/// Parse `nodetool status`.
///
/// A `Datacenter <name>` line opens a datacenter. Lines starting with `UN`
/// count as up and lines starting with `D` count as down, provided they
/// carry an IPv4 address. The host is the second whitespace token.
pub fn parse_status(stdout: &str) -> OpsResult<ClusterStatus> {
    let ip = ipv4()?;
    let mut status = ClusterStatus::new();
    let mut current: Option<String> = None;

    for line in stdout.lines() {
        if let Some(rest) = line.strip_prefix("Datacenter") {
            let name = rest.trim_start_matches(':').trim();
            if name.is_empty() {
                return Err(OpsError::Parse(format!(
                    "unable to parse status output: '{}'",
                    line
                )));
            }
            status.insert(name.to_string(), DatacenterStatus::default());
            current = Some(name.to_string());
            continue;
        }

        let up = line.starts_with("UN");
        let down = line.starts_with('D');
        if !(up || down) || !ip.is_match(line) {
            continue;
        }

        let dc = current
            .as_ref()
            .and_then(|name| status.get_mut(name))
            .ok_or_else(|| {
                OpsError::Parse(format!("node line before any datacenter: '{}'", line))
            })?;
        let host = line
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| OpsError::Parse(format!("unable to parse status line: '{}'", line)))?
            .to_string();

        if up {
            dc.up.push(host);
        } else {
            dc.down.push(host);
        }
    }

    Ok(status)
}

/// Parse the schema versions section of `nodetool describecluster`.
///
/// Returns schema version → hosts reporting it. Braces around the version,
/// when present, are kept in the key.
pub fn parse_describecluster(stdout: &str) -> OpsResult<BTreeMap<String, Vec<String>>> {
    let re = Regex::new(
        r"(\{)?[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}(\})?: \[.*\]",
    )
    .map_err(|e| OpsError::Parse(e.to_string()))?;

    let mut versions = BTreeMap::new();
    for m in re.find_iter(stdout) {
        let (uuid, hosts) = m
            .as_str()
            .split_once(": ")
            .ok_or_else(|| OpsError::Parse(format!("unable to parse schema line: '{}'", m.as_str())))?;
        let hosts = hosts.trim_start_matches('[').trim_end_matches(']');
        let hosts: Vec<String> = if hosts.is_empty() {
            Vec::new()
        } else {
            hosts.split(", ").map(String::from).collect()
        };
        versions.insert(uuid.trim().to_string(), hosts);
    }
    Ok(versions)
}

/// Entry counts of the three caches reported by `nodetool info`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheInfo {
    pub key_cache_entries: u64,
    pub row_cache_entries: u64,
    pub counter_cache_entries: u64,
}

/// Parse cache entry counts out of `nodetool info`
pub fn parse_cache_info(stdout: &str) -> OpsResult<CacheInfo> {
    let entries = |cache: &str| -> OpsResult<u64> {
        let re = Regex::new(&format!(r"{} Cache .*: entries (\d+)", cache))
            .map_err(|e| OpsError::Parse(e.to_string()))?;
        re.captures(stdout)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .ok_or_else(|| {
                OpsError::Parse(format!("Error parsing info output: no {} Cache entries", cache))
            })
    };

    Ok(CacheInfo {
        key_cache_entries: entries("Key")?,
        row_cache_entries: entries("Row")?,
        counter_cache_entries: entries("Counter")?,
    })
}

/// Full query log configuration as reported by `nodetool getfullquerylog`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FullQueryLogConfig {
    pub enabled: bool,
    pub log_dir: Option<String>,
    pub archive_command: Option<String>,
    pub roll_cycle: Option<String>,
    pub block: bool,
    pub max_log_size: Option<u64>,
    pub max_queue_weight: Option<u64>,
    pub max_archive_retries: Option<u64>,
}

/// Parse `nodetool getfullquerylog` key/value lines.
///
/// Keys with no value parse as `None`. Unknown keys are ignored.
pub fn parse_fullquerylog(stdout: &str) -> OpsResult<FullQueryLogConfig> {
    let mut config = FullQueryLogConfig::default();
    let mut seen_enabled = false;

    for line in stdout.lines() {
        let mut parts = line.splitn(2, char::is_whitespace);
        let key = match parts.next().map(str::trim) {
            Some(k) if !k.is_empty() => k,
            _ => continue,
        };
        let value = parts
            .next()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);

        let int = |v: &Option<String>| -> OpsResult<Option<u64>> {
            match v {
                None => Ok(None),
                Some(s) => s
                    .parse()
                    .map(Some)
                    .map_err(|_| OpsError::Parse(format!("invalid {} value '{}'", key, s))),
            }
        };
        let flag = |v: &Option<String>| v.as_deref().map(|s| s.eq_ignore_ascii_case("true")).unwrap_or(false);

        match key {
            "enabled" => {
                config.enabled = flag(&value);
                seen_enabled = true;
            }
            "log_dir" => config.log_dir = value,
            "archive_command" => config.archive_command = value,
            "roll_cycle" => config.roll_cycle = value,
            "block" => config.block = flag(&value),
            "max_log_size" => config.max_log_size = int(&value)?,
            "max_queue_weight" => config.max_queue_weight = int(&value)?,
            "max_archive_retries" => config.max_archive_retries = int(&value)?,
            _ => {}
        }
    }

    if !seen_enabled {
        return Err(OpsError::Parse(format!(
            "unable to parse getfullquerylog output: '{}'",
            stdout.trim()
        )));
    }
    Ok(config)
}

/// Trailing integer token of `stdout`, if any
pub fn last_integer(stdout: &str) -> Option<i64> {
    stdout.split_whitespace().last()?.parse().ok()
}

/// Snapshot directory reported by `nodetool snapshot` (its last token)
pub fn snapshot_directory(stdout: &str) -> String {
    stdout.trim().rsplit(' ').next().unwrap_or_default().to_string()
}

/// Whether `host` occurs anywhere in `nodetool ring` or `status` output
pub fn hosts_in_ring(stdout: &str, host: &str) -> bool {
    !host.is_empty() && stdout.contains(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = "Datacenter: dc1
===============
Status=Up/Down
|/ State=Normal/Leaving/Joining/Moving
--  Address    Load       Tokens  Owns   Host ID                               Rack
UN  10.0.0.1   108.45 KiB  16     100.0% 8d1fbe3c-7c8d-4e2b-8f7a-0f3c1a2b3c4d  rack1
DN  10.0.0.2   98.12 KiB   16     100.0% 1a2b3c4d-7c8d-4e2b-8f7a-0f3c1a2b3c4d  rack1
";

    #[test]
    fn test_parse_status() {
        let status = parse_status(STATUS).unwrap();
        assert_eq!(status["dc1"].up, vec!["10.0.0.1"]);
        assert_eq!(status["dc1"].down, vec!["10.0.0.2"]);
        assert_eq!(down_count(&status), 1);
    }

    #[test]
    fn test_parse_status_multiple_dcs() {
        let out = "Datacenter dc1\nUN 10.0.0.1 x\nDatacenter dc2\nUN 10.0.1.1 x\nUN 10.0.1.2 x\n";
        let status = parse_status(out).unwrap();
        assert_eq!(status.len(), 2);
        assert_eq!(status["dc2"].up.len(), 2);
        assert_eq!(down_count(&status), 0);
    }

    #[test]
    fn test_parse_status_ignores_header_lines() {
        let out = "Datacenter dc1\nStatus=Up/Down\nUN no-ip-here\n";
        let status = parse_status(out).unwrap();
        assert!(status["dc1"].up.is_empty());
    }

    #[test]
    fn test_parse_status_node_before_dc() {
        let err = parse_status("UN 10.0.0.1 x\n").unwrap_err();
        assert_eq!(err.code(), "CASS_PARSE_FAILED");
    }

    #[test]
    fn test_parse_describecluster() {
        let out = "Cluster Information:
\tName: Test Cluster
\tSnitch: org.apache.cassandra.locator.SimpleSnitch
\tSchema versions:
\t\td4f18346-f81f-3786-aed4-40e03558b299: [127.0.0.1]
";
        let versions = parse_describecluster(out).unwrap();
        assert_eq!(
            versions["d4f18346-f81f-3786-aed4-40e03558b299"],
            vec!["127.0.0.1"]
        );
    }

    #[test]
    fn test_parse_describecluster_disagreement() {
        let out = "\t\td4f18346-f81f-3786-aed4-40e03558b299: [10.0.0.1, 10.0.0.2]\n\t\t\
                   59adb24e-f3cd-3e02-97f0-5b395827453f: [10.0.0.3]\n";
        let versions = parse_describecluster(out).unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(
            versions["d4f18346-f81f-3786-aed4-40e03558b299"],
            vec!["10.0.0.1", "10.0.0.2"]
        );
    }

    #[test]
    fn test_parse_cache_info() {
        let out = "ID                     : f4ee490c-df8e-4a8d-9236-320903697fbf
Key Cache              : entries 10, size 896 bytes, capacity 24 MiB, 48 hits
Row Cache              : entries 0, size 0 bytes, capacity 0 bytes, 0 hits
Counter Cache          : entries 3, size 0 bytes, capacity 12 MiB, 0 hits
";
        let info = parse_cache_info(out).unwrap();
        assert_eq!(info.key_cache_entries, 10);
        assert_eq!(info.row_cache_entries, 0);
        assert_eq!(info.counter_cache_entries, 3);
    }

    #[test]
    fn test_parse_cache_info_missing() {
        let err = parse_cache_info("Key Cache : entries 1").unwrap_err();
        assert!(err.to_string().contains("Row Cache"));
    }

    #[test]
    fn test_parse_fullquerylog() {
        let out = "enabled             true
log_dir             /var/log/fql
archive_command
roll_cycle          HOURLY
block               true
max_log_size        17179869184
max_queue_weight    268435456
max_archive_retries 10
";
        let cfg = parse_fullquerylog(out).unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.log_dir.as_deref(), Some("/var/log/fql"));
        assert_eq!(cfg.archive_command, None);
        assert_eq!(cfg.roll_cycle.as_deref(), Some("HOURLY"));
        assert!(cfg.block);
        assert_eq!(cfg.max_log_size, Some(17179869184));
        assert_eq!(cfg.max_archive_retries, Some(10));
    }

    #[test]
    fn test_parse_fullquerylog_false_is_false() {
        let cfg = parse_fullquerylog("enabled false\nblock false\n").unwrap();
        assert!(!cfg.enabled);
        assert!(!cfg.block);
    }

    #[test]
    fn test_parse_fullquerylog_garbage() {
        assert!(parse_fullquerylog("error: unknown command").is_err());
    }

    #[test]
    fn test_small_helpers() {
        assert_eq!(last_integer("is: \n16\n"), Some(16));
        assert_eq!(last_integer("nothing"), None);
        assert_eq!(
            snapshot_directory("Requested creating snapshot(s) for [all keyspaces] with snapshot name [1700000000]\nSnapshot directory: 1700000000\n"),
            "1700000000"
        );
        assert!(hosts_in_ring("10.0.0.1  rack1  Up", "10.0.0.1"));
        assert!(!hosts_in_ring("10.0.0.1", ""));
    }
}
