//! Turning cqlsh output into values

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{OpsError, OpsResult};

/// One result-set row, column name to rendered cell
pub type Row = BTreeMap<String, String>;

/// How cqlsh output is turned into a value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    /// `json` when the output opens with `[json]`, otherwise a whitespace split
    #[default]
    Auto,
    Split,
    Json,
    Raw,
}

impl Transform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transform::Auto => "auto",
            Transform::Split => "split",
            Transform::Json => "json",
            Transform::Raw => "raw",
        }
    }
}

fn split_value(output: &str, split_char: Option<&str>) -> Value {
    let trimmed = output.trim();
    let parts: Vec<Value> = match split_char {
        None => trimmed.split_whitespace().map(Value::from).collect(),
        Some(sep) if sep.is_empty() => vec![Value::from(trimmed)],
        Some(sep) => trimmed.split(sep).map(Value::from).collect(),
    };
    Value::Array(parts)
}

/// Rows of a `SELECT JSON` result: the lines between the two header and
/// two footer lines, each a JSON object
fn json_rows(output: &str) -> OpsResult<Value> {
    let lines: Vec<&str> = output.trim().split('\n').collect();
    if lines.last().map(|l| l.trim()) == Some("(0 rows)") {
        return Ok(Value::Array(Vec::new()));
    }
    if lines.len() <= 4 {
        return Ok(Value::Array(Vec::new()));
    }

    lines[2..lines.len() - 2]
        .iter()
        .map(|line| {
            serde_json::from_str(line.trim())
                .map_err(|e| OpsError::Parse(format!("Error transforming output: {}", e)))
        })
        .collect::<OpsResult<Vec<Value>>>()
        .map(Value::Array)
}

/// Apply `transform` to raw cqlsh stdout
pub fn transform_output(output: &str, transform: Transform, split_char: &str) -> OpsResult<Value> {
    match transform {
        Transform::Auto if output.trim().starts_with("[json]") => json_rows(output),
        Transform::Auto => Ok(split_value(output, None)),
        Transform::Split => Ok(split_value(output, Some(split_char))),
        Transform::Json => json_rows(output),
        Transform::Raw => Ok(Value::from(output.trim())),
    }
}

fn is_separator(line: &str) -> bool {
    let t = line.trim();
    !t.is_empty() && t.chars().all(|c| c == '-' || c == '+')
}

fn is_footer(line: &str) -> bool {
    let t = line.trim();
    t.starts_with('(') && (t.ends_with(" rows)") || t.ends_with(" row)"))
}

fn cells(line: &str) -> Vec<String> {
    line.split('|').map(|c| c.trim().to_string()).collect()
}

/// Parse a tabular result set.
///
/// ```text
///  role      | super | login
/// -----------+-------+-------
///  cassandra |  True |  True
///
/// (1 rows)
/// ```
///
/// Output with no header (DDL, empty result) yields no rows. A row whose
/// cell count differs from the header is a parse error.
pub fn parse_table(output: &str) -> OpsResult<Vec<Row>> {
    let mut lines = output
        .lines()
        .skip_while(|l| l.trim().is_empty() || l.trim_start().starts_with("Warnings"));

    let header = match lines.next() {
        Some(h) if !is_footer(h) => cells(h),
        _ => return Ok(Vec::new()),
    };

    match lines.next() {
        Some(sep) if is_separator(sep) => {}
        _ => {
            return Err(OpsError::Parse(format!(
                "unable to parse cqlsh output: no separator after header '{}'",
                header.join(" | ")
            )))
        }
    }

    let mut rows = Vec::new();
    for line in lines {
        if line.trim().is_empty() || is_footer(line) {
            break;
        }
        let values = cells(line);
        if values.len() != header.len() {
            return Err(OpsError::Parse(format!(
                "unable to parse cqlsh row '{}': expected {} columns",
                line.trim(),
                header.len()
            )));
        }
        rows.push(header.iter().cloned().zip(values).collect());
    }
    Ok(rows)
}
