use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::schema::{ColumnSpec, EntityDescriptor, IndexSpec};
use super::{Entity, NOW_RFC3339};

/// Risk level reported by the scanner, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Severity {
    /// Lower values indicate higher severity.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// One vulnerability reported for a scan task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub id: i64,
    pub task_id: i64,
    /// Affected host or URL.
    pub target: String,
    /// Vulnerability name or template identifier.
    pub vulnerability: String,
    pub severity: Severity,
    /// Raw scanner output or parsed detail.
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Entity for ScanResult {
    const TABLE: &'static str = "result";

    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new(Self::TABLE)
            .column(ColumnSpec::integer("id").autoincrement())
            .column(ColumnSpec::integer("task_id").not_null())
            .column(ColumnSpec::text("target").not_null())
            .column(ColumnSpec::text("vulnerability").not_null())
            .column(ColumnSpec::text("severity").default_text(Severity::default().as_str()))
            .column(ColumnSpec::text("detail"))
            .column(ColumnSpec::text("timestamp").not_null().default_expr(NOW_RFC3339))
            .index(IndexSpec::new("idx_result_task_id", ["task_id"]))
    }
}
