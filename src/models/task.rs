use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::schema::{ColumnSpec, EntityDescriptor, IndexSpec};
use super::{Entity, NOW_RFC3339};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown task status '{}'", other)),
        }
    }
}

/// A scan of one target with one template, owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub user_id: i64,
    pub target: String,
    /// Scanner template name.
    pub template: String,
    pub created_at: DateTime<Utc>,
    pub status: TaskStatus,
}

impl Entity for Task {
    const TABLE: &'static str = "task";

    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::new(Self::TABLE)
            .column(ColumnSpec::integer("id").autoincrement())
            .column(ColumnSpec::integer("user_id").not_null())
            .column(ColumnSpec::text("target").not_null())
            .column(ColumnSpec::text("template").not_null())
            .column(ColumnSpec::text("created_at").not_null().default_expr(NOW_RFC3339))
            .column(ColumnSpec::text("status").default_text(TaskStatus::default().as_str()))
            .index(IndexSpec::new("idx_task_user_id", ["user_id"]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [TaskStatus::Pending, TaskStatus::Running, TaskStatus::Done, TaskStatus::Failed] {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_status_finished() {
        assert!(!TaskStatus::Pending.is_finished());
        assert!(!TaskStatus::Running.is_finished());
        assert!(TaskStatus::Done.is_finished());
        assert!(TaskStatus::Failed.is_finished());
    }

    #[test]
    fn test_task_descriptor() {
        let desc = Task::descriptor();
        assert!(desc.validate().is_ok());
        assert_eq!(
            desc.column_names(),
            vec!["id", "user_id", "target", "template", "created_at", "status"]
        );
        assert!(desc.create_table_sql().contains("\"status\" TEXT DEFAULT 'pending'"));
    }
}
