use serde::Serialize;

use super::descriptor::{ColumnSpec, EntityDescriptor};
use super::introspect::LiveSchemaSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftDecision {
    CreateFresh,
    Rebuild,
}

/// Decide how to bring a table in line with its declaration.
///
/// An existing table is always rebuilt. The declared and live column sets are
/// deliberately not compared, so an unchanged table still pays for a full
/// backup/recreate/copy cycle on every startup.
pub fn decide(_declared: &[ColumnSpec], snapshot: &LiveSchemaSnapshot) -> DriftDecision {
    if snapshot.table_exists {
        DriftDecision::Rebuild
    } else {
        DriftDecision::CreateFresh
    }
}

/// Column-level difference between a declaration and a live table. Used for
/// diagnostics only; it never influences [`decide`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaDiff {
    /// Declared but missing on disk; rebuilt rows get the declared default.
    pub added: Vec<String>,
    /// On disk but no longer declared; dropped with their data.
    pub removed: Vec<String>,
}

impl SchemaDiff {
    pub fn between(declared: &EntityDescriptor, snapshot: &LiveSchemaSnapshot) -> Self {
        if !snapshot.table_exists {
            return Self {
                added: declared.column_names().iter().map(|s| s.to_string()).collect(),
                removed: Vec::new(),
            };
        }

        let added = declared
            .columns()
            .iter()
            .filter(|c| !snapshot.contains(&c.name))
            .map(|c| c.name.clone())
            .collect();
        let removed = snapshot
            .column_names
            .iter()
            .filter(|live| !declared.columns().iter().any(|c| c.name.eq_ignore_ascii_case(live)))
            .cloned()
            .collect();

        Self { added, removed }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> EntityDescriptor {
        EntityDescriptor::new("task")
            .column(ColumnSpec::integer("id").autoincrement())
            .column(ColumnSpec::integer("user_id"))
            .column(ColumnSpec::text("target"))
            .column(ColumnSpec::text("status").default_text("pending"))
    }

    fn live(columns: &[&str]) -> LiveSchemaSnapshot {
        LiveSchemaSnapshot {
            table_exists: true,
            column_names: columns.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_absent_table_creates_fresh() {
        let desc = task();
        assert_eq!(decide(desc.columns(), &LiveSchemaSnapshot::absent()), DriftDecision::CreateFresh);
    }

    #[test]
    fn test_existing_table_always_rebuilds() {
        let desc = task();
        let identical = live(&["id", "user_id", "target", "status"]);
        assert_eq!(decide(desc.columns(), &identical), DriftDecision::Rebuild);

        let drifted = live(&["id", "legacy_notes"]);
        assert_eq!(decide(desc.columns(), &drifted), DriftDecision::Rebuild);
    }

    #[test]
    fn test_diff_added_and_removed() {
        let diff = SchemaDiff::between(&task(), &live(&["id", "user_id", "target", "legacy_notes"]));
        assert_eq!(diff.added, vec!["status"]);
        assert_eq!(diff.removed, vec!["legacy_notes"]);
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let diff = SchemaDiff::between(&task(), &live(&["ID", "user_id", "target", "status"]));
        assert!(diff.is_empty());
    }

    #[test]
    fn test_diff_absent_table_adds_everything() {
        let diff = SchemaDiff::between(&task(), &LiveSchemaSnapshot::absent());
        assert_eq!(diff.added.len(), 4);
        assert!(diff.removed.is_empty());
    }
}
