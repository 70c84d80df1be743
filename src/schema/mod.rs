//! Startup schema reconciliation.
//!
//! Every registered entity declares its table through an [`EntityDescriptor`].
//! At startup [`reconcile_schema`] walks the descriptors in order: a missing
//! table is created, an existing one is rebuilt through a backup copy so that
//! its physical columns match the declaration while rows in shared columns
//! survive. The first failure aborts the whole run.

pub mod descriptor;
pub mod drift;
pub mod identifier;
pub mod introspect;
pub mod journal;
pub mod rebuild;
pub mod reconcile;

pub use descriptor::{ColumnSpec, ColumnType, DefaultValue, EntityDescriptor, IndexSpec, BACKUP_SUFFIX};
pub use drift::{decide, DriftDecision, SchemaDiff};
pub use introspect::{inspect, LiveSchemaSnapshot};
pub use journal::{JournalEntry, JOURNAL_TABLE};
pub use rebuild::{IndexDropFailure, MigrationPlan, RebuildStep};
pub use reconcile::{
    ping, reconcile, reconcile_schema, ReadyConnection, RebuildStrategy, ReconcileOptions,
    ReconcileReport, TableAction, TableReport,
};
