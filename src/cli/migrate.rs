use tracing::info;

use crate::config::{VulnFusionConfig, DB_PATH_ENV};
use crate::db::Database;
use crate::errors::VulnFusionError;
use crate::schema::ReconcileReport;
use super::commands::MigrateArgs;

pub async fn handle_migrate(args: MigrateArgs, mut config: VulnFusionConfig) -> Result<(), VulnFusionError> {
    config.apply_overrides(std::env::var(DB_PATH_ENV).ok(), args.db.as_deref());
    let mut options = config.reconcile_options();
    if let Some(strategy) = args.strategy {
        options.strategy = strategy;
    }

    let path = config.database.path.clone();
    info!(path = %path, strategy = %options.strategy, "Migrating database");

    let db = tokio::task::spawn_blocking(move || Database::open(&path, &options))
        .await
        .map_err(|e| VulnFusionError::Internal(format!("Migration task failed: {}", e)))??;

    print!("{}", render_summary(db.report()));
    Ok(())
}

pub(crate) fn render_summary(report: &ReconcileReport) -> String {
    let mut out = format!("Run {} ({})\n", report.run_id, report.strategy);
    for table in &report.tables {
        out.push_str(&format!(
            "  {:<8} {:<10} rows: {:<6} columns: {}\n",
            table.table,
            table.action.to_string(),
            table.rows_copied,
            if table.copied_columns.is_empty() { "-".to_string() } else { table.copied_columns.join(", ") },
        ));
        if !table.added_columns.is_empty() {
            out.push_str(&format!("           added: {}\n", table.added_columns.join(", ")));
        }
        if !table.removed_columns.is_empty() {
            out.push_str(&format!("           dropped: {}\n", table.removed_columns.join(", ")));
        }
    }
    for failure in report.index_failures() {
        out.push_str(&format!(
            "  warning: could not drop index {} on {}: {}\n",
            failure.index, failure.table, failure.message
        ));
    }
    out
}
