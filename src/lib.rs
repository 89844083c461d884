pub mod config;
pub mod date_util;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod quality;
pub mod report;
pub mod storage;

pub use error::{Error, Result};
pub use ingest::{ImportReport, ImportSources, TableImport};
pub use metrics::{Report, ReportOptions};
pub use model::{
    DelayReason, DeliveryAgent, DeliveryStatus, Order, Route, ShipmentCheckpoint, Snapshot,
    Warehouse,
};
pub use quality::QualityReport;
pub use report::{Metric, Table};
pub use storage::repository::TableCounts;
pub use storage::Database;

use serde::Serialize;

use storage::repository;

/// Row counts and import history of the warehouse.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub tables: TableCounts,
    pub last_import_at: Option<String>,
    pub last_import_dir: Option<String>,
}

/// Main entry point for the logistics data warehouse.
pub struct ShipDW {
    db: Database,
}

impl ShipDW {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // ── Import ─────────────────────────────────────────────────────

    /// Replace the stored snapshot with the CSV files in `dir`.
    pub async fn import_dir(&self, dir: impl AsRef<std::path::Path>) -> Result<ImportReport> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::NotFound(format!(
                "import directory {}",
                dir.display()
            )));
        }
        let sources = ImportSources::from_dir(dir);
        ingest::import(&self.db, &sources, &dir.display().to_string()).await
    }

    pub async fn snapshot(&self) -> Result<Snapshot> {
        Ok(self
            .db
            .reader()
            .call(|conn| repository::load_snapshot(conn))
            .await?)
    }

    pub async fn check_quality(&self) -> Result<QualityReport> {
        let snapshot = self.snapshot().await?;
        Ok(quality::check(&snapshot))
    }

    // ── Reports ────────────────────────────────────────────────────

    /// Report options from stored config over the defaults.
    pub async fn report_options(&self) -> Result<ReportOptions> {
        config::load_report_options(&self.db).await
    }

    pub async fn report(&self, options: &ReportOptions) -> Result<Report> {
        metrics::compute_report(&self.db, options).await
    }

    pub async fn status(&self) -> Result<Status> {
        let (tables, last_import_at, last_import_dir) = self
            .db
            .reader()
            .call(|conn| {
                Ok::<_, rusqlite::Error>((
                    repository::table_counts(conn)?,
                    repository::last_import_at(conn)?,
                    repository::get_config(conn, config::LAST_IMPORT_KEY)?,
                ))
            })
            .await?;
        Ok(Status {
            tables,
            last_import_at,
            last_import_dir,
        })
    }

    // ── Config commands ────────────────────────────────────────────

    pub async fn config_get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .db
            .reader()
            .call({
                let key = key.to_string();
                move |conn| repository::get_config(conn, &key)
            })
            .await?)
    }

    /// Store a config value after checking it parses for its key.
    pub async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        config::validate(key, value)?;
        Ok(self
            .db
            .writer()
            .call({
                let key = key.to_string();
                let value = value.to_string();
                move |conn| repository::set_config(conn, &key, &value)
            })
            .await?)
    }

    pub async fn config_unset(&self, key: &str) -> Result<bool> {
        Ok(self
            .db
            .writer()
            .call({
                let key = key.to_string();
                move |conn| repository::delete_config(conn, &key)
            })
            .await?)
    }

    pub async fn config_list(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .db
            .reader()
            .call(|conn| repository::list_config(conn))
            .await?)
    }
}
