use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::LAST_IMPORT_KEY;
use crate::date_util::{normalize_date, normalize_timestamp};
use crate::error::{Error, Result};
use crate::model::{
    DeliveryAgent, DelayReason, DeliveryStatus, Order, Route, ShipmentCheckpoint, Snapshot,
    Warehouse,
};
use crate::storage::{repository, Database};

/// Where each table's CSV file lives.
#[derive(Debug, Clone)]
pub struct ImportSources {
    pub orders: PathBuf,
    pub routes: PathBuf,
    pub warehouses: PathBuf,
    pub agents: PathBuf,
    pub checkpoints: PathBuf,
}

impl ImportSources {
    /// The conventional file names inside `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            orders: dir.join("orders.csv"),
            routes: dir.join("routes.csv"),
            warehouses: dir.join("warehouses.csv"),
            agents: dir.join("delivery_agents.csv"),
            checkpoints: dir.join("shipment_tracking.csv"),
        }
    }
}

/// Per-table load counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableImport {
    pub rows_loaded: u64,
    /// Rows dropped for lacking their identifier.
    pub rows_skipped: u64,
    /// Cells that could not be parsed and were stored as NULL.
    pub values_rejected: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub source: String,
    pub orders: TableImport,
    pub routes: TableImport,
    pub warehouses: TableImport,
    pub delivery_agents: TableImport,
    pub shipment_tracking: TableImport,
}

impl ImportReport {
    pub fn rows_loaded(&self) -> u64 {
        self.tables().iter().map(|t| t.rows_loaded).sum()
    }

    pub fn values_rejected(&self) -> u64 {
        self.tables().iter().map(|t| t.values_rejected).sum()
    }

    fn tables(&self) -> [&TableImport; 5] {
        [
            &self.orders,
            &self.routes,
            &self.warehouses,
            &self.delivery_agents,
            &self.shipment_tracking,
        ]
    }
}

/// Column lookup by case-insensitive header name.
struct Columns {
    file: String,
    index: HashMap<String, usize>,
}

impl Columns {
    fn new(file: &Path, headers: &csv::StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_ascii_lowercase(), i))
            .collect();
        Self {
            file: file.display().to_string(),
            index,
        }
    }

    /// Fails listing every column of `names` absent from the header.
    fn require(&self, names: &[&str]) -> Result<()> {
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| !self.index.contains_key(*name))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Csv {
                file: self.file.clone(),
                message: format!("missing required columns: {}", missing.join(", ")),
            })
        }
    }

    /// Trimmed cell text; empty cells read as `None`.
    fn text<'r>(&self, record: &'r csv::StringRecord, name: &str) -> Option<&'r str> {
        let value = record.get(*self.index.get(name)?)?.trim();
        (!value.is_empty()).then_some(value)
    }

    fn string(&self, record: &csv::StringRecord, name: &str) -> Option<String> {
        self.text(record, name).map(str::to_string)
    }
}

/// Parses cells, counting the ones that fail.
struct CellParser<'a> {
    columns: &'a Columns,
    stats: &'a mut TableImport,
    line: u64,
}

impl CellParser<'_> {
    fn number(&mut self, record: &csv::StringRecord, name: &str) -> Option<f64> {
        let raw = self.columns.text(record, name)?;
        match raw.trim_end_matches('%').trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Some(v),
            _ => {
                self.reject(name, raw);
                None
            }
        }
    }

    fn date(&mut self, record: &csv::StringRecord, name: &str) -> Option<chrono::NaiveDate> {
        let raw = self.columns.text(record, name)?;
        let parsed = normalize_date(raw);
        if parsed.is_none() {
            self.reject(name, raw);
        }
        parsed
    }

    fn timestamp(
        &mut self,
        record: &csv::StringRecord,
        name: &str,
    ) -> Option<chrono::NaiveDateTime> {
        let raw = self.columns.text(record, name)?;
        let parsed = normalize_timestamp(raw);
        if parsed.is_none() {
            self.reject(name, raw);
        }
        parsed
    }

    fn reject(&mut self, name: &str, raw: &str) {
        log::warn!(
            "{} line {}: unparseable {name} '{raw}', stored as NULL",
            self.columns.file,
            self.line
        );
        self.stats.values_rejected += 1;
    }
}

fn csv_error(file: &Path, e: csv::Error) -> Error {
    Error::Csv {
        file: file.display().to_string(),
        message: e.to_string(),
    }
}

/// Read every record of `path`, calling `row` with each one.
///
/// `schema` lists the expected columns, identifier first. Rows without an
/// identifier are skipped.
fn read_table<T>(
    path: &Path,
    schema: &[&str],
    stats: &mut TableImport,
    mut row: impl FnMut(&Columns, &csv::StringRecord, &mut CellParser<'_>) -> Option<T>,
) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;
    let headers = reader.headers().map_err(|e| csv_error(path, e))?.clone();
    let columns = Columns::new(path, &headers);
    columns.require(schema)?;
    let id_column = schema[0];

    let mut out = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| csv_error(path, e))?;
        // Header is line 1
        let line = idx as u64 + 2;
        if columns.text(&record, id_column).is_none() {
            log::warn!("{} line {line}: missing {id_column}, row skipped", path.display());
            stats.rows_skipped += 1;
            continue;
        }
        let mut parser = CellParser {
            columns: &columns,
            stats: &mut *stats,
            line,
        };
        if let Some(item) = row(&columns, &record, &mut parser) {
            out.push(item);
            stats.rows_loaded += 1;
        }
    }
    log::info!("Read {} rows from {}", out.len(), path.display());
    Ok(out)
}

const ORDER_COLUMNS: &[&str] = &[
    "order_id",
    "route_id",
    "warehouse_id",
    "order_date",
    "expected_delivery_date",
    "actual_delivery_date",
    "status",
];

const ROUTE_COLUMNS: &[&str] = &[
    "route_id",
    "start_location",
    "end_location",
    "distance_km",
    "average_travel_time_min",
    "traffic_delay_min",
];

const WAREHOUSE_COLUMNS: &[&str] = &["warehouse_id", "location", "processing_time_min"];

const AGENT_COLUMNS: &[&str] = &[
    "agent_id",
    "route_id",
    "on_time_delivery_percentage",
    "avg_speed_km_hr",
];

const CHECKPOINT_COLUMNS: &[&str] = &[
    "order_id",
    "shipment_id",
    "checkpoint",
    "checkpoint_time",
    "delay_reason",
];

/// Read all five CSV files into a snapshot.
pub fn read_snapshot(sources: &ImportSources) -> Result<(Snapshot, ImportReport)> {
    let mut report = ImportReport::default();

    let orders = read_table(&sources.orders, ORDER_COLUMNS, &mut report.orders, |c, r, p| {
        Some(Order {
            order_id: c.string(r, "order_id")?,
            route_id: c.string(r, "route_id"),
            warehouse_id: c.string(r, "warehouse_id"),
            order_date: p.date(r, "order_date"),
            expected_delivery_date: p.date(r, "expected_delivery_date"),
            actual_delivery_date: p.date(r, "actual_delivery_date"),
            status: DeliveryStatus::from_label(c.text(r, "status").unwrap_or("")),
        })
    })?;

    let routes = read_table(&sources.routes, ROUTE_COLUMNS, &mut report.routes, |c, r, p| {
        Some(Route {
            route_id: c.string(r, "route_id")?,
            start_location: c.string(r, "start_location"),
            end_location: c.string(r, "end_location"),
            distance_km: p.number(r, "distance_km"),
            average_travel_time_min: p.number(r, "average_travel_time_min"),
            traffic_delay_min: p.number(r, "traffic_delay_min"),
        })
    })?;

    let warehouses = read_table(
        &sources.warehouses,
        WAREHOUSE_COLUMNS,
        &mut report.warehouses,
        |c, r, p| {
            Some(Warehouse {
                warehouse_id: c.string(r, "warehouse_id")?,
                location: c.string(r, "location"),
                processing_time_min: p.number(r, "processing_time_min"),
            })
        },
    )?;

    let agents = read_table(
        &sources.agents,
        AGENT_COLUMNS,
        &mut report.delivery_agents,
        |c, r, p| {
            Some(DeliveryAgent {
                agent_id: c.string(r, "agent_id")?,
                route_id: c.string(r, "route_id"),
                on_time_pct: p.number(r, "on_time_delivery_percentage"),
                avg_speed_km_hr: p.number(r, "avg_speed_km_hr"),
            })
        },
    )?;

    let tracked = read_table(
        &sources.checkpoints,
        CHECKPOINT_COLUMNS,
        &mut report.shipment_tracking,
        |c, r, p| {
            let explicit = match c.text(r, "shipment_id") {
                Some(raw) => raw.parse::<i64>().ok().or_else(|| {
                    p.reject("shipment_id", raw);
                    None
                }),
                None => None,
            };
            Some((
                explicit,
                ShipmentCheckpoint {
                    shipment_id: explicit.unwrap_or(p.line as i64),
                    order_id: c.string(r, "order_id")?,
                    checkpoint: c.string(r, "checkpoint"),
                    checkpoint_time: p.timestamp(r, "checkpoint_time"),
                    delay_reason: DelayReason::from_label(
                        c.text(r, "delay_reason").unwrap_or(""),
                    ),
                },
            ))
        },
    )?;
    let checkpoints = assign_shipment_ids(tracked);

    Ok((
        Snapshot {
            orders,
            routes,
            warehouses,
            agents,
            checkpoints,
        },
        report,
    ))
}

/// Rows without a usable `Shipment_ID` carry their CSV line number; shift
/// those past the largest explicit id so they stay unique and in file order.
fn assign_shipment_ids(
    tracked: Vec<(Option<i64>, ShipmentCheckpoint)>,
) -> Vec<ShipmentCheckpoint> {
    let offset = tracked
        .iter()
        .filter_map(|(explicit, _)| *explicit)
        .max()
        .unwrap_or(0)
        .max(0);
    tracked
        .into_iter()
        .map(|(explicit, mut cp)| {
            if explicit.is_none() {
                cp.shipment_id += offset;
            }
            cp
        })
        .collect()
}

/// Read the CSV sources and replace the stored snapshot in one transaction.
pub async fn import(db: &Database, sources: &ImportSources, label: &str) -> Result<ImportReport> {
    let job_id = db
        .writer()
        .call({
            let label = label.to_string();
            move |conn| repository::insert_import_job(conn, &label)
        })
        .await?;

    let read = read_snapshot(sources);
    let (snapshot, mut report) = match read {
        Ok(v) => v,
        Err(e) => {
            record_failure(db, job_id, &e).await;
            return Err(e);
        }
    };
    report.source = label.to_string();

    let rows = report.rows_loaded();
    let rejected = report.values_rejected();
    let result = db
        .writer()
        .call({
            let label = label.to_string();
            move |conn| {
                let tx = conn.transaction()?;
                repository::replace_snapshot(&tx, &snapshot)?;
                repository::set_config(&tx, LAST_IMPORT_KEY, &label)?;
                repository::update_import_job(&tx, job_id, "completed", rows, rejected, None)?;
                tx.commit()?;
                Ok::<(), rusqlite::Error>(())
            }
        })
        .await;

    if let Err(e) = result {
        let e = Error::Database(e.to_string());
        record_failure(db, job_id, &e).await;
        return Err(e);
    }

    log::info!(
        "Imported {rows} rows from {label} ({rejected} values stored as NULL)"
    );
    Ok(report)
}

async fn record_failure(db: &Database, job_id: i64, error: &Error) {
    let message = error.to_string();
    let result = db
        .writer()
        .call(move |conn| {
            repository::update_import_job(conn, job_id, "failed", 0, 0, Some(&message))
        })
        .await;
    if let Err(e) = result {
        log::error!("Failed to record import failure: {e}");
    }
}
