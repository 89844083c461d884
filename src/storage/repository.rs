use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::date_util::{DATE_FORMAT, TIMESTAMP_FORMAT};
use crate::model::{
    DeliveryAgent, DelayReason, DeliveryStatus, Order, Route, ShipmentCheckpoint, Snapshot,
    Warehouse,
};

/// Snapshot tables in load order.
pub const SNAPSHOT_TABLES: [&str; 5] = [
    "orders",
    "routes",
    "warehouses",
    "delivery_agents",
    "shipment_tracking",
];

fn date_text(d: Option<NaiveDate>) -> Option<String> {
    d.map(|d| d.format(DATE_FORMAT).to_string())
}

fn timestamp_text(ts: Option<NaiveDateTime>) -> Option<String> {
    ts.map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
}

fn parse_date(s: Option<String>) -> Option<NaiveDate> {
    s.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok())
}

fn parse_timestamp(s: Option<String>) -> Option<NaiveDateTime> {
    s.and_then(|s| NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT).ok())
}

// ── Snapshot writes ────────────────────────────────────────────────

/// Replace every snapshot table with the contents of `snapshot`.
/// Callers wrap this in a transaction so readers never see a partial load.
pub fn replace_snapshot(conn: &Connection, snapshot: &Snapshot) -> Result<u64, rusqlite::Error> {
    for table in SNAPSHOT_TABLES {
        conn.execute(&format!("DELETE FROM {table}"), [])?;
    }

    let mut rows = 0u64;
    for order in &snapshot.orders {
        insert_order(conn, order)?;
        rows += 1;
    }
    for route in &snapshot.routes {
        insert_route(conn, route)?;
        rows += 1;
    }
    for warehouse in &snapshot.warehouses {
        insert_warehouse(conn, warehouse)?;
        rows += 1;
    }
    for agent in &snapshot.agents {
        insert_agent(conn, agent)?;
        rows += 1;
    }
    for checkpoint in &snapshot.checkpoints {
        insert_checkpoint(conn, checkpoint)?;
        rows += 1;
    }
    Ok(rows)
}

pub fn insert_order(conn: &Connection, order: &Order) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO orders (
            order_id, route_id, warehouse_id, order_date,
            expected_delivery_date, actual_delivery_date, status
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            order.order_id,
            order.route_id,
            order.warehouse_id,
            date_text(order.order_date),
            date_text(order.expected_delivery_date),
            date_text(order.actual_delivery_date),
            order.status.as_str(),
        ],
    )?;
    Ok(())
}

pub fn insert_route(conn: &Connection, route: &Route) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO routes (
            route_id, start_location, end_location, distance_km,
            average_travel_time_min, traffic_delay_min
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            route.route_id,
            route.start_location,
            route.end_location,
            route.distance_km,
            route.average_travel_time_min,
            route.traffic_delay_min,
        ],
    )?;
    Ok(())
}

pub fn insert_warehouse(conn: &Connection, warehouse: &Warehouse) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO warehouses (warehouse_id, location, processing_time_min)
         VALUES (?1, ?2, ?3)",
        params![
            warehouse.warehouse_id,
            warehouse.location,
            warehouse.processing_time_min,
        ],
    )?;
    Ok(())
}

pub fn insert_agent(conn: &Connection, agent: &DeliveryAgent) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO delivery_agents (agent_id, route_id, on_time_pct, avg_speed_km_hr)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            agent.agent_id,
            agent.route_id,
            agent.on_time_pct,
            agent.avg_speed_km_hr,
        ],
    )?;
    Ok(())
}

pub fn insert_checkpoint(
    conn: &Connection,
    checkpoint: &ShipmentCheckpoint,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO shipment_tracking (
            shipment_id, order_id, checkpoint, checkpoint_time, delay_reason
        ) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            checkpoint.shipment_id,
            checkpoint.order_id,
            checkpoint.checkpoint,
            timestamp_text(checkpoint.checkpoint_time),
            checkpoint.delay_reason.as_str(),
        ],
    )?;
    Ok(())
}

// ── Snapshot reads ─────────────────────────────────────────────────

/// Load all five tables in insertion order.
pub fn load_snapshot(conn: &Connection) -> Result<Snapshot, rusqlite::Error> {
    Ok(Snapshot {
        orders: load_orders(conn)?,
        routes: load_routes(conn)?,
        warehouses: load_warehouses(conn)?,
        agents: load_agents(conn)?,
        checkpoints: load_checkpoints(conn)?,
    })
}

pub fn load_orders(conn: &Connection) -> Result<Vec<Order>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT order_id, route_id, warehouse_id, order_date,
                expected_delivery_date, actual_delivery_date, status
         FROM orders ORDER BY row_id",
    )?;
    let rows = stmt.query_map([], |row| {
        let status: String = row.get(6)?;
        Ok(Order {
            order_id: row.get(0)?,
            route_id: row.get(1)?,
            warehouse_id: row.get(2)?,
            order_date: parse_date(row.get(3)?),
            expected_delivery_date: parse_date(row.get(4)?),
            actual_delivery_date: parse_date(row.get(5)?),
            status: DeliveryStatus::from_label(&status),
        })
    })?;
    rows.collect()
}

pub fn load_routes(conn: &Connection) -> Result<Vec<Route>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT route_id, start_location, end_location, distance_km,
                average_travel_time_min, traffic_delay_min
         FROM routes ORDER BY row_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Route {
            route_id: row.get(0)?,
            start_location: row.get(1)?,
            end_location: row.get(2)?,
            distance_km: row.get(3)?,
            average_travel_time_min: row.get(4)?,
            traffic_delay_min: row.get(5)?,
        })
    })?;
    rows.collect()
}

pub fn load_warehouses(conn: &Connection) -> Result<Vec<Warehouse>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT warehouse_id, location, processing_time_min FROM warehouses ORDER BY row_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Warehouse {
            warehouse_id: row.get(0)?,
            location: row.get(1)?,
            processing_time_min: row.get(2)?,
        })
    })?;
    rows.collect()
}

pub fn load_agents(conn: &Connection) -> Result<Vec<DeliveryAgent>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT agent_id, route_id, on_time_pct, avg_speed_km_hr
         FROM delivery_agents ORDER BY row_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(DeliveryAgent {
            agent_id: row.get(0)?,
            route_id: row.get(1)?,
            on_time_pct: row.get(2)?,
            avg_speed_km_hr: row.get(3)?,
        })
    })?;
    rows.collect()
}

pub fn load_checkpoints(conn: &Connection) -> Result<Vec<ShipmentCheckpoint>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT shipment_id, order_id, checkpoint, checkpoint_time, delay_reason
         FROM shipment_tracking ORDER BY row_id",
    )?;
    let rows = stmt.query_map([], |row| {
        let reason: String = row.get(4)?;
        Ok(ShipmentCheckpoint {
            shipment_id: row.get(0)?,
            order_id: row.get(1)?,
            checkpoint: row.get(2)?,
            checkpoint_time: parse_timestamp(row.get(3)?),
            delay_reason: DelayReason::from_label(&reason),
        })
    })?;
    rows.collect()
}

/// Row count per snapshot table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableCounts {
    pub orders: u64,
    pub routes: u64,
    pub warehouses: u64,
    pub delivery_agents: u64,
    pub shipment_tracking: u64,
}

pub fn table_counts(conn: &Connection) -> Result<TableCounts, rusqlite::Error> {
    let count = |table: &str| -> Result<u64, rusqlite::Error> {
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })?;
        Ok(n as u64)
    };
    Ok(TableCounts {
        orders: count("orders")?,
        routes: count("routes")?,
        warehouses: count("warehouses")?,
        delivery_agents: count("delivery_agents")?,
        shipment_tracking: count("shipment_tracking")?,
    })
}

// ── Import jobs ────────────────────────────────────────────────────

pub fn insert_import_job(conn: &Connection, source_dir: &str) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO import_jobs (source_dir, status, started_at)
         VALUES (?1, 'running', datetime('now'))",
        params![source_dir],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_import_job(
    conn: &Connection,
    job_id: i64,
    status: &str,
    rows_loaded: u64,
    values_rejected: u64,
    error_message: Option<&str>,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "UPDATE import_jobs SET
            status = ?2, completed_at = datetime('now'),
            rows_loaded = ?3, values_rejected = ?4, error_message = ?5
         WHERE id = ?1",
        params![
            job_id,
            status,
            rows_loaded as i64,
            values_rejected as i64,
            error_message
        ],
    )?;
    Ok(())
}

/// Completion time of the most recent successful import.
pub fn last_import_at(conn: &Connection) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT MAX(completed_at) FROM import_jobs WHERE status = 'completed'",
        [],
        |row| row.get(0),
    )
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn delete_config(conn: &Connection, key: &str) -> Result<bool, rusqlite::Error> {
    let n = conn.execute("DELETE FROM app_config WHERE key = ?1", params![key])?;
    Ok(n > 0)
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    fn sample_snapshot() -> Snapshot {
        let d = |s: &str| NaiveDate::parse_from_str(s, DATE_FORMAT).ok();
        Snapshot {
            orders: vec![
                Order {
                    order_id: "O1".into(),
                    route_id: Some("R1".into()),
                    warehouse_id: Some("W1".into()),
                    order_date: d("2024-01-01"),
                    expected_delivery_date: d("2024-01-10"),
                    actual_delivery_date: d("2024-01-12"),
                    status: DeliveryStatus::Delayed,
                },
                Order {
                    order_id: "O1".into(),
                    route_id: None,
                    warehouse_id: None,
                    order_date: None,
                    expected_delivery_date: None,
                    actual_delivery_date: None,
                    status: DeliveryStatus::Other("Lost".into()),
                },
            ],
            routes: vec![Route {
                route_id: "R1".into(),
                start_location: Some("Mumbai".into()),
                end_location: Some("Pune".into()),
                distance_km: Some(150.0),
                average_travel_time_min: Some(180.0),
                traffic_delay_min: None,
            }],
            warehouses: vec![Warehouse {
                warehouse_id: "W1".into(),
                location: Some("Mumbai".into()),
                processing_time_min: Some(45.0),
            }],
            agents: vec![DeliveryAgent {
                agent_id: "A1".into(),
                route_id: Some("R1".into()),
                on_time_pct: Some(91.5),
                avg_speed_km_hr: Some(48.0),
            }],
            checkpoints: vec![ShipmentCheckpoint {
                shipment_id: 1,
                order_id: "O1".into(),
                checkpoint: Some("Hub".into()),
                checkpoint_time: NaiveDateTime::parse_from_str(
                    "2024-01-05 10:00:00",
                    TIMESTAMP_FORMAT,
                )
                .ok(),
                delay_reason: DelayReason::Weather,
            }],
        }
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let db = Database::open_memory().await.unwrap();
        let snapshot = sample_snapshot();
        let expected = snapshot.clone();

        let loaded = db
            .writer()
            .call(move |conn| {
                let tx = conn.transaction()?;
                let rows = replace_snapshot(&tx, &snapshot)?;
                tx.commit()?;
                assert_eq!(rows, 6);
                load_snapshot(conn)
            })
            .await
            .unwrap();

        assert_eq!(loaded, expected);
    }

    #[tokio::test]
    async fn test_replace_snapshot_discards_previous_rows() {
        let db = Database::open_memory().await.unwrap();

        let counts = db
            .writer()
            .call(|conn| {
                replace_snapshot(conn, &sample_snapshot())?;
                replace_snapshot(conn, &sample_snapshot())?;
                table_counts(conn)
            })
            .await
            .unwrap();

        assert_eq!(counts.orders, 2);
        assert_eq!(counts.routes, 1);
        assert_eq!(counts.shipment_tracking, 1);
    }

    #[tokio::test]
    async fn test_config_round_trip() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                set_config(conn, "top_n", "5")?;
                let val = get_config(conn, "top_n")?;
                assert_eq!(val, Some("5".to_string()));

                set_config(conn, "top_n", "8")?;
                assert_eq!(get_config(conn, "top_n")?, Some("8".to_string()));

                let missing = get_config(conn, "nonexistent")?;
                assert_eq!(missing, None);

                assert!(delete_config(conn, "top_n")?);
                assert!(!delete_config(conn, "top_n")?);
                assert!(list_config(conn)?.is_empty());
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_import_job_tracking() {
        let db = Database::open_memory().await.unwrap();

        db.writer()
            .call(|conn| {
                assert_eq!(last_import_at(conn)?, None);
                let id = insert_import_job(conn, "/tmp/data")?;
                update_import_job(conn, id, "completed", 10, 1, None)?;
                assert!(last_import_at(conn)?.is_some());
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
    }
}
