use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::model::Snapshot;

/// An identifier that occurs more than once in its table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateId {
    pub id: String,
    pub occurrences: u64,
}

/// An order delivered before it was placed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateAnomaly {
    pub order_id: String,
    pub order_date: String,
    pub actual_delivery_date: String,
}

/// A row whose reference does not resolve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DanglingReference {
    pub table: &'static str,
    pub row_id: String,
    pub column: &'static str,
    pub missing_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityReport {
    pub duplicate_order_ids: Vec<DuplicateId>,
    pub duplicate_route_ids: Vec<DuplicateId>,
    pub duplicate_warehouse_ids: Vec<DuplicateId>,
    pub duplicate_agent_ids: Vec<DuplicateId>,
    /// Routes with no stored traffic delay.
    pub missing_traffic_delay: Vec<String>,
    /// Orders missing any of their three dates.
    pub orders_missing_dates: Vec<String>,
    pub delivered_before_ordered: Vec<DateAnomaly>,
    pub dangling_references: Vec<DanglingReference>,
}

impl QualityReport {
    pub fn is_clean(&self) -> bool {
        self.issue_count() == 0
    }

    pub fn issue_count(&self) -> usize {
        self.duplicate_order_ids.len()
            + self.duplicate_route_ids.len()
            + self.duplicate_warehouse_ids.len()
            + self.duplicate_agent_ids.len()
            + self.missing_traffic_delay.len()
            + self.orders_missing_dates.len()
            + self.delivered_before_ordered.len()
            + self.dangling_references.len()
    }
}

fn duplicates<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<DuplicateId> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for id in ids {
        *counts.entry(id).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(id, occurrences)| DuplicateId {
            id: id.to_string(),
            occurrences,
        })
        .collect()
}

/// Run every check over `snapshot`.
pub fn check(snapshot: &Snapshot) -> QualityReport {
    let route_ids: HashSet<&str> = snapshot.routes.iter().map(|r| r.route_id.as_str()).collect();
    let warehouse_ids: HashSet<&str> = snapshot
        .warehouses
        .iter()
        .map(|w| w.warehouse_id.as_str())
        .collect();
    let order_ids: HashSet<&str> = snapshot.orders.iter().map(|o| o.order_id.as_str()).collect();

    let mut report = QualityReport {
        duplicate_order_ids: duplicates(snapshot.orders.iter().map(|o| o.order_id.as_str())),
        duplicate_route_ids: duplicates(snapshot.routes.iter().map(|r| r.route_id.as_str())),
        duplicate_warehouse_ids: duplicates(
            snapshot.warehouses.iter().map(|w| w.warehouse_id.as_str()),
        ),
        duplicate_agent_ids: duplicates(snapshot.agents.iter().map(|a| a.agent_id.as_str())),
        missing_traffic_delay: snapshot
            .routes
            .iter()
            .filter(|r| r.traffic_delay_min.is_none())
            .map(|r| r.route_id.clone())
            .collect(),
        ..Default::default()
    };

    for order in &snapshot.orders {
        if order.order_date.is_none()
            || order.expected_delivery_date.is_none()
            || order.actual_delivery_date.is_none()
        {
            report.orders_missing_dates.push(order.order_id.clone());
        }
        if let (Some(ordered), Some(delivered)) = (order.order_date, order.actual_delivery_date) {
            if delivered < ordered {
                report.delivered_before_ordered.push(DateAnomaly {
                    order_id: order.order_id.clone(),
                    order_date: ordered.to_string(),
                    actual_delivery_date: delivered.to_string(),
                });
            }
        }
        if let Some(route_id) = order.route_id.as_deref() {
            if !route_ids.contains(route_id) {
                report.dangling_references.push(DanglingReference {
                    table: "orders",
                    row_id: order.order_id.clone(),
                    column: "route_id",
                    missing_id: route_id.to_string(),
                });
            }
        }
        if let Some(warehouse_id) = order.warehouse_id.as_deref() {
            if !warehouse_ids.contains(warehouse_id) {
                report.dangling_references.push(DanglingReference {
                    table: "orders",
                    row_id: order.order_id.clone(),
                    column: "warehouse_id",
                    missing_id: warehouse_id.to_string(),
                });
            }
        }
    }

    for agent in &snapshot.agents {
        if let Some(route_id) = agent.route_id.as_deref() {
            if !route_ids.contains(route_id) {
                report.dangling_references.push(DanglingReference {
                    table: "delivery_agents",
                    row_id: agent.agent_id.clone(),
                    column: "route_id",
                    missing_id: route_id.to_string(),
                });
            }
        }
    }

    for cp in &snapshot.checkpoints {
        if !order_ids.contains(cp.order_id.as_str()) {
            report.dangling_references.push(DanglingReference {
                table: "shipment_tracking",
                row_id: cp.shipment_id.to_string(),
                column: "order_id",
                missing_id: cp.order_id.clone(),
            });
        }
    }

    if !report.is_clean() {
        log::warn!("Quality check flagged {} issues", report.issue_count());
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeliveryAgent, DelayReason, DeliveryStatus, Order, Route, ShipmentCheckpoint, Warehouse};
    use chrono::NaiveDate;

    fn date(s: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
    }

    fn order(id: &str, ordered: &str, delivered: &str) -> Order {
        Order {
            order_id: id.into(),
            route_id: Some("R1".into()),
            warehouse_id: Some("W1".into()),
            order_date: date(ordered),
            expected_delivery_date: date("2024-01-10"),
            actual_delivery_date: date(delivered),
            status: DeliveryStatus::OnTime,
        }
    }

    fn clean_snapshot() -> Snapshot {
        Snapshot {
            orders: vec![order("O1", "2024-01-01", "2024-01-09")],
            routes: vec![Route {
                route_id: "R1".into(),
                start_location: None,
                end_location: None,
                distance_km: Some(10.0),
                average_travel_time_min: Some(20.0),
                traffic_delay_min: Some(5.0),
            }],
            warehouses: vec![Warehouse {
                warehouse_id: "W1".into(),
                location: None,
                processing_time_min: Some(30.0),
            }],
            agents: vec![DeliveryAgent {
                agent_id: "A1".into(),
                route_id: Some("R1".into()),
                on_time_pct: Some(90.0),
                avg_speed_km_hr: Some(40.0),
            }],
            checkpoints: vec![ShipmentCheckpoint {
                shipment_id: 1,
                order_id: "O1".into(),
                checkpoint: None,
                checkpoint_time: None,
                delay_reason: DelayReason::None,
            }],
        }
    }

    #[test]
    fn test_clean_snapshot() {
        let report = check(&clean_snapshot());
        assert!(report.is_clean(), "{report:?}");
    }

    #[test]
    fn test_flags_duplicates_and_date_anomalies() {
        let mut snapshot = clean_snapshot();
        snapshot.orders.push(order("O1", "2024-01-05", "2024-01-03"));
        snapshot.orders.push(order("O2", "2024-01-05", ""));

        let report = check(&snapshot);
        assert_eq!(
            report.duplicate_order_ids,
            vec![DuplicateId {
                id: "O1".into(),
                occurrences: 2
            }]
        );
        assert_eq!(report.delivered_before_ordered.len(), 1);
        assert_eq!(report.delivered_before_ordered[0].order_date, "2024-01-05");
        assert_eq!(report.orders_missing_dates, vec!["O2".to_string()]);
        // Flagged rows are kept
        assert_eq!(snapshot.orders.len(), 3);
    }

    #[test]
    fn test_flags_missing_traffic_delay_and_dangling_refs() {
        let mut snapshot = clean_snapshot();
        snapshot.routes[0].traffic_delay_min = None;
        snapshot.orders[0].warehouse_id = Some("W9".into());
        snapshot.checkpoints[0].order_id = "O404".into();

        let report = check(&snapshot);
        assert_eq!(report.missing_traffic_delay, vec!["R1".to_string()]);
        let columns: Vec<(&str, &str)> = report
            .dangling_references
            .iter()
            .map(|d| (d.table, d.missing_id.as_str()))
            .collect();
        assert_eq!(columns, vec![("orders", "W9"), ("shipment_tracking", "O404")]);
        assert_eq!(report.issue_count(), 3);
    }
}
