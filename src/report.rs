use std::fmt::Write as _;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::metrics::Report;

/// One of the report's result tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    DeliveryDelays,
    TopDelayedRoutes,
    WarehouseDelayRanking,
    RoutePerformance,
    LeastEfficientRoutes,
    HighDelayShareRoutes,
    WarehouseBottlenecks,
    WarehouseVolume,
    AboveAverageProcessing,
    WarehouseOnTimeRanking,
    AgentRouteRanking,
    UnderperformingAgents,
    AgentSpeedComparison,
    LastCheckpoints,
    DelayReasonFrequency,
    SeverelyDelayedOrders,
    RegionalDelays,
    OverallOnTime,
    RouteTrafficDelays,
}

impl Metric {
    pub const ALL: [Metric; 19] = [
        Metric::DeliveryDelays,
        Metric::TopDelayedRoutes,
        Metric::WarehouseDelayRanking,
        Metric::RoutePerformance,
        Metric::LeastEfficientRoutes,
        Metric::HighDelayShareRoutes,
        Metric::WarehouseBottlenecks,
        Metric::WarehouseVolume,
        Metric::AboveAverageProcessing,
        Metric::WarehouseOnTimeRanking,
        Metric::AgentRouteRanking,
        Metric::UnderperformingAgents,
        Metric::AgentSpeedComparison,
        Metric::LastCheckpoints,
        Metric::DelayReasonFrequency,
        Metric::SeverelyDelayedOrders,
        Metric::RegionalDelays,
        Metric::OverallOnTime,
        Metric::RouteTrafficDelays,
    ];

    /// Name used on the command line and as the JSON field.
    pub fn name(&self) -> &'static str {
        match self {
            Metric::DeliveryDelays => "delivery-delays",
            Metric::TopDelayedRoutes => "top-delayed-routes",
            Metric::WarehouseDelayRanking => "warehouse-delay-ranking",
            Metric::RoutePerformance => "route-performance",
            Metric::LeastEfficientRoutes => "least-efficient-routes",
            Metric::HighDelayShareRoutes => "high-delay-share-routes",
            Metric::WarehouseBottlenecks => "warehouse-bottlenecks",
            Metric::WarehouseVolume => "warehouse-volume",
            Metric::AboveAverageProcessing => "above-average-processing",
            Metric::WarehouseOnTimeRanking => "warehouse-on-time-ranking",
            Metric::AgentRouteRanking => "agent-route-ranking",
            Metric::UnderperformingAgents => "underperforming-agents",
            Metric::AgentSpeedComparison => "agent-speed-comparison",
            Metric::LastCheckpoints => "last-checkpoints",
            Metric::DelayReasonFrequency => "delay-reason-frequency",
            Metric::SeverelyDelayedOrders => "severely-delayed-orders",
            Metric::RegionalDelays => "regional-delays",
            Metric::OverallOnTime => "overall-on-time",
            Metric::RouteTrafficDelays => "route-traffic-delays",
        }
    }

    pub fn title(&self, report: &Report) -> String {
        let o = &report.options;
        match self {
            Metric::DeliveryDelays => "Delivery Delay per Order".into(),
            Metric::TopDelayedRoutes => format!("Top {} Delayed Routes", o.top_n),
            Metric::WarehouseDelayRanking => "Order Delay Ranking per Warehouse".into(),
            Metric::RoutePerformance => "Route Performance".into(),
            Metric::LeastEfficientRoutes => {
                format!("{} Least Efficient Routes", o.least_efficient_n)
            }
            Metric::HighDelayShareRoutes => {
                format!("Routes with > {}% Delayed Orders", o.delayed_share_threshold)
            }
            Metric::WarehouseBottlenecks => {
                format!("Top {} Warehouses by Processing Time", o.bottleneck_n)
            }
            Metric::WarehouseVolume => "Warehouse Volume vs Delayed Orders".into(),
            Metric::AboveAverageProcessing => "Warehouses Above Average Processing Time".into(),
            Metric::WarehouseOnTimeRanking => "Warehouse On-Time Ranking".into(),
            Metric::AgentRouteRanking => "Agent Ranking per Route".into(),
            Metric::UnderperformingAgents => {
                format!("Agents Below {}% On-Time", o.sla_threshold)
            }
            Metric::AgentSpeedComparison => format!(
                "Top {n} vs Bottom {n} Agents: Average Speed",
                n = o.speed_sample_n
            ),
            Metric::LastCheckpoints => "Last Checkpoint per Order".into(),
            Metric::DelayReasonFrequency => "Delay Reasons".into(),
            Metric::SeverelyDelayedOrders => format!(
                "Orders with > {} Delay Checkpoints",
                o.severe_delay_threshold
            ),
            Metric::RegionalDelays => "Average Delay by Region".into(),
            Metric::OverallOnTime => "Overall On-Time Delivery".into(),
            Metric::RouteTrafficDelays => "Average Traffic Delay per Route".into(),
        }
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Metric::ALL
            .into_iter()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| Error::InvalidMetric(s.to_string()))
    }
}

/// A metric flattened to string cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub title: String,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

fn fmt2(v: f64) -> String {
    format!("{v:.2}")
}

fn fmt4(v: f64) -> String {
    format!("{v:.4}")
}

fn opt<T>(v: Option<T>, f: impl Fn(T) -> String) -> String {
    v.map(f).unwrap_or_default()
}

fn text(v: &Option<String>) -> String {
    v.clone().unwrap_or_default()
}

/// Flatten one metric of `report` into a table.
pub fn table(report: &Report, metric: Metric) -> Table {
    let (headers, rows): (Vec<&'static str>, Vec<Vec<String>>) = match metric {
        Metric::DeliveryDelays => (
            vec!["order_id", "delivery_delay_days"],
            report
                .delivery_delays
                .iter()
                .map(|r| vec![r.order_id.clone(), r.delivery_delay_days.to_string()])
                .collect(),
        ),
        Metric::TopDelayedRoutes => (
            vec!["route_id", "avg_delay_days"],
            report
                .top_delayed_routes
                .iter()
                .map(|r| vec![r.route_id.clone(), fmt2(r.avg_delay_days)])
                .collect(),
        ),
        Metric::WarehouseDelayRanking => (
            vec!["warehouse_id", "order_id", "delivery_delay_days", "delay_rank"],
            report
                .warehouse_delay_ranking
                .iter()
                .map(|r| {
                    vec![
                        r.warehouse_id.clone(),
                        r.order_id.clone(),
                        r.delivery_delay_days.to_string(),
                        r.delay_rank.to_string(),
                    ]
                })
                .collect(),
        ),
        Metric::RoutePerformance => (
            vec![
                "route_id",
                "avg_delivery_days",
                "traffic_delay_min",
                "efficiency_ratio",
            ],
            report
                .route_performance
                .iter()
                .map(|r| {
                    vec![
                        r.route_id.clone(),
                        opt(r.avg_delivery_days, fmt2),
                        opt(r.traffic_delay_min, fmt2),
                        opt(r.efficiency_ratio, fmt4),
                    ]
                })
                .collect(),
        ),
        Metric::LeastEfficientRoutes => (
            vec![
                "route_id",
                "distance_km",
                "average_travel_time_min",
                "efficiency_ratio",
            ],
            report
                .least_efficient_routes
                .iter()
                .map(|r| {
                    vec![
                        r.route_id.clone(),
                        fmt2(r.distance_km),
                        fmt2(r.average_travel_time_min),
                        fmt4(r.efficiency_ratio),
                    ]
                })
                .collect(),
        ),
        Metric::HighDelayShareRoutes => (
            vec!["route_id", "total_orders", "delayed_orders", "delayed_pct"],
            report
                .high_delay_share_routes
                .iter()
                .map(|r| {
                    vec![
                        r.route_id.clone(),
                        r.total_orders.to_string(),
                        r.delayed_orders.to_string(),
                        fmt2(r.delayed_pct),
                    ]
                })
                .collect(),
        ),
        Metric::WarehouseBottlenecks => (
            vec!["warehouse_id", "location", "processing_time_min"],
            report
                .warehouse_bottlenecks
                .iter()
                .map(|r| {
                    vec![
                        r.warehouse_id.clone(),
                        text(&r.location),
                        fmt2(r.processing_time_min),
                    ]
                })
                .collect(),
        ),
        Metric::WarehouseVolume => (
            vec!["warehouse_id", "total_orders", "delayed_orders"],
            report
                .warehouse_volume
                .iter()
                .map(|r| {
                    vec![
                        r.warehouse_id.clone(),
                        r.total_orders.to_string(),
                        r.delayed_orders.to_string(),
                    ]
                })
                .collect(),
        ),
        Metric::AboveAverageProcessing => (
            vec![
                "warehouse_id",
                "location",
                "processing_time_min",
                "average_processing_time_min",
            ],
            report
                .above_average_processing
                .iter()
                .flat_map(|b| {
                    b.warehouses.iter().map(|r| {
                        vec![
                            r.warehouse_id.clone(),
                            text(&r.location),
                            fmt2(r.processing_time_min),
                            fmt2(b.average_processing_time_min),
                        ]
                    })
                })
                .collect(),
        ),
        Metric::WarehouseOnTimeRanking => (
            vec![
                "warehouse_id",
                "total_orders",
                "on_time_orders",
                "on_time_pct",
                "rank",
            ],
            report
                .warehouse_on_time_ranking
                .iter()
                .map(|r| {
                    vec![
                        r.warehouse_id.clone(),
                        r.total_orders.to_string(),
                        r.on_time_orders.to_string(),
                        fmt2(r.on_time_pct),
                        r.rank.to_string(),
                    ]
                })
                .collect(),
        ),
        Metric::AgentRouteRanking => (
            vec!["route_id", "agent_id", "on_time_pct", "rank"],
            report
                .agent_route_ranking
                .iter()
                .map(|r| {
                    vec![
                        r.route_id.clone(),
                        r.agent_id.clone(),
                        fmt2(r.on_time_pct),
                        r.rank.to_string(),
                    ]
                })
                .collect(),
        ),
        Metric::UnderperformingAgents => (
            vec!["agent_id", "route_id", "on_time_pct", "avg_speed_km_hr"],
            report
                .underperforming_agents
                .iter()
                .map(|r| {
                    vec![
                        r.agent_id.clone(),
                        text(&r.route_id),
                        fmt2(r.on_time_pct),
                        opt(r.avg_speed_km_hr, fmt2),
                    ]
                })
                .collect(),
        ),
        Metric::AgentSpeedComparison => (
            vec!["group", "agent_count", "avg_speed_km_hr"],
            report
                .agent_speed_comparison
                .iter()
                .map(|r| {
                    vec![
                        r.group.clone(),
                        r.agent_count.to_string(),
                        fmt2(r.avg_speed_km_hr),
                    ]
                })
                .collect(),
        ),
        Metric::LastCheckpoints => (
            vec![
                "order_id",
                "shipment_id",
                "checkpoint",
                "checkpoint_time",
                "delay_reason",
            ],
            report
                .last_checkpoints
                .iter()
                .map(|r| {
                    vec![
                        r.order_id.clone(),
                        r.shipment_id.to_string(),
                        text(&r.checkpoint),
                        r.checkpoint_time.clone(),
                        r.delay_reason.to_string(),
                    ]
                })
                .collect(),
        ),
        Metric::DelayReasonFrequency => (
            vec!["delay_reason", "occurrences"],
            report
                .delay_reason_frequency
                .iter()
                .map(|r| vec![r.delay_reason.to_string(), r.occurrences.to_string()])
                .collect(),
        ),
        Metric::SeverelyDelayedOrders => (
            vec!["order_id", "delay_checkpoints"],
            report
                .severely_delayed_orders
                .iter()
                .map(|r| vec![r.order_id.clone(), r.delay_checkpoints.to_string()])
                .collect(),
        ),
        Metric::RegionalDelays => (
            vec!["start_location", "late_orders", "avg_delay_days"],
            report
                .regional_delays
                .iter()
                .map(|r| {
                    vec![
                        r.start_location.clone(),
                        r.late_orders.to_string(),
                        fmt2(r.avg_delay_days),
                    ]
                })
                .collect(),
        ),
        Metric::OverallOnTime => (
            vec!["total_orders", "on_time_orders", "on_time_pct"],
            report
                .overall_on_time
                .iter()
                .map(|r| {
                    vec![
                        r.total_orders.to_string(),
                        r.on_time_orders.to_string(),
                        fmt2(r.on_time_pct),
                    ]
                })
                .collect(),
        ),
        Metric::RouteTrafficDelays => (
            vec!["route_id", "avg_traffic_delay_min"],
            report
                .route_traffic_delays
                .iter()
                .map(|r| vec![r.route_id.clone(), fmt2(r.avg_traffic_delay_min)])
                .collect(),
        ),
    };
    Table {
        title: metric.title(report),
        headers,
        rows,
    }
}

/// Write a table as CSV with a header row.
pub fn to_csv(table: &Table) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let csv_err = |e: csv::Error| Error::Csv {
        file: "<stdout>".into(),
        message: e.to_string(),
    };
    writer.write_record(&table.headers).map_err(csv_err)?;
    for row in &table.rows {
        writer.write_record(row).map_err(csv_err)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Other(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| Error::Other(e.to_string()))
}

/// Pretty JSON of the whole report, or of one metric's rows.
pub fn to_json(report: &Report, metric: Option<Metric>) -> Result<String> {
    let value = serde_json::to_value(report)?;
    let selected = match metric {
        None => value,
        Some(m) => {
            let field = m.name().replace('-', "_");
            value
                .get(&field)
                .cloned()
                .ok_or_else(|| Error::InvalidMetric(m.name().to_string()))?
        }
    };
    Ok(serde_json::to_string_pretty(&selected)?)
}

/// Serialize any value as pretty JSON.
pub fn json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Aligned plain-text rendering of a table.
pub fn render_table(table: &Table) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", table.title);
    let _ = writeln!(out, "{}", "=".repeat(table.title.chars().count()));
    if table.rows.is_empty() {
        out.push_str("  (no rows)\n");
        return out;
    }

    let mut widths: Vec<usize> = table.headers.iter().map(|h| h.len()).collect();
    for row in &table.rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{c:<w$}"))
            .collect();
        format!("  {}\n", padded.join("  ").trim_end())
    };
    out.push_str(&line(table.headers.clone()));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&line(rule.iter().map(String::as_str).collect()));
    for row in &table.rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
    }
    out
}

/// The full human-readable report.
pub fn render_text(report: &Report) -> String {
    let mut out = String::from("Logistics Delivery Report\n\n");
    match &report.overall_on_time {
        Some(kpi) => {
            let _ = writeln!(
                out,
                "On-time delivery: {:.2}% ({} of {} orders)\n",
                kpi.on_time_pct, kpi.on_time_orders, kpi.total_orders
            );
        }
        None => out.push_str("No orders in the snapshot.\n\n"),
    }
    for metric in Metric::ALL {
        out.push_str(&render_table(&table(report, metric)));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{build_report, ReportOptions};
    use crate::model::{Route, Snapshot};

    fn report_with_routes() -> Report {
        let snapshot = Snapshot {
            routes: vec![
                Route {
                    route_id: "R1".into(),
                    start_location: Some("Mumbai".into()),
                    end_location: None,
                    distance_km: Some(100.0),
                    average_travel_time_min: Some(50.0),
                    traffic_delay_min: Some(12.5),
                },
                Route {
                    route_id: "R2".into(),
                    start_location: Some("Delhi, North".into()),
                    end_location: None,
                    distance_km: Some(80.0),
                    average_travel_time_min: Some(40.0),
                    traffic_delay_min: None,
                },
            ],
            ..Default::default()
        };
        build_report(&snapshot, &ReportOptions::default())
    }

    #[test]
    fn test_metric_names_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(metric.name().parse::<Metric>().unwrap(), metric);
        }
        assert_eq!(
            "top_delayed_routes".parse::<Metric>().unwrap(),
            Metric::TopDelayedRoutes
        );
        assert!(matches!(
            "nope".parse::<Metric>(),
            Err(Error::InvalidMetric(_))
        ));
    }

    #[test]
    fn test_efficiency_formatted_to_four_places() {
        let t = table(&report_with_routes(), Metric::LeastEfficientRoutes);
        let ratios: Vec<&str> = t.rows.iter().map(|r| r[3].as_str()).collect();
        assert_eq!(ratios, vec!["2.0000", "2.0000"]);
    }

    #[test]
    fn test_csv_escapes_cells() {
        let t = Table {
            title: "t".into(),
            headers: vec!["region", "n"],
            rows: vec![vec!["Delhi, North".into(), "1".into()]],
        };
        assert_eq!(to_csv(&t).unwrap(), "region,n\n\"Delhi, North\",1\n");
    }

    #[test]
    fn test_json_selects_single_metric() {
        let report = report_with_routes();
        let out = to_json(&report, Some(Metric::RouteTrafficDelays)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["route_id"], "R1");
        assert_eq!(value[0]["avg_traffic_delay_min"], 12.5);

        let full = to_json(&report, None).unwrap();
        assert!(full.contains("\"least_efficient_routes\""));
    }

    #[test]
    fn test_json_field_for_every_metric() {
        let report = report_with_routes();
        for metric in Metric::ALL {
            assert!(to_json(&report, Some(metric)).is_ok(), "{}", metric.name());
        }
    }

    #[test]
    fn test_render_text_lists_every_metric() {
        let report = report_with_routes();
        let out = render_text(&report);
        assert!(out.contains("No orders in the snapshot."));
        for metric in Metric::ALL {
            assert!(out.contains(&metric.title(&report)), "{}", metric.name());
        }
        assert!(out.contains("(no rows)"));
    }
}
