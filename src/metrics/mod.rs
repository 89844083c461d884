pub mod ranking;
pub mod types;

pub use types::*;

use std::collections::{BTreeMap, HashMap};

use crate::date_util::{mean, round_to, TIMESTAMP_FORMAT};
use crate::error::Result;
use crate::model::{DelayReason, Route, ShipmentCheckpoint, Snapshot};
use crate::storage::{repository, Database};

use ranking::rank_descending;

/// Load the stored snapshot and compute every metric over it.
pub async fn compute_report(db: &Database, options: &ReportOptions) -> Result<Report> {
    let snapshot = db
        .reader()
        .call(|conn| repository::load_snapshot(conn))
        .await
        .map_err(|e| crate::error::Error::Database(e.to_string()))?;
    log::info!(
        "Computing report over {} orders, {} routes, {} warehouses, {} agents, {} checkpoints",
        snapshot.orders.len(),
        snapshot.routes.len(),
        snapshot.warehouses.len(),
        snapshot.agents.len(),
        snapshot.checkpoints.len()
    );
    Ok(build_report(&snapshot, options))
}

/// Compute every metric over an in-memory snapshot.
pub fn build_report(snapshot: &Snapshot, options: &ReportOptions) -> Report {
    let report = Report {
        options: options.clone(),
        delivery_delays: delivery_delays(snapshot),
        top_delayed_routes: top_delayed_routes(snapshot, options.top_n),
        warehouse_delay_ranking: warehouse_delay_ranking(snapshot),
        route_performance: route_performance(snapshot),
        least_efficient_routes: least_efficient_routes(snapshot, options.least_efficient_n),
        high_delay_share_routes: high_delay_share_routes(
            snapshot,
            options.delayed_share_threshold,
        ),
        warehouse_bottlenecks: warehouse_bottlenecks(snapshot, options.bottleneck_n),
        warehouse_volume: warehouse_volume(snapshot),
        above_average_processing: above_average_processing(snapshot),
        warehouse_on_time_ranking: warehouse_on_time_ranking(snapshot),
        agent_route_ranking: agent_route_ranking(snapshot),
        underperforming_agents: underperforming_agents(snapshot, options.sla_threshold),
        agent_speed_comparison: agent_speed_comparison(snapshot, options.speed_sample_n),
        last_checkpoints: last_checkpoints(snapshot),
        delay_reason_frequency: delay_reason_frequency(snapshot),
        severely_delayed_orders: severely_delayed_orders(
            snapshot,
            options.severe_delay_threshold,
        ),
        regional_delays: regional_delays(snapshot),
        overall_on_time: overall_on_time(snapshot),
        route_traffic_delays: route_traffic_delays(snapshot),
    };
    log::debug!(
        "Report: {} delayed routes, {} bottlenecks, {} underperforming agents",
        report.top_delayed_routes.len(),
        report.warehouse_bottlenecks.len(),
        report.underperforming_agents.len()
    );
    report
}

// ── Delivery delays ────────────────────────────────────────────────

/// Per-order delay in days, never negative. Orders missing either date are skipped.
pub fn delivery_delays(snapshot: &Snapshot) -> Vec<OrderDelay> {
    snapshot
        .orders
        .iter()
        .filter_map(|o| {
            Some(OrderDelay {
                order_id: o.order_id.clone(),
                delivery_delay_days: o.delay_delta_days()?.max(0),
            })
        })
        .collect()
}

/// Routes whose late orders are, on average, the latest.
pub fn top_delayed_routes(snapshot: &Snapshot, n: usize) -> Vec<RouteDelay> {
    let mut late: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for order in &snapshot.orders {
        let (Some(route_id), Some(delta)) = (order.route_id.as_deref(), order.delay_delta_days())
        else {
            continue;
        };
        if delta > 0 {
            late.entry(route_id).or_default().push(delta as f64);
        }
    }

    let mut rows: Vec<RouteDelay> = late
        .into_iter()
        .filter_map(|(route_id, deltas)| {
            Some(RouteDelay {
                route_id: route_id.to_string(),
                avg_delay_days: round_to(mean(&deltas)?, 2),
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        b.avg_delay_days
            .total_cmp(&a.avg_delay_days)
            .then_with(|| a.route_id.cmp(&b.route_id))
    });
    rows.truncate(n);
    rows
}

/// Orders ranked by delay within each warehouse, most delayed first.
pub fn warehouse_delay_ranking(snapshot: &Snapshot) -> Vec<WarehouseOrderRank> {
    let mut partitions: BTreeMap<&str, Vec<(&str, i64)>> = BTreeMap::new();
    for order in &snapshot.orders {
        let (Some(warehouse_id), Some(delta)) =
            (order.warehouse_id.as_deref(), order.delay_delta_days())
        else {
            continue;
        };
        partitions
            .entry(warehouse_id)
            .or_default()
            .push((order.order_id.as_str(), delta.max(0)));
    }

    let mut out = Vec::new();
    for (warehouse_id, orders) in partitions {
        let values: Vec<f64> = orders.iter().map(|(_, d)| *d as f64).collect();
        let ranks = rank_descending(&values);
        let mut ranked: Vec<WarehouseOrderRank> = orders
            .into_iter()
            .zip(ranks)
            .map(|((order_id, delay), rank)| WarehouseOrderRank {
                warehouse_id: warehouse_id.to_string(),
                order_id: order_id.to_string(),
                delivery_delay_days: delay,
                delay_rank: rank,
            })
            .collect();
        ranked.sort_by(|a, b| {
            a.delay_rank
                .cmp(&b.delay_rank)
                .then_with(|| a.order_id.cmp(&b.order_id))
        });
        out.extend(ranked);
    }
    out
}

// ── Routes ─────────────────────────────────────────────────────────

/// Route lookup by id. The first row wins when ids repeat.
fn route_index(snapshot: &Snapshot) -> HashMap<&str, &Route> {
    let mut index = HashMap::new();
    for route in &snapshot.routes {
        index.entry(route.route_id.as_str()).or_insert(route);
    }
    index
}

/// Delivery time, traffic delay and efficiency for every route with orders.
pub fn route_performance(snapshot: &Snapshot) -> Vec<RoutePerformance> {
    let routes = route_index(snapshot);
    let mut transit: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for order in &snapshot.orders {
        let Some(route_id) = order.route_id.as_deref() else {
            continue;
        };
        if !routes.contains_key(route_id) {
            continue;
        }
        let days = transit.entry(route_id).or_default();
        if let Some(t) = order.transit_days() {
            days.push(t as f64);
        }
    }

    transit
        .into_iter()
        .map(|(route_id, days)| {
            let route = routes[route_id];
            RoutePerformance {
                route_id: route_id.to_string(),
                avg_delivery_days: mean(&days).map(|m| round_to(m, 2)),
                traffic_delay_min: route.traffic_delay_min,
                efficiency_ratio: route.efficiency_ratio().map(|r| round_to(r, 4)),
            }
        })
        .collect()
}

/// The `n` routes covering the least distance per minute of travel.
pub fn least_efficient_routes(snapshot: &Snapshot, n: usize) -> Vec<RouteEfficiency> {
    let mut rows: Vec<RouteEfficiency> = snapshot
        .routes
        .iter()
        .filter_map(|r| {
            let ratio = r.efficiency_ratio()?;
            Some(RouteEfficiency {
                route_id: r.route_id.clone(),
                distance_km: r.distance_km?,
                average_travel_time_min: r.average_travel_time_min?,
                efficiency_ratio: round_to(ratio, 4),
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        a.efficiency_ratio
            .total_cmp(&b.efficiency_ratio)
            .then_with(|| a.route_id.cmp(&b.route_id))
    });
    rows.truncate(n);
    rows
}

/// Routes whose share of `Delayed` orders exceeds `threshold` percent.
pub fn high_delay_share_routes(snapshot: &Snapshot, threshold: f64) -> Vec<RouteDelayShare> {
    let mut counts: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for order in &snapshot.orders {
        let Some(route_id) = order.route_id.as_deref() else {
            continue;
        };
        let entry = counts.entry(route_id).or_default();
        entry.0 += 1;
        if order.status.is_delayed() {
            entry.1 += 1;
        }
    }

    let mut rows: Vec<RouteDelayShare> = counts
        .into_iter()
        .map(|(route_id, (total, delayed))| RouteDelayShare {
            route_id: route_id.to_string(),
            total_orders: total,
            delayed_orders: delayed,
            delayed_pct: round_to(delayed as f64 / total as f64 * 100.0, 2),
        })
        .filter(|row| row.delayed_pct > threshold)
        .collect();
    rows.sort_by(|a, b| {
        b.delayed_pct
            .total_cmp(&a.delayed_pct)
            .then_with(|| a.route_id.cmp(&b.route_id))
    });
    rows
}

/// Average late days per route start location.
pub fn regional_delays(snapshot: &Snapshot) -> Vec<RegionalDelay> {
    let routes = route_index(snapshot);
    let mut late: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for order in &snapshot.orders {
        let Some(route) = order.route_id.as_deref().and_then(|id| routes.get(id)) else {
            continue;
        };
        let (Some(start), Some(delta)) = (route.start_location.as_deref(), order.delay_delta_days())
        else {
            continue;
        };
        if delta > 0 {
            late.entry(start).or_default().push(delta as f64);
        }
    }

    let mut rows: Vec<RegionalDelay> = late
        .into_iter()
        .filter_map(|(start, deltas)| {
            Some(RegionalDelay {
                start_location: start.to_string(),
                late_orders: deltas.len() as u64,
                avg_delay_days: round_to(mean(&deltas)?, 2),
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        b.avg_delay_days
            .total_cmp(&a.avg_delay_days)
            .then_with(|| a.start_location.cmp(&b.start_location))
    });
    rows
}

/// Mean stored traffic delay per route id.
pub fn route_traffic_delays(snapshot: &Snapshot) -> Vec<RouteTrafficDelay> {
    let mut delays: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for route in &snapshot.routes {
        if let Some(d) = route.traffic_delay_min {
            delays.entry(route.route_id.as_str()).or_default().push(d);
        }
    }
    delays
        .into_iter()
        .filter_map(|(route_id, values)| {
            Some(RouteTrafficDelay {
                route_id: route_id.to_string(),
                avg_traffic_delay_min: round_to(mean(&values)?, 2),
            })
        })
        .collect()
}

// ── Warehouses ─────────────────────────────────────────────────────

fn processing_rows(snapshot: &Snapshot) -> Vec<WarehouseProcessing> {
    snapshot
        .warehouses
        .iter()
        .filter_map(|w| {
            Some(WarehouseProcessing {
                warehouse_id: w.warehouse_id.clone(),
                location: w.location.clone(),
                processing_time_min: w.processing_time_min?,
            })
        })
        .collect()
}

/// The `n` warehouses with the longest processing time.
pub fn warehouse_bottlenecks(snapshot: &Snapshot, n: usize) -> Vec<WarehouseProcessing> {
    let mut rows = processing_rows(snapshot);
    rows.sort_by(|a, b| {
        b.processing_time_min
            .total_cmp(&a.processing_time_min)
            .then_with(|| a.warehouse_id.cmp(&b.warehouse_id))
    });
    rows.truncate(n);
    rows
}

/// Order volume and delayed count per warehouse.
pub fn warehouse_volume(snapshot: &Snapshot) -> Vec<WarehouseVolume> {
    let mut counts: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for order in &snapshot.orders {
        let Some(warehouse_id) = order.warehouse_id.as_deref() else {
            continue;
        };
        let entry = counts.entry(warehouse_id).or_default();
        entry.0 += 1;
        if order.status.is_delayed() {
            entry.1 += 1;
        }
    }
    counts
        .into_iter()
        .map(|(warehouse_id, (total, delayed))| WarehouseVolume {
            warehouse_id: warehouse_id.to_string(),
            total_orders: total,
            delayed_orders: delayed,
        })
        .collect()
}

/// Warehouses whose processing time is strictly above the mean of all warehouses.
pub fn above_average_processing(snapshot: &Snapshot) -> Option<ProcessingBottlenecks> {
    let rows = processing_rows(snapshot);
    let times: Vec<f64> = rows.iter().map(|r| r.processing_time_min).collect();
    let average = mean(&times)?;

    let mut warehouses: Vec<WarehouseProcessing> = rows
        .into_iter()
        .filter(|r| r.processing_time_min > average)
        .collect();
    warehouses.sort_by(|a, b| {
        b.processing_time_min
            .total_cmp(&a.processing_time_min)
            .then_with(|| a.warehouse_id.cmp(&b.warehouse_id))
    });
    Some(ProcessingBottlenecks {
        average_processing_time_min: round_to(average, 2),
        warehouses,
    })
}

/// Warehouses ranked by on-time share of their orders.
pub fn warehouse_on_time_ranking(snapshot: &Snapshot) -> Vec<WarehouseOnTimeRank> {
    let mut counts: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for order in &snapshot.orders {
        let Some(warehouse_id) = order.warehouse_id.as_deref() else {
            continue;
        };
        let entry = counts.entry(warehouse_id).or_default();
        entry.0 += 1;
        if order.status.is_on_time() {
            entry.1 += 1;
        }
    }

    let rows: Vec<(&str, u64, u64, f64)> = counts
        .into_iter()
        .map(|(id, (total, on_time))| {
            (id, total, on_time, round_to(on_time as f64 / total as f64 * 100.0, 2))
        })
        .collect();
    let values: Vec<f64> = rows.iter().map(|r| r.3).collect();
    let ranks = rank_descending(&values);

    let mut out: Vec<WarehouseOnTimeRank> = rows
        .into_iter()
        .zip(ranks)
        .map(|((id, total, on_time, pct), rank)| WarehouseOnTimeRank {
            warehouse_id: id.to_string(),
            total_orders: total,
            on_time_orders: on_time,
            on_time_pct: pct,
            rank,
        })
        .collect();
    out.sort_by(|a, b| {
        a.rank
            .cmp(&b.rank)
            .then_with(|| a.warehouse_id.cmp(&b.warehouse_id))
    });
    out
}

// ── Agents ─────────────────────────────────────────────────────────

/// Agents ranked by on-time percentage within their route.
pub fn agent_route_ranking(snapshot: &Snapshot) -> Vec<AgentRouteRank> {
    let mut partitions: BTreeMap<&str, Vec<(&str, f64)>> = BTreeMap::new();
    for agent in &snapshot.agents {
        let (Some(route_id), Some(pct)) = (agent.route_id.as_deref(), agent.on_time_pct) else {
            continue;
        };
        partitions
            .entry(route_id)
            .or_default()
            .push((agent.agent_id.as_str(), pct));
    }

    let mut out = Vec::new();
    for (route_id, agents) in partitions {
        let values: Vec<f64> = agents.iter().map(|(_, p)| *p).collect();
        let ranks = rank_descending(&values);
        let mut ranked: Vec<AgentRouteRank> = agents
            .into_iter()
            .zip(ranks)
            .map(|((agent_id, pct), rank)| AgentRouteRank {
                route_id: route_id.to_string(),
                agent_id: agent_id.to_string(),
                on_time_pct: pct,
                rank,
            })
            .collect();
        ranked.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.agent_id.cmp(&b.agent_id)));
        out.extend(ranked);
    }
    out
}

fn agents_by_on_time(snapshot: &Snapshot) -> Vec<AgentPerformance> {
    let mut agents: Vec<AgentPerformance> = snapshot
        .agents
        .iter()
        .filter_map(|a| {
            Some(AgentPerformance {
                agent_id: a.agent_id.clone(),
                route_id: a.route_id.clone(),
                on_time_pct: a.on_time_pct?,
                avg_speed_km_hr: a.avg_speed_km_hr,
            })
        })
        .collect();
    agents.sort_by(|a, b| {
        a.on_time_pct
            .total_cmp(&b.on_time_pct)
            .then_with(|| a.agent_id.cmp(&b.agent_id))
    });
    agents
}

/// Agents below `threshold` percent on-time, worst first.
pub fn underperforming_agents(snapshot: &Snapshot, threshold: f64) -> Vec<AgentPerformance> {
    agents_by_on_time(snapshot)
        .into_iter()
        .filter(|a| a.on_time_pct < threshold)
        .collect()
}

/// Average speed of the `n` most and `n` least punctual agents.
pub fn agent_speed_comparison(snapshot: &Snapshot, n: usize) -> Vec<SpeedComparison> {
    let ascending = agents_by_on_time(snapshot);
    let mut descending = ascending.clone();
    descending.sort_by(|a, b| {
        b.on_time_pct
            .total_cmp(&a.on_time_pct)
            .then_with(|| a.agent_id.cmp(&b.agent_id))
    });

    let summarize = |label: &str, agents: &[AgentPerformance]| -> Option<SpeedComparison> {
        let speeds: Vec<f64> = agents.iter().filter_map(|a| a.avg_speed_km_hr).collect();
        Some(SpeedComparison {
            group: label.to_string(),
            agent_count: speeds.len() as u64,
            avg_speed_km_hr: round_to(mean(&speeds)?, 2),
        })
    };

    let take = n.min(ascending.len());
    [
        summarize(&format!("Top {n}"), &descending[..take]),
        summarize(&format!("Bottom {n}"), &ascending[..take]),
    ]
    .into_iter()
    .flatten()
    .collect()
}

// ── Shipment tracking ──────────────────────────────────────────────

/// Latest checkpoint per order. Equal timestamps go to the highest `shipment_id`.
pub fn last_checkpoints(snapshot: &Snapshot) -> Vec<LastCheckpoint> {
    let mut latest: BTreeMap<&str, &ShipmentCheckpoint> = BTreeMap::new();
    for cp in &snapshot.checkpoints {
        let Some(time) = cp.checkpoint_time else {
            continue;
        };
        let newer = match latest.get(cp.order_id.as_str()) {
            Some(best) => (best.checkpoint_time, best.shipment_id) < (Some(time), cp.shipment_id),
            None => true,
        };
        if newer {
            latest.insert(cp.order_id.as_str(), cp);
        }
    }

    latest
        .into_values()
        .filter_map(|cp| {
            Some(LastCheckpoint {
                order_id: cp.order_id.clone(),
                shipment_id: cp.shipment_id,
                checkpoint: cp.checkpoint.clone(),
                checkpoint_time: cp.checkpoint_time?.format(TIMESTAMP_FORMAT).to_string(),
                delay_reason: cp.delay_reason.clone(),
            })
        })
        .collect()
}

/// How often each delay reason was recorded, most frequent first.
pub fn delay_reason_frequency(snapshot: &Snapshot) -> Vec<DelayReasonCount> {
    let mut counts: BTreeMap<&DelayReason, u64> = BTreeMap::new();
    for cp in &snapshot.checkpoints {
        if cp.delay_reason.is_delay() {
            *counts.entry(&cp.delay_reason).or_default() += 1;
        }
    }
    let mut rows: Vec<DelayReasonCount> = counts
        .into_iter()
        .map(|(reason, occurrences)| DelayReasonCount {
            delay_reason: reason.clone(),
            occurrences,
        })
        .collect();
    // Stable sort keeps reasons with equal counts in enum order.
    rows.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));
    rows
}

/// Orders with more than `threshold` delay checkpoints.
pub fn severely_delayed_orders(snapshot: &Snapshot, threshold: u64) -> Vec<SevereDelay> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for cp in &snapshot.checkpoints {
        if cp.delay_reason.is_delay() {
            *counts.entry(cp.order_id.as_str()).or_default() += 1;
        }
    }
    let mut rows: Vec<SevereDelay> = counts
        .into_iter()
        .filter(|(_, n)| *n > threshold)
        .map(|(order_id, n)| SevereDelay {
            order_id: order_id.to_string(),
            delay_checkpoints: n,
        })
        .collect();
    rows.sort_by(|a, b| b.delay_checkpoints.cmp(&a.delay_checkpoints));
    rows
}

// ── KPIs ───────────────────────────────────────────────────────────

/// Network-wide on-time percentage. `None` when there are no orders.
pub fn overall_on_time(snapshot: &Snapshot) -> Option<OnTimeSummary> {
    let total = snapshot.orders.len() as u64;
    if total == 0 {
        return None;
    }
    let on_time = snapshot
        .orders
        .iter()
        .filter(|o| o.status.is_on_time())
        .count() as u64;
    Some(OnTimeSummary {
        total_orders: total,
        on_time_orders: on_time,
        on_time_pct: round_to(on_time as f64 / total as f64 * 100.0, 2),
    })
}
