use serde::Serialize;

use crate::model::DelayReason;

/// Delivery delay of one order, clamped at zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDelay {
    pub order_id: String,
    pub delivery_delay_days: i64,
}

/// Average lateness of a route's late orders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDelay {
    pub route_id: String,
    pub avg_delay_days: f64,
}

/// An order's delay rank inside its warehouse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarehouseOrderRank {
    pub warehouse_id: String,
    pub order_id: String,
    pub delivery_delay_days: i64,
    pub delay_rank: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePerformance {
    pub route_id: String,
    /// Mean days from order to delivery over the route's orders.
    pub avg_delivery_days: Option<f64>,
    pub traffic_delay_min: Option<f64>,
    /// `distance_km / average_travel_time_min`, 4 decimals.
    pub efficiency_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteEfficiency {
    pub route_id: String,
    pub distance_km: f64,
    pub average_travel_time_min: f64,
    pub efficiency_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDelayShare {
    pub route_id: String,
    pub total_orders: u64,
    pub delayed_orders: u64,
    pub delayed_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarehouseProcessing {
    pub warehouse_id: String,
    pub location: Option<String>,
    pub processing_time_min: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarehouseVolume {
    pub warehouse_id: String,
    pub total_orders: u64,
    pub delayed_orders: u64,
}

/// Warehouses above the network-wide mean processing time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingBottlenecks {
    pub average_processing_time_min: f64,
    pub warehouses: Vec<WarehouseProcessing>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarehouseOnTimeRank {
    pub warehouse_id: String,
    pub total_orders: u64,
    pub on_time_orders: u64,
    pub on_time_pct: f64,
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentRouteRank {
    pub route_id: String,
    pub agent_id: String,
    pub on_time_pct: f64,
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentPerformance {
    pub agent_id: String,
    pub route_id: Option<String>,
    pub on_time_pct: f64,
    pub avg_speed_km_hr: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedComparison {
    pub group: String,
    pub agent_count: u64,
    pub avg_speed_km_hr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastCheckpoint {
    pub order_id: String,
    pub shipment_id: i64,
    pub checkpoint: Option<String>,
    pub checkpoint_time: String,
    pub delay_reason: DelayReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelayReasonCount {
    pub delay_reason: DelayReason,
    pub occurrences: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SevereDelay {
    pub order_id: String,
    pub delay_checkpoints: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionalDelay {
    pub start_location: String,
    pub late_orders: u64,
    pub avg_delay_days: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnTimeSummary {
    pub total_orders: u64,
    pub on_time_orders: u64,
    pub on_time_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteTrafficDelay {
    pub route_id: String,
    pub avg_traffic_delay_min: f64,
}

/// Every metric computed over one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub options: ReportOptions,
    pub delivery_delays: Vec<OrderDelay>,
    pub top_delayed_routes: Vec<RouteDelay>,
    pub warehouse_delay_ranking: Vec<WarehouseOrderRank>,
    pub route_performance: Vec<RoutePerformance>,
    pub least_efficient_routes: Vec<RouteEfficiency>,
    pub high_delay_share_routes: Vec<RouteDelayShare>,
    pub warehouse_bottlenecks: Vec<WarehouseProcessing>,
    pub warehouse_volume: Vec<WarehouseVolume>,
    pub above_average_processing: Option<ProcessingBottlenecks>,
    pub warehouse_on_time_ranking: Vec<WarehouseOnTimeRank>,
    pub agent_route_ranking: Vec<AgentRouteRank>,
    pub underperforming_agents: Vec<AgentPerformance>,
    pub agent_speed_comparison: Vec<SpeedComparison>,
    pub last_checkpoints: Vec<LastCheckpoint>,
    pub delay_reason_frequency: Vec<DelayReasonCount>,
    pub severely_delayed_orders: Vec<SevereDelay>,
    pub regional_delays: Vec<RegionalDelay>,
    pub overall_on_time: Option<OnTimeSummary>,
    pub route_traffic_delays: Vec<RouteTrafficDelay>,
}

/// Thresholds and list lengths for a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportOptions {
    /// Routes listed in the top delayed routes.
    pub top_n: usize,
    pub least_efficient_n: usize,
    pub bottleneck_n: usize,
    /// Delayed share (percent) a route must exceed to be listed.
    pub delayed_share_threshold: f64,
    /// On-time percentage below which an agent underperforms.
    pub sla_threshold: f64,
    /// Agents averaged at each end of the speed comparison.
    pub speed_sample_n: usize,
    /// Delay checkpoints an order must exceed to count as severely delayed.
    pub severe_delay_threshold: u64,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            top_n: 10,
            least_efficient_n: 3,
            bottleneck_n: 3,
            delayed_share_threshold: 20.0,
            sla_threshold: 80.0,
            speed_sample_n: 5,
            severe_delay_threshold: 2,
        }
    }
}
