use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};

/// Delivery status of an order. Unrecognized labels are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeliveryStatus {
    OnTime,
    Delayed,
    Other(String),
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &str {
        match self {
            DeliveryStatus::OnTime => "On Time",
            DeliveryStatus::Delayed => "Delayed",
            DeliveryStatus::Other(s) => s,
        }
    }

    pub fn is_on_time(&self) -> bool {
        matches!(self, DeliveryStatus::OnTime)
    }

    pub fn is_delayed(&self) -> bool {
        matches!(self, DeliveryStatus::Delayed)
    }

    /// Parse a free-text status label; never fails.
    pub fn from_label(s: &str) -> Self {
        let trimmed = s.trim();
        let folded: String = trimmed
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match folded.as_str() {
            "ontime" => DeliveryStatus::OnTime,
            "delayed" | "late" => DeliveryStatus::Delayed,
            _ => DeliveryStatus::Other(trimmed.to_string()),
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_label(s))
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DeliveryStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Reason recorded at a shipment checkpoint. `None` means no delay.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DelayReason {
    None,
    Traffic,
    Weather,
    MechanicalFailure,
    AddressIssue,
    Other(String),
}

impl DelayReason {
    pub fn as_str(&self) -> &str {
        match self {
            DelayReason::None => "None",
            DelayReason::Traffic => "Traffic",
            DelayReason::Weather => "Weather",
            DelayReason::MechanicalFailure => "Mechanical Failure",
            DelayReason::AddressIssue => "Address Issue",
            DelayReason::Other(s) => s,
        }
    }

    pub fn is_delay(&self) -> bool {
        !matches!(self, DelayReason::None)
    }

    /// Parse a free-text reason label. Empty input is read as `None`.
    pub fn from_label(s: &str) -> Self {
        let trimmed = s.trim();
        let folded: String = trimmed
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match folded.as_str() {
            "" | "none" => DelayReason::None,
            "traffic" => DelayReason::Traffic,
            "weather" => DelayReason::Weather,
            "mechanicalfailure" => DelayReason::MechanicalFailure,
            "addressissue" => DelayReason::AddressIssue,
            _ => DelayReason::Other(trimmed.to_string()),
        }
    }
}

impl FromStr for DelayReason {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_label(s))
    }
}

impl fmt::Display for DelayReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DelayReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub order_id: String,
    pub route_id: Option<String>,
    pub warehouse_id: Option<String>,
    pub order_date: Option<NaiveDate>,
    pub expected_delivery_date: Option<NaiveDate>,
    pub actual_delivery_date: Option<NaiveDate>,
    pub status: DeliveryStatus,
}

impl Order {
    /// Signed days between expected and actual delivery.
    pub fn delay_delta_days(&self) -> Option<i64> {
        Some(crate::date_util::days_between(
            self.expected_delivery_date?,
            self.actual_delivery_date?,
        ))
    }

    /// Days from order placement to delivery.
    pub fn transit_days(&self) -> Option<i64> {
        Some(crate::date_util::days_between(
            self.order_date?,
            self.actual_delivery_date?,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub route_id: String,
    pub start_location: Option<String>,
    pub end_location: Option<String>,
    pub distance_km: Option<f64>,
    pub average_travel_time_min: Option<f64>,
    pub traffic_delay_min: Option<f64>,
}

impl Route {
    /// Distance covered per minute of average travel time.
    pub fn efficiency_ratio(&self) -> Option<f64> {
        let distance = self.distance_km?;
        let time = self.average_travel_time_min?;
        if time == 0.0 {
            return None;
        }
        Some(distance / time)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warehouse {
    pub warehouse_id: String,
    pub location: Option<String>,
    pub processing_time_min: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryAgent {
    pub agent_id: String,
    pub route_id: Option<String>,
    pub on_time_pct: Option<f64>,
    pub avg_speed_km_hr: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShipmentCheckpoint {
    pub shipment_id: i64,
    pub order_id: String,
    pub checkpoint: Option<String>,
    pub checkpoint_time: Option<NaiveDateTime>,
    pub delay_reason: DelayReason,
}

/// The five tables a report is computed from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub orders: Vec<Order>,
    pub routes: Vec<Route>,
    pub warehouses: Vec<Warehouse>,
    pub agents: Vec<DeliveryAgent>,
    pub checkpoints: Vec<ShipmentCheckpoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        assert_eq!("On Time".parse::<DeliveryStatus>().unwrap(), DeliveryStatus::OnTime);
        assert_eq!("on-time".parse::<DeliveryStatus>().unwrap(), DeliveryStatus::OnTime);
        assert_eq!(" DELAYED ".parse::<DeliveryStatus>().unwrap(), DeliveryStatus::Delayed);
        assert_eq!(
            "Cancelled".parse::<DeliveryStatus>().unwrap(),
            DeliveryStatus::Other("Cancelled".into())
        );
    }

    #[test]
    fn test_reason_parsing() {
        assert_eq!("None".parse::<DelayReason>().unwrap(), DelayReason::None);
        assert_eq!("".parse::<DelayReason>().unwrap(), DelayReason::None);
        assert_eq!("traffic".parse::<DelayReason>().unwrap(), DelayReason::Traffic);
        assert_eq!(
            "Mechanical failure".parse::<DelayReason>().unwrap(),
            DelayReason::MechanicalFailure
        );
        let other = "Customs Hold".parse::<DelayReason>().unwrap();
        assert_eq!(other, DelayReason::Other("Customs Hold".into()));
        assert!(other.is_delay());
        assert_eq!(other.to_string(), "Customs Hold");
    }

    #[test]
    fn test_efficiency_ratio() {
        let mut route = Route {
            route_id: "R1".into(),
            start_location: None,
            end_location: None,
            distance_km: Some(100.0),
            average_travel_time_min: Some(50.0),
            traffic_delay_min: None,
        };
        assert_eq!(route.efficiency_ratio(), Some(2.0));
        route.average_travel_time_min = Some(0.0);
        assert_eq!(route.efficiency_ratio(), None);
    }

    #[test]
    fn test_status_serializes_as_label() {
        let json = serde_json::to_string(&DeliveryStatus::OnTime).unwrap();
        assert_eq!(json, "\"On Time\"");
    }
}
