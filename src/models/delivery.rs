use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Assigned,
    InTransit,
    Delivered,
    Failed,
}

/// Assignment record for a single order, one-to-one with it. Status only
/// moves forward: assigned, in_transit, then delivered or failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub staff_id: u64,
    pub collector_phone: String,
    pub status: DeliveryStatus,
    pub assigned_at: DateTime<Utc>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Delivery {
    pub fn new(staff_id: u64, collector_phone: String) -> Self {
        Self {
            staff_id,
            collector_phone,
            status: DeliveryStatus::Assigned,
            assigned_at: Utc::now(),
            picked_up_at: None,
            delivered_at: None,
        }
    }
}
