use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::delivery::Delivery;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    OutForDelivery,
    Delivered,
    Cancelled,
}

/// Delivery-facing progress mirrored onto the order, so customer-visible
/// order reads never have to join against the delivery record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryProgress {
    Pending,
    Assigned,
    OutForDelivery,
    Delivered,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: u64,
    pub zone_id: Option<u32>,
    pub location_id: Option<u32>,
    pub delivery_fee: f64,
    /// 4-digit shared secret generated once at creation, never regenerated.
    pub delivery_code: String,
    pub status: OrderStatus,
    pub delivery_status: DeliveryProgress,
    pub delivered_at: Option<DateTime<Utc>>,
    pub delivered_by: Option<u64>,
    pub created_at: DateTime<Utc>,
}

/// An order and the delivery assignment it owns, stored as one record so
/// every transition mutates both sides under a single exclusive reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order: Order,
    pub delivery: Option<Delivery>,
}

/// Broadcast once per completed transition; the notification collaborator
/// subscribes to these. Verify emits exactly one `Delivered` per order.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FulfillmentEvent {
    Assigned { order_number: String, staff_id: u64 },
    PickedUp { order_number: String, staff_id: u64 },
    Delivered { order_number: String, staff_id: u64 },
}

/// Random 4-digit handoff code. Scoped per order; collisions across orders
/// are harmless because verification looks the order up by number first.
pub fn generate_delivery_code() -> String {
    format!("{:04}", rand::thread_rng().gen_range(0..10_000))
}

/// Externally visible order number, e.g. `CM-20260829-483920`.
pub fn generate_order_number(created_at: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("CM-{}-{:06}", created_at.format("%Y%m%d"), suffix)
}
