use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::api::rest::rate_limit::RateLimiter;
use crate::config::Config;
use crate::models::order::{FulfillmentEvent, OrderRecord};
use crate::models::zone::{DeliveryLocation, DeliveryZone};
use crate::observability::metrics::Metrics;

pub struct AppState {
    pub zones: DashMap<u32, DeliveryZone>,
    pub locations: DashMap<u32, DeliveryLocation>,
    /// Order plus its owned delivery record, guarded as one entry. All
    /// lifecycle transitions go through `engine::lifecycle`; nothing else
    /// mutates these records.
    pub orders: DashMap<Uuid, OrderRecord>,
    /// External order number -> internal id.
    pub order_numbers: DashMap<String, Uuid>,
    pub fulfillment_events_tx: broadcast::Sender<FulfillmentEvent>,
    pub verify_limiter: RateLimiter,
    pub metrics: Metrics,
    pub max_gps_accuracy_m: f64,
    pub allow_geofence_bypass: bool,
    zone_id_seq: AtomicU32,
    location_id_seq: AtomicU32,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let (fulfillment_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        Self {
            zones: DashMap::new(),
            locations: DashMap::new(),
            orders: DashMap::new(),
            order_numbers: DashMap::new(),
            fulfillment_events_tx,
            verify_limiter: RateLimiter::new(
                config.verify_max_attempts,
                config.verify_window_secs,
            ),
            metrics: Metrics::new(),
            max_gps_accuracy_m: config.max_gps_accuracy_m,
            allow_geofence_bypass: config.allow_geofence_bypass,
            zone_id_seq: AtomicU32::new(1),
            location_id_seq: AtomicU32::new(1),
        }
    }

    /// Zone ids are handed out in creation order; the resolver's tie-break
    /// iterates them ascending.
    pub fn next_zone_id(&self) -> u32 {
        self.zone_id_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_location_id(&self) -> u32 {
        self.location_id_seq.fetch_add(1, Ordering::Relaxed)
    }
}
