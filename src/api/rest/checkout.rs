use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::auth::CallerIdentity;
use crate::engine::{geofence, lifecycle};
use crate::error::AppError;
use crate::models::order::Order;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/checkout", post(checkout))
}

/// Coordinates arrive as raw JSON values so that a string `"6.67"` or a
/// missing field produces the checkout validation message instead of a
/// generic deserialization error.
#[derive(Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub latitude: Option<Value>,
    #[serde(default)]
    pub longitude: Option<Value>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub delivery_location_id: Option<u32>,
}

async fn checkout(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<Order>, AppError> {
    let (lat, lng) = extract_coordinates(&payload)?;

    if let Some(accuracy) = payload.accuracy {
        if accuracy > state.max_gps_accuracy_m {
            return Err(AppError::Validation(
                "GPS accuracy is too low. Please move to an open area and try again.".to_string(),
            ));
        }
    }

    let (zone_id, location_id, delivery_fee) =
        match geofence::find_valid_delivery_zone(&state, lat, lng) {
            Some(geofence::ZoneMatch::Zone(zone)) => {
                state.metrics.record_geofence("matched");
                (Some(zone.id), payload.delivery_location_id, zone.delivery_fee)
            }
            Some(geofence::ZoneMatch::Location(location)) => {
                state.metrics.record_geofence("matched");
                (None, Some(location.id), 0.0)
            }
            None => {
                let bypass_location = payload.delivery_location_id.filter(|id| {
                    state
                        .locations
                        .get(id)
                        .map(|location| location.active)
                        .unwrap_or(false)
                });

                if state.allow_geofence_bypass && bypass_location.is_some() {
                    state.metrics.record_geofence("bypassed");
                    info!(lat, lng, "geofence bypassed for pre-selected location");
                    (None, bypass_location, 0.0)
                } else {
                    state.metrics.record_geofence("no_match");
                    return Err(AppError::NoZoneMatch);
                }
            }
        };

    let order = lifecycle::create_order(
        &state,
        caller.caller_id,
        zone_id,
        location_id,
        delivery_fee,
    );

    Ok(Json(order))
}

fn extract_coordinates(payload: &CheckoutRequest) -> Result<(f64, f64), AppError> {
    let lat = payload.latitude.as_ref().and_then(Value::as_f64);
    let lng = payload.longitude.as_ref().and_then(Value::as_f64);

    match (lat, lng) {
        (Some(lat), Some(lng))
            if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) =>
        {
            Ok((lat, lng))
        }
        _ => Err(AppError::Validation(
            "Valid latitude and longitude are required for checkout.".to_string(),
        )),
    }
}
