use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::models::zone::{DeliveryLocation, DeliveryZone, GeoPoint, ZoneArea};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/zones", post(create_zone).get(list_zones))
        .route("/zones/:id/active", patch(set_zone_active))
        .route("/locations", post(create_location).get(list_locations))
        .route("/locations/:id/active", patch(set_location_active))
}

#[derive(Deserialize)]
pub struct CreateZoneRequest {
    pub name: String,
    pub delivery_fee: f64,
    pub area: ZoneArea,
}

#[derive(Deserialize)]
pub struct CreateLocationRequest {
    pub name: String,
    pub bounds: Vec<GeoPoint>,
}

#[derive(Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

async fn create_zone(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    Json(payload): Json<CreateZoneRequest>,
) -> Result<Json<DeliveryZone>, AppError> {
    require_role(&caller, Role::Admin)?;

    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }

    match &payload.area {
        ZoneArea::Radius { radius_m, .. } if *radius_m <= 0.0 => {
            return Err(AppError::Validation("radius_m must be > 0".to_string()));
        }
        ZoneArea::Polygon { vertices } if vertices.len() < 3 => {
            return Err(AppError::Validation(
                "polygon needs at least 3 vertices".to_string(),
            ));
        }
        _ => {}
    }

    let zone = DeliveryZone {
        id: state.next_zone_id(),
        name: payload.name,
        active: true,
        delivery_fee: payload.delivery_fee,
        area: payload.area,
    };

    state.zones.insert(zone.id, zone.clone());
    Ok(Json(zone))
}

async fn list_zones(State(state): State<Arc<AppState>>) -> Json<Vec<DeliveryZone>> {
    let mut zones: Vec<DeliveryZone> = state
        .zones
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    zones.sort_by_key(|zone| zone.id);
    Json(zones)
}

/// Zones are only ever deactivated, never removed, so orders created while
/// a zone was live keep a resolvable reference.
async fn set_zone_active(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    Path(id): Path<u32>,
    Json(payload): Json<SetActiveRequest>,
) -> Result<Json<DeliveryZone>, AppError> {
    require_role(&caller, Role::Admin)?;

    let mut zone = state
        .zones
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("zone {id} not found")))?;

    zone.active = payload.active;
    Ok(Json(zone.clone()))
}

async fn create_location(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    Json(payload): Json<CreateLocationRequest>,
) -> Result<Json<DeliveryLocation>, AppError> {
    require_role(&caller, Role::Admin)?;

    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }

    if payload.bounds.len() < 3 {
        return Err(AppError::Validation(
            "bounds needs at least 3 vertices".to_string(),
        ));
    }

    let location = DeliveryLocation {
        id: state.next_location_id(),
        name: payload.name,
        active: true,
        bounds: payload.bounds,
    };

    state.locations.insert(location.id, location.clone());
    Ok(Json(location))
}

async fn list_locations(State(state): State<Arc<AppState>>) -> Json<Vec<DeliveryLocation>> {
    let mut locations: Vec<DeliveryLocation> = state
        .locations
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    locations.sort_by_key(|location| location.id);
    Json(locations)
}

async fn set_location_active(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    Path(id): Path<u32>,
    Json(payload): Json<SetActiveRequest>,
) -> Result<Json<DeliveryLocation>, AppError> {
    require_role(&caller, Role::Admin)?;

    let mut location = state
        .locations
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("location {id} not found")))?;

    location.active = payload.active;
    Ok(Json(location.clone()))
}
