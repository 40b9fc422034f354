use std::sync::Arc;

use axum::extract::{Path, State};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::api::rest::rate_limit::verify_rate_limit;
use crate::auth::{require_role, CallerIdentity, Role};
use crate::engine::lifecycle;
use crate::error::AppError;
use crate::models::order::{Order, OrderRecord};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/orders/verify-delivery",
            post(verify_delivery).route_layer(from_fn_with_state(state, verify_rate_limit)),
        )
        .route("/orders/:order_number", get(get_order))
        .route("/orders/:order_number/assign", post(assign_delivery))
        .route("/orders/:order_number/start", post(start_delivery))
        .route("/orders/:order_number/cancel", post(cancel_order))
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub staff_id: u64,
    pub collector_phone: String,
}

#[derive(Deserialize)]
pub struct VerifyDeliveryRequest {
    pub order_id: String,
    pub delivery_code: String,
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    Path(order_number): Path<String>,
) -> Result<Json<OrderRecord>, AppError> {
    let record = lifecycle::get_order(&state, &order_number)?;

    // Customers only see their own orders; staff and admin see all.
    if caller.role == Role::Customer && record.order.customer_id != caller.caller_id {
        return Err(AppError::Forbidden);
    }

    Ok(Json(record))
}

async fn assign_delivery(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    Path(order_number): Path<String>,
    Json(payload): Json<AssignRequest>,
) -> Result<Json<Order>, AppError> {
    require_role(&caller, Role::Admin)?;

    if payload.collector_phone.trim().is_empty() {
        return Err(AppError::Validation(
            "collector_phone cannot be empty".to_string(),
        ));
    }

    let order = lifecycle::assign_delivery(
        &state,
        &order_number,
        payload.staff_id,
        payload.collector_phone,
    )?;
    Ok(Json(order))
}

async fn start_delivery(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    Path(order_number): Path<String>,
) -> Result<Json<Order>, AppError> {
    require_role(&caller, Role::DeliveryStaff)?;

    let order = lifecycle::start_delivery(&state, &order_number, caller.caller_id)?;
    Ok(Json(order))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    Path(order_number): Path<String>,
) -> Result<Json<Order>, AppError> {
    if caller.role == Role::Customer {
        let record = lifecycle::get_order(&state, &order_number)?;
        if record.order.customer_id != caller.caller_id {
            return Err(AppError::Forbidden);
        }
    }

    let order = lifecycle::cancel_order(&state, &order_number)?;
    Ok(Json(order))
}

/// The handoff handshake. Role is checked before anything touches the
/// order, so a customer probing codes learns nothing from this endpoint.
async fn verify_delivery(
    State(state): State<Arc<AppState>>,
    caller: CallerIdentity,
    Json(payload): Json<VerifyDeliveryRequest>,
) -> Result<Json<Order>, AppError> {
    require_role(&caller, Role::DeliveryStaff)?;

    if payload.order_id.trim().is_empty() {
        return Err(AppError::Validation("order_id is required".to_string()));
    }

    let code = payload.delivery_code.trim();
    if code.len() != 4 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(
            "Delivery code must be exactly 4 digits.".to_string(),
        ));
    }

    let order =
        lifecycle::verify_handshake(&state, payload.order_id.trim(), code, caller.caller_id)?;
    Ok(Json(order))
}
