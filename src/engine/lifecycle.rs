//! Order fulfillment state machine.
//!
//! Every transition takes the order's map entry exclusively and mutates the
//! order and its owned delivery record together, so callers never observe a
//! half-applied transition. Concurrent calls against one order serialize on
//! that entry; each re-reads the current status once it holds the lock.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::order::{
    generate_delivery_code, generate_order_number, DeliveryProgress, FulfillmentEvent, Order,
    OrderRecord, OrderStatus,
};
use crate::state::AppState;

/// Create the fulfillment record for a zone-validated checkout. The delivery
/// code is generated here and never again for this order.
pub fn create_order(
    state: &AppState,
    customer_id: u64,
    zone_id: Option<u32>,
    location_id: Option<u32>,
    delivery_fee: f64,
) -> Order {
    let created_at = Utc::now();
    let order = Order {
        id: Uuid::new_v4(),
        order_number: generate_order_number(created_at),
        customer_id,
        zone_id,
        location_id,
        delivery_fee,
        delivery_code: generate_delivery_code(),
        status: OrderStatus::Pending,
        delivery_status: DeliveryProgress::Pending,
        delivered_at: None,
        delivered_by: None,
        created_at,
    };

    state.orders.insert(
        order.id,
        OrderRecord {
            order: order.clone(),
            delivery: None,
        },
    );
    state
        .order_numbers
        .insert(order.order_number.clone(), order.id);
    state.metrics.open_orders.inc();

    info!(
        order_number = %order.order_number,
        customer_id,
        zone_id,
        "order created"
    );

    order
}

/// Attach a delivery worker to a pending order.
pub fn assign_delivery(
    state: &AppState,
    order_number: &str,
    staff_id: u64,
    collector_phone: String,
) -> Result<Order, AppError> {
    let id = resolve_order_id(state, order_number)?;
    let mut record = entry(state, id)?;

    if record.order.status != OrderStatus::Pending || record.delivery.is_some() {
        return Err(AppError::InvalidTransition(format!(
            "order {order_number} cannot be assigned while {}",
            status_name(record.order.status)
        )));
    }

    record.delivery = Some(Delivery::new(staff_id, collector_phone));
    record.order.status = OrderStatus::Processing;
    record.order.delivery_status = DeliveryProgress::Assigned;

    let order = record.order.clone();
    let _ = state.fulfillment_events_tx.send(FulfillmentEvent::Assigned {
        order_number: order.order_number.clone(),
        staff_id,
    });

    info!(order_number, staff_id, "delivery assigned");
    Ok(order)
}

/// Staff picked up the package and is heading out. Only valid once, from
/// `assigned`; a repeat call on an in-transit delivery is an error, not a
/// no-op.
pub fn start_delivery(
    state: &AppState,
    order_number: &str,
    staff_id: u64,
) -> Result<Order, AppError> {
    let id = resolve_order_id(state, order_number)?;
    let mut record = entry(state, id)?;

    let delivery = record.delivery.as_mut().ok_or_else(|| {
        AppError::InvalidTransition(format!("order {order_number} has no assigned delivery"))
    })?;

    if delivery.status != DeliveryStatus::Assigned {
        return Err(AppError::InvalidTransition(format!(
            "delivery for order {order_number} is not awaiting pickup"
        )));
    }

    delivery.status = DeliveryStatus::InTransit;
    delivery.picked_up_at = Some(Utc::now());
    record.order.status = OrderStatus::OutForDelivery;
    record.order.delivery_status = DeliveryProgress::OutForDelivery;

    let order = record.order.clone();
    let _ = state.fulfillment_events_tx.send(FulfillmentEvent::PickedUp {
        order_number: order.order_number.clone(),
        staff_id,
    });

    info!(order_number, staff_id, "delivery started");
    Ok(order)
}

/// The handoff handshake: compare the customer-presented code and, on a
/// match, finalize both records in one step.
///
/// Mismatches mutate nothing. The stored code is never echoed back.
pub fn verify_handshake(
    state: &AppState,
    order_number: &str,
    submitted_code: &str,
    staff_id: u64,
) -> Result<Order, AppError> {
    let id = resolve_order_id(state, order_number)?;
    let mut record = entry(state, id)?;

    if record.order.status == OrderStatus::Delivered {
        state.metrics.record_verify("already_delivered");
        return Err(AppError::AlreadyDelivered);
    }

    // Cancelled is terminal, and the handshake only makes sense once the
    // package is actually out; a correct code must not move the order from
    // any earlier or terminal state.
    if record.order.status != OrderStatus::OutForDelivery {
        state.metrics.record_verify("invalid_state");
        return Err(AppError::InvalidTransition(format!(
            "order {order_number} is not out for delivery"
        )));
    }

    if record.order.delivery_code != submitted_code {
        state.metrics.record_verify("invalid_code");
        info!(order_number, staff_id, "delivery code mismatch");
        return Err(AppError::InvalidCode);
    }

    let now = Utc::now();
    record.order.status = OrderStatus::Delivered;
    record.order.delivery_status = DeliveryProgress::Delivered;
    record.order.delivered_at = Some(now);
    record.order.delivered_by = Some(staff_id);

    if let Some(delivery) = record.delivery.as_mut() {
        delivery.status = DeliveryStatus::Delivered;
        delivery.delivered_at = Some(now);
    }

    let order = record.order.clone();
    let _ = state
        .fulfillment_events_tx
        .send(FulfillmentEvent::Delivered {
            order_number: order.order_number.clone(),
            staff_id,
        });
    state.metrics.record_verify("delivered");
    state.metrics.open_orders.dec();

    info!(order_number, staff_id, "order delivered");
    Ok(order)
}

/// Cancellation window closes once the package is out the door.
pub fn cancel_order(state: &AppState, order_number: &str) -> Result<Order, AppError> {
    let id = resolve_order_id(state, order_number)?;
    let mut record = entry(state, id)?;

    match record.order.status {
        OrderStatus::Pending | OrderStatus::Processing => {}
        status => {
            return Err(AppError::InvalidTransition(format!(
                "order {order_number} cannot be cancelled while {}",
                status_name(status)
            )));
        }
    }

    record.order.status = OrderStatus::Cancelled;
    if let Some(delivery) = record.delivery.as_mut() {
        delivery.status = DeliveryStatus::Failed;
        record.order.delivery_status = DeliveryProgress::Failed;
    }
    state.metrics.open_orders.dec();

    info!(order_number, "order cancelled");
    Ok(record.order.clone())
}

pub fn get_order(state: &AppState, order_number: &str) -> Result<OrderRecord, AppError> {
    let id = resolve_order_id(state, order_number)?;
    state
        .orders
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or(AppError::StorageUnavailable)
}

fn resolve_order_id(state: &AppState, order_number: &str) -> Result<Uuid, AppError> {
    state
        .order_numbers
        .get(order_number)
        .map(|entry| *entry.value())
        .ok_or_else(|| AppError::NotFound(format!("order {order_number} not found")))
}

fn entry<'a>(
    state: &'a AppState,
    id: Uuid,
) -> Result<dashmap::mapref::one::RefMut<'a, Uuid, OrderRecord>, AppError> {
    // The index pointed here, so a missing record can only be a write in
    // flight; the caller may retry.
    state.orders.get_mut(&id).ok_or(AppError::StorageUnavailable)
}

fn status_name(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "pending",
        OrderStatus::Processing => "processing",
        OrderStatus::OutForDelivery => "out_for_delivery",
        OrderStatus::Delivered => "delivered",
        OrderStatus::Cancelled => "cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::{
        assign_delivery, cancel_order, create_order, get_order, start_delivery, verify_handshake,
    };
    use crate::config::Config;
    use crate::error::AppError;
    use crate::models::delivery::DeliveryStatus;
    use crate::models::order::{DeliveryProgress, Order, OrderStatus};
    use crate::state::AppState;

    fn state() -> AppState {
        AppState::new(&Config {
            http_port: 0,
            log_level: "info".to_string(),
            max_gps_accuracy_m: 100.0,
            allow_geofence_bypass: false,
            verify_max_attempts: 10,
            verify_window_secs: 60,
            event_buffer_size: 16,
        })
    }

    fn out_for_delivery_order(state: &AppState) -> Order {
        let order = create_order(state, 42, Some(1), None, 5.0);
        assign_delivery(state, &order.order_number, 7, "0241234567".to_string()).unwrap();
        start_delivery(state, &order.order_number, 7).unwrap()
    }

    #[test]
    fn create_sets_pending_with_four_digit_code() {
        let state = state();
        let order = create_order(&state, 42, Some(1), None, 5.0);

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.delivery_status, DeliveryProgress::Pending);
        assert_eq!(order.delivery_code.len(), 4);
        assert!(order.delivered_at.is_none());
        assert!(order.delivered_by.is_none());
    }

    #[test]
    fn assign_creates_delivery_and_moves_to_processing() {
        let state = state();
        let order = create_order(&state, 42, Some(1), None, 5.0);

        let updated =
            assign_delivery(&state, &order.order_number, 7, "0241234567".to_string()).unwrap();
        assert_eq!(updated.status, OrderStatus::Processing);
        assert_eq!(updated.delivery_status, DeliveryProgress::Assigned);

        let record = get_order(&state, &order.order_number).unwrap();
        let delivery = record.delivery.unwrap();
        assert_eq!(delivery.staff_id, 7);
        assert_eq!(delivery.status, DeliveryStatus::Assigned);
        assert!(delivery.picked_up_at.is_none());
    }

    #[test]
    fn double_assign_is_rejected() {
        let state = state();
        let order = create_order(&state, 42, Some(1), None, 5.0);
        assign_delivery(&state, &order.order_number, 7, "0241234567".to_string()).unwrap();

        let err = assign_delivery(&state, &order.order_number, 8, "0249999999".to_string())
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[test]
    fn start_requires_assigned_delivery() {
        let state = state();
        let order = create_order(&state, 42, Some(1), None, 5.0);

        let err = start_delivery(&state, &order.order_number, 7).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[test]
    fn repeated_start_is_rejected_not_absorbed() {
        let state = state();
        let order = create_order(&state, 42, Some(1), None, 5.0);
        assign_delivery(&state, &order.order_number, 7, "0241234567".to_string()).unwrap();
        start_delivery(&state, &order.order_number, 7).unwrap();

        let err = start_delivery(&state, &order.order_number, 7).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[test]
    fn correct_code_finalizes_both_records() {
        let state = state();
        let order = out_for_delivery_order(&state);
        let code = order.delivery_code.clone();

        let delivered = verify_handshake(&state, &order.order_number, &code, 7).unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);
        assert_eq!(delivered.delivery_status, DeliveryProgress::Delivered);
        assert_eq!(delivered.delivered_by, Some(7));
        assert!(delivered.delivered_at.is_some());

        let record = get_order(&state, &order.order_number).unwrap();
        let delivery = record.delivery.unwrap();
        assert_eq!(delivery.status, DeliveryStatus::Delivered);
        assert!(delivery.delivered_at.is_some());
    }

    #[test]
    fn wrong_code_mutates_nothing() {
        let state = state();
        let order = out_for_delivery_order(&state);
        let wrong = if order.delivery_code == "9999" { "0000" } else { "9999" };

        let err = verify_handshake(&state, &order.order_number, wrong, 7).unwrap_err();
        assert!(matches!(err, AppError::InvalidCode));

        let record = get_order(&state, &order.order_number).unwrap();
        assert_eq!(record.order.status, OrderStatus::OutForDelivery);
        assert_eq!(record.order.delivery_status, DeliveryProgress::OutForDelivery);
        assert!(record.order.delivered_at.is_none());
        assert!(record.order.delivered_by.is_none());
        assert_eq!(record.delivery.unwrap().status, DeliveryStatus::InTransit);
    }

    #[test]
    fn second_verify_sees_already_delivered() {
        let state = state();
        let order = out_for_delivery_order(&state);
        let code = order.delivery_code.clone();

        verify_handshake(&state, &order.order_number, &code, 7).unwrap();
        let err = verify_handshake(&state, &order.order_number, &code, 7).unwrap_err();
        assert!(matches!(err, AppError::AlreadyDelivered));
    }

    #[test]
    fn already_delivered_wins_over_wrong_code() {
        let state = state();
        let order = out_for_delivery_order(&state);
        let code = order.delivery_code.clone();
        verify_handshake(&state, &order.order_number, &code, 7).unwrap();

        let err = verify_handshake(&state, &order.order_number, "0000", 7).unwrap_err();
        assert!(matches!(err, AppError::AlreadyDelivered));
    }

    #[test]
    fn correct_code_cannot_resurrect_cancelled_order() {
        let state = state();
        let order = create_order(&state, 42, Some(1), None, 5.0);
        cancel_order(&state, &order.order_number).unwrap();
        let open_after_cancel = state.metrics.open_orders.get();

        let err =
            verify_handshake(&state, &order.order_number, &order.delivery_code, 7).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));

        let record = get_order(&state, &order.order_number).unwrap();
        assert_eq!(record.order.status, OrderStatus::Cancelled);
        assert!(record.order.delivered_at.is_none());
        assert!(record.order.delivered_by.is_none());
        assert_eq!(state.metrics.open_orders.get(), open_after_cancel);
    }

    #[test]
    fn verify_requires_order_out_for_delivery() {
        let state = state();

        let pending = create_order(&state, 42, Some(1), None, 5.0);
        let err =
            verify_handshake(&state, &pending.order_number, &pending.delivery_code, 7).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));

        let processing = create_order(&state, 42, Some(1), None, 5.0);
        assign_delivery(&state, &processing.order_number, 7, "0241234567".to_string()).unwrap();
        let err = verify_handshake(
            &state,
            &processing.order_number,
            &processing.delivery_code,
            7,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[test]
    fn verify_unknown_order_is_not_found() {
        let state = state();
        let err = verify_handshake(&state, "CM-20260101-000000", "1234", 7).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn exactly_one_delivered_event_under_concurrent_verifies() {
        let state = std::sync::Arc::new(state());
        let order = out_for_delivery_order(&state);
        let code = order.delivery_code.clone();
        let mut events_rx = state.fulfillment_events_tx.subscribe();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let state = state.clone();
            let number = order.order_number.clone();
            let code = code.clone();
            handles.push(std::thread::spawn(move || {
                verify_handshake(&state, &number, &code, 7).is_ok()
            }));
        }

        let successes = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|delivered| *delivered)
            .count();
        assert_eq!(successes, 1);

        let mut delivered_events = 0;
        while let Ok(event) = events_rx.try_recv() {
            if matches!(
                event,
                crate::models::order::FulfillmentEvent::Delivered { .. }
            ) {
                delivered_events += 1;
            }
        }
        assert_eq!(delivered_events, 1);
    }

    #[test]
    fn cancel_allowed_from_pending_and_processing_only() {
        let state = state();

        let pending = create_order(&state, 42, Some(1), None, 5.0);
        let cancelled = cancel_order(&state, &pending.order_number).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let processing = create_order(&state, 42, Some(1), None, 5.0);
        assign_delivery(&state, &processing.order_number, 7, "024".to_string()).unwrap();
        let cancelled = cancel_order(&state, &processing.order_number).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        let record = get_order(&state, &processing.order_number).unwrap();
        assert_eq!(record.delivery.unwrap().status, DeliveryStatus::Failed);

        let in_transit = out_for_delivery_order(&state);
        let err = cancel_order(&state, &in_transit.order_number).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }
}
