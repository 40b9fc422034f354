use crate::models::zone::{DeliveryLocation, DeliveryZone};
use crate::state::AppState;

/// What the resolver found at a coordinate: a served zone or a pre-approved
/// delivery location. Both grant checkout; only zones carry a fee.
#[derive(Debug, Clone)]
pub enum ZoneMatch {
    Zone(DeliveryZone),
    Location(DeliveryLocation),
}

/// Find the service area covering the given coordinate.
///
/// Candidates are all active delivery zones followed by all active delivery
/// locations, each in ascending id order, so overlaps always resolve the
/// same way and the chosen fee and routing are stable across calls. Returns
/// `None` when nothing matches; whether that rejects the checkout is the
/// boundary's decision.
pub fn find_valid_delivery_zone(state: &AppState, lat: f64, lng: f64) -> Option<ZoneMatch> {
    let mut zones: Vec<DeliveryZone> = state
        .zones
        .iter()
        .filter(|entry| entry.value().active)
        .map(|entry| entry.value().clone())
        .collect();
    zones.sort_by_key(|zone| zone.id);

    if let Some(zone) = zones.into_iter().find(|zone| zone.area.contains(lat, lng)) {
        return Some(ZoneMatch::Zone(zone));
    }

    let mut locations: Vec<DeliveryLocation> = state
        .locations
        .iter()
        .filter(|entry| entry.value().active)
        .map(|entry| entry.value().clone())
        .collect();
    locations.sort_by_key(|location| location.id);

    locations
        .into_iter()
        .find(|location| location.contains(lat, lng))
        .map(ZoneMatch::Location)
}
