use serde::{Deserialize, Serialize};

use crate::geo::{haversine_m, point_in_polygon};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Geometry of a service area. Radius zones use haversine distance from the
/// center; polygon zones use ray casting over the ordered vertex list. Both
/// treat the boundary as inside.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ZoneArea {
    Radius { center: GeoPoint, radius_m: f64 },
    Polygon { vertices: Vec<GeoPoint> },
}

impl ZoneArea {
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        let point = GeoPoint { lat, lng };
        match self {
            ZoneArea::Radius { center, radius_m } => haversine_m(center, &point) <= *radius_m,
            ZoneArea::Polygon { vertices } => point_in_polygon(&point, vertices),
        }
    }
}

/// A served delivery area. Zones are deactivated rather than deleted so
/// historical orders keep a valid reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryZone {
    pub id: u32,
    pub name: String,
    pub active: bool,
    pub delivery_fee: f64,
    pub area: ZoneArea,
}

/// A pre-approved drop-off point (campus gate, hostel entrance) that a
/// customer can pick directly at checkout. Carries its own polygon bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryLocation {
    pub id: u32,
    pub name: String,
    pub active: bool,
    pub bounds: Vec<GeoPoint>,
}

impl DeliveryLocation {
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        point_in_polygon(&GeoPoint { lat, lng }, &self.bounds)
    }
}
