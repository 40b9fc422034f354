pub mod geofence;
pub mod lifecycle;
