use crate::models::zone::GeoPoint;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters. Campus zones are small, but haversine
/// keeps the resolver consistent at any radius and reproducible in tests.
pub fn haversine_m(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_M * central_angle
}

/// Ray-casting membership test over an ordered vertex list.
/// Points on an edge or vertex count as inside.
pub fn point_in_polygon(point: &GeoPoint, vertices: &[GeoPoint]) -> bool {
    if vertices.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = vertices.len() - 1;

    for i in 0..vertices.len() {
        let a = &vertices[i];
        let b = &vertices[j];

        if on_segment(point, a, b) {
            return true;
        }

        let crosses = (a.lat > point.lat) != (b.lat > point.lat)
            && point.lng < (b.lng - a.lng) * (point.lat - a.lat) / (b.lat - a.lat) + a.lng;
        if crosses {
            inside = !inside;
        }

        j = i;
    }

    inside
}

fn on_segment(p: &GeoPoint, a: &GeoPoint, b: &GeoPoint) -> bool {
    let cross = (b.lat - a.lat) * (p.lng - a.lng) - (b.lng - a.lng) * (p.lat - a.lat);
    if cross.abs() > 1e-12 {
        return false;
    }

    p.lat >= a.lat.min(b.lat)
        && p.lat <= a.lat.max(b.lat)
        && p.lng >= a.lng.min(b.lng)
        && p.lng <= a.lng.max(b.lng)
}
