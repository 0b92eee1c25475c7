// src/recommend/geo.rs
//! Great-circle distance and the distance/city multipliers.

use crate::config::Catalog;

const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Haversine distance between two (lat, lon) points in kilometres.
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// 1.0 up to `radius_km`, then a linear decay over `decay_km`, floored.
pub fn distance_multiplier(distance_km: f64, radius_km: f64, decay_km: f64, floor: f64) -> f64 {
    if distance_km <= radius_km {
        return 1.0;
    }
    if decay_km <= 0.0 {
        return floor;
    }
    (1.0 - (distance_km - radius_km) / decay_km).max(floor)
}

/// City part of a free-form place string: the first comma-separated segment.
pub fn city_from_address(address: &str) -> Option<String> {
    address
        .split(',')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `penalty` when both cities are known and differ, otherwise 1.0.
pub fn city_multiplier(catalog: &Catalog, user_city: Option<&str>, event_city: Option<&str>, penalty: f64) -> f64 {
    match (user_city, event_city) {
        (Some(u), Some(e)) if catalog.canonical_city(u) != catalog.canonical_city(e) => penalty,
        _ => 1.0,
    }
}
