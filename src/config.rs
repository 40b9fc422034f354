use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    /// Reject checkout fixes reported as less accurate than this (meters).
    pub max_gps_accuracy_m: f64,
    /// Development-only escape hatch: skip zone matching when the request
    /// already names a pre-approved delivery location. Must stay false in
    /// production deployments.
    pub allow_geofence_bypass: bool,
    /// Verify-delivery rate limit: attempts allowed per caller per window.
    pub verify_max_attempts: u64,
    pub verify_window_secs: u64,
    pub event_buffer_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            max_gps_accuracy_m: parse_or_default("MAX_GPS_ACCURACY_M", 100.0)?,
            allow_geofence_bypass: parse_or_default("GEOFENCE_BYPASS", false)?,
            verify_max_attempts: parse_or_default("VERIFY_MAX_ATTEMPTS", 10)?,
            verify_window_secs: parse_or_default("VERIFY_WINDOW_SECS", 60)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
