use std::env;
use std::time::Duration;

use crate::error::AppError;
use crate::models::courier::GeoPoint;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub dispatch: DispatchConfig,
}

/// Knobs for the offer protocol. Tests shrink the timeouts to milliseconds.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// How long a courier has to answer an offer.
    pub offer_timeout: Duration,
    /// Extra slack before the watcher re-checks an outstanding offer.
    pub watcher_grace: Duration,
    /// Used whenever a live position is unknown (restaurant, customer or courier).
    pub fallback_location: GeoPoint,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            offer_timeout: Duration::from_secs(60),
            watcher_grace: Duration::from_secs(5),
            fallback_location: GeoPoint {
                lat: 16.87,
                lng: 96.20,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            dispatch: DispatchConfig {
                offer_timeout: Duration::from_secs(parse_or_default("OFFER_TIMEOUT_SECS", 60)?),
                watcher_grace: Duration::from_secs(parse_or_default("WATCHER_GRACE_SECS", 5)?),
                fallback_location: GeoPoint {
                    lat: parse_or_default("FALLBACK_LAT", 16.87)?,
                    lng: parse_or_default("FALLBACK_LNG", 96.20)?,
                },
            },
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
