//! Runtime configuration, read from `SAFEREPORT_*` environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono::TimeDelta;

use crate::model::Coordinates;

/// Default base URL of the reporting API.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Default base URL of the OSRM-compatible routing service.
pub const DEFAULT_ROUTING_URL: &str = "https://router.project-osrm.org";

/// Coordinate used when the device position cannot be obtained (Nairobi CBD).
pub const DEFAULT_COORDINATES: Coordinates = Coordinates {
    lat: -1.2921,
    lng: 36.8219,
};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the reporting API, without a trailing slash.
    pub api_url: String,

    /// Base URL of the routing service.
    pub routing_url: String,

    /// Fallback position when location is denied or unavailable.
    pub default_coordinates: Coordinates,

    /// How long a nearest-services result stays fresh.
    pub cache_ttl: TimeDelta,

    /// Timeout applied to every HTTP request.
    pub http_timeout: Duration,

    /// How long to wait for a one-shot position fix.
    pub geolocation_timeout: Duration,

    /// Interval between fixes while a position watch is active.
    pub watch_interval: Duration,

    /// Movement (metres) above which the user marker is moved.
    pub marker_threshold_m: f64,

    /// Movement (metres) above which nearby services are looked up again.
    pub requery_threshold_m: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            routing_url: DEFAULT_ROUTING_URL.to_string(),
            default_coordinates: DEFAULT_COORDINATES,
            cache_ttl: TimeDelta::minutes(5),
            http_timeout: Duration::from_secs(15),
            geolocation_timeout: Duration::from_secs(10),
            watch_interval: Duration::from_secs(30),
            marker_threshold_m: 50.0,
            requery_threshold_m: 500.0,
        }
    }
}

impl Config {
    /// Load configuration from the environment, falling back to defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<f64>().ok());
        let secs = |key: &str| lookup(key).and_then(|v| parse_positive::<u64>(&v));

        let api_url = lookup("SAFEREPORT_API_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.api_url);

        let routing_url = lookup("SAFEREPORT_ROUTING_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.routing_url);

        let default_coordinates = match (
            parsed("SAFEREPORT_DEFAULT_LAT"),
            parsed("SAFEREPORT_DEFAULT_LNG"),
        ) {
            (Some(lat), Some(lng)) if valid_coordinates(lat, lng) => Coordinates::new(lat, lng),
            _ => defaults.default_coordinates,
        };

        Self {
            api_url,
            routing_url,
            default_coordinates,
            cache_ttl: secs("SAFEREPORT_CACHE_TTL_SECS")
                .and_then(|s| TimeDelta::try_seconds(s as i64))
                .unwrap_or(defaults.cache_ttl),
            http_timeout: secs("SAFEREPORT_HTTP_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            geolocation_timeout: secs("SAFEREPORT_GEO_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.geolocation_timeout),
            watch_interval: secs("SAFEREPORT_WATCH_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.watch_interval),
            marker_threshold_m: parsed("SAFEREPORT_MARKER_THRESHOLD_M")
                .filter(|m| *m >= 0.0)
                .unwrap_or(defaults.marker_threshold_m),
            requery_threshold_m: parsed("SAFEREPORT_REQUERY_THRESHOLD_M")
                .filter(|m| *m >= 0.0)
                .unwrap_or(defaults.requery_threshold_m),
        }
    }
}

fn parse_positive<T>(value: &str) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
{
    value.trim().parse::<T>().ok().filter(|v| *v > T::default())
}

/// Whether a latitude/longitude pair is within valid WGS84 bounds.
pub fn valid_coordinates(lat: f64, lng: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}
