//! Routed directions to a nearby service.
//!
//! Routes come from any OSRM-compatible HTTP service. The routing engine
//! itself is external; this client only asks for a single driving route and
//! keeps its length, duration, and path for the map overlay.
//!
//! # API Reference
//!
//! See: <https://project-osrm.org/docs/v5.24.0/api/#route-service>

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::RouteError;
use crate::model::Coordinates;

/// Client for an OSRM-compatible routing service.
#[derive(Clone)]
pub struct RouteClient {
    client: reqwest::Client,
    base_url: String,
}

impl RouteClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the best driving route from `from` to `to`.
    #[instrument(skip_all)]
    pub async fn route(&self, from: Coordinates, to: Coordinates) -> Result<Route, RouteError> {
        // OSRM takes longitude first.
        let url = format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url, from.lng, from.lat, to.lng, to.lat
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Routing request failed");
            return Err(RouteError::Status(status.as_u16()));
        }

        let data = response.json::<OsrmRouteResponse>().await?;
        if data.code != "Ok" {
            return Err(RouteError::NoRoute(data.code));
        }

        let route = data
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| RouteError::NoRoute("empty".to_string()))?;

        let path = route
            .geometry
            .coordinates
            .iter()
            .filter_map(|pair| match pair.as_slice() {
                [lng, lat, ..] => Some(Coordinates::new(*lat, *lng)),
                _ => None,
            })
            .collect::<Vec<_>>();

        info!(
            distance_m = route.distance,
            duration_s = route.duration,
            points = path.len(),
            "Route computed"
        );

        Ok(Route {
            distance_m: route.distance,
            duration_s: route.duration,
            path,
        })
    }
}

/// A computed route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub distance_m: f64,
    pub duration_s: f64,
    pub path: Vec<Coordinates>,
}

impl Route {
    /// Travel time rounded up to whole minutes.
    pub fn duration_minutes(&self) -> u64 {
        (self.duration_s / 60.0).ceil().max(0.0) as u64
    }
}

/// Link to turn-by-turn directions on openstreetmap.org.
pub fn directions_link(from: Coordinates, to: Coordinates) -> String {
    let route = format!("{},{};{},{}", from.lat, from.lng, to.lat, to.lng);
    format!(
        "https://www.openstreetmap.org/directions?engine=fossgis_osrm_car&route={}",
        urlencoding::encode(&route)
    )
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct OsrmRouteResponse {
    #[serde(default)]
    code: String,

    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    #[serde(default)]
    distance: f64,

    #[serde(default)]
    duration: f64,

    #[serde(default)]
    geometry: OsrmGeometry,
}

#[derive(Debug, Default, Deserialize)]
struct OsrmGeometry {
    /// `[lng, lat]` pairs.
    #[serde(default)]
    coordinates: Vec<Vec<f64>>,
}
