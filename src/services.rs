//! Nearest emergency services lookup.
//!
//! # API Reference
//!
//! `GET {api}/nearest-services?lat={lat}&lng={lng}` returns
//!
//! ```json
//! {
//!     "police":   { "name": "...", "lat": 0.0, "lng": 0.0, "distance": 850.0, "phone": "..." },
//!     "hospital": null
//! }
//! ```
//!
//! # Privacy
//!
//! Exact coordinates are sent to the API but only the rounded cache key is
//! ever logged.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CoordinateKey, ServiceCache};
use crate::error::LookupError;
use crate::model::{Coordinates, NearestServices};

/// Client for the nearest-services endpoint.
#[derive(Clone)]
pub struct NearestServicesClient {
    client: reqwest::Client,
    base_url: String,
}

impl NearestServicesClient {
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

    /// Query the closest police station and hospital to `coords`.
    pub async fn fetch(&self, coords: Coordinates) -> Result<NearestServices, LookupError> {
        let url = format!(
            "{}/nearest-services?lat={}&lng={}",
            self.base_url, coords.lat, coords.lng
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let data = response.json::<NearestServices>().await?;
        Ok(data)
    }
}

/// Nearest-services lookups backed by a [`ServiceCache`].
///
/// Concurrent lookups for the same rounded position share one request: the
/// first caller fetches while the others wait on a per-key lock and then read
/// the cached result.
#[derive(Clone)]
pub struct ServiceLookup {
    client: NearestServicesClient,
    cache: ServiceCache,
    in_flight: Arc<Mutex<HashMap<CoordinateKey, Arc<Mutex<()>>>>>,
}

impl ServiceLookup {
    pub fn new(client: NearestServicesClient, cache: ServiceCache) -> Self {
        Self {
            client,
            cache,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn cache(&self) -> &ServiceCache {
        &self.cache
    }

    /// Look up services near `coords`, answering from the cache when a fresh
    /// result exists for the same rounded position. Failed requests are not
    /// cached, so a retry always goes back to the network.
    #[instrument(skip_all, fields(key = ?CoordinateKey::from(coords).coordinates()))]
    pub async fn lookup(&self, coords: Coordinates) -> Result<NearestServices, LookupError> {
        let key = CoordinateKey::from(coords);

        if let Some(services) = self.cache.get(key, Utc::now()).await {
            debug!("Nearest services served from cache");
            return Ok(services);
        }

        let key_lock = {
            let mut in_flight = self.in_flight.lock().await;
            Arc::clone(in_flight.entry(key).or_default())
        };
        let result = {
            let _guard = key_lock.lock().await;
            self.fetch_and_cache(key, coords).await
        };

        // The map and this function hold the last two references once no
        // other caller is waiting on the key.
        let mut in_flight = self.in_flight.lock().await;
        if Arc::strong_count(&key_lock) == 2 {
            in_flight.remove(&key);
        }
        result
    }

    /// Fetch under the key lock. A caller that waited behind another request
    /// for the same key finds its result in the cache.
    async fn fetch_and_cache(
        &self,
        key: CoordinateKey,
        coords: Coordinates,
    ) -> Result<NearestServices, LookupError> {
        if let Some(services) = self.cache.get(key, Utc::now()).await {
            debug!("Nearest services fetched by a concurrent lookup");
            return Ok(services);
        }

        match self.client.fetch(coords).await {
            Ok(services) => {
                info!(
                    police = services.police.is_some(),
                    hospital = services.hospital.is_some(),
                    "Nearest services fetched"
                );
                self.cache.insert(key, services.clone(), Utc::now()).await;
                Ok(services)
            }
            Err(e) => {
                warn!(error = %e, "Nearest services lookup failed");
                Err(e)
            }
        }
    }
}
