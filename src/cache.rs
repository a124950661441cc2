//! Cache of nearest-services lookups.
//!
//! Results are keyed by the user's position rounded to three decimal places
//! (roughly 110 m), so small jitter in successive fixes hits the same entry.
//! Entries older than the configured time-to-live are treated as missing and
//! evicted when read.
//!
//! The cache is an explicit value rather than global state: clones share the
//! same entries, and tests construct their own.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;

use crate::model::{Coordinates, NearestServices};

/// Decimal places kept when rounding coordinates into a cache key.
const KEY_PRECISION: i32 = 3;

/// A coordinate pair rounded to a fixed grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordinateKey {
    lat: i64,
    lng: i64,
}

impl CoordinateKey {
    pub fn from_coordinates(coords: Coordinates) -> Self {
        let scale = 10f64.powi(KEY_PRECISION);
        Self {
            lat: (coords.lat * scale).round() as i64,
            lng: (coords.lng * scale).round() as i64,
        }
    }

    /// The rounded coordinates this key stands for.
    pub fn coordinates(&self) -> Coordinates {
        let scale = 10f64.powi(KEY_PRECISION);
        Coordinates::new(self.lat as f64 / scale, self.lng as f64 / scale)
    }
}

impl From<Coordinates> for CoordinateKey {
    fn from(coords: Coordinates) -> Self {
        Self::from_coordinates(coords)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    services: NearestServices,
    stored_at: DateTime<Utc>,
}

/// Shared, time-limited store of nearest-services results.
#[derive(Debug, Clone)]
pub struct ServiceCache {
    entries: Arc<RwLock<HashMap<CoordinateKey, CacheEntry>>>,
    ttl: TimeDelta,
}

impl Default for ServiceCache {
    fn default() -> Self {
        Self::new(TimeDelta::minutes(5))
    }
}

impl ServiceCache {
    pub fn new(ttl: TimeDelta) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Fetch a fresh entry. A stale entry is removed and reported as a miss.
    pub async fn get(&self, key: CoordinateKey, now: DateTime<Utc>) -> Option<NearestServices> {
        {
            let entries = self.entries.read().await;
            match entries.get(&key) {
                None => return None,
                Some(entry) if now - entry.stored_at < self.ttl => {
                    return Some(entry.services.clone());
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        // Another writer may have refreshed the entry since the read lock was released.
        if let Some(entry) = entries.get(&key) {
            if now - entry.stored_at < self.ttl {
                return Some(entry.services.clone());
            }
            entries.remove(&key);
        }
        None
    }

    pub async fn insert(&self, key: CoordinateKey, services: NearestServices, now: DateTime<Utc>) {
        self.entries.write().await.insert(
            key,
            CacheEntry {
                services,
                stored_at: now,
            },
        );
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of entries, fresh or stale.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
