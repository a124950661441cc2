//! Post-submission locator: finds the user and the nearest police station and
//! hospital once a report has been accepted.
//!
//! # States
//!
//! ```text
//! Idle -> Locating -> Located -> FetchingServices -> Ready
//!             |          ^
//!             v          |  (retry / continue without location)
//!       LocatingFailed --+
//! ```
//!
//! Permission denied, unavailable, and unsupported positioning fall back to
//! the configured default coordinate and carry on as `Located`. A timeout
//! stops in `LocatingFailed` with a retry and a "continue without location"
//! option.
//!
//! # Failure Semantics
//!
//! Nothing here is fatal. Lookup and routing failures become inline messages,
//! and the emergency contact directory is part of every [`LocatorView`].

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::CoordinateKey;
use crate::config::Config;
use crate::contacts::{self, EmergencyContact};
use crate::error::PositionError;
use crate::geo::distance_m;
use crate::geolocation::{PositionEvent, PositionSource, PositionWatch};
use crate::map::{MapView, RouteOverlay};
use crate::model::{Coordinates, NearestServices, ServiceKind, SubmissionResult, format_distance};
use crate::routing::{RouteClient, directions_link};
use crate::services::ServiceLookup;

pub const SERVICES_ERROR: &str = "Failed to load service data";
pub const ROUTE_ERROR: &str = "Failed to load directions";
pub const ROUTING_UNAVAILABLE: &str = "Directions are not available";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorState {
    Idle,
    Locating,
    LocatingFailed,
    Located,
    FetchingServices,
    Ready,
}

/// What a position update changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixUpdate {
    /// Error, or movement below the marker threshold.
    Ignored,
    /// The user marker moved; services were not looked up again.
    MarkerMoved,
    /// The user moved far enough that services were looked up again.
    ServicesRefreshed,
}

/// Tunables taken from [`Config`].
#[derive(Debug, Clone)]
pub struct LocatorSettings {
    pub default_coordinates: Coordinates,
    pub geolocation_timeout: Duration,
    pub watch_interval: Duration,
    pub marker_threshold_m: f64,
    pub requery_threshold_m: f64,
}

impl From<&Config> for LocatorSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_coordinates: config.default_coordinates,
            geolocation_timeout: config.geolocation_timeout,
            watch_interval: config.watch_interval,
            marker_threshold_m: config.marker_threshold_m,
            requery_threshold_m: config.requery_threshold_m,
        }
    }
}

impl Default for LocatorSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

pub struct Locator<S: PositionSource> {
    settings: LocatorSettings,
    source: Arc<S>,
    lookup: ServiceLookup,
    routes: Option<RouteClient>,

    state: LocatorState,
    report_id: Option<String>,
    fix: Option<Coordinates>,
    used_fallback: bool,
    location_error: Option<PositionError>,
    last_query_fix: Option<Coordinates>,
    services: NearestServices,
    services_error: Option<String>,
    route: Option<RouteOverlay>,
    route_error: Option<String>,
    watch: Option<PositionWatch<S>>,
}

impl<S: PositionSource> Locator<S> {
    pub fn new(settings: LocatorSettings, source: Arc<S>, lookup: ServiceLookup) -> Self {
        Self {
            settings,
            source,
            lookup,
            routes: None,
            state: LocatorState::Idle,
            report_id: None,
            fix: None,
            used_fallback: false,
            location_error: None,
            last_query_fix: None,
            services: NearestServices::default(),
            services_error: None,
            route: None,
            route_error: None,
            watch: None,
        }
    }

    /// Enable routed directions.
    pub fn with_routes(mut self, routes: RouteClient) -> Self {
        self.routes = Some(routes);
        self
    }

    pub fn state(&self) -> LocatorState {
        self.state
    }

    pub fn user_location(&self) -> Option<Coordinates> {
        self.fix
    }

    /// Whether the current location is the default rather than a real fix.
    pub fn used_fallback(&self) -> bool {
        self.used_fallback
    }

    pub fn location_error(&self) -> Option<PositionError> {
        self.location_error
    }

    pub fn services(&self) -> &NearestServices {
        &self.services
    }

    pub fn services_error(&self) -> Option<&str> {
        self.services_error.as_deref()
    }

    pub fn route(&self) -> Option<&RouteOverlay> {
        self.route.as_ref()
    }

    pub fn route_error(&self) -> Option<&str> {
        self.route_error.as_deref()
    }

    pub fn is_watching(&self) -> bool {
        self.watch.as_ref().is_some_and(PositionWatch::is_active)
    }

    /// Start locating once a report has been accepted. Only the first call has
    /// any effect.
    pub async fn activate(&mut self, submission: &SubmissionResult) {
        if self.state != LocatorState::Idle {
            return;
        }
        info!(report_id = ?submission.id, "Locating nearby services");
        self.report_id = submission.id.clone();
        self.locate().await;
    }

    /// Request a one-shot position and, if one is obtained (or a fallback
    /// applies), look up nearby services.
    pub async fn locate(&mut self) {
        self.state = LocatorState::Locating;
        self.location_error = None;

        let result = tokio::time::timeout(
            self.settings.geolocation_timeout,
            self.source.current_position(),
        )
        .await
        .unwrap_or(Err(PositionError::Timeout));

        match result {
            Ok(coords) => {
                self.used_fallback = false;
                self.set_fix(coords);
            }
            Err(e) if e.falls_back_to_default() => {
                warn!(error = %e, "Position unavailable, using default location");
                self.location_error = Some(e);
                self.used_fallback = true;
                self.set_fix(self.settings.default_coordinates);
            }
            Err(e) => {
                warn!(error = %e, "Position request failed");
                self.location_error = Some(e);
                self.state = LocatorState::LocatingFailed;
                return;
            }
        }

        self.fetch_services().await;
    }

    /// Try to locate again. Also used to refresh the location once ready.
    pub async fn retry(&mut self) {
        if matches!(
            self.state,
            LocatorState::Locating | LocatorState::FetchingServices
        ) {
            return;
        }
        self.locate().await;
    }

    /// Give up on a real fix and show services around the default location.
    pub async fn continue_without_location(&mut self) {
        if self.state != LocatorState::LocatingFailed {
            return;
        }
        info!("Continuing with default location");
        self.used_fallback = true;
        self.set_fix(self.settings.default_coordinates);
        self.fetch_services().await;
    }

    /// Look up services around the current fix. A failure keeps whatever
    /// services were shown before and adds an inline error.
    pub async fn fetch_services(&mut self) {
        let Some(coords) = self.fix else {
            return;
        };

        self.state = LocatorState::FetchingServices;
        match self.lookup.lookup(coords).await {
            Ok(services) => {
                self.services = services;
                self.services_error = None;
            }
            Err(_) => {
                self.services_error = Some(SERVICES_ERROR.to_string());
            }
        }
        self.last_query_fix = Some(coords);
        self.state = LocatorState::Ready;
    }

    /// Begin watching the position in the background.
    pub fn start_watch(&mut self) {
        let interval = self.settings.watch_interval;
        let source = Arc::clone(&self.source);
        self.watch
            .get_or_insert_with(|| PositionWatch::new(source, interval))
            .start();
    }

    pub fn stop_watch(&mut self) {
        if let Some(watch) = self.watch.as_mut() {
            watch.stop();
        }
    }

    /// Wait for the next watch event and apply it. Returns `None` when no
    /// watch is running.
    pub async fn poll_watch(&mut self) -> Option<FixUpdate> {
        let event = self.watch.as_mut()?.next_event().await?;
        Some(self.apply_fix(event).await)
    }

    /// Apply a position update from the watch.
    pub async fn apply_fix(&mut self, event: PositionEvent) -> FixUpdate {
        let coords = match event {
            Ok(coords) => coords,
            Err(e) => {
                debug!(error = %e, "Ignoring failed position update");
                return FixUpdate::Ignored;
            }
        };

        let Some(current) = self.fix else {
            self.used_fallback = false;
            self.location_error = None;
            self.set_fix(coords);
            self.fetch_services().await;
            return FixUpdate::ServicesRefreshed;
        };

        let moved = distance_m(current, coords);
        if moved <= self.settings.marker_threshold_m {
            return FixUpdate::Ignored;
        }

        self.used_fallback = false;
        self.location_error = None;
        self.set_fix(coords);

        let since_query = self
            .last_query_fix
            .map(|q| distance_m(q, coords))
            .unwrap_or(f64::INFINITY);

        if since_query > self.settings.requery_threshold_m {
            debug!(moved_m = since_query.round(), "Significant movement, refreshing services");
            // Directions from the old position no longer apply.
            self.route = None;
            self.fetch_services().await;
            FixUpdate::ServicesRefreshed
        } else {
            FixUpdate::MarkerMoved
        }
    }

    /// Show directions to a service, or hide them if already shown.
    pub async fn toggle_route(&mut self, kind: ServiceKind) {
        if self.route.as_ref().is_some_and(|r| r.to == kind) {
            self.route = None;
            return;
        }

        self.route_error = None;
        let (Some(from), Some(target)) = (self.fix, self.services.get(kind)) else {
            self.route_error = Some(kind.none_found().to_string());
            return;
        };
        let to = target.coordinates();

        let Some(routes) = self.routes.as_ref() else {
            self.route_error = Some(ROUTING_UNAVAILABLE.to_string());
            return;
        };

        match routes.route(from, to).await {
            Ok(route) => {
                self.route = Some(RouteOverlay {
                    to: kind,
                    route,
                    directions_link: directions_link(from, to),
                });
            }
            Err(e) => {
                warn!(error = %e, service = kind.label(), "Directions unavailable");
                self.route = None;
                self.route_error = Some(ROUTE_ERROR.to_string());
            }
        }
    }

    /// Stop background work. Called when the user leaves the screen.
    pub fn shutdown(&mut self) {
        self.stop_watch();
        self.watch = None;
    }

    /// Everything needed to render the screen.
    pub fn view(&self) -> LocatorView {
        let fetching = self.state == LocatorState::FetchingServices;

        let loading_message = match self.state {
            LocatorState::Locating => Some("Detecting your location..."),
            LocatorState::FetchingServices => Some("Finding nearby services..."),
            _ => None,
        };

        let location_notice = match (self.state, self.location_error) {
            (LocatorState::LocatingFailed, Some(e)) => Some(e.to_string()),
            (_, Some(e)) if self.used_fallback => Some(format!(
                "{}. Showing services near a default location.",
                e.to_string().trim_end_matches('.')
            )),
            _ => None,
        };

        let retry_label = (self.state == LocatorState::LocatingFailed).then(|| {
            if self.location_error == Some(PositionError::PermissionDenied) {
                "Enable Location Access"
            } else {
                "Retry Location Detection"
            }
        });

        let cards = [ServiceKind::Police, ServiceKind::Hospital]
            .into_iter()
            .map(|kind| ServiceCard::new(kind, &self.services, self.fix, fetching))
            .collect();

        let map = self.fix.map(|fix| {
            let mut map = MapView::new(fix, &self.services);
            map.route = self.route.clone();
            map
        });

        LocatorView {
            state: self.state,
            report_id: self.report_id.clone(),
            contacts: contacts::urgent().chain(contacts::other()).copied().collect(),
            loading_message,
            location_notice,
            retry_label,
            can_continue_without_location: self.state == LocatorState::LocatingFailed,
            cards,
            map,
            services_error: self.services_error.clone(),
            route_error: self.route_error.clone(),
        }
    }

    fn set_fix(&mut self, coords: Coordinates) {
        debug!(key = ?CoordinateKey::from(coords).coordinates(), "Location fixed");
        self.fix = Some(coords);
        self.state = LocatorState::Located;
    }
}

impl<S: PositionSource> Drop for Locator<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A police or hospital card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceCard {
    pub kind: ServiceKind,
    pub title: &'static str,
    pub name: Option<String>,
    pub distance: Option<String>,
    pub phone: Option<String>,
    /// Shown when nothing was found and no lookup is in progress.
    pub empty_message: Option<&'static str>,
}

impl ServiceCard {
    fn new(
        kind: ServiceKind,
        services: &NearestServices,
        user: Option<Coordinates>,
        fetching: bool,
    ) -> Self {
        match services.get(kind) {
            Some(service) => {
                // Prefer the server's distance; otherwise compute one locally.
                let meters = service
                    .distance
                    .or_else(|| user.map(|u| distance_m(u, service.coordinates())));
                Self {
                    kind,
                    title: kind.label(),
                    name: Some(service.display_name(kind).to_string()),
                    distance: Some(format_distance(meters)),
                    phone: service.phone().map(str::to_string),
                    empty_message: None,
                }
            }
            None => Self {
                kind,
                title: kind.label(),
                name: None,
                distance: None,
                phone: None,
                empty_message: (!fetching).then(|| kind.none_found()),
            },
        }
    }
}

/// Renderable state of the locator screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocatorView {
    pub state: LocatorState,
    pub report_id: Option<String>,
    /// Always present.
    pub contacts: Vec<EmergencyContact>,
    pub loading_message: Option<&'static str>,
    pub location_notice: Option<String>,
    pub retry_label: Option<&'static str>,
    pub can_continue_without_location: bool,
    pub cards: Vec<ServiceCard>,
    pub map: Option<MapView>,
    pub services_error: Option<String>,
    pub route_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::cache::ServiceCache;
    use crate::config::DEFAULT_COORDINATES;
    use crate::geolocation::{FailingPositionSource, FixedPositionSource, ScriptedPositionSource};
    use crate::model::ServiceLocation;
    use crate::services::NearestServicesClient;

    /// Never answers, like a device that hangs on a position request.
    struct HangingPositionSource;

    impl PositionSource for HangingPositionSource {
        async fn current_position(&self) -> PositionEvent {
            std::future::pending().await
        }
    }

    // Nothing listens on the discard port, so any network lookup fails fast.
    fn offline_lookup() -> ServiceLookup {
        let client = NearestServicesClient::new("http://127.0.0.1:9", Duration::from_millis(200))
            .unwrap();
        ServiceLookup::new(client, ServiceCache::default())
    }

    fn police_near(coords: Coordinates) -> NearestServices {
        NearestServices {
            police: Some(ServiceLocation {
                name: "Central Police Station".to_string(),
                lat: coords.lat + 0.01,
                lng: coords.lng,
                distance: None,
                phone: Some("999".to_string()),
            }),
            hospital: None,
        }
    }

    async fn seeded_lookup(points: &[Coordinates]) -> ServiceLookup {
        let lookup = offline_lookup();
        for p in points {
            lookup
                .cache()
                .insert(CoordinateKey::from(*p), police_near(*p), Utc::now())
                .await;
        }
        lookup
    }

    fn submission() -> SubmissionResult {
        SubmissionResult::from_body(serde_json::json!({"id": 1}))
    }

    #[tokio::test]
    async fn test_fallback_notice_reads_as_two_sentences() {
        for (error, expected) in [
            (
                PositionError::PositionUnavailable,
                "Couldn't determine your location. Showing services near a default location.",
            ),
            (
                PositionError::PermissionDenied,
                "Location access denied. Please enable permissions. Showing services near a default location.",
            ),
        ] {
            let lookup = seeded_lookup(&[DEFAULT_COORDINATES]).await;
            let mut locator = Locator::new(
                LocatorSettings::default(),
                Arc::new(FailingPositionSource(error)),
                lookup,
            );
            locator.locate().await;

            assert_eq!(locator.view().location_notice.as_deref(), Some(expected));
        }
    }

    #[tokio::test]
    async fn test_activate_without_report_id() {
        let lookup = seeded_lookup(&[DEFAULT_COORDINATES]).await;
        let source = Arc::new(FixedPositionSource(DEFAULT_COORDINATES));
        let mut locator = Locator::new(LocatorSettings::default(), source, lookup);

        let submission = SubmissionResult::from_body(serde_json::json!({"status": "received"}));
        locator.activate(&submission).await;

        assert_eq!(locator.state(), LocatorState::Ready);
        assert_eq!(locator.view().report_id, None);
        assert!(locator.services().police.is_some());
    }

    #[tokio::test]
    async fn test_permission_denied_falls_back_and_fetches() {
        let lookup = seeded_lookup(&[DEFAULT_COORDINATES]).await;
        let source = Arc::new(FailingPositionSource(PositionError::PermissionDenied));
        let mut locator = Locator::new(LocatorSettings::default(), source, lookup);

        locator.activate(&submission()).await;

        assert_eq!(locator.state(), LocatorState::Ready);
        assert!(locator.used_fallback());
        assert_eq!(locator.user_location(), Some(DEFAULT_COORDINATES));
        assert!(locator.services().police.is_some());

        let view = locator.view();
        assert!(view.location_notice.unwrap().contains("default location"));
        assert!(view.retry_label.is_none());
        assert_eq!(view.report_id.as_deref(), Some("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_offers_retry_and_escape() {
        let lookup = seeded_lookup(&[DEFAULT_COORDINATES]).await;
        let mut locator = Locator::new(
            LocatorSettings::default(),
            Arc::new(HangingPositionSource),
            lookup,
        );

        locator.activate(&submission()).await;

        assert_eq!(locator.state(), LocatorState::LocatingFailed);
        assert_eq!(locator.location_error(), Some(PositionError::Timeout));
        let view = locator.view();
        assert_eq!(view.retry_label, Some("Retry Location Detection"));
        assert!(view.can_continue_without_location);
        assert!(!view.contacts.is_empty());
        assert!(view.map.is_none());

        locator.continue_without_location().await;
        assert_eq!(locator.state(), LocatorState::Ready);
        assert_eq!(locator.user_location(), Some(DEFAULT_COORDINATES));
    }

    #[tokio::test]
    async fn test_lookup_failure_is_inline() {
        let here = Coordinates::new(0.5, 35.2);
        let mut locator = Locator::new(
            LocatorSettings::default(),
            Arc::new(FixedPositionSource(here)),
            offline_lookup(),
        );

        locator.activate(&submission()).await;

        assert_eq!(locator.state(), LocatorState::Ready);
        assert_eq!(locator.services_error(), Some(SERVICES_ERROR));
        let view = locator.view();
        assert!(view.map.is_some());
        assert_eq!(view.cards[0].empty_message, Some("No police stations found nearby"));
        assert_eq!(view.contacts.len(), contacts::EMERGENCY_CONTACTS.len());
    }

    #[tokio::test]
    async fn test_activate_only_once() {
        let here = Coordinates::new(0.5, 35.2);
        let lookup = seeded_lookup(&[here]).await;
        let source = Arc::new(ScriptedPositionSource::new(vec![
            Ok(here),
            Ok(Coordinates::new(10.0, 10.0)),
        ]));
        let mut locator = Locator::new(LocatorSettings::default(), source, lookup);

        locator.activate(&submission()).await;
        locator.activate(&submission()).await;

        assert_eq!(locator.user_location(), Some(here));
    }

    #[tokio::test]
    async fn test_movement_thresholds() {
        let start = Coordinates::new(-1.2921, 36.8219);
        // ~110 m and ~780 m north of the start.
        let small = Coordinates::new(-1.2911, 36.8219);
        let large = Coordinates::new(-1.2851, 36.8219);
        let lookup = seeded_lookup(&[start, large]).await;
        let mut locator = Locator::new(
            LocatorSettings::default(),
            Arc::new(FixedPositionSource(start)),
            lookup,
        );
        locator.activate(&submission()).await;

        let jitter = Coordinates::new(-1.29205, 36.8219);
        assert_eq!(locator.apply_fix(Ok(jitter)).await, FixUpdate::Ignored);
        assert_eq!(locator.user_location(), Some(start));

        assert_eq!(locator.apply_fix(Ok(small)).await, FixUpdate::MarkerMoved);
        assert_eq!(locator.user_location(), Some(small));

        assert_eq!(
            locator.apply_fix(Err(PositionError::Timeout)).await,
            FixUpdate::Ignored
        );
        assert_eq!(locator.user_location(), Some(small));

        assert_eq!(locator.apply_fix(Ok(large)).await, FixUpdate::ServicesRefreshed);
        assert_eq!(locator.state(), LocatorState::Ready);
        assert!(locator.services_error().is_none());
        let police = locator.services().police.as_ref().unwrap();
        assert!((police.lat - (large.lat + 0.01)).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_updates_and_shutdown() {
        let start = Coordinates::new(-1.2921, 36.8219);
        let moved = Coordinates::new(-1.2911, 36.8219);
        let lookup = seeded_lookup(&[start]).await;
        let source = Arc::new(ScriptedPositionSource::new(vec![Ok(start), Ok(start), Ok(moved)]));
        let mut locator = Locator::new(LocatorSettings::default(), source, lookup);

        locator.activate(&submission()).await;
        locator.start_watch();
        assert!(locator.is_watching());

        assert_eq!(locator.poll_watch().await, Some(FixUpdate::Ignored));
        assert_eq!(locator.poll_watch().await, Some(FixUpdate::MarkerMoved));

        locator.shutdown();
        assert!(!locator.is_watching());
        assert_eq!(locator.poll_watch().await, None);
    }

    #[tokio::test]
    async fn test_route_without_routing_service() {
        let here = Coordinates::new(0.5, 35.2);
        let lookup = seeded_lookup(&[here]).await;
        let mut locator = Locator::new(
            LocatorSettings::default(),
            Arc::new(FixedPositionSource(here)),
            lookup,
        );
        locator.activate(&submission()).await;

        locator.toggle_route(ServiceKind::Hospital).await;
        assert_eq!(locator.route_error(), Some("No hospitals found nearby"));

        locator.toggle_route(ServiceKind::Police).await;
        assert_eq!(locator.route_error(), Some(ROUTING_UNAVAILABLE));
        assert!(locator.route().is_none());
    }

    #[tokio::test]
    async fn test_card_distance_computed_locally() {
        let here = Coordinates::new(0.5, 35.2);
        let lookup = seeded_lookup(&[here]).await;
        let mut locator = Locator::new(
            LocatorSettings::default(),
            Arc::new(FixedPositionSource(here)),
            lookup,
        );
        locator.activate(&submission()).await;

        let view = locator.view();
        let police = &view.cards[0];
        assert_eq!(police.name.as_deref(), Some("Central Police Station"));
        assert_eq!(police.distance.as_deref(), Some("1.1 km"));
        assert_eq!(police.phone.as_deref(), Some("999"));
        assert_eq!(view.cards[1].empty_message, Some("No hospitals found nearby"));
    }
}
