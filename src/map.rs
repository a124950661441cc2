//! Description of the emergency-services map.
//!
//! The map is described rather than drawn: a centre, a zoom level, a tile
//! URL template, markers, and an optional route overlay. Any front end that
//! speaks slippy-map tiles can render it.

use serde::Serialize;

use crate::model::{Coordinates, NearestServices, ServiceKind, format_distance};
use crate::routing::Route;

/// OpenStreetMap standard tile layer.
pub const OSM_TILE_TEMPLATE: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Zoom level used when the map is first shown.
pub const DEFAULT_ZOOM: u8 = 13;

/// What a marker stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    User,
    Police,
    Hospital,
}

impl From<ServiceKind> for MarkerKind {
    fn from(kind: ServiceKind) -> Self {
        match kind {
            ServiceKind::Police => MarkerKind::Police,
            ServiceKind::Hospital => MarkerKind::Hospital,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub kind: MarkerKind,
    pub position: Coordinates,
    pub label: String,
    /// Popup lines, e.g. name, distance, and phone.
    pub popup: Vec<String>,
}

/// A route drawn on the map towards one of the services.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteOverlay {
    pub to: ServiceKind,
    pub route: Route,
    pub directions_link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub center: Coordinates,
    pub zoom: u8,
    pub tile_url_template: &'static str,
    pub markers: Vec<Marker>,
    pub route: Option<RouteOverlay>,
}

impl MapView {
    /// Build the map around `user`, with a marker for each service found.
    pub fn new(user: Coordinates, services: &NearestServices) -> Self {
        let mut markers = vec![Marker {
            kind: MarkerKind::User,
            position: user,
            label: "Your Location".to_string(),
            popup: vec!["Your Location".to_string()],
        }];

        for kind in [ServiceKind::Police, ServiceKind::Hospital] {
            let Some(service) = services.get(kind) else {
                continue;
            };

            let mut popup = vec![
                kind.fallback_name().to_string(),
                service.display_name(kind).to_string(),
                format!("{} away", format_distance(service.distance)),
            ];
            if let Some(phone) = service.phone() {
                popup.push(format!("Phone: {phone}"));
            }

            markers.push(Marker {
                kind: kind.into(),
                position: service.coordinates(),
                label: service.display_name(kind).to_string(),
                popup,
            });
        }

        Self {
            center: user,
            zoom: DEFAULT_ZOOM,
            tile_url_template: OSM_TILE_TEMPLATE,
            markers,
            route: None,
        }
    }

    pub fn marker(&self, kind: MarkerKind) -> Option<&Marker> {
        self.markers.iter().find(|m| m.kind == kind)
    }

    /// URL of the tile containing the map centre.
    pub fn center_tile_url(&self) -> String {
        tile_url(self.tile_url_template, self.zoom, self.center)
    }
}

/// Web-Mercator tile indices containing `point` at `zoom`.
pub fn tile_for(zoom: u8, point: Coordinates) -> (i64, i64) {
    let zoom = zoom.min(22);
    let n = 1_i64 << zoom;
    let x_raw = ((point.lng + 180.0) / 360.0 * (n as f64)).floor() as i64;
    let lat_rad = point.lat.to_radians();
    let y_raw = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0
        * (n as f64))
        .floor() as i64;

    let x_tile = ((x_raw % n) + n) % n;
    let y_tile = y_raw.clamp(0, n - 1);
    (x_tile, y_tile)
}

/// Fill a `{s}/{z}/{x}/{y}` template for the tile containing `point`.
pub fn tile_url(template: &str, zoom: u8, point: Coordinates) -> String {
    let (x, y) = tile_for(zoom, point);
    template
        .replace("{s}", "a")
        .replace("{z}", &zoom.min(22).to_string())
        .replace("{x}", &x.to_string())
        .replace("{y}", &y.to_string())
}
