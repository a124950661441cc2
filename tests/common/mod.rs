//! Stub reporting backend for integration tests.
//!
//! Serves the report, nearest-services and routing endpoints on an ephemeral
//! local port and records every request it receives.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tokio::net::TcpListener;

/// How the stub answers the next report submission.
pub const ACCEPT: u8 = 0;
pub const REJECT_WITH_MESSAGE: u8 = 1;
pub const REJECT_WITHOUT_BODY: u8 = 2;
pub const ACCEPT_WITHOUT_ID: u8 = 3;

/// An uploaded evidence part.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
}

#[derive(Clone, Default)]
pub struct Backend {
    pub submissions: Arc<AtomicUsize>,
    pub lookups: Arc<AtomicUsize>,
    pub routes: Arc<AtomicUsize>,
    /// Mode for the next submission; reset to [`ACCEPT`] after use.
    pub next_submission: Arc<AtomicU8>,
    /// Status returned by the nearest-services endpoint (0 means 200).
    pub lookup_status: Arc<AtomicU16>,
    pub last_fields: Arc<Mutex<HashMap<String, String>>>,
    pub last_upload: Arc<Mutex<Option<Upload>>>,
    pub last_query: Arc<Mutex<Option<(f64, f64)>>>,
}

impl Backend {
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn route_requests(&self) -> usize {
        self.routes.load(Ordering::SeqCst)
    }

    pub fn fail_next_submission(&self, mode: u8) {
        self.next_submission.store(mode, Ordering::SeqCst);
    }

    pub fn fail_lookups(&self, status: u16) {
        self.lookup_status.store(status, Ordering::SeqCst);
    }

    pub fn field(&self, name: &str) -> Option<String> {
        self.last_fields.lock().unwrap().get(name).cloned()
    }

    pub fn upload(&self) -> Option<Upload> {
        self.last_upload.lock().unwrap().clone()
    }

    pub fn last_query(&self) -> Option<(f64, f64)> {
        *self.last_query.lock().unwrap()
    }
}

async fn post_report(State(backend): State<Backend>, mut multipart: Multipart) -> Response {
    let n = backend.submissions.fetch_add(1, Ordering::SeqCst) + 1;

    let mut fields = HashMap::new();
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        if name == "evidence" {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.unwrap();
            upload = Some(Upload {
                file_name,
                content_type,
                size: bytes.len(),
            });
        } else {
            fields.insert(name, field.text().await.unwrap());
        }
    }
    *backend.last_fields.lock().unwrap() = fields;
    *backend.last_upload.lock().unwrap() = upload;

    match backend.next_submission.swap(ACCEPT, Ordering::SeqCst) {
        REJECT_WITH_MESSAGE => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"message": "Database unavailable"})),
        )
            .into_response(),
        REJECT_WITHOUT_BODY => (StatusCode::INTERNAL_SERVER_ERROR, "oops").into_response(),
        ACCEPT_WITHOUT_ID => (StatusCode::CREATED, Json(json!({"status": "received"}))).into_response(),
        _ => (
            StatusCode::CREATED,
            Json(json!({"id": n, "created_at": "2026-10-17T08:00:00Z"})),
        )
            .into_response(),
    }
}

async fn nearest_services(
    State(backend): State<Backend>,
    Query(query): Query<HashMap<String, f64>>,
) -> Response {
    backend.lookups.fetch_add(1, Ordering::SeqCst);

    let status = backend.lookup_status.load(Ordering::SeqCst);
    if status != 0 {
        let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (code, Json(json!({"message": "lookup failed"}))).into_response();
    }

    let lat = query.get("lat").copied().unwrap_or_default();
    let lng = query.get("lng").copied().unwrap_or_default();
    *backend.last_query.lock().unwrap() = Some((lat, lng));

    Json(json!({
        "police": {
            "name": "Kilimani Police Station",
            "lat": lat + 0.005,
            "lng": lng,
            "distance": 556.0,
            "phone": "020 2222222"
        },
        "hospital": {
            "name": "",
            "lat": lat,
            "lng": lng + 0.02,
            "distance": 2224.0,
            "phone": null
        }
    }))
    .into_response()
}

async fn osrm_route(State(backend): State<Backend>, Path(coords): Path<String>) -> Response {
    backend.routes.fetch_add(1, Ordering::SeqCst);

    let points: Vec<Vec<f64>> = coords
        .split(';')
        .map(|pair| pair.split(',').filter_map(|v| v.parse().ok()).collect())
        .collect();

    Json(json!({
        "code": "Ok",
        "routes": [{
            "distance": 612.5,
            "duration": 95.0,
            "geometry": {"type": "LineString", "coordinates": points}
        }]
    }))
    .into_response()
}

/// Start the stub backend. Returns its state and base URL
/// (`http://127.0.0.1:PORT`); the API lives under `/api`.
pub async fn spawn_backend() -> (Backend, String) {
    let backend = Backend::default();

    let app = Router::new()
        .route("/api/reports/", post(post_report))
        .route("/api/nearest-services", get(nearest_services))
        .route("/route/v1/driving/:coords", get(osrm_route))
        .with_state(backend.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (backend, format!("http://{addr}"))
}

pub fn http_timeout() -> Duration {
    Duration::from_secs(5)
}
