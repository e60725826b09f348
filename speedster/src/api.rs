use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use mongodb::bson::DateTime;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::serde_helpers::{
    serialize_bson_datetime_as_rfc3339_string, serialize_object_id_as_hex_string,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::auditor::{AuditReports, Auditor};
use crate::decode::{self, DecodeError};
use crate::metrics_defs;
use crate::store::{ScanStore, StoreError};
use crate::types::Scan;

/// Shared handler context, built once at startup and cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ScanStore>,
    pub auditor: Arc<Auditor>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/scans", get(list_scans).post(create_scan))
        .route("/scans/{id}", get(get_scan).delete(delete_scan))
        .with_state(state)
}

/// Client-settable fields only; everything else is assigned server-side.
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct CreateScanRequest {
    url: String,
}

/// Wire form of a scan. Storage keeps the raw ObjectId and BSON datetime;
/// clients see a hex id and an RFC 3339 timestamp.
#[derive(Serialize)]
struct ScanResponse {
    #[serde(serialize_with = "serialize_object_id_as_hex_string")]
    id: ObjectId,
    url: String,
    json: String,
    html: String,
    #[serde(serialize_with = "serialize_bson_datetime_as_rfc3339_string")]
    created_at: DateTime,
}

impl From<Scan> for ScanResponse {
    fn from(scan: Scan) -> Self {
        ScanResponse {
            id: scan.id,
            url: scan.url,
            json: scan.json,
            html: scan.html,
            created_at: scan.created_at,
        }
    }
}

impl ScanResponse {
    /// The zero record a successful delete answers with.
    fn empty() -> Self {
        ScanResponse {
            id: ObjectId::from_bytes([0; 12]),
            url: String::new(),
            json: String::new(),
            html: String::new(),
            created_at: DateTime::from_millis(0),
        }
    }
}

#[derive(thiserror::Error, Debug)]
enum ApiError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Decode(DecodeError::TooLarge) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };

        // Failure bodies are the bare message text; the content type stays
        // JSON on every response, success or not.
        (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            self.to_string(),
        )
            .into_response()
    }
}

async fn list_scans(State(state): State<AppState>) -> Result<Json<Vec<ScanResponse>>, ApiError> {
    let scans = state.store.list().await?;
    Ok(Json(scans.into_iter().map(ScanResponse::from).collect()))
}

async fn create_scan(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ScanResponse>, ApiError> {
    let request: CreateScanRequest = decode::from_slice(&body)?;

    // The id doubles as the audit's artifact name, so concurrent creations
    // never share an output path.
    let id = ObjectId::new();

    let started = Instant::now();
    let reports = match state.auditor.audit(&request.url, &id.to_hex()).await {
        Ok(reports) => reports,
        Err(err) => {
            // A failed audit still produces a record, with empty payloads.
            metrics::counter!(metrics_defs::AUDITOR_FAILURES.name).increment(1);
            tracing::warn!(url = %request.url, %err, "auditor run failed");
            AuditReports::empty()
        }
    };
    metrics::histogram!(metrics_defs::AUDIT_DURATION.name).record(started.elapsed().as_secs_f64());

    let scan = Scan::new(id, request.url, reports.json, reports.html);
    tracing::info!(id = %scan.id, url = %scan.url, "inserting scan");
    state.store.insert(&scan).await?;
    metrics::counter!(metrics_defs::SCANS_CREATED.name).increment(1);

    Ok(Json(scan.into()))
}

async fn get_scan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ScanResponse>, ApiError> {
    let scan = state.store.find(&id).await?;
    Ok(Json(scan.into()))
}

async fn delete_scan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ScanResponse>, ApiError> {
    state.store.delete(&id).await?;
    Ok(Json(ScanResponse::empty()))
}
