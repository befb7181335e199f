use super::state::AppState;
use crate::error::RelayError;
use crate::registry::{CompletedStream, RecordingMeta, StreamSession};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    pub service: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StreamsResponse {
    pub streams: Vec<StreamSession>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PastStreamsResponse {
    pub past_streams: Vec<CompletedStream>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub stream: CompletedStream,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match &self {
            RelayError::StreamNotFound(_) | RelayError::RecordingNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            RelayError::DuplicateStream(_) => StatusCode::CONFLICT,
            RelayError::Protocol(_) | RelayError::InvalidRecording(_) => StatusCode::BAD_REQUEST,
            RelayError::PeerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::Storage(_) | RelayError::ArtifactRemoval { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /
pub async fn root(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(ServiceStatus {
        status: "ok".to_string(),
        service: state.service_name.clone(),
    })
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /streams
/// Active streams
pub async fn list_streams(State(state): State<AppState>) -> Json<StreamsResponse> {
    Json(StreamsResponse {
        streams: state.relay.active_streams().await,
    })
}

/// GET /past-streams
/// Completed, recorded streams
pub async fn list_past_streams(State(state): State<AppState>) -> Json<PastStreamsResponse> {
    Json(PastStreamsResponse {
        past_streams: state.relay.completed_streams().await,
    })
}

/// GET /past-streams/:stream_id
pub async fn get_past_stream(
    State(state): State<AppState>,
    Path(stream_id): Path<String>,
) -> Result<Json<CompletedStream>, RelayError> {
    state
        .relay
        .completed_stream(&stream_id)
        .await
        .map(Json)
        .ok_or(RelayError::RecordingNotFound(stream_id))
}

/// DELETE /past-streams/:stream_id
/// Delete a recording and its video artifact
pub async fn delete_past_stream(
    State(state): State<AppState>,
    Path(stream_id): Path<String>,
) -> Result<Json<SuccessResponse>, RelayError> {
    state.recordings.delete(&stream_id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /upload-recording
/// Multipart upload of a finished stream's video plus its metadata
pub async fn upload_recording(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, RelayError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(invalid_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "video" {
            form.video = Some(field.bytes().await.map_err(invalid_multipart)?);
        } else {
            let value = field.text().await.map_err(invalid_multipart)?;
            form.set(&name, value);
        }
    }

    let (meta, video) = form.into_parts()?;
    info!(
        "Recording upload for {} ({} bytes, {:.1}s)",
        meta.stream_id,
        video.len(),
        meta.duration_seconds
    );

    let stream = state.recordings.ingest(meta, &video).await?;
    Ok(Json(UploadResponse {
        success: true,
        stream,
    }))
}

fn invalid_multipart(e: MultipartError) -> RelayError {
    RelayError::InvalidRecording(e.body_text())
}

/// Fields collected from an upload form
#[derive(Debug, Default)]
struct UploadForm {
    stream_id: Option<String>,
    started_at: Option<String>,
    ended_at: Option<String>,
    latitude: Option<String>,
    longitude: Option<String>,
    notes: Option<String>,
    duration_seconds: Option<String>,
    video: Option<Bytes>,
}

impl UploadForm {
    fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "stream_id" => &mut self.stream_id,
            "started_at" => &mut self.started_at,
            "ended_at" => &mut self.ended_at,
            "latitude" => &mut self.latitude,
            "longitude" => &mut self.longitude,
            "notes" => &mut self.notes,
            "duration_seconds" => &mut self.duration_seconds,
            other => {
                warn!("Ignoring unknown upload field {:?}", other);
                return;
            }
        };
        *slot = Some(value);
    }

    fn into_parts(self) -> Result<(RecordingMeta, Bytes), RelayError> {
        let meta = RecordingMeta {
            stream_id: required("stream_id", self.stream_id)?,
            started_at: parse_timestamp("started_at", self.started_at)?,
            ended_at: parse_timestamp("ended_at", self.ended_at)?,
            latitude: parse_number("latitude", self.latitude)?,
            longitude: parse_number("longitude", self.longitude)?,
            notes: self.notes.unwrap_or_default(),
            duration_seconds: parse_number("duration_seconds", self.duration_seconds)?,
        };
        let video = self
            .video
            .ok_or_else(|| RelayError::InvalidRecording("missing field video".to_string()))?;
        Ok((meta, video))
    }
}

fn required(field: &str, value: Option<String>) -> Result<String, RelayError> {
    value.ok_or_else(|| RelayError::InvalidRecording(format!("missing field {}", field)))
}

fn parse_number(field: &str, value: Option<String>) -> Result<f64, RelayError> {
    let raw = required(field, value)?;
    raw.trim()
        .parse()
        .map_err(|_| RelayError::InvalidRecording(format!("{} is not a number: {:?}", field, raw)))
}

/// RFC 3339, or a naive ISO 8601 timestamp taken as UTC
fn parse_timestamp(field: &str, value: Option<String>) -> Result<DateTime<Utc>, RelayError> {
    let raw = required(field, value)?;
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| RelayError::InvalidRecording(format!("{} is not a timestamp: {:?}", field, raw)))
}
