//! # as-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the sync engine.

use std::path::PathBuf;
use std::sync::Arc;

use as_core::{BroadcastHub, Message, SyncEngine, TransferStreamer};
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::middleware::ClientAddress;

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SyncEngine>,
    pub hub: Arc<BroadcastHub>,
    pub streamer: Arc<TransferStreamer>,
    /// Reported by `/api/status`.
    pub scratch_root: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub total_messages: usize,
    pub subscribers: usize,
    pub temp_dir: String,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct SendTextRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SendTextResponse {
    pub success: bool,
    pub message_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message_id: Uuid,
    /// Storage name to pass to the download route
    pub filename: String,
}

/// Diagnostic summary of the server.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "running",
        message: "AutoSync server is active",
        total_messages: state.engine.message_count(),
        subscribers: state.hub.subscriber_count(),
        temp_dir: state.scratch_root.display().to_string(),
    })
}

/// The whole ledger, in append order.
pub async fn list_messages(State(state): State<AppState>) -> Json<MessagesResponse> {
    Json(MessagesResponse {
        messages: state.engine.list_all(),
    })
}

pub async fn send_text(
    State(state): State<AppState>,
    ClientAddress(sender): ClientAddress,
    payload: Result<Json<SendTextRequest>, JsonRejection>,
) -> ApiResult<Json<SendTextResponse>> {
    let Json(request) = payload.map_err(|_| ApiError::bad_request("Missing 'text' field"))?;

    let message = state.engine.submit_text(request.text, sender).await?;
    Ok(Json(SendTextResponse {
        success: true,
        message_id: message.id,
    }))
}

/// Accepts a multipart form whose `file` part carries the payload.
pub async fn upload(
    State(state): State<AppState>,
    ClientAddress(sender): ClientAddress,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Rejected(e.status(), e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let display_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::Rejected(e.status(), e.body_text()))?;

        let message = state.engine.submit_file(display_name, data, sender).await?;
        let filename = message.storage_name().unwrap_or_default().to_string();
        return Ok(Json(UploadResponse {
            success: true,
            message_id: message.id,
            filename,
        }));
    }

    Err(ApiError::bad_request("No file uploaded"))
}

/// Streams a stored blob. Length is announced up front; a failure
/// mid-stream aborts the connection.
pub async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    let handle = state.streamer.open(&filename).await?;
    let size = handle.metadata().size_bytes;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime::APPLICATION_OCTET_STREAM.as_ref())
        .header(header::CONTENT_LENGTH, size)
        .header(header::CONTENT_DISPOSITION, content_disposition(&filename))
        .body(Body::from_stream(handle.produce()))
        .map_err(|e| ApiError::Rejected(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// `attachment` with an ASCII fallback name plus the RFC 5987 UTF-8 form.
fn content_disposition(name: &str) -> HeaderValue {
    let fallback: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || b"-._~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }

    HeaderValue::from_str(&format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}"
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_encodes_non_ascii() {
        let value = content_disposition("0190_résumé final.pdf");
        let text = value.to_str().unwrap();
        assert!(text.starts_with("attachment; filename=\"0190_r_sum__final.pdf\""));
        assert!(text.ends_with("filename*=UTF-8''0190_r%C3%A9sum%C3%A9%20final.pdf"));
    }
}
