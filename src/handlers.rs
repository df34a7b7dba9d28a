// Axum handler functions for each API endpoint.

use crate::{
    app::AppState,
    error::ApiError,
    history::HistoryRecord,
    models::{HealthResponse, MessageResponse, UpscaleResponse},
    pipeline,
    upload::extract_upload,
};
use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use base64::prelude::{BASE64_STANDARD, Engine as _};
use chrono::Utc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

// --- GET / ---
// Health / readiness probe. Always 200.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Active".to_string(),
        model_loaded: state.upscaler.is_some(),
        scale: state.upscaler.as_ref().map(|model| model.scale()),
        cors: if state.cors.is_any() {
            "Enabled"
        } else {
            "Restricted"
        }
        .to_string(),
    })
}

/// Methods advertised by the `/upscale` preflight.
pub const PREFLIGHT_METHODS: &str = "POST, OPTIONS";

// --- OPTIONS /upscale ---
// CORS preflight. Always 200, with or without a loaded model.
pub async fn upscale_preflight(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let mut response = Json(MessageResponse {
        message: "OK".to_string(),
    })
    .into_response();

    let out = response.headers_mut();
    match state.cors.allowed_origin(headers.get(header::ORIGIN)) {
        Some(origin) => {
            out.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        None => debug!("Preflight from disallowed origin: {:?}", headers.get(header::ORIGIN)),
    }
    if !state.cors.is_any() {
        out.insert(header::VARY, HeaderValue::from_static("origin"));
    }
    out.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(PREFLIGHT_METHODS),
    );
    out.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
    response
}

// --- POST /upscale ---
// Upscales the multipart `image` field and returns it as a JPEG data URI.
pub async fn upscale_image(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<UpscaleResponse>, ApiError> {
    let model = state.upscaler.clone().ok_or(ApiError::ModelUnavailable)?;

    let request_id = Uuid::new_v4();
    let upload = extract_upload(request).await?;
    let filename = upload
        .filename
        .clone()
        .unwrap_or_else(|| "unknown".to_string());
    info!(
        "Upscale request: request_id={}, filename={}, bytes={}",
        request_id,
        filename,
        upload.data.len()
    );

    let started = Instant::now();
    let config = state.pipeline;
    // A panic inside the pipeline surfaces as a JoinError, not a dead worker.
    let output = tokio::task::spawn_blocking(move || {
        pipeline::run(
            &*model,
            &config,
            &upload.data,
            upload.content_type.as_deref(),
        )
    })
    .await??;

    info!(
        "Upscale completed: request_id={}, {} -> {} in {} ms",
        request_id,
        output.original,
        output.upscaled,
        started.elapsed().as_millis()
    );

    if let Some(history) = &state.history {
        debug!("Submitting history record: request_id={}", request_id);
        history.record(HistoryRecord {
            filename,
            timestamp: Utc::now(),
            original_size: output.input.to_string(),
            upscaled_size: output.upscaled.to_string(),
        });
    }

    Ok(Json(UpscaleResponse {
        image: format!("data:image/jpeg;base64,{}", BASE64_STANDARD.encode(&output.jpeg)),
        old_res: output.original.to_string(),
        new_res: output.upscaled.to_string(),
        input_res: output.input.to_string(),
    }))
}
