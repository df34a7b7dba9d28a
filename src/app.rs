use crate::{
    handlers, history::HistoryLogger, pipeline::PipelineConfig, upscaler::SuperResolution,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::Level;

/// Default maximum size of an upload request body.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024; // 32MB

/// Origins allowed to call the API from a browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<HeaderValue>),
}

impl CorsOrigins {
    /// Parses `*` or a comma-separated list of origins.
    pub fn parse(value: &str) -> Result<Self, String> {
        let value = value.trim();
        if value.is_empty() || value == "*" {
            return Ok(CorsOrigins::Any);
        }
        let origins = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| HeaderValue::from_str(s).map_err(|e| format!("invalid origin '{}': {}", s, e)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CorsOrigins::List(origins))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, CorsOrigins::Any)
    }

    /// Value of `Access-Control-Allow-Origin` for a request from `origin`,
    /// or `None` when that origin is not allowed.
    pub fn allowed_origin(&self, origin: Option<&HeaderValue>) -> Option<HeaderValue> {
        match self {
            CorsOrigins::Any => Some(HeaderValue::from_static("*")),
            CorsOrigins::List(list) => origin.filter(|o| list.contains(o)).cloned(),
        }
    }

    fn layer(&self) -> CorsLayer {
        let origin = match self {
            CorsOrigins::Any => AllowOrigin::any(),
            CorsOrigins::List(list) => AllowOrigin::list(list.clone()),
        };
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    }
}

/// Shared, read-only state of the service.
///
/// `upscaler` is set once at startup; `None` means the model failed to load.
#[derive(Clone)]
pub struct AppState {
    pub upscaler: Option<Arc<dyn SuperResolution>>,
    pub pipeline: PipelineConfig,
    pub history: Option<Arc<dyn HistoryLogger>>,
    pub cors: CorsOrigins,
}

pub fn create_app(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = state.cors.layer();
    Router::new()
        // Health / readiness probe
        .route("/", get(handlers::health_check).layer(cors.clone()))
        // The CORS layer only wraps POST; OPTIONS is added after it so the
        // preflight handler answers instead of the layer.
        .route(
            "/upscale",
            post(handlers::upscale_image)
                .layer(cors)
                .options(handlers::upscale_preflight),
        )
        // Limit the maximum size of request bodies
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        // Add tracing for HTTP requests and responses
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::new().level(Level::INFO)))
        .with_state(state)
}
