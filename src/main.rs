// Main entry point for the upscale-server application.
// Loads the super-resolution model, configures the Axum router,
// and starts the HTTP server.

mod app;
mod error;
mod filters;
mod handlers;
mod history;
mod image_codec;
mod listeners;
mod models;
mod pipeline;
mod plugin_ffi;
mod plugin_model;
mod shutdown;
mod upload;
mod upscaler;

use app::{AppState, CorsOrigins};
use clap::Parser;
use history::{HistoryLogger, PgHistoryLogger};
use pipeline::PipelineConfig;
use plugin_model::PluginModel;
use std::{path::PathBuf, sync::Arc};
use tracing::Level;
use upscaler::SuperResolution;

fn default_model_path() -> PathBuf {
    PathBuf::from(format!(
        "models/upsclr-plugin-fsrcnn{}",
        std::env::consts::DLL_SUFFIX
    ))
}

/// Command line arguments for upscale-server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct AppConfig {
    /// Hostname/IP to bind the server to.
    /// If this option is specified without value, it will default to "*", meaning the server will listen on all interfaces.
    #[arg(long, env = "UPSCALE_SERVER_HOST", default_value = "localhost", num_args = 0..=1, default_missing_value = "*")]
    host: String,

    /// Port number to listen on.
    #[arg(short, long, env = "UPSCALE_SERVER_PORT", default_value_t = 5000)]
    port: u16,

    /// Upscaler plugin library providing the super-resolution model.
    #[arg(long, env = "UPSCALE_MODEL_PATH", default_value_os_t = default_model_path())]
    model_path: PathBuf,

    /// Engine to use from the plugin. Defaults to the first one it provides.
    #[arg(long, env = "UPSCALE_ENGINE_NAME")]
    engine_name: Option<String>,

    /// JSON configuration passed to the engine.
    #[arg(long, env = "UPSCALE_ENGINE_CONFIG", default_value = "{}")]
    engine_config: String,

    /// Fixed upscale factor of the model.
    #[arg(long, env = "UPSCALE_SCALE", default_value_t = 3, value_parser = clap::value_parser!(u32).range(2..=16))]
    scale: u32,

    /// Inputs whose width or height exceeds this are shrunk before upscaling.
    #[arg(long, env = "UPSCALE_MAX_DIM", default_value_t = 1200, value_parser = clap::value_parser!(u32).range(1..))]
    max_dim: u32,

    /// JPEG quality of the result.
    #[arg(long, env = "UPSCALE_JPEG_QUALITY", default_value_t = image_codec::DEFAULT_JPEG_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Apply a median denoise pass before upscaling.
    #[arg(long, env = "UPSCALE_PRE_DENOISE", action = clap::ArgAction::SetTrue)]
    pre_denoise: bool,

    /// Allowed CORS origins: "*" or a comma-separated list.
    #[arg(long, env = "UPSCALE_CORS_ORIGINS", default_value = "*")]
    cors_origins: String,

    /// Maximum accepted request body size in bytes.
    #[arg(long, env = "UPSCALE_MAX_UPLOAD_BYTES", default_value_t = app::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    /// PostgreSQL URL for request history. History is disabled when unset.
    #[arg(long, env = "UPSCALE_HISTORY_URL")]
    history_url: Option<String>,

    /// Log at DEBUG level instead of INFO.
    #[arg(short, long, env = "UPSCALE_VERBOSE", action = clap::ArgAction::SetTrue)]
    verbose: bool,
}

fn load_model(config: &AppConfig) -> Option<Arc<dyn SuperResolution>> {
    tracing::info!("Loading super-resolution model from {:?}", config.model_path);

    // Loading runs plugin code through FFI.
    let result = unsafe {
        PluginModel::load(
            &config.model_path,
            config.engine_name.as_deref(),
            &config.engine_config,
            config.scale,
        )
    };

    match result {
        Ok(model) => {
            let info = model.info();
            tracing::info!(
                "AI engine loaded: {} v{} / {} v{} (x{})",
                info.plugin_name,
                info.plugin_version,
                info.engine_name,
                info.engine_version,
                config.scale
            );
            Some(Arc::new(model))
        }
        Err(e) => {
            tracing::error!("Model unavailable, /upscale will fail: {}", e);
            None
        }
    }
}

async fn connect_history(url: &str) -> Option<Arc<dyn HistoryLogger>> {
    let logger = match PgHistoryLogger::connect_lazy(url) {
        Ok(logger) => logger,
        Err(e) => {
            tracing::warn!("History logging disabled, invalid database URL: {}", e);
            return None;
        }
    };

    match logger.ensure_schema().await {
        Ok(()) => tracing::info!("History logging enabled"),
        Err(e) => tracing::warn!(
            "History store not reachable at startup ({}); records will be attempted anyway",
            e
        ),
    }

    Some(Arc::new(logger))
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Parse command line args and environment variables
    let config = AppConfig::parse();

    tracing_subscriber::fmt()
        .with_max_level(if config.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting upscale-server...");

    let cors = CorsOrigins::parse(&config.cors_origins).unwrap_or_else(|err| {
        tracing::error!("FATAL: Invalid CORS origins: {}", err);
        std::process::exit(1);
    });

    let pipeline = PipelineConfig {
        pre_denoise: config.pre_denoise,
        max_dim: config.max_dim,
        jpeg_quality: config.jpeg_quality,
    };
    tracing::info!(
        "Pipeline: max_dim={}, jpeg_quality={}, pre_denoise={}",
        pipeline.max_dim,
        pipeline.jpeg_quality,
        pipeline.pre_denoise
    );

    let upscaler = load_model(&config);

    let history = match &config.history_url {
        Some(url) => connect_history(url).await,
        None => {
            tracing::info!("History logging not configured");
            None
        }
    };

    let app = app::create_app(
        AppState {
            upscaler,
            pipeline,
            history,
            cors,
        },
        config.max_upload_bytes,
    );

    tracing::info!("Axum router configured.");

    let listener = match listeners::create_listener(&config.host, config.port).await {
        Ok((addr, l)) => {
            tracing::info!("Server successfully bound. Listening on {}", addr);
            l
        }
        Err(e) => {
            tracing::error!("FATAL: Failed to bind server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await
    {
        tracing::error!("Server run error: {}", e);
    }

    tracing::info!("upscale-server has shut down.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::try_parse_from(["upscale-server"]).unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5000);
        assert_eq!(config.scale, 3);
        assert_eq!(config.max_dim, 1200);
        assert_eq!(config.jpeg_quality, 95);
        assert!(!config.pre_denoise);
        assert_eq!(config.cors_origins, "*");
        assert!(config.history_url.is_none());
        assert_eq!(config.model_path, default_model_path());
    }

    #[test]
    fn test_host_without_value_means_all_interfaces() {
        let config = AppConfig::try_parse_from(["upscale-server", "--host"]).unwrap();
        assert_eq!(config.host, "*");
    }

    #[test]
    fn test_revision_settings() {
        let config = AppConfig::try_parse_from([
            "upscale-server",
            "--max-dim",
            "1000",
            "--jpeg-quality",
            "98",
            "--pre-denoise",
        ])
        .unwrap();
        assert_eq!(config.max_dim, 1000);
        assert_eq!(config.jpeg_quality, 98);
        assert!(config.pre_denoise);
    }

    #[test]
    fn test_rejects_out_of_range_quality() {
        assert!(AppConfig::try_parse_from(["upscale-server", "--jpeg-quality", "0"]).is_err());
        assert!(AppConfig::try_parse_from(["upscale-server", "--jpeg-quality", "101"]).is_err());
    }

    #[test]
    fn test_missing_model_leaves_service_unready() {
        let config = AppConfig::try_parse_from([
            "upscale-server",
            "--model-path",
            "no/such/dir/model.so",
        ])
        .unwrap();
        assert!(load_model(&config).is_none());
    }
}
