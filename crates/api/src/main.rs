use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use lifeguard_inference::{DetectorConfig, HttpDetector};
use lifeguard_pipeline::{DetectionPipeline, SessionStore};
use lifeguard_vision::ffmpeg_source::FfmpegOpener;
use lifeguard_vision::FrameAnnotator;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lifeguard_api::background::session_sweeper;
use lifeguard_api::config::{LogFormat, ServerConfig};
use lifeguard_api::router::build_app_router;
use lifeguard_api::state::AppState;

/// How long shutdown waits for cancelled sessions to clean up.
const SESSION_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::from_env();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "lifeguard_api=debug,lifeguard_pipeline=debug,lifeguard_inference=info,tower_http=debug"
            .into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Upload staging ---
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .expect("Failed to create upload directory");
    tracing::info!(upload_dir = %config.upload_dir.display(), "Upload directory ready");

    // --- Detector ---
    let detector_config = DetectorConfig::from_env().expect("Invalid detector configuration");
    let pipeline = match HttpDetector::load(&detector_config).await {
        Ok(detector) => Some(Arc::new(DetectionPipeline::new(
            Arc::new(detector),
            Arc::new(FfmpegOpener::new()),
            build_annotator(&config),
            config.pipeline_config(detector_config.request_timeout),
        ))),
        Err(e) => {
            tracing::error!(
                error = %e,
                url = %detector_config.base_url,
                model = %detector_config.model,
                "Failed to load detector model; detection endpoints are disabled",
            );
            None
        }
    };

    // --- Sessions ---
    let sessions = Arc::new(SessionStore::new(config.store_config()));

    let sweeper_cancel = CancellationToken::new();
    let sweeper_handle = tokio::spawn(session_sweeper::run(
        Arc::clone(&sessions),
        config.sweep_interval(),
        sweeper_cancel.clone(),
    ));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        sessions: Arc::clone(&sessions),
        pipeline: pipeline.clone(),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, model_loaded = pipeline.is_some(), "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    sweeper_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), sweeper_handle).await;
    tracing::info!("Session sweeper stopped");

    if let Some(pipeline) = &pipeline {
        pipeline.close();
    }
    sessions.cancel_all().await;
    let drained = tokio::time::timeout(SESSION_DRAIN_TIMEOUT, async {
        while sessions.active_count().await > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .is_ok();
    if drained {
        tracing::info!("All detection sessions stopped");
    } else {
        tracing::warn!(
            active = sessions.active_count().await,
            "Detection sessions still running at shutdown"
        );
    }

    tracing::info!("Graceful shutdown complete");
}

fn build_annotator(config: &ServerConfig) -> FrameAnnotator {
    let annotator = FrameAnnotator::new(config.jpeg_quality);
    let Some(path) = &config.annotation_font_path else {
        return annotator;
    };
    match FrameAnnotator::load_font(path) {
        Ok(font) => {
            tracing::info!(font = %path.display(), "Annotation font loaded");
            annotator.with_font(font)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Annotation font unavailable; drawing boxes only");
            annotator
        }
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
