//! # oracle: ask questions about an image
//!
//! `oracle` is a small single-page web service. The browser submits an image
//! and a prompt; the service uploads the image to Cloudflare R2 over the
//! S3-compatible API, hands the resulting `s3://bucket/key` reference plus
//! the prompt to a remote inference backend, and streams the backend's text
//! answer back to the browser chunk by chunk.
//!
//! ## Request Flow
//!
//! `GET /` serves the upload page (embedded HTML with drag-and-drop preview
//! and a persisted dark-mode toggle). `POST /process` validates the
//! multipart form, writes exactly one object to storage under
//! `uploads/{uuid}{ext}`, POSTs the storage URI and prompt as JSON to the
//! configured backend, and relays the response body as a streamed
//! `text/plain` answer. Stylesheet and icon assets are compiled into the
//! binary and served under `/styles/`.
//!
//! Each request is handled independently; the only shared state is the
//! immutable [`AppState`] built once at startup. Backend and storage
//! settings are optional at boot - requests that need a missing setting fail
//! with a 500 instead of the process refusing to start.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use oracle::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = oracle::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     oracle::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod backend;
pub mod config;
pub mod errors;
mod static_assets;
pub mod storage;
pub mod telemetry;

use axum::{Router, extract::DefaultBodyLimit, routing::get, routing::post};
use bon::Builder;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, instrument, warn};

use backend::BackendClient;
pub use config::Config;
use storage::{ObjectStorage, R2Storage};

/// Application state shared across all request handlers.
///
/// Built once at startup and treated as read-only for the process lifetime.
/// `storage` is `None` while the R2 settings are incomplete (lenient
/// startup); requests that need it fail individually.
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub storage: Option<Arc<dyn ObjectStorage>>,
    pub backend: BackendClient,
}

/// Build the application router with all endpoints and middleware.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> Router {
    let max_upload = state.config.limits.max_upload_bytes;

    Router::new()
        .route("/", get(api::handlers::pages::index))
        .route("/styles/{*path}", get(api::handlers::static_assets::serve_style))
        .route(
            "/process",
            post(api::handlers::process::process)
                .get(api::handlers::process::method_not_allowed)
                .layer(DefaultBodyLimit::max(max_upload)),
        )
        .route("/healthz", get(|| async { "OK" }))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Main application struct that owns the router and listener lifecycle.
///
/// 1. **Create**: [`Application::new`] builds the storage and backend
///    clients from configuration
/// 2. **Serve**: [`Application::serve`] binds the TCP port and handles
///    requests until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let storage = match R2Storage::from_config(&config).await {
            Some(storage) => Some(Arc::new(storage) as Arc<dyn ObjectStorage>),
            None => {
                warn!(
                    "Object storage is not fully configured; uploads will fail until \
                     account_id, access_key_id, access_key_secret and bucket_name are all set"
                );
                None
            }
        };
        if config.backend_url.is_none() {
            warn!("BACKEND_URL is not set; /process requests will fail until it is configured");
        }

        let backend = BackendClient::new(config.backend_url.clone(), config.backend.request_timeout);

        let state = AppState::builder()
            .config(config.clone())
            .maybe_storage(storage)
            .backend(backend)
            .build();

        let router = build_router(state);

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Oracle listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        Ok(())
    }
}
