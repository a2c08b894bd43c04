use crate::config::ConvertConfig;
use crate::handlers;
use crate::models::TargetFormat;
use crate::services::{ConversionService, Workspace};
use crate::workers::{CommandExecutor, ConversionGate, Converter, LibreOfficeConverter};
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id_middleware, REQUEST_ID_HEADER};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

pub const LANDING_PAGE: &str = "index.html";

#[derive(Clone)]
pub struct AppState {
    pub config: ConvertConfig,
    pub workspace: Workspace,
    pub conversions: ConversionService,
    pub default_format: TargetFormat,
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the service around headless LibreOffice.
    pub async fn build(config: ConvertConfig) -> Result<Self, AppError> {
        let converter: Arc<dyn Converter> = Arc::new(LibreOfficeConverter::new(
            config.conversion.soffice_path.clone(),
            CommandExecutor::new(config.conversion.command_timeout()),
        ));
        Self::build_with_converter(config, converter).await
    }

    pub async fn build_with_converter(
        config: ConvertConfig,
        converter: Arc<dyn Converter>,
    ) -> Result<Self, AppError> {
        let default_format =
            TargetFormat::new(&config.conversion.default_format).map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("DEFAULT_TARGET_FORMAT: {}", e))
            })?;

        let workspace = Workspace::new(&config.workspace.upload_dir)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to initialize working directory at {}: {}",
                    config.workspace.upload_dir.display(),
                    e
                );
                e
            })?;

        let gate = ConversionGate::new(
            config.conversion.max_concurrent,
            config.conversion.queue_timeout(),
        );
        let conversions = ConversionService::new(workspace.clone(), converter, gate);

        let state = AppState {
            config: config.clone(),
            workspace,
            conversions,
            default_format,
        };

        let router = build_router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            port,
            upload_dir = %config.workspace.upload_dir.display(),
            max_concurrent = config.conversion.max_concurrent,
            "Server is running"
        );

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router).await
    }

    pub async fn run_until<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

pub fn build_router(state: AppState) -> Router {
    let public_dir = &state.config.workspace.public_dir;
    // Known assets are served as-is; any other GET lands on the index page.
    let landing = ServeDir::new(public_dir).fallback(ServeFile::new(public_dir.join(LANDING_PAGE)));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        // GET /convert is just another page request.
        .route(
            "/convert",
            post(handlers::convert_document).fallback_service(landing.clone()),
        )
        .fallback_service(landing)
        .layer(from_fn(metrics_middleware))
        .layer(DefaultBodyLimit::max(state.config.conversion.max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
