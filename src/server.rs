//! HTTP surface: routes, shared state, and error-to-response mapping.
//!
//! | Route | Body | Success |
//! |-------|------|---------|
//! | `POST /convert-pdf-to-png/`    | `{pdf_url, zoom?}` | `{message, images}` |
//! | `POST /parse-pdf-to-markdown/` | `{pdf_url}`        | `{message, markdown_pages}` |
//! | `POST /process-pdf/`           | `{pdf_url, zoom?}` | `{message, markdown_pages, images}` |
//! | `GET  /health`                 | –                  | `{status, version}` |
//!
//! Errors are returned as `{"error": <kind>, "detail": <message>}`. The image
//! route reports caller mistakes (bad zoom, failed download) as 400; the
//! Markdown and combined routes report every failure as 500. A timeout is
//! always 504. A body that does not parse is 400 on every route.

use crate::config::ServerConfig;
use crate::convert::Converter;
use crate::error::Pdf2PngError;
use crate::output::{ImagesResponse, MarkdownResponse, ProcessResponse};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    converter: Converter,
    default_zoom: u32,
}

impl AppState {
    pub fn new(converter: Converter, default_zoom: u32) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                converter,
                default_zoom,
            }),
        }
    }

    /// Build the production state (real fetcher + parsing service client).
    pub fn from_config(config: &ServerConfig) -> Result<Self, Pdf2PngError> {
        Ok(Self::new(
            Converter::from_config(config)?,
            config.default_zoom,
        ))
    }

    fn zoom_or_default(&self, zoom: Option<i64>) -> i64 {
        zoom.unwrap_or(i64::from(self.inner.default_zoom))
    }
}

/// Request body shared by the three conversion routes.
#[derive(Debug, Clone, Deserialize)]
pub struct PdfRequest {
    pub pdf_url: String,
    #[serde(default)]
    pub zoom: Option<i64>,
}

impl PdfRequest {
    fn from_body(body: Result<Json<PdfRequest>, JsonRejection>) -> Result<Self, ApiError> {
        body.map(|Json(request)| request).map_err(ApiError::bad_request)
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    detail: String,
}

/// A pipeline error paired with the status it is reported with.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    source: Pdf2PngError,
}

impl ApiError {
    /// Caller-input errors become 400, timeouts 504, everything else 500.
    pub fn classified(source: Pdf2PngError) -> Self {
        let status = match &source {
            Pdf2PngError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, source }
    }

    /// Every failure becomes 500, except timeouts (504).
    pub fn opaque(source: Pdf2PngError) -> Self {
        let status = match &source {
            Pdf2PngError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, source }
    }

    /// A body that could not be read as a [`PdfRequest`]; 400 on every route.
    pub fn bad_request(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            source: Pdf2PngError::InvalidRequest(rejection.body_text()),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{} ({}): {}", self.status, self.source.kind(), self.source);
        } else {
            tracing::warn!("{} ({}): {}", self.status, self.source.kind(), self.source);
        }

        let body = Json(ErrorResponse {
            error: self.source.kind(),
            detail: self.source.to_string(),
        });

        (self.status, body).into_response()
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn convert_pdf_to_png(
    State(state): State<AppState>,
    body: Result<Json<PdfRequest>, JsonRejection>,
) -> Result<Json<ImagesResponse>, ApiError> {
    let request = PdfRequest::from_body(body)?;
    let zoom = state.zoom_or_default(request.zoom);
    let images = state
        .inner
        .converter
        .convert_to_images(&request.pdf_url, zoom)
        .await
        .map_err(ApiError::classified)?;

    Ok(Json(ImagesResponse {
        message: "PDF converted to PNG images successfully".to_string(),
        images,
    }))
}

async fn parse_pdf_to_markdown(
    State(state): State<AppState>,
    body: Result<Json<PdfRequest>, JsonRejection>,
) -> Result<Json<MarkdownResponse>, ApiError> {
    let request = PdfRequest::from_body(body)?;
    let markdown_pages = state
        .inner
        .converter
        .parse_to_markdown(&request.pdf_url)
        .await
        .map_err(ApiError::opaque)?;

    Ok(Json(MarkdownResponse {
        message: "PDF parsed to Markdown successfully".to_string(),
        markdown_pages,
    }))
}

async fn process_pdf(
    State(state): State<AppState>,
    body: Result<Json<PdfRequest>, JsonRejection>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let request = PdfRequest::from_body(body)?;
    let zoom = state.zoom_or_default(request.zoom);
    let (markdown_pages, images) = state
        .inner
        .converter
        .process(&request.pdf_url, zoom)
        .await
        .map_err(ApiError::opaque)?;

    Ok(Json(ProcessResponse {
        message: "Processing successful".to_string(),
        markdown_pages,
        images,
    }))
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/convert-pdf-to-png/", post(convert_pdf_to_png))
        .route("/parse-pdf-to-markdown/", post(parse_pdf_to_markdown))
        .route("/process-pdf/", post(process_pdf))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `config.bind_addr()` and serve until Ctrl+C / SIGTERM.
pub async fn serve(config: &ServerConfig, state: AppState) -> std::io::Result<()> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("pdf2png-api listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
