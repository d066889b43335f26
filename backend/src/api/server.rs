//! HTTP Server for the catalog importer.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                          |
//! |--------|-------------------|--------------------------------------|
//! | GET    | `/health`         | Health check                         |
//! | POST   | `/api/import`     | Upload a CSV export and import it    |
//! | GET    | `/api/logs`       | SSE stream for real-time logs        |

use axum::{
    extract::{Multipart, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use super::logs::LOG_BROADCASTER;
use super::types::{error_response, ImportResponse};
use crate::error::{ImportError, ImportResult};
use crate::import::Importer;

type ApiError = (StatusCode, Json<Value>);

/// Start the HTTP server
pub async fn start_server(port: u16, importer: Importer) -> ImportResult<()> {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    let app = router(Arc::new(importer)).layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "catalog import server listening");
    info!("POST /api/import - upload CSV export");
    info!("GET  /api/logs   - SSE log stream");
    info!("GET  /health     - health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(importer: Arc<Importer>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/import", post(import_csv))
        .route("/api/logs", get(sse_logs))
        .with_state(importer)
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "catalog-import",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "import": "POST /api/import",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Upload and import a CSV export
async fn import_csv(
    State(importer): State<Arc<Importer>>,
    mut multipart: Multipart,
) -> Result<Json<ImportResponse>, ApiError> {
    let mut file_data = None;
    let mut file_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().map(|s| s.to_string());
            file_data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Read error: {}", e)))?,
            );
        }
    }

    let bytes = file_data.ok_or_else(|| bad_request("No file provided".to_string()))?;
    info!(
        file = file_name.as_deref().unwrap_or("unknown"),
        bytes = bytes.len(),
        "import upload received"
    );

    let stats = importer.import_reader(&bytes[..]).await.map_err(|e| {
        error!(error = %e, "import failed");
        match e {
            ImportError::Csv(_) => bad_request(e.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, Json(error_response(&e.to_string()))),
        }
    })?;

    Ok(Json(ImportResponse::from(stats)))
}

fn bad_request(message: String) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(error_response(&message)))
}
