//! Local HTTP web seed for integration tests.
//!
//! Serves one static body under `/files/{name}`; everything else is 404.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

async fn serve_file(Path(_name): Path<String>, State(body): State<Arc<Vec<u8>>>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, body.len().to_string()),
        ],
        body.as_ref().clone(),
    )
        .into_response()
}

/// Starts the server on an ephemeral port. Returns the base URL, e.g.
/// `http://127.0.0.1:12345/`. Runs until the test runtime shuts down.
pub async fn start(body: Vec<u8>) -> String {
    let app = Router::new()
        .route("/files/{name}", get(serve_file))
        .with_state(Arc::new(body));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/", addr)
}
