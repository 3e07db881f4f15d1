use axum::{
    body::Body,
    extract::State,
    http::Uri,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;

pub mod cache;
pub mod config;
pub mod errlog;
pub mod fetch;
pub mod mime_table;
pub mod path;
pub mod service;

use crate::config::ConfigError;
use crate::fetch::FetchError;
use crate::service::{AssetResponse, CacheService};

#[derive(Error, Debug)]
pub enum AssetCacheError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Fetcher error: {0}")]
    Fetch(#[from] FetchError),
}

pub type Result<T> = std::result::Result<T, AssetCacheError>;

impl IntoResponse for AssetResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, Body::from(self.body)).into_response()
    }
}

// The raw path goes through undecoded; `PathMapper` splits it before decoding.
async fn asset_handler(State(service): State<Arc<CacheService>>, uri: Uri) -> AssetResponse {
    service.handle(uri.path()).await
}

/// Router serving every `GET` path through `service`.
///
/// `/` maps to the default document. Other methods are answered with 405 by
/// axum.
pub fn router(service: CacheService) -> Router {
    let state = Arc::new(service);
    Router::new()
        .route("/", get(asset_handler))
        .route("/*path", get(asset_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
