#![allow(dead_code)]

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Serves `app` on an ephemeral localhost port for the rest of the test.
pub async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Counts every request the test origin receives.
#[derive(Clone, Default)]
pub struct Hits(Arc<AtomicUsize>);

impl Hits {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

async fn count(
    State(hits): State<Hits>,
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    hits.0.fetch_add(1, Ordering::SeqCst);
    next.run(req).await
}

/// Origin with a handful of fixed behaviours.
pub fn origin(hits: Hits) -> Router {
    Router::new()
        .route(
            "/assets/app.js",
            get(|| async {
                ([(header::CONTENT_TYPE, "application/javascript")], "console.log(1)")
            }),
        )
        .route("/index.html", get(|| async { "<h1>home</h1>" }))
        .route("/data/a.json", get(|| async { "{\"a\":1}" }))
        .route("/down", get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                "late"
            }),
        )
        .route("/big", get(|| async { "x".repeat(4096) }))
        .route(
            "/moved",
            get(|| async { (StatusCode::FOUND, [(header::LOCATION, "/assets/app.js")], "") }),
        )
        .route("/echo/*rest", get(|uri: Uri| async move { uri.path().to_string() }))
        .layer(axum::middleware::from_fn_with_state(hits, count))
}

/// Stand-in forward proxy: answers every request with the request target it
/// saw and the `Proxy-Authorization` header it was given.
pub fn proxy() -> Router {
    Router::new().fallback(|uri: Uri, headers: HeaderMap| async move {
        let auth = headers
            .get(header::PROXY_AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();
        format!("{}|{}", uri, auth).into_response()
    })
}
