use crate::cache::{DiskStore, Store, StoreError};
use crate::config::AssetCacheConfig;
use crate::errlog::{ErrorLog, ErrorLogEntry, FileErrorLog};
use crate::fetch::{Fetch, FetchError, HttpFetcher};
use crate::mime_table::{MimeResolver, DEFAULT_CONTENT_TYPE};
use crate::path::PathMapper;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;

/// Body of every upstream failure response.
pub const UNAVAILABLE_BODY: &str = "Fora do ar";

pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-methods", "POST, GET, OPTIONS, PUT, DELETE"),
    ("access-control-allow-headers", "Content-Type, Authorization"),
];

const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Local,
    /// Fetched from the origin on this request. `persisted` is false when
    /// the local write failed and the bytes were passed straight through.
    Remote { persisted: bool },
}

#[derive(Debug, Clone)]
pub struct ServedAsset {
    pub storage_key: PathBuf,
    pub content_type: String,
    pub body: Bytes,
    pub served_from: ServedFrom,
}

#[derive(Debug)]
pub enum RemoteFailure {
    Status { url: String, status: StatusCode },
    Fetch { url: String, error: FetchError },
}

impl RemoteFailure {
    pub fn url(&self) -> &str {
        match self {
            RemoteFailure::Status { url, .. } | RemoteFailure::Fetch { url, .. } => url,
        }
    }

    fn log_message(&self) -> String {
        match self {
            RemoteFailure::Status { url, status } => format!(
                "Failed to fetch file from remote server. URL: {}, Status Code: {}",
                url,
                status.as_u16()
            ),
            RemoteFailure::Fetch { url, error } => {
                format!("Exception while fetching file: {} (URL: {})", error, url)
            }
        }
    }
}

/// What happened to a request before it is flattened into a response.
#[derive(Debug)]
pub enum CopyOutcome {
    Success(ServedAsset),
    RemoteFailure(RemoteFailure),
    LocalFailure(StoreError),
}

/// Framework-independent response: status, headers and body.
#[derive(Debug, Clone)]
pub struct AssetResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl AssetResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn plain(status: StatusCode, body: &'static str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(PLAIN_TEXT));
        Self { status, headers, body: Bytes::from_static(body.as_bytes()) }
    }
}

impl From<CopyOutcome> for AssetResponse {
    fn from(outcome: CopyOutcome) -> Self {
        match outcome {
            CopyOutcome::Success(asset) => {
                let mut headers = HeaderMap::new();
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_str(&asset.content_type)
                        .unwrap_or(HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
                );
                for (name, value) in CORS_HEADERS {
                    headers.insert(name, HeaderValue::from_static(value));
                }
                Self { status: StatusCode::OK, headers, body: asset.body }
            }
            CopyOutcome::RemoteFailure(_) => Self::plain(StatusCode::NOT_FOUND, UNAVAILABLE_BODY),
            CopyOutcome::LocalFailure(_) => {
                Self::plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }
}

/// Serves mirrored assets, filling the local copy from the origin on a miss.
///
/// Holds no per-request state; share it behind an `Arc`.
pub struct CacheService {
    mapper: PathMapper,
    mime: MimeResolver,
    store: Arc<dyn Store>,
    fetcher: Arc<dyn Fetch>,
    log: Arc<dyn ErrorLog>,
}

impl CacheService {
    pub fn new(
        mapper: PathMapper,
        mime: MimeResolver,
        store: Arc<dyn Store>,
        fetcher: Arc<dyn Fetch>,
        log: Arc<dyn ErrorLog>,
    ) -> Self {
        Self { mapper, mime, store, fetcher, log }
    }

    /// Disk store, reqwest fetcher and file error log wired from `config`.
    pub fn from_config(config: &AssetCacheConfig) -> crate::Result<Self> {
        config.validate()?;
        let mapper = PathMapper::new(
            config.origin.clone(),
            config.default_document.clone(),
            config.namespace.clone(),
        );
        Ok(Self::new(
            mapper,
            MimeResolver::with_overrides(&config.mime_overrides),
            Arc::new(DiskStore::new(&config.storage_root)),
            Arc::new(HttpFetcher::new(&config.fetch)?),
            Arc::new(FileErrorLog::new(&config.error_log)),
        ))
    }

    /// Handles one request path and always produces exactly one response.
    pub async fn handle(&self, request_path: &str) -> AssetResponse {
        self.resolve(request_path).await.into()
    }

    /// Serve from the local copy, or fetch, persist and serve. Upstream
    /// failures are written to the error log.
    pub async fn resolve(&self, request_path: &str) -> CopyOutcome {
        let mapped = self.mapper.map(request_path);

        if let Some(key) = self.store.locate(&mapped.storage_key).await {
            tracing::debug!("Cache hit for {}", key.display());
            return match self.store.read(&key).await {
                Ok(body) => CopyOutcome::Success(ServedAsset {
                    content_type: self.mime.resolve_path(&key).to_string(),
                    storage_key: key,
                    body,
                    served_from: ServedFrom::Local,
                }),
                Err(e) => {
                    tracing::error!("Failed to read cached file {}: {}", key.display(), e);
                    CopyOutcome::LocalFailure(e)
                }
            };
        }

        tracing::debug!(
            "Cache miss for {}, fetching {}",
            mapped.storage_key.display(),
            mapped.remote_url
        );
        let response = match self.fetcher.fetch(&mapped.remote_url).await {
            Ok(response) => response,
            Err(error) => {
                return self.fail(RemoteFailure::Fetch { url: mapped.remote_url, error }).await;
            }
        };
        if !response.is_success() {
            let failure = RemoteFailure::Status { url: mapped.remote_url, status: response.status };
            return self.fail(failure).await;
        }

        let written = self.store.write(&mapped.storage_key, response.body.clone()).await;
        let (storage_key, persisted) = match written {
            Ok(written) => {
                tracing::info!("Cached {} from {}", written.display(), mapped.remote_url);
                (written, true)
            }
            Err(e) => {
                // Serve what we fetched even if it could not be kept
                tracing::warn!("Failed to store {}: {}", mapped.storage_key.display(), e);
                self.log
                    .append(ErrorLogEntry::now(format!(
                        "Failed to store fetched file. URL: {}, Error: {}",
                        mapped.remote_url, e
                    )))
                    .await;
                (mapped.storage_key, false)
            }
        };

        CopyOutcome::Success(ServedAsset {
            content_type: self.mime.resolve_path(&storage_key).to_string(),
            storage_key,
            body: response.body,
            served_from: ServedFrom::Remote { persisted },
        })
    }

    async fn fail(&self, failure: RemoteFailure) -> CopyOutcome {
        let message = failure.log_message();
        tracing::warn!("{}", message);
        self.log.append(ErrorLogEntry::now(message)).await;
        CopyOutcome::RemoteFailure(failure)
    }
}
