use crate::config::{FetchConfig, ProxyConfig};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::{redirect, Client, Proxy, StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid client configuration: {0}")]
    Client(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("response exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(e.to_string())
        } else if e.is_builder() {
            FetchError::Client(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// Status and body of a completed upstream request, whatever the status.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Outbound GET against the origin.
///
/// A non-2xx answer is `Ok`; `Err` means no usable response arrived.
#[async_trait::async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

/// reqwest-backed fetcher sharing one connection pool across requests.
///
/// Each call is a single attempt: redirects are not followed, the whole
/// exchange is bounded by the configured timeout, and bodies larger than
/// `max_body_size` are abandoned mid-stream.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_body_size: usize,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        // Proxy env vars are not picked up implicitly; only `config.proxy` counts.
        let mut builder = Client::builder()
            .no_proxy()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .redirect(redirect::Policy::none());

        if let Some(proxy) = &config.proxy {
            for p in build_proxies(proxy)? {
                builder = builder.proxy(p);
            }
        }

        let client = builder.build().map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client, max_body_size: config.max_body_size })
    }
}

/// Builds one reqwest proxy per configured target scheme, with basic auth attached.
pub fn build_proxies(config: &ProxyConfig) -> Result<Vec<Proxy>, FetchError> {
    if !config.full_uri {
        tracing::warn!(
            "full_uri disabled, but plain-HTTP proxy requests always use absolute-form URIs"
        );
    }

    let mut proxies = Vec::new();
    if let Some(url) = &config.http {
        let proxy = Proxy::http(url)
            .map_err(|e| FetchError::Client(format!("invalid HTTP proxy URL {url}: {e}")))?;
        proxies.push(with_auth(proxy, config));
    }
    if let Some(url) = &config.https {
        let proxy = Proxy::https(url)
            .map_err(|e| FetchError::Client(format!("invalid HTTPS proxy URL {url}: {e}")))?;
        proxies.push(with_auth(proxy, config));
    }
    Ok(proxies)
}

fn with_auth(proxy: Proxy, config: &ProxyConfig) -> Proxy {
    match &config.username {
        Some(username) => proxy.basic_auth(username, config.password.as_deref().unwrap_or("")),
        None => proxy,
    }
}

#[async_trait::async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();

        // Pre-flight size check based on Content-Length header
        if let Some(len) = resp.content_length() {
            if len > self.max_body_size as u64 {
                return Err(FetchError::TooLarge { limit: self.max_body_size });
            }
        }

        // Enforce the cap while streaming too; Content-Length may be absent or wrong
        let mut buf = BytesMut::with_capacity(8192);
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await.transpose()? {
            if buf.len() + chunk.len() > self.max_body_size {
                return Err(FetchError::TooLarge { limit: self.max_body_size });
            }
            buf.extend_from_slice(&chunk);
        }

        tracing::debug!("Fetched {} ({}, {} bytes)", url, status, buf.len());
        Ok(FetchResponse { status, body: buf.freeze() })
    }
}
