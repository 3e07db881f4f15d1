use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_ORIGIN: &str = "http://localhost:8081/";
pub const DEFAULT_STORAGE_ROOT: &str = "./public";
pub const DEFAULT_NAMESPACE: &str = "mirror";
pub const DEFAULT_DOCUMENT: &str = "index.html";
pub const ERROR_LOG_NAME: &str = "error.log";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_BODY_SIZE: usize = 32 * 1024 * 1024;

/// Forward proxy the outbound fetch is routed through.
///
/// Proxy URLs are kept per target scheme. Credentials, when present, are sent
/// as HTTP Basic auth to whichever proxy handles the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    pub http: Option<String>,
    pub https: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Proxy expects absolute-form request lines. reqwest always sends those
    /// for plain-HTTP targets (HTTPS goes through CONNECT), so turning this
    /// off only produces a startup warning.
    pub full_uri: bool,
}

impl ProxyConfig {
    pub fn is_empty(&self) -> bool {
        self.http.is_none() && self.https.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_body_size: usize, // bytes
    pub proxy: Option<ProxyConfig>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            proxy: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssetCacheConfig {
    pub origin: Url,
    pub storage_root: PathBuf,
    pub namespace: String,
    pub default_document: String,
    pub error_log: PathBuf,
    /// Extension (lowercase, no dot) to content type, applied over the built-in table.
    pub mime_overrides: BTreeMap<String, String>,
    pub fetch: FetchConfig,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid origin {value:?}: {source}")]
    InvalidOrigin { value: String, source: url::ParseError },
    #[error("origin must be an absolute http(s) URL")] UnsupportedOrigin,
    #[error("namespace must be a single, non-empty path segment")] InvalidNamespace,
    #[error("default document must be a single, non-empty path segment")] InvalidDefaultDocument,
    #[error("fetch timeout must be > 0")] InvalidTimeout,
    #[error("max body size must be > 0")] InvalidMaxBody,
    #[error("proxy password given without a username")] PasswordWithoutUsername,
    #[error("invalid proxy URL {0:?}")] InvalidProxyUrl(String),
    #[error("invalid value {value:?} for {name}")]
    InvalidValue { name: &'static str, value: String },
    #[error("invalid MIME override {0:?}, expected ext=type")] InvalidMime(String),
}

impl AssetCacheConfig {
    /// Configuration for `origin` with every other setting at its default.
    pub fn new(origin: Url) -> Self {
        let storage_root = PathBuf::from(DEFAULT_STORAGE_ROOT);
        Self {
            origin,
            error_log: storage_root.join(ERROR_LOG_NAME),
            storage_root,
            namespace: DEFAULT_NAMESPACE.to_string(),
            default_document: DEFAULT_DOCUMENT.to_string(),
            mime_overrides: BTreeMap::new(),
            fetch: FetchConfig::default(),
        }
    }

    /// Loads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to its value.
    ///
    /// Empty values count as unset. The result is validated before it is returned.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let origin_raw = var("ASSETCACHE_ORIGIN").unwrap_or_else(|| DEFAULT_ORIGIN.to_string());
        let origin = Url::parse(&origin_raw)
            .map_err(|source| ConfigError::InvalidOrigin { value: origin_raw.clone(), source })?;
        let mut cfg = Self::new(origin);

        if let Some(root) = var("ASSETCACHE_ROOT") {
            cfg.storage_root = PathBuf::from(root);
            cfg.error_log = cfg.storage_root.join(ERROR_LOG_NAME);
        }
        if let Some(log) = var("ASSETCACHE_ERROR_LOG") {
            cfg.error_log = PathBuf::from(log);
        }
        if let Some(namespace) = var("ASSETCACHE_NAMESPACE") {
            cfg.namespace = namespace;
        }
        if let Some(document) = var("ASSETCACHE_DEFAULT_DOCUMENT") {
            cfg.default_document = document;
        }
        if let Some(secs) = var("ASSETCACHE_TIMEOUT_SECS") {
            let secs = parse_number::<u64>("ASSETCACHE_TIMEOUT_SECS", &secs)?;
            cfg.fetch.timeout = Duration::from_secs(secs);
        }
        if let Some(bytes) = var("ASSETCACHE_MAX_BODY_BYTES") {
            cfg.fetch.max_body_size = parse_number("ASSETCACHE_MAX_BODY_BYTES", &bytes)?;
        }
        if let Some(spec) = var("ASSETCACHE_MIME") {
            cfg.mime_overrides = parse_mime_overrides(&spec)?;
        }

        let proxy = ProxyConfig {
            http: var("HTTP_PROXY").or_else(|| var("http_proxy")),
            https: var("HTTPS_PROXY").or_else(|| var("https_proxy")),
            username: var("PROXY_USERNAME"),
            password: var("PROXY_PASSWORD"),
            full_uri: match var("PROXY_FULL_URI") {
                Some(v) => parse_flag("PROXY_FULL_URI", &v)?,
                None => true,
            },
        };
        if !proxy.is_empty() {
            cfg.fetch.proxy = Some(proxy);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.origin.cannot_be_a_base() || !matches!(self.origin.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedOrigin);
        }
        if !is_single_segment(&self.namespace) { return Err(ConfigError::InvalidNamespace); }
        if !is_single_segment(&self.default_document) {
            return Err(ConfigError::InvalidDefaultDocument);
        }
        if self.fetch.timeout.is_zero() { return Err(ConfigError::InvalidTimeout); }
        if self.fetch.max_body_size == 0 { return Err(ConfigError::InvalidMaxBody); }

        if let Some(proxy) = &self.fetch.proxy {
            if proxy.password.is_some() && proxy.username.is_none() {
                return Err(ConfigError::PasswordWithoutUsername);
            }
            for url in proxy.http.iter().chain(proxy.https.iter()) {
                if Url::parse(url).is_err() {
                    return Err(ConfigError::InvalidProxyUrl(url.clone()));
                }
            }
        }
        Ok(())
    }
}

fn is_single_segment(value: &str) -> bool {
    !value.is_empty() && value != "." && value != ".." && !value.contains(['/', '\\'])
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue { name, value: value.to_string() })
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue { name, value: value.to_string() }),
    }
}

/// Parses `ext=type` pairs separated by commas, e.g. `txt=text/plain, wasm=application/wasm`.
pub fn parse_mime_overrides(spec: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut overrides = BTreeMap::new();
    for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (ext, content_type) = entry
            .split_once('=')
            .ok_or_else(|| ConfigError::InvalidMime(entry.to_string()))?;
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        let content_type = content_type.trim();
        if ext.is_empty() || content_type.parse::<mime::Mime>().is_err() {
            return Err(ConfigError::InvalidMime(entry.to_string()));
        }
        overrides.insert(ext, content_type.to_string());
    }
    Ok(overrides)
}
