use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Content type for unknown or missing extensions. Cached documents are
/// mostly HTML fragments of the mirrored site.
pub const DEFAULT_CONTENT_TYPE: &str = "text/html";

/// Extension to content-type lookup.
///
/// `php` maps to HTML: mirrored pages are served as documents, never run.
#[derive(Debug, Clone)]
pub struct MimeResolver {
    table: HashMap<String, String>,
}

impl Default for MimeResolver {
    fn default() -> Self {
        const BUILTIN: [(&str, &str); 19] = [
            ("json", "application/json"),
            ("map", "application/json"),
            ("js", "text/javascript"),
            ("mjs", "text/javascript"),
            ("html", "text/html"),
            ("htm", "text/html"),
            ("php", "text/html"),
            ("css", "text/css"),
            ("txt", "text/plain"),
            ("xml", "text/xml"),
            ("svg", "image/svg+xml"),
            ("png", "image/png"),
            ("jpg", "image/jpeg"),
            ("jpeg", "image/jpeg"),
            ("gif", "image/gif"),
            ("webp", "image/webp"),
            ("ico", "image/x-icon"),
            ("woff", "font/woff"),
            ("woff2", "font/woff2"),
        ];
        let table = BUILTIN
            .iter()
            .map(|(ext, ct)| (ext.to_string(), ct.to_string()))
            .collect();
        Self { table }
    }
}

impl MimeResolver {
    /// Built-in table with `overrides` applied on top.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
        let mut resolver = Self::default();
        for (ext, content_type) in overrides {
            resolver.table.insert(ext.to_ascii_lowercase(), content_type.clone());
        }
        resolver
    }

    pub fn resolve(&self, extension: &str) -> &str {
        self.table
            .get(&extension.to_ascii_lowercase())
            .map(String::as_str)
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    /// Resolves from the extension of `path`'s final component.
    pub fn resolve_path(&self, path: &Path) -> &str {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.resolve(ext),
            None => DEFAULT_CONTENT_TYPE,
        }
    }
}
