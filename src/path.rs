use percent_encoding::{percent_decode_str, percent_encode, AsciiSet, CONTROLS};
use std::path::PathBuf;
use url::Url;

/// Bytes escaped in an upstream path segment. `%` and `/` included, so a
/// decoded segment goes back out as exactly one segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Where a request path lives locally and upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedPath {
    /// Relative to the storage root, always under the namespace directory.
    pub storage_key: PathBuf,
    pub remote_url: String,
}

/// Maps inbound request paths to storage keys and origin URLs.
///
/// Input is the path as it arrived on the wire, still percent-encoded. It is
/// split on literal `/` first and each segment decoded on its own, so an
/// encoded `%2F` stays inside its segment. Every key lives beneath a single
/// namespace directory so cached copies never collide with a sibling tree
/// served from the same root.
#[derive(Debug, Clone)]
pub struct PathMapper {
    origin: Url,
    default_document: String,
    namespace: String,
}

impl PathMapper {
    pub fn new(
        origin: Url,
        default_document: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            origin,
            default_document: default_document.into(),
            namespace: namespace.into(),
        }
    }

    pub fn map(&self, request_path: &str) -> MappedPath {
        let segments = self.segments(request_path);

        let mut storage_key = PathBuf::from(&self.namespace);
        storage_key.extend(segments.iter().map(|s| key_segment(s)));

        let mut remote = self.origin.clone();
        remote.set_query(None);
        remote.set_fragment(None);
        // A trailing slash on the origin would leave an empty segment.
        let mut path = remote.path().trim_end_matches('/').to_string();
        for segment in &segments {
            path.push('/');
            path.extend(percent_encode(segment, SEGMENT));
        }
        remote.set_path(&path);

        MappedPath { storage_key, remote_url: remote.into() }
    }

    /// Decoded path segments: query dropped, empty and dot segments skipped.
    fn segments(&self, request_path: &str) -> Vec<Vec<u8>> {
        let clean = request_path.split('?').next().unwrap_or_default();
        let segments: Vec<Vec<u8>> = clean
            .split('/')
            .map(|raw| percent_decode_str(raw).collect::<Vec<u8>>())
            .filter(|s| !s.is_empty() && s != b"." && s != b"..")
            .collect();
        if segments.is_empty() {
            vec![self.default_document.as_bytes().to_vec()]
        } else {
            segments
        }
    }
}

/// File name for one decoded segment. Readable text is kept as is; `%`, `/`,
/// NUL and bytes that are not UTF-8 are written back as `%XX`, so distinct
/// segments never share a name.
fn key_segment(decoded: &[u8]) -> String {
    let mut name = String::with_capacity(decoded.len());
    for chunk in decoded.utf8_chunks() {
        for c in chunk.valid().chars() {
            match c {
                '%' | '/' | '\0' => name.push_str(&format!("%{:02X}", c as u8)),
                _ => name.push(c),
            }
        }
        for byte in chunk.invalid() {
            name.push_str(&format!("%{:02X}", byte));
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper(origin: &str) -> PathMapper {
        PathMapper::new(Url::parse(origin).unwrap(), "index.html", "mirror")
    }

    #[test]
    fn empty_path_maps_to_default_document() {
        let m = mapper("https://origin.example/");
        for input in ["", "/", "?v=3", "./.."] {
            let mapped = m.map(input);
            assert_eq!(mapped.storage_key, PathBuf::from("mirror/index.html"), "input {input:?}");
            assert_eq!(mapped.remote_url, "https://origin.example/index.html");
        }
    }

    #[test]
    fn query_is_not_part_of_key_or_url() {
        let m = mapper("https://origin.example/");
        let mapped = m.map("css/site.css?v=12&x=y");
        assert_eq!(mapped.storage_key, PathBuf::from("mirror/css/site.css"));
        assert_eq!(mapped.remote_url, "https://origin.example/css/site.css");
        assert_eq!(m.map("css/site.css"), mapped);
    }

    #[test]
    fn nested_paths_mirror_under_namespace() {
        let mapped = mapper("https://origin.example/").map("foo/bar/baz.json");
        assert_eq!(mapped.storage_key, PathBuf::from("mirror/foo/bar/baz.json"));
        assert_eq!(mapped.remote_url, "https://origin.example/foo/bar/baz.json");
    }

    #[test]
    fn origin_path_prefix_is_kept() {
        let with_slash = mapper("https://origin.example/static/").map("a/b.js");
        let without_slash = mapper("https://origin.example/static").map("a/b.js");
        assert_eq!(with_slash.remote_url, "https://origin.example/static/a/b.js");
        assert_eq!(without_slash.remote_url, with_slash.remote_url);
    }

    #[test]
    fn unsafe_characters_are_encoded_per_segment() {
        let mapped = mapper("https://origin.example/").map("img/summer sale #1.png");
        assert_eq!(mapped.remote_url, "https://origin.example/img/summer%20sale%20%231.png");
        assert_eq!(mapped.storage_key, PathBuf::from("mirror/img/summer sale #1.png"));
    }

    #[test]
    fn dot_segments_cannot_escape_the_namespace() {
        let mapped = mapper("https://origin.example/").map("../../etc/passwd");
        assert_eq!(mapped.storage_key, PathBuf::from("mirror/etc/passwd"));
        assert_eq!(mapped.remote_url, "https://origin.example/etc/passwd");
    }

    #[test]
    fn distinct_paths_get_distinct_keys() {
        let m = mapper("https://origin.example/");
        assert_ne!(m.map("a/b").storage_key, m.map("a/b.html").storage_key);
        assert_ne!(m.map("a/b").storage_key, m.map("b/a").storage_key);
    }

    #[test]
    fn encoded_slash_stays_inside_its_segment() {
        let m = mapper("https://origin.example/");
        let encoded = m.map("/a%2Fb.css");
        let nested = m.map("/a/b.css");

        assert_eq!(encoded.storage_key, PathBuf::from("mirror/a%2Fb.css"));
        assert_eq!(encoded.remote_url, "https://origin.example/a%2Fb.css");
        assert_eq!(nested.storage_key, PathBuf::from("mirror/a/b.css"));
        assert_ne!(encoded.storage_key, nested.storage_key);
        assert_ne!(encoded.remote_url, nested.remote_url);
    }

    #[test]
    fn non_utf8_bytes_are_kept_literally() {
        let mapped = mapper("https://origin.example/").map("/img/caf%E9.png");
        assert_eq!(mapped.storage_key, PathBuf::from("mirror/img/caf%E9.png"));
        assert_eq!(mapped.remote_url, "https://origin.example/img/caf%E9.png");

        let utf8 = mapper("https://origin.example/").map("/img/caf%C3%A9.png");
        assert_eq!(utf8.storage_key, PathBuf::from("mirror/img/café.png"));
        assert_eq!(utf8.remote_url, "https://origin.example/img/caf%C3%A9.png");
    }

    #[test]
    fn escaped_percent_does_not_alias_an_encoded_slash() {
        let m = mapper("https://origin.example/");
        let percent = m.map("/a%252Fb.css");
        assert_eq!(percent.storage_key, PathBuf::from("mirror/a%252Fb.css"));
        assert_eq!(percent.remote_url, "https://origin.example/a%252Fb.css");
        assert_ne!(percent.storage_key, m.map("/a%2Fb.css").storage_key);
    }

    #[test]
    fn encoded_dot_segments_are_dropped_too() {
        let mapped = mapper("https://origin.example/").map("/%2E%2E/%2e%2e/etc/passwd");
        assert_eq!(mapped.storage_key, PathBuf::from("mirror/etc/passwd"));
        assert_eq!(mapped.remote_url, "https://origin.example/etc/passwd");
    }
}
