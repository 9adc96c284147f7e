//! Request path resolution.
//!
//! Maps URL paths to files below the webroot and loads them into
//! [`CacheEntry`] values: bytes, content type and a strong version token.

use std::io;
use std::path::{Component, Path, PathBuf};

use axum::body::Bytes;
use md5::{Digest, Md5};
use percent_encoding::percent_decode_str;

use crate::agent;

/// File served for directory requests and as the SPA entry document.
pub(crate) const INDEX_FILE: &str = "index.html";

/// Content type used when the extension is unknown.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A resolved response body with its metadata.
///
/// Entries are immutable; a changed file yields a new entry.
#[derive(Clone, Debug)]
pub(crate) struct CacheEntry {
    /// Body bytes, post-processed for their content type.
    pub(crate) contents: Bytes,
    /// `Content-Type` header value.
    pub(crate) content_type: String,
    /// Quoted strong `ETag` value.
    pub(crate) version: String,
}

/// Resolution error.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No file exists for the request.
    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Any other I/O failure.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// File being resolved.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
}

impl ResolveError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => {
                Self::NotFound(path.to_path_buf())
            }
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    /// Whether this error means the resource does not exist.
    pub(crate) fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// What a request path refers to.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Target {
    /// The live reload agent script.
    Agent,
    /// A filesystem path below the webroot (not yet checked for existence).
    File(PathBuf),
}

/// Post-processing applied to a body based on its content type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PostProcess {
    /// Append the agent `<script>` tag.
    InjectAgent,
    /// Serve bytes unchanged.
    Passthrough,
}

/// Content type essence to post-processing behavior.
const POST_PROCESSING: &[(&str, PostProcess)] = &[("text/html", PostProcess::InjectAgent)];

impl PostProcess {
    /// Look up the behavior for a `Content-Type` value (parameters ignored).
    pub(crate) fn for_content_type(content_type: &str) -> Self {
        let essence = content_type.split(';').next().unwrap_or_default().trim();

        POST_PROCESSING
            .iter()
            .find(|(category, _)| category.eq_ignore_ascii_case(essence))
            .map_or(Self::Passthrough, |(_, behavior)| *behavior)
    }

    /// Apply the behavior to a body.
    pub(crate) fn apply(self, mut contents: Vec<u8>) -> Vec<u8> {
        match self {
            Self::InjectAgent => {
                contents.extend_from_slice(agent::SCRIPT_TAG.as_bytes());
                contents
            }
            Self::Passthrough => contents,
        }
    }
}

/// Resolves request paths against a webroot.
pub(crate) struct FileResolver {
    webroot: PathBuf,
    spa: bool,
    agent: CacheEntry,
}

impl FileResolver {
    /// Create a resolver for an already canonicalized webroot.
    pub(crate) fn new(webroot: PathBuf, spa: bool) -> Self {
        Self {
            webroot,
            spa,
            agent: agent::agent_entry(),
        }
    }

    /// Map a URL path to a [`Target`] confined to the webroot.
    ///
    /// `..` segments never climb above the webroot; segments that are not
    /// plain file names are rejected as not found.
    pub(crate) fn locate(&self, request_path: &str) -> Result<Target, ResolveError> {
        let not_found = || ResolveError::NotFound(PathBuf::from(request_path));

        let decoded = percent_decode_str(request_path)
            .decode_utf8()
            .map_err(|_| not_found())?;

        let mut segments: Vec<&str> = Vec::new();
        for segment in decoded.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                name => {
                    if !is_plain_name(name) {
                        return Err(not_found());
                    }
                    segments.push(name);
                }
            }
        }

        if segments.last() == Some(&agent::AGENT_FILE_NAME) {
            return Ok(Target::Agent);
        }

        let mut path = self.webroot.clone();
        path.extend(segments);
        Ok(Target::File(path))
    }

    /// Path of the SPA entry document if the fallback applies to this request.
    ///
    /// Only extensionless paths fall back, so missing assets still 404.
    pub(crate) fn spa_fallback(&self, request_path: &str) -> Option<PathBuf> {
        if !self.spa {
            return None;
        }

        let last_segment = request_path.rsplit('/').next().unwrap_or_default();
        if last_segment.contains('.') {
            return None;
        }

        Some(self.webroot.join(INDEX_FILE))
    }

    /// The synthetic agent entry.
    pub(crate) fn agent(&self) -> CacheEntry {
        self.agent.clone()
    }

    /// Read a file (or a directory's index document) from disk.
    pub(crate) async fn load(&self, path: &Path) -> Result<CacheEntry, ResolveError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| ResolveError::from_io(path, e))?;

        let file = if metadata.is_dir() {
            path.join(INDEX_FILE)
        } else {
            path.to_path_buf()
        };

        let bytes = tokio::fs::read(&file)
            .await
            .map_err(|e| ResolveError::from_io(&file, e))?;

        let content_type = content_type_for(&file);
        let contents = PostProcess::for_content_type(&content_type).apply(bytes);
        let version = compute_version(&contents);

        tracing::debug!(
            path = %file.display(),
            content_type = %content_type,
            size = contents.len(),
            "Resolved file"
        );

        Ok(CacheEntry {
            contents: Bytes::from(contents),
            content_type,
            version,
        })
    }
}

/// Whether a decoded URL segment is a single normal path component.
fn is_plain_name(name: &str) -> bool {
    if name.contains('\0') {
        return false;
    }

    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Content type for a file path, by extension.
fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .map_or_else(|| DEFAULT_CONTENT_TYPE.to_owned(), |mime| mime.to_string())
}

/// Compute the `ETag` for a body.
///
/// MD5 truncated to 64 bits (16 hex chars), quoted as a strong validator.
pub(crate) fn compute_version(contents: &[u8]) -> String {
    let hash = Md5::digest(contents);
    format!("\"{}\"", &hex::encode(hash)[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn resolver(spa: bool) -> (TempDir, FileResolver) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        (dir, FileResolver::new(root, spa))
    }

    #[test]
    fn test_locate_joins_segments() {
        let (_dir, resolver) = resolver(false);

        let target = resolver.locate("/css/site.css").unwrap();

        assert_eq!(
            target,
            Target::File(resolver.webroot.join("css").join("site.css"))
        );
    }

    #[test]
    fn test_locate_cannot_escape_webroot() {
        let (_dir, resolver) = resolver(false);

        let target = resolver.locate("/../../etc/passwd").unwrap();
        assert_eq!(
            target,
            Target::File(resolver.webroot.join("etc").join("passwd"))
        );

        let target = resolver.locate("/a/%2e%2e/%2e%2e/%2e%2e/secret").unwrap();
        assert_eq!(target, Target::File(resolver.webroot.join("secret")));
    }

    #[test]
    fn test_locate_collapses_trailing_slash() {
        let (_dir, resolver) = resolver(false);

        assert_eq!(
            resolver.locate("/docs/").unwrap(),
            resolver.locate("/docs").unwrap()
        );
        assert_eq!(
            resolver.locate("/").unwrap(),
            Target::File(resolver.webroot.clone())
        );
    }

    #[test]
    fn test_locate_decodes_percent_escapes() {
        let (_dir, resolver) = resolver(false);

        let target = resolver.locate("/my%20file.txt").unwrap();

        assert_eq!(target, Target::File(resolver.webroot.join("my file.txt")));
    }

    #[test]
    fn test_locate_rejects_nul() {
        let (_dir, resolver) = resolver(false);

        let err = resolver.locate("/bad%00name").unwrap_err();

        assert!(err.is_not_found());
    }

    #[test]
    fn test_locate_agent_in_any_directory() {
        let (_dir, resolver) = resolver(false);

        assert_eq!(resolver.locate("/__s4d__.js").unwrap(), Target::Agent);
        assert_eq!(resolver.locate("/nested/__s4d__.js").unwrap(), Target::Agent);
    }

    #[test]
    fn test_spa_fallback_only_for_extensionless_paths() {
        let (_dir, resolver) = resolver(true);

        assert_eq!(
            resolver.spa_fallback("/app/settings"),
            Some(resolver.webroot.join("index.html"))
        );
        assert_eq!(resolver.spa_fallback("/missing.js"), None);
    }

    #[test]
    fn test_spa_fallback_disabled() {
        let (_dir, resolver) = resolver(false);

        assert_eq!(resolver.spa_fallback("/app/settings"), None);
    }

    #[test]
    fn test_post_process_mapping() {
        assert_eq!(
            PostProcess::for_content_type("text/html"),
            PostProcess::InjectAgent
        );
        assert_eq!(
            PostProcess::for_content_type("text/html; charset=utf-8"),
            PostProcess::InjectAgent
        );
        assert_eq!(
            PostProcess::for_content_type("text/css"),
            PostProcess::Passthrough
        );
    }

    #[test]
    fn test_inject_agent_appends_literal_suffix() {
        let body = PostProcess::InjectAgent.apply(b"<p>Hi</p>".to_vec());

        assert_eq!(
            String::from_utf8(body).unwrap(),
            format!("<p>Hi</p>{}", agent::SCRIPT_TAG)
        );
    }

    #[test]
    fn test_compute_version_format() {
        let version = compute_version(b"content");

        assert!(version.starts_with('"'));
        assert!(version.ends_with('"'));
        assert_eq!(version.len(), 18);
        assert_ne!(version, compute_version(b"content2"));
    }

    #[test]
    fn test_content_type_defaults_to_octet_stream() {
        assert_eq!(content_type_for(Path::new("a.css")), "text/css");
        assert_eq!(
            content_type_for(Path::new("a.unknown_ext_xyz")),
            "application/octet-stream"
        );
        assert_eq!(
            content_type_for(Path::new("LICENSE")),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn test_load_file() {
        let (_dir, resolver) = resolver(false);
        std::fs::write(resolver.webroot.join("style.css"), "body {}").unwrap();

        let entry = resolver
            .load(&resolver.webroot.join("style.css"))
            .await
            .unwrap();

        assert_eq!(&entry.contents[..], b"body {}");
        assert_eq!(entry.content_type, "text/css");
        assert_eq!(entry.version, compute_version(b"body {}"));
    }

    #[tokio::test]
    async fn test_load_directory_serves_index_with_agent() {
        let (_dir, resolver) = resolver(false);
        std::fs::create_dir(resolver.webroot.join("docs")).unwrap();
        std::fs::write(resolver.webroot.join("docs/index.html"), "Hello").unwrap();

        let entry = resolver
            .load(&resolver.webroot.join("docs"))
            .await
            .unwrap();

        assert_eq!(entry.content_type, "text/html");
        let body = String::from_utf8(entry.contents.to_vec()).unwrap();
        assert!(body.starts_with("Hello"));
        assert!(body.ends_with(agent::SCRIPT_TAG));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_not_found() {
        let (_dir, resolver) = resolver(false);

        let err = resolver
            .load(&resolver.webroot.join("missing.txt"))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_load_directory_without_index_is_not_found() {
        let (_dir, resolver) = resolver(false);
        std::fs::create_dir(resolver.webroot.join("empty")).unwrap();

        let err = resolver
            .load(&resolver.webroot.join("empty"))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_load_through_file_is_not_found() {
        let (_dir, resolver) = resolver(false);
        std::fs::write(resolver.webroot.join("file.txt"), "x").unwrap();

        let err = resolver
            .load(&resolver.webroot.join("file.txt").join("child"))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }
}
