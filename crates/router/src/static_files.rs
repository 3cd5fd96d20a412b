//! Serving a directory of files as static routes.
//!
//! The directory is walked once, when it is registered: every regular file found becomes a
//! `GET` route. File contents are read when requested, so edits to existing files show up
//! without restarting, while new files need a new registration.

use crate::context::RequestContext;
use crate::handler::{HandlerError, RequestHandler};
use crate::route::RouterError;
use async_trait::async_trait;
use http::StatusCode;
use mime::Mime;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{error, warn};
use walkdir::WalkDir;

/// The files found below a directory, keyed by their path relative to it.
#[derive(Debug)]
pub struct StaticDir {
    root: PathBuf,
    // (relative url path without leading slash, file on disk)
    files: Vec<(String, PathBuf)>,
}

impl StaticDir {
    /// Walks `dir` and records every regular file below it, in file name order.
    ///
    /// Files that cannot be expressed as a static route are skipped: a segment must be
    /// non-empty ASCII made of RFC 3986 `pchar` characters that need no percent-encoding,
    /// and must not start with `:` or `*`.
    pub fn scan(dir: impl AsRef<Path>) -> Result<Self, RouterError> {
        let root = dir.as_ref().to_path_buf();
        let mut files = Vec::new();

        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|source| RouterError::StaticDir { dir: root.clone(), source })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&root) else {
                continue;
            };
            match url_path(relative) {
                Some(url_path) => files.push((url_path, entry.into_path())),
                None => warn!(file = %entry.path().display(), "skipping file that cannot be routed"),
            }
        }

        Ok(Self { root, files })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// The route path and handler of every file, mounted under `prefix`.
    pub fn routes(&self, prefix: &str) -> impl Iterator<Item = (String, StaticFile)> + '_ {
        let prefix = prefix.trim_end_matches('/').to_owned();
        self.files
            .iter()
            .map(move |(relative, file)| (format!("{prefix}/{relative}"), StaticFile::new(file.clone())))
    }
}

fn url_path(relative: &Path) -> Option<String> {
    let mut segments = Vec::new();
    for component in relative.components() {
        let Component::Normal(segment) = component else {
            return None;
        };
        let segment = segment.to_str()?;
        if segment.is_empty() || segment.starts_with([':', '*']) || !segment.bytes().all(is_path_byte) {
            return None;
        }
        segments.push(segment);
    }
    Some(segments.join("/"))
}

#[inline]
fn is_path_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || b"-._~!$&'()+,;=:@*".contains(&byte)
}

/// Serves one file from disk.
#[derive(Debug, Clone)]
pub struct StaticFile {
    path: PathBuf,
    content_type: Mime,
}

impl StaticFile {
    pub fn new(path: PathBuf) -> Self {
        let content_type = content_type(&path);
        Self { path, content_type }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content_type(&self) -> &Mime {
        &self.content_type
    }
}

#[async_trait]
impl RequestHandler for StaticFile {
    async fn invoke(&self, ctx: &mut RequestContext) -> Result<(), HandlerError> {
        match tokio::fs::read(&self.path).await {
            Ok(contents) => {
                ctx.response_mut().bytes(contents, &self.content_type)?;
                Ok(())
            }
            Err(e) => {
                let status = if e.kind() == io::ErrorKind::NotFound {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                error!(cause = %e, file = %self.path.display(), "failed to read static file");
                ctx.response_mut().set_status(status);
                Err(e.into())
            }
        }
    }
}

/// Guesses the media type of a file from its extension.
pub fn content_type(path: &Path) -> Mime {
    let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("html" | "htm") => mime::TEXT_HTML_UTF_8,
        Some("css") => mime::TEXT_CSS_UTF_8,
        Some("js" | "mjs") => mime::APPLICATION_JAVASCRIPT_UTF_8,
        Some("json") => mime::APPLICATION_JSON,
        Some("txt") => mime::TEXT_PLAIN_UTF_8,
        Some("csv") => mime::TEXT_CSV_UTF_8,
        Some("xml") => mime::TEXT_XML,
        Some("png") => mime::IMAGE_PNG,
        Some("jpg" | "jpeg") => mime::IMAGE_JPEG,
        Some("gif") => mime::IMAGE_GIF,
        Some("bmp") => mime::IMAGE_BMP,
        Some("svg") => mime::IMAGE_SVG,
        Some("woff") => mime::FONT_WOFF,
        Some("woff2") => mime::FONT_WOFF2,
        Some("pdf") => mime::APPLICATION_PDF,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}
