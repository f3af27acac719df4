//! Static single-page-app hosting.
//!
//! Paths with a file extension are served from the asset root. Everything
//! else (application routes, missing files, unreadable files) gets the entry
//! document, so client-side routing works on reload.

use crate::config::AssetsConfig;
use axum::extract::OriginalUri;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Content type for files whose extension is not in the table.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Asset tree rooted at a directory, with an entry document.
#[derive(Debug, Clone)]
pub struct StaticAssets {
    root: PathBuf,
    index: String,
}

impl StaticAssets {
    /// Create an asset tree.
    pub fn new(root: impl Into<PathBuf>, index: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            index: index.into(),
        }
    }

    /// Create an asset tree from configuration.
    pub fn from_config(config: &AssetsConfig) -> Self {
        Self::new(config.root.clone(), config.index.clone())
    }

    /// Map a request path to a file under the root.
    ///
    /// Returns `None` for application routes (no extension) and for paths
    /// that would leave the root.
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let relative = Path::new(request_path.trim_start_matches('/'));
        relative.extension()?;

        let mut path = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(path)
    }

    /// Serve a request path with single-page-app fallback.
    pub async fn serve(&self, request_path: &str) -> Response {
        if let Some(path) = self.resolve(request_path) {
            match tokio::fs::read(&path).await {
                Ok(bytes) => return ([(CONTENT_TYPE, content_type_for(&path))], bytes).into_response(),
                Err(e) => {
                    tracing::debug!("Asset {} unavailable ({}), serving entry", path.display(), e);
                }
            }
        }

        let entry = self.root.join(&self.index);
        match tokio::fs::read(&entry).await {
            Ok(bytes) => ([(CONTENT_TYPE, content_type_for(&entry))], bytes).into_response(),
            Err(e) => {
                tracing::warn!("Entry document {} unavailable: {}", entry.display(), e);
                (StatusCode::NOT_FOUND, "Not Found").into_response()
            }
        }
    }
}

/// Fallback handler for every path that is not the signaling endpoint.
pub async fn asset_handler(
    Extension(assets): Extension<Arc<StaticAssets>>,
    OriginalUri(uri): OriginalUri,
) -> Response {
    assets.serve(uri.path()).await
}

/// Content type by file extension (case-insensitive).
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("js") | Some("mjs") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json") | Some("map") => "application/json",
        Some("webmanifest") => "application/manifest+json",
        Some("wasm") => "application/wasm",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("txt") => "text/plain; charset=utf-8",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        _ => FALLBACK_CONTENT_TYPE,
    }
}
