use crate::paths;
use crate::server::http::Response;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The directory the front-end files are served from.
#[derive(Debug, Clone)]
pub struct AssetRoot {
    root: PathBuf,
}

impl AssetRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Serve the file at `request_path`; `/` maps to `index.html`.
    pub async fn serve(&self, request_path: &str) -> Response {
        let relative = request_path.trim_start_matches('/');
        let relative = if relative.is_empty() {
            "index.html"
        } else {
            relative
        };
        let Some(path) = paths::resolve_within(&self.root, relative) else {
            debug!(path = request_path, "Refused to serve a path outside of the asset root");
            return Response::not_found();
        };
        match tokio::fs::read(&path).await {
            Ok(body) => Response::new(200, content_type(&path), body),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Asset not available");
                Response::not_found()
            }
        }
    }
}

fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("txt" | "bolton") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("wasm") => "application/wasm",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::AssetRoot;

    #[tokio::test]
    async fn serve_index_and_nested_files() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("index.html"), "<h1>Bolton</h1>").unwrap();
        std::fs::create_dir(root.path().join("css")).unwrap();
        std::fs::write(root.path().join("css").join("site.css"), "body {}").unwrap();
        let assets = AssetRoot::new(root.path());

        let index = assets.serve("/").await;
        assert_eq!(index.status, 200);
        assert_eq!(index.content_type, "text/html; charset=utf-8");
        assert_eq!(index.body, b"<h1>Bolton</h1>");

        let css = assets.serve("/css/site.css").await;
        assert_eq!(css.status, 200);
        assert_eq!(css.content_type, "text/css; charset=utf-8");
    }

    #[tokio::test]
    async fn missing_files_and_escapes_are_not_found() {
        let root = tempfile::tempdir().unwrap();
        let assets = AssetRoot::new(root.path());
        assert_eq!(assets.serve("/missing.js").await.status, 404);
        assert_eq!(assets.serve("/../etc/passwd").await.status, 404);
        assert_eq!(assets.serve("/css").await.status, 404);
    }
}
