//! Static assets under `/web`.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::config::StaticFilesConfig;
use crate::http::mime;
use crate::http::response::{Response, ResponseBuilder, StatusCode};

#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
    index: String,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>, index: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            index: index.into(),
        }
    }

    /// `None` when static serving is disabled.
    pub fn from_config(cfg: &StaticFilesConfig) -> Option<Self> {
        cfg.enabled
            .then(|| Self::new(cfg.root.clone(), cfg.index.clone()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Serves the file behind a `/web...` request path.
    pub fn serve(&self, request_path: &str) -> Response {
        let Some(file) = self.resolve(request_path) else {
            return Response::not_found("File not found");
        };

        match std::fs::read(&file) {
            Ok(contents) => ResponseBuilder::new(StatusCode::Ok)
                .content_type(mime::from_path(&file))
                .body(contents)
                .build(),
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::IsADirectory) => {
                Response::not_found("File not found")
            }
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "Failed to read static file");
                Response::internal_error()
            }
        }
    }

    /// Maps a request path onto a file below the root, refusing anything
    /// that could escape it.
    fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let path = request_path.split(['?', '#']).next().unwrap_or_default();
        let relative = path.strip_prefix("/web")?.trim_start_matches('/');

        if relative.is_empty() {
            return Some(self.root.join(&self.index));
        }
        if relative.contains('\\') {
            return None;
        }

        let relative = Path::new(relative);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }

        let file = self.root.join(relative);
        if file.is_dir() {
            return Some(file.join(&self.index));
        }
        Some(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_parent_components() {
        let files = StaticFiles::new("/srv/web", "index.html");

        assert_eq!(files.resolve("/web/../etc/passwd"), None);
        assert_eq!(files.resolve("/web/a/../../x"), None);
        assert_eq!(files.resolve("/web/..\\x"), None);
    }

    #[test]
    fn root_paths_map_to_index() {
        let files = StaticFiles::new("/srv/web", "index.html");
        let index = Some(PathBuf::from("/srv/web/index.html"));

        assert_eq!(files.resolve("/web"), index);
        assert_eq!(files.resolve("/web/"), index);
        assert_eq!(files.resolve("/web/?v=2"), index);
    }
}
