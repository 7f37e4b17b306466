//! Request routing
//!
//! Maps a framed request onto the collaborator routes (redirect, static
//! files, status endpoints) or onto a key-value operation under `/api/`.

pub mod static_files;
pub mod status;

pub use static_files::StaticFiles;

use std::time::Instant;

use crate::http::parser::ParseError;
use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::store::KvStore;
use crate::verbose;

/// Prefix of the key-value API.
pub const API_PREFIX: &str = "/api/";

const WEB_PREFIX: &str = "/web";

/// Dispatches requests against the store it owns.
pub struct Router {
    store: KvStore,
    static_files: Option<StaticFiles>,
    started: Instant,
}

impl Router {
    pub fn new(store: KvStore) -> Self {
        Self {
            store,
            static_files: None,
            started: Instant::now(),
        }
    }

    /// Enables `/web*` serving from `files`.
    pub fn with_static_files(mut self, files: StaticFiles) -> Self {
        self.static_files = Some(files);
        self
    }

    pub fn store(&self) -> &KvStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut KvStore {
        &mut self.store
    }

    /// Routes the output of the framer; a framing failure becomes 400.
    pub fn handle(&mut self, framed: Result<Request, ParseError>) -> Response {
        match framed {
            Ok(request) => self.dispatch(&request),
            Err(e) => {
                tracing::debug!(error = %e, "Rejecting malformed request");
                Response::bad_request("Bad Request")
            }
        }
    }

    pub fn dispatch(&mut self, request: &Request) -> Response {
        let path = request.path.as_str();

        let response = if path == "/" {
            get_only(request, || Response::redirect("/web/"))
        } else if path == WEB_PREFIX || path.starts_with("/web/") || path.starts_with("/web?") {
            get_only(request, || match &self.static_files {
                Some(files) => files.serve(path),
                None => Response::not_found("Not Found"),
            })
        } else if path == "/health" {
            get_only(request, || {
                status::health(self.store.size(), self.started.elapsed())
            })
        } else if path == "/test_connection" {
            get_only(request, status::test_connection)
        } else if let Some(key) = path.strip_prefix(API_PREFIX) {
            self.dispatch_api(request.method, key, request)
        } else {
            Response::not_found("Not Found")
        };

        verbose!(
            method = %request.method,
            path = %request.path,
            status = response.status.as_u16(),
            "Request handled"
        );

        response
    }

    fn dispatch_api(&mut self, method: Method, key: &str, request: &Request) -> Response {
        if method == Method::UNKNOWN {
            return Response::method_not_allowed();
        }
        if key.is_empty() {
            return Response::bad_request("Key cannot be empty");
        }

        match method {
            Method::GET => match self.store.get(key) {
                Some(value) => Response::ok(value),
                None => Response::not_found("Key not found"),
            },
            Method::POST => {
                if !request.has_body() {
                    return Response::bad_request("Request body required");
                }
                match self.store.set(key, request.body_bytes()) {
                    Ok(()) => Response::created(),
                    Err(e) => {
                        tracing::error!(key, error = %e, "Store rejected write");
                        Response::internal_error()
                    }
                }
            }
            Method::DELETE => {
                if self.store.delete(key) {
                    Response::no_content()
                } else {
                    Response::not_found("Key not found")
                }
            }
            Method::UNKNOWN => Response::method_not_allowed(),
        }
    }
}

/// Collaborator routes exist only for GET; any other method falls through
/// to the catch-all 404 like an unknown path.
fn get_only(request: &Request, handler: impl FnOnce() -> Response) -> Response {
    if request.method == Method::GET {
        handler()
    } else {
        Response::not_found("Not Found")
    }
}
