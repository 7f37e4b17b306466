//! `/health` and `/test_connection` JSON endpoints.

use std::time::Duration;

use serde::Serialize;

use crate::http::response::{APPLICATION_JSON, Response, ResponseBuilder, StatusCode};

pub const SERVER_NAME: &str = "kvhttpd";

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    keys: usize,
    uptime_secs: u64,
}

#[derive(Debug, Serialize)]
struct ConnectionCheck {
    status: &'static str,
    server: &'static str,
    version: &'static str,
}

pub fn health(keys: usize, uptime: Duration) -> Response {
    json_response(&Health {
        status: "ok",
        keys,
        uptime_secs: uptime.as_secs(),
    })
}

pub fn test_connection() -> Response {
    json_response(&ConnectionCheck {
        status: "connected",
        server: SERVER_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn json_response<T: Serialize>(value: &T) -> Response {
    match serde_json::to_vec(value) {
        Ok(body) => ResponseBuilder::new(StatusCode::Ok)
            .content_type(APPLICATION_JSON)
            .body(body)
            .build(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode status body");
            Response::internal_error()
        }
    }
}
