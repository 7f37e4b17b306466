//! kvhttpd - in-memory key-value store over a minimal HTTP subset
//!
//! Core library: the readiness-driven connection multiplexer, the HTTP
//! request framer and response writer, the key-value store, and the router
//! tying them together.

pub mod config;
pub mod http;
pub mod router;
pub mod server;
pub mod store;
pub mod verbose;
