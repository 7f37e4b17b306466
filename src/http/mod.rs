//! HTTP protocol subset.
//!
//! Just enough HTTP/1.1 to carry the key-value API: one request per
//! connection, no keep-alive, no chunked encoding, and no header parsing
//! beyond locating the header/body boundary.
//!
//! # Architecture
//!
//! - **`connection`**: Per-socket buffer and state machine driven by the event loop
//! - **`parser`**: Frames a byte buffer into a request once the boundary is present
//! - **`request`**: HTTP request representation and method table
//! - **`response`**: HTTP response representation with builder pattern
//! - **`writer`**: Serializes responses and flushes them to non-blocking sockets
//! - **`mime`**: MIME type detection based on file extensions
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │  Accepted   │ ← Slot taken, socket registered for reads
//!        └──────┬──────┘
//!               │ bytes arrive
//!               ▼
//!        ┌─────────────┐
//!        │   Reading   │ ← Accumulate until boundary or full buffer
//!        └──────┬──────┘
//!               │ boundary found / buffer full
//!               ▼
//!        ┌─────────────┐
//!        │   Writing   │ ← Flush the single response
//!        └──────┬──────┘
//!               │ flushed, or peer gone at any point
//!               ▼
//!        ┌─────────────┐
//!        │   Closed    │ ← Slot returned to the table
//!        └─────────────┘
//! ```

pub mod connection;
pub mod mime;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
