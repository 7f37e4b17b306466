//! Connection multiplexing
//!
//! A `mio`-driven readiness loop that accepts clients into a fixed-size
//! connection table and serves exactly one request per connection.

pub mod listener;
pub mod table;

pub use listener::{EventLoop, StopHandle, bind};
pub use table::ConnectionTable;
