//! End-to-end tests over real sockets.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::thread::JoinHandle;
use std::time::Duration;

use kvhttpd::config::ServerConfig;
use kvhttpd::router::Router;
use kvhttpd::server::{EventLoop, StopHandle};
use kvhttpd::store::KvStore;

struct TestServer {
    addr: SocketAddr,
    stop: StopHandle,
    thread: Option<JoinHandle<anyhow::Result<()>>>,
}

impl TestServer {
    fn start(max_connections: usize, buffer_size: usize) -> Self {
        let config = ServerConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            max_connections,
            buffer_size,
            max_events: 16,
        };
        let mut server = EventLoop::create(config, Router::new(KvStore::new())).unwrap();
        server.start().unwrap();

        let addr = server.local_addr().unwrap();
        let stop = server.stop_handle();
        let thread = std::thread::spawn(move || server.run());

        Self {
            addr,
            stop,
            thread: Some(thread),
        }
    }

    fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        stream
    }

    /// Stops the loop and waits for its thread to return.
    fn shutdown(mut self) {
        self.stop.stop();
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap().unwrap();
        }
    }

    /// Sends `raw` and reads until the server closes the connection.
    fn exchange(&self, raw: &[u8]) -> String {
        let mut stream = self.connect();
        stream.write_all(raw).unwrap();
        read_all(&mut stream)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop.stop();
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap().unwrap();
        }
    }
}

fn read_all(stream: &mut TcpStream) -> String {
    let mut out = Vec::new();
    stream.read_to_end(&mut out).unwrap();
    String::from_utf8(out).unwrap()
}

fn body(response: &str) -> &str {
    response.split_once("\r\n\r\n").map(|(_, b)| b).unwrap_or("")
}

#[test]
fn test_key_lifecycle_over_http() {
    let server = TestServer::start(16, 4096);

    let r = server.exchange(b"GET /api/foo HTTP/1.1\r\n\r\n");
    assert!(r.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert_eq!(body(&r), "Key not found");

    let r = server.exchange(b"POST /api/foo HTTP/1.1\r\nContent-Type: text/plain\r\n\r\nbar");
    assert!(r.starts_with("HTTP/1.1 201 Created\r\n"));

    let r = server.exchange(b"GET /api/foo HTTP/1.1\r\n\r\n");
    assert!(r.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(r.contains("Content-Length: 3\r\n"));
    assert!(r.contains("Connection: close\r\n"));
    assert_eq!(body(&r), "bar");

    let r = server.exchange(b"DELETE /api/foo HTTP/1.1\r\n\r\n");
    assert!(r.starts_with("HTTP/1.1 204 No Content\r\n"));

    let r = server.exchange(b"GET /api/foo HTTP/1.1\r\n\r\n");
    assert!(r.starts_with("HTTP/1.1 404 Not Found\r\n"));
}

#[test]
fn test_large_body_in_single_write() {
    let server = TestServer::start(16, 4096);
    let value = "v".repeat(2000);

    let mut raw = b"POST /api/big HTTP/1.1\r\nHost: x\r\n\r\n".to_vec();
    raw.extend_from_slice(value.as_bytes());
    let r = server.exchange(&raw);
    assert!(r.starts_with("HTTP/1.1 201 Created\r\n"));

    let r = server.exchange(b"GET /api/big HTTP/1.1\r\n\r\n");
    assert!(r.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(r.contains("Content-Length: 2000\r\n"));
    assert_eq!(body(&r), value);
}

#[test]
fn test_request_split_across_writes() {
    let server = TestServer::start(16, 4096);
    let mut stream = server.connect();

    stream.write_all(b"POST /api/split HTTP/1.1\r\n").unwrap();
    std::thread::sleep(Duration::from_millis(50));
    stream.write_all(b"Host: x\r\n\r\nvalue").unwrap();

    let r = read_all(&mut stream);
    assert!(r.starts_with("HTTP/1.1 201 Created\r\n"));

    let r = server.exchange(b"GET /api/split HTTP/1.1\n\n");
    assert_eq!(body(&r), "value");
}

#[test]
fn test_malformed_request_line() {
    let server = TestServer::start(16, 4096);

    let r = server.exchange(b"GARBAGE\r\n\r\n");
    assert!(r.starts_with("HTTP/1.1 400 Bad Request\r\n"));
}

#[test]
fn test_oversized_request_rejected() {
    let server = TestServer::start(16, 64);

    // Exactly the usable capacity, with no boundary anywhere
    let filler = vec![b'a'; 63];
    let r = server.exchange(&filler);

    assert!(r.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert_eq!(body(&r), "Request too large");

    // The slot was freed
    let r = server.exchange(b"GET /health HTTP/1.1\r\n\r\n");
    assert!(r.starts_with("HTTP/1.1 200 OK\r\n"));
}

#[test]
fn test_full_table_drops_new_peer() {
    let server = TestServer::start(1, 4096);

    let mut first = server.connect();
    let mut second = server.connect();

    let mut buf = [0u8; 64];
    match second.read(&mut buf) {
        Ok(n) => assert_eq!(n, 0),
        Err(e) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionReset),
    }

    first.write_all(b"GET /test_connection HTTP/1.1\r\n\r\n").unwrap();
    let r = read_all(&mut first);
    assert!(r.starts_with("HTTP/1.1 200 OK\r\n"));
}

#[test]
fn test_peer_disconnect_frees_slot() {
    let server = TestServer::start(1, 4096);

    let mut idle = server.connect();
    idle.write_all(b"GET /api/x HTTP/1.1\r\n").unwrap();
    idle.shutdown(Shutdown::Both).unwrap();
    drop(idle);

    // Give the loop a moment to observe the close before reusing the slot
    std::thread::sleep(Duration::from_millis(100));

    let r = server.exchange(b"GET /health HTTP/1.1\r\n\r\n");
    assert!(r.starts_with("HTTP/1.1 200 OK\r\n"));
}

#[test]
fn test_stop_without_traffic() {
    let server = TestServer::start(4, 4096);
    drop(server);
}

#[test]
fn test_stop_closes_idle_clients_and_listener() {
    let server = TestServer::start(4, 4096);
    let addr = server.addr;

    let mut idle = server.connect();
    idle.write_all(b"GET /api/x HTTP/1.1\r\n").unwrap();
    std::thread::sleep(Duration::from_millis(100));

    server.shutdown();

    let mut buf = [0u8; 64];
    match idle.read(&mut buf) {
        Ok(n) => assert_eq!(n, 0),
        Err(e) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionReset),
    }
    assert!(TcpStream::connect(addr).is_err());
}

#[test]
fn test_event_loop_lifecycle() {
    let config = ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        max_connections: 2,
        buffer_size: 256,
        max_events: 8,
    };
    let mut server = EventLoop::create(config, Router::new(KvStore::new())).unwrap();

    assert!(!server.is_running());
    assert!(server.local_addr().is_none());
    assert!(server.run().is_err());

    server.start().unwrap();
    assert!(server.is_running());
    assert!(server.local_addr().is_some());
    assert_eq!(server.connection_count(), 0);
    assert!(server.router().store().is_empty());

    server.stop();
    assert!(!server.is_running());
    assert!(server.local_addr().is_none());
}
