use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use mio::event::Event;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token, Waker};
use tracing::{debug, info, warn};

use crate::config::{Config, ServerConfig};
use crate::http::connection::{Connection, ReadOutcome};
use crate::http::parser::parse_http_request;
use crate::http::response::Response;
use crate::http::writer::WriteProgress;
use crate::router::{Router, StaticFiles};
use crate::server::table::ConnectionTable;
use crate::store::KvStore;
use crate::verbose;

const LISTENER: Token = Token(0);
const WAKER: Token = Token(usize::MAX);

/// Single-threaded readiness loop.
///
/// Owns the listening socket, the connection table and the router (and
/// through it the store). Every accept, read, framing, routing and write
/// happens synchronously inside [`EventLoop::run`].
pub struct EventLoop {
    config: ServerConfig,
    poll: Poll,
    waker: Arc<Waker>,
    listener: Option<TcpListener>,
    table: ConnectionTable<TcpStream>,
    router: Router,
    running: Arc<AtomicBool>,
}

/// Stops a running loop from another thread.
#[derive(Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        if let Err(e) = self.waker.wake() {
            warn!(error = %e, "Failed to wake event loop");
        }
    }
}

/// Builds the store, router and loop described by `cfg` and starts
/// listening.
pub fn bind(cfg: &Config) -> Result<EventLoop> {
    cfg.validate()?;

    let mut router = Router::new(KvStore::new());
    if let Some(files) = StaticFiles::from_config(&cfg.static_files) {
        info!(root = %files.root().display(), "Serving static files");
        router = router.with_static_files(files);
    }

    let mut server = EventLoop::create(cfg.server.clone(), router)?;
    server.start()?;
    Ok(server)
}

impl EventLoop {
    pub fn create(config: ServerConfig, router: Router) -> Result<Self> {
        let poll = Poll::new().context("failed to create poll instance")?;
        let waker = Waker::new(poll.registry(), WAKER).context("failed to create waker")?;
        let table = ConnectionTable::new(config.max_connections);

        Ok(Self {
            config,
            poll,
            waker: Arc::new(waker),
            listener: None,
            table,
            router,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Binds the listening socket and registers it for readiness.
    pub fn start(&mut self) -> Result<()> {
        if self.listener.is_some() {
            bail!("server already started");
        }

        let addr = self.config.socket_addr()?;
        let mut listener =
            TcpListener::bind(addr).with_context(|| format!("failed to bind {addr}"))?;
        self.poll
            .registry()
            .register(&mut listener, LISTENER, Interest::READABLE)
            .context("failed to register listener")?;

        info!("Listening on {}", listener.local_addr()?);
        self.listener = Some(listener);
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    /// Closes the listener and every client, and clears the running flag.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);

        let registry = self.poll.registry();
        for (token, mut conn) in self.table.drain() {
            if let Err(e) = registry.deregister(conn.stream_mut()) {
                debug!(?token, error = %e, "Deregister failed");
            }
        }

        if let Some(mut listener) = self.listener.take() {
            if let Err(e) = registry.deregister(&mut listener) {
                warn!(error = %e, "Failed to deregister listener");
            }
            info!("Server stopped");
        }
    }

    /// Blocks dispatching readiness events until stopped.
    ///
    /// Returns an error only when polling itself fails; all descriptors are
    /// closed before returning either way.
    pub fn run(&mut self) -> Result<()> {
        if self.listener.is_none() {
            bail!("server not started");
        }

        let mut events = Events::with_capacity(self.config.max_events);
        let result = self.dispatch_events(&mut events);
        self.stop();
        result
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: Arc::clone(&self.running),
            waker: Arc::clone(&self.waker),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref()?.local_addr().ok()
    }

    pub fn connection_count(&self) -> usize {
        self.table.len()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    fn dispatch_events(&mut self, events: &mut Events) -> Result<()> {
        while self.running.load(Ordering::Acquire) {
            if let Err(e) = self.poll.poll(events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(e).context("poll failed");
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept_connections(),
                    WAKER => {}
                    token => self.handle_client_event(token, event),
                }
            }
        }

        Ok(())
    }

    fn accept_connections(&mut self) {
        loop {
            let Some(listener) = self.listener.as_ref() else {
                return;
            };

            let (stream, peer) = match listener.accept() {
                Ok(pair) => pair,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::ConnectionAborted
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    return;
                }
            };

            let conn = Connection::new(stream, Some(peer), self.config.buffer_size);
            let token = match self.table.insert(conn) {
                Ok(token) => token,
                Err(_rejected) => {
                    // Dropping the stream closes it without a response
                    warn!(%peer, capacity = self.table.capacity(), "Connection table full, dropping peer");
                    continue;
                }
            };

            let Some(conn) = self.table.get_mut(token) else {
                continue;
            };
            if let Err(e) =
                self.poll
                    .registry()
                    .register(conn.stream_mut(), token, Interest::READABLE)
            {
                warn!(%peer, error = %e, "Failed to register client");
                self.table.remove(token);
                continue;
            }

            info!("Accepted connection from {}", peer);
            verbose!(%peer, ?token, active = self.table.len(), "Slot assigned");
        }
    }

    fn handle_client_event(&mut self, token: Token, event: &Event) {
        let Some(conn) = self.table.get_mut(token) else {
            return;
        };

        if conn.is_writing() {
            if event.is_writable() || event.is_write_closed() || event.is_error() {
                self.continue_response(token);
            }
            return;
        }

        if event.is_readable() {
            self.handle_client_data(token);
        } else if event.is_read_closed() || event.is_error() {
            self.handle_client_disconnect(token);
        }
    }

    fn handle_client_data(&mut self, token: Token) {
        let Some(conn) = self.table.get_mut(token) else {
            return;
        };

        let response = match conn.read_available() {
            Ok(ReadOutcome::Pending) => {
                verbose!(?token, buffered = conn.len(), "Waiting for more request bytes");
                return;
            }
            Ok(ReadOutcome::Complete) => {
                let framed = parse_http_request(conn.buffered());
                self.router.handle(framed)
            }
            Ok(ReadOutcome::Full) => {
                warn!(peer = ?conn.peer(), buffered = conn.len(), "Request too large");
                Response::bad_request("Request too large")
            }
            Ok(ReadOutcome::Closed) => {
                self.handle_client_disconnect(token);
                return;
            }
            Err(e) => {
                debug!(?token, error = %e, "Read failed");
                self.handle_client_disconnect(token);
                return;
            }
        };

        self.send_response(token, &response);
    }

    fn send_response(&mut self, token: Token, response: &Response) {
        let Some(conn) = self.table.get_mut(token) else {
            return;
        };

        match conn.begin_response(response) {
            Ok(WriteProgress::Done) => self.release(token),
            Ok(WriteProgress::Pending) => {
                let rearmed =
                    self.poll
                        .registry()
                        .reregister(conn.stream_mut(), token, Interest::WRITABLE);
                if let Err(e) = rearmed {
                    warn!(?token, error = %e, "Failed to wait for writability");
                    self.release(token);
                }
            }
            Err(e) => {
                debug!(?token, error = %e, "Write failed");
                self.release(token);
            }
        }
    }

    fn continue_response(&mut self, token: Token) {
        let Some(conn) = self.table.get_mut(token) else {
            return;
        };

        match conn.flush() {
            Ok(WriteProgress::Pending) => {}
            Ok(WriteProgress::Done) => self.release(token),
            Err(e) => {
                debug!(?token, error = %e, "Write failed");
                self.release(token);
            }
        }
    }

    fn handle_client_disconnect(&mut self, token: Token) {
        debug!(?token, "Client disconnected");
        self.release(token);
    }

    /// Frees the slot; dropping the stream closes the socket.
    fn release(&mut self, token: Token) {
        if let Some(mut conn) = self.table.remove(token) {
            if let Err(e) = self.poll.registry().deregister(conn.stream_mut()) {
                debug!(?token, error = %e, "Deregister failed");
            }
            verbose!(?token, peer = ?conn.peer(), "Slot freed");
        }
    }
}
