//! Loopback callback service for the selector.
//!
//! While a selection is on screen the selector runs `tb _rpc ...` for its
//! preview pane and key bindings. Those short-lived processes talk to the
//! session opened by [`RpcHost::listen`] over one JSON line per request.
//!
//! Only one session is active at a time. Opening a new one tears down the
//! previous listener, and dropping an old [`RpcSession`] never disturbs a newer
//! one.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ErrorCode;
use crate::fetch::Interactor;
use crate::format::render_detail;
use crate::selection::RPC_ADDR_ENV;

/// Port used when the config does not name one.
pub const DEFAULT_RPC_PORT: u16 = 4378;

const IO_TIMEOUT: Duration = Duration::from_secs(2);
const ACCEPT_POLL: Duration = Duration::from_millis(25);

/// One callback request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RpcRequest {
    LoadMore,
    PrintRecord { id: String },
}

/// Reply to one [`RpcRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RpcResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RpcResponse {
    fn ok(output: Option<String>) -> Self {
        Self {
            ok: true,
            output,
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            output: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("could not listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("callback i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("malformed callback message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid {RPC_ADDR_ENV} value {0:?}")]
    BadAddress(String),

    #[error("row has no record id: {0:?}")]
    BadRow(String),

    /// The session answered with an error.
    #[error("{0}")]
    Remote(String),
}

impl RpcError {
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Bind { .. } => ErrorCode::ListenerBindFailed,
            Self::Remote(message) if message == NOT_REGISTERED => ErrorCode::CallbackNotRegistered,
            Self::Remote(message) if message == RECORD_NOT_FOUND => ErrorCode::RecordNotFound,
            Self::BadRow(_) | Self::Decode(_) => ErrorCode::SelectorProtocol,
            Self::Io(_) | Self::BadAddress(_) | Self::Remote(_) => ErrorCode::InternalUnexpected,
        }
    }
}

const NOT_REGISTERED: &str = "not registered";
const RECORD_NOT_FOUND: &str = "record not found";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Listener {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Listener {
    fn stop(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if self.handle.join().is_err() {
            warn!(addr = %self.addr, "callback listener panicked");
        }
    }
}

type Attached = Option<(u64, Arc<dyn Interactor>)>;

struct HostInner {
    port: u16,
    /// Lifecycle state; never locked by the accept thread.
    active: Mutex<Option<(u64, Listener)>>,
    generation: Mutex<u64>,
    attached: Arc<Mutex<Attached>>,
}

/// Owner of the callback listener. Create one per process.
#[derive(Clone)]
pub struct RpcHost {
    inner: Arc<HostInner>,
}

impl std::fmt::Debug for RpcHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcHost")
            .field("port", &self.inner.port)
            .finish_non_exhaustive()
    }
}

impl RpcHost {
    /// `port` 0 binds an ephemeral port.
    #[must_use]
    pub fn new(port: u16) -> Self {
        Self {
            inner: Arc::new(HostInner {
                port,
                active: Mutex::new(None),
                generation: Mutex::new(0),
                attached: Arc::new(Mutex::new(None)),
            }),
        }
    }

    /// Attach `interactor` and start listening on `127.0.0.1:<port>`.
    ///
    /// Any previous session is stopped first.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Bind`] if the port is taken.
    pub fn listen(&self, interactor: Arc<dyn Interactor>) -> Result<RpcSession, RpcError> {
        let mut active = lock(&self.inner.active);
        if let Some((previous, listener)) = active.take() {
            debug!(generation = previous, "replacing callback session");
            listener.stop();
        }

        let generation = {
            let mut next = lock(&self.inner.generation);
            *next += 1;
            *next
        };

        let wanted = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, self.inner.port));
        let socket = TcpListener::bind(wanted).map_err(|source| RpcError::Bind {
            addr: wanted,
            source,
        })?;
        let addr = socket.local_addr()?;
        socket.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = {
            let shutdown = Arc::clone(&shutdown);
            let attached = Arc::clone(&self.inner.attached);
            thread::Builder::new()
                .name("rpc-accept".to_string())
                .spawn(move || accept_loop(&socket, &shutdown, &attached))?
        };

        *lock(&self.inner.attached) = Some((generation, interactor));
        info!(%addr, generation, "callback session listening");
        *active = Some((
            generation,
            Listener {
                addr,
                shutdown,
                handle,
            },
        ));

        Ok(RpcSession {
            host: Arc::clone(&self.inner),
            generation,
            addr,
        })
    }

    /// Address of the active session, if any.
    #[must_use]
    pub fn active_addr(&self) -> Option<SocketAddr> {
        lock(&self.inner.active)
            .as_ref()
            .map(|(_, listener)| listener.addr)
    }
}

impl HostInner {
    fn stop_generation(&self, generation: u64) {
        let mut active = lock(&self.active);
        if !matches!(active.as_ref(), Some((current, _)) if *current == generation) {
            debug!(generation, "callback session already replaced");
            return;
        }
        if let Some((_, listener)) = active.take() {
            listener.stop();
        }
        let mut attached = lock(&self.attached);
        if matches!(attached.as_ref(), Some((current, _)) if *current == generation) {
            *attached = None;
        }
        debug!(generation, "callback session closed");
    }
}

/// Scope of one callback session. Dropping it stops the listener.
#[must_use = "the session stops as soon as it is dropped"]
pub struct RpcSession {
    host: Arc<HostInner>,
    generation: u64,
    addr: SocketAddr,
}

impl std::fmt::Debug for RpcSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcSession")
            .field("generation", &self.generation)
            .field("addr", &self.addr)
            .finish()
    }
}

impl RpcSession {
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop now instead of at end of scope.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for RpcSession {
    fn drop(&mut self) {
        self.host.stop_generation(self.generation);
    }
}

fn accept_loop(socket: &TcpListener, shutdown: &AtomicBool, attached: &Mutex<Attached>) {
    while !shutdown.load(Ordering::Relaxed) {
        match socket.accept() {
            Ok((stream, peer)) => {
                if let Err(err) = handle_connection(stream, attached) {
                    debug!(%peer, "callback connection failed: {err}");
                }
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(err) => {
                warn!("callback accept failed: {err}");
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
}

fn handle_connection(stream: TcpStream, attached: &Mutex<Attached>) -> Result<(), RpcError> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(IO_TIMEOUT))?;
    stream.set_write_timeout(Some(IO_TIMEOUT))?;

    let mut line = String::new();
    BufReader::new(&stream).read_line(&mut line)?;
    let response = match serde_json::from_str::<RpcRequest>(line.trim()) {
        Ok(request) => {
            let interactor = lock(attached)
                .as_ref()
                .map(|(_, interactor)| Arc::clone(interactor));
            dispatch(request, interactor.as_deref())
        }
        Err(err) => RpcResponse::err(format!("bad request: {err}")),
    };

    let mut payload = serde_json::to_string(&response)?;
    payload.push('\n');
    (&stream).write_all(payload.as_bytes())?;
    Ok(())
}

fn dispatch(request: RpcRequest, interactor: Option<&dyn Interactor>) -> RpcResponse {
    let Some(interactor) = interactor else {
        return RpcResponse::err(NOT_REGISTERED);
    };
    match request {
        RpcRequest::LoadMore => {
            interactor.load_more();
            RpcResponse::ok(None)
        }
        RpcRequest::PrintRecord { id } => interactor
            .loaded()
            .iter()
            .find(|record| record.id == id)
            .map_or_else(
                || RpcResponse::err(RECORD_NOT_FOUND),
                |record| RpcResponse::ok(Some(render_detail(record))),
            ),
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Extract the record id from a candidate row (`"<index> <id> ..."`).
#[must_use]
pub fn record_id_from_row(row: &str) -> Option<&str> {
    row.split_whitespace().nth(1)
}

/// Client side used by `tb _rpc`.
#[derive(Debug, Clone, Copy)]
pub struct RpcClient {
    addr: SocketAddr,
}

impl RpcClient {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Address from `TICKETBENCH_RPC_ADDR`, else the default port on loopback.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::BadAddress`] if the variable is set but unparsable.
    pub fn from_env() -> Result<Self, RpcError> {
        match std::env::var(RPC_ADDR_ENV) {
            Ok(raw) => raw
                .trim()
                .parse()
                .map(Self::new)
                .map_err(|_| RpcError::BadAddress(raw)),
            Err(_) => Ok(Self::new(SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::LOCALHOST,
                DEFAULT_RPC_PORT,
            )))),
        }
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Ask the session for another page.
    ///
    /// # Errors
    ///
    /// Fails if the session is unreachable or answers with an error.
    pub fn load_more(&self) -> Result<(), RpcError> {
        self.call(&RpcRequest::LoadMore).map(|_| ())
    }

    /// Detail text for the record in a candidate row.
    ///
    /// # Errors
    ///
    /// Fails for a row without an id, an unreachable session, or an unknown id.
    pub fn print_record(&self, row: &str) -> Result<String, RpcError> {
        let id = record_id_from_row(row).ok_or_else(|| RpcError::BadRow(row.to_string()))?;
        let response = self.call(&RpcRequest::PrintRecord { id: id.to_string() })?;
        Ok(response.output.unwrap_or_default())
    }

    fn call(&self, request: &RpcRequest) -> Result<RpcResponse, RpcError> {
        let stream = TcpStream::connect_timeout(&self.addr, IO_TIMEOUT)?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;

        let mut payload = serde_json::to_string(request)?;
        payload.push('\n');
        (&stream).write_all(payload.as_bytes())?;

        let mut line = String::new();
        BufReader::new(&stream).read_line(&mut line)?;
        let response: RpcResponse = serde_json::from_str(line.trim())?;
        if response.ok {
            Ok(response)
        } else {
            Err(RpcError::Remote(response.error.unwrap_or_default()))
        }
    }
}
