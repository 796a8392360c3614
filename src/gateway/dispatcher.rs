use bytes::BytesMut;
use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, copy_bidirectional};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::auth::{ClientAuthError, authenticate_client};
use crate::config::{BackendHostSetting, BackendsConfig};
use crate::errors::{ErrorResponse, Severity};
use crate::net::Connection;
use crate::wire::codec::{
    is_cancel_request, is_gssenc_request, is_ssl_request, startup_parameters,
};
use crate::wire::protocol_version;
use crate::wire::types::message_type::{ENCRYPTION_NOT_ALLOWED, PROTOCOL_VERSION};

use super::session::{BackendSession, SessionError};
use super::slots::BackendSlots;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Time a client gets to finish the authentication handshake.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(60);

const LISTEN_BACKLOG: u32 = 1024;

// -----------------------------------------------------------------------------
// ----- Gateway ---------------------------------------------------------------

/// One listener per backend. Clients connecting to a backend's `proxy_port`
/// are validated against that backend and then attached to their own backend
/// session.
#[derive(Debug)]
pub struct Gateway {
    listeners: Vec<BackendListener>,
    auth_timeout: Duration,
}

#[derive(Debug)]
struct BackendListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    slots: Arc<BackendSlots>,
}

// -----------------------------------------------------------------------------
// ----- Gateway: Static -------------------------------------------------------

impl Gateway {
    pub async fn bind(listen_host: IpAddr, backends: &BackendsConfig) -> io::Result<Self> {
        let mut listeners = Vec::with_capacity(backends.len());

        for backend in backends.iter() {
            let addr = SocketAddr::new(listen_host, backend.proxy_port);

            let socket = if addr.is_ipv4() {
                TcpSocket::new_v4()?
            } else {
                TcpSocket::new_v6()?
            };
            socket.set_reuseaddr(true)?;
            socket.bind(addr)?;

            let listener = socket.listen(LISTEN_BACKLOG)?;
            let local_addr = listener.local_addr()?;

            info!(
                "backend {} ({}) listening on {local_addr}",
                backend.name,
                backend.host_port()
            );

            listeners.push(BackendListener {
                listener,
                local_addr,
                slots: Arc::new(BackendSlots::new(backend.clone())),
            });
        }

        Ok(Self {
            listeners,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- Gateway: Public -------------------------------------------------------

impl Gateway {
    pub fn with_auth_timeout(mut self, auth_timeout: Duration) -> Self {
        self.auth_timeout = auth_timeout;
        self
    }

    /// Bound addresses, in backend name order.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners.iter().map(|l| l.local_addr).collect()
    }

    pub fn local_addr(&self, backend_name: &str) -> Option<SocketAddr> {
        self.listeners
            .iter()
            .find(|l| l.slots.backend().name == backend_name)
            .map(|l| l.local_addr)
    }

    /// Accept clients on every listener until `shutdown` resolves. Client
    /// tasks already running are left to finish on their own.
    pub async fn serve<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut accept_loops = JoinSet::new();
        for listener in self.listeners {
            accept_loops.spawn(accept_loop(listener, self.auth_timeout));
        }

        shutdown.await;

        info!("gateway shutting down");
        accept_loops.shutdown().await;
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Accept ------------------------------------------------------

async fn accept_loop(listener: BackendListener, auth_timeout: Duration) {
    loop {
        let (stream, peer) = match listener.listener.accept().await {
            Ok(v) => v,
            Err(e) => {
                error!("accept error on {}: {e}", listener.local_addr);
                continue;
            }
        };

        let _ = stream.set_nodelay(true);

        let slots = listener.slots.clone();
        tokio::spawn(async move {
            match handle_client(stream, slots, auth_timeout).await {
                Ok(()) => debug!("client {peer} done"),
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!("client {peer} hung up: {e}")
                }
                Err(e) => error!("client {peer} error: {e}"),
            }
        });
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Client --------------------------------------------------------

async fn handle_client(
    stream: TcpStream,
    slots: Arc<BackendSlots>,
    auth_timeout: Duration,
) -> io::Result<()> {
    let mut client = Connection::from_stream(stream)?;
    let backend = slots.backend().clone();

    let Some(startup) = read_startup(&mut client).await? else {
        return client.close().await;
    };

    let version = protocol_version(&startup);
    if version != PROTOCOL_VERSION {
        let err = ErrorResponse::protocol_violation("unsupported startup protocol version")
            .with_detail(format!("version: {version}"));
        return reject(client, err).await;
    }

    match startup_parameters(&startup) {
        Ok(params) => match params.iter().find(|(k, _)| *k == "user") {
            Some((_, user)) if !user.is_empty() => {
                info!(
                    "client {} requests backend {} as {user}",
                    client.peer_addr(),
                    backend.name
                );
            }
            _ => {
                let err = ErrorResponse::protocol_violation("startup missing user");
                return reject(client, err).await;
            }
        },
        Err(e) => {
            let err = ErrorResponse::protocol_violation("bad startup message")
                .with_detail(e.to_string());
            return reject(client, err).await;
        }
    }

    let Some(_slot) = slots.try_acquire() else {
        warn!(
            "backend {} is at capacity ({}), refusing {}",
            backend.name,
            backend.capacity,
            client.peer_addr()
        );
        let err = ErrorResponse::too_many_connections(format!(
            "sorry, too many clients already for backend {}",
            backend.name
        ));
        return reject(client, err).await;
    };

    let host_port = backend.host_port();
    match timeout(
        auth_timeout,
        authenticate_client(&mut client, &host_port, &startup),
    )
    .await
    {
        Ok(Ok(())) => {}
        Ok(Err(ClientAuthError::Rejected(_))) | Ok(Err(ClientAuthError::ClientDisconnected(_))) => {
            return client.close().await;
        }
        Ok(Err(ClientAuthError::Client(e))) if e.kind() == io::ErrorKind::InvalidData => {
            let err = ErrorResponse::protocol_violation("invalid authentication message")
                .with_detail(e.to_string());
            return reject(client, err).await;
        }
        Ok(Err(ClientAuthError::Client(_))) => {
            return client.close().await;
        }
        Ok(Err(e @ (ClientAuthError::Connect { .. } | ClientAuthError::Backend(_)))) => {
            let err = ErrorResponse::backend_unavailable(format!(
                "could not validate credentials with backend {}",
                backend.name
            ))
            .with_detail(e.to_string());
            return reject(client, err).await;
        }
        Err(_) => {
            warn!(
                "client {} did not authenticate within {:?}",
                client.peer_addr(),
                auth_timeout
            );
            let err = ErrorResponse::new(
                Severity::Fatal,
                "57014",
                "canceling authentication due to timeout",
            );
            return reject(client, err).await;
        }
    }

    let session = match BackendSession::open(&backend).await {
        Ok(session) => session,
        Err(e) => {
            error!("backend {}: session failed: {e}", backend.name);
            return reject(client, session_failure(&backend, e)).await;
        }
    };

    let (backend_conn, greeting) = session.into_parts();
    client.send_message(&greeting).await?;

    attach(client, backend_conn, &backend).await
}

/// Read the startup packet, refusing encryption requests. `None` for a
/// CancelRequest.
async fn read_startup(client: &mut Connection) -> io::Result<Option<BytesMut>> {
    loop {
        let packet = client.receive_startup().await?;

        if is_ssl_request(&packet) || is_gssenc_request(&packet) {
            debug!("client {}: encryption request refused", client.peer_addr());
            client.send_message(&[ENCRYPTION_NOT_ALLOWED]).await?;
            continue;
        }

        if is_cancel_request(&packet) {
            debug!("client {}: cancel request ignored", client.peer_addr());
            return Ok(None);
        }

        return Ok(Some(packet));
    }
}

/// Relay raw bytes between an authenticated client and its backend session
/// until either side closes.
async fn attach(
    client: Connection,
    backend_conn: Connection,
    backend: &BackendHostSetting,
) -> io::Result<()> {
    let peer = client.peer_addr();
    let (mut client_stream, client_pending) = client.into_parts();
    let (mut backend_stream, backend_pending) = backend_conn.into_parts();

    if !client_pending.is_empty() {
        backend_stream.write_all(&client_pending).await?;
    }
    if !backend_pending.is_empty() {
        client_stream.write_all(&backend_pending).await?;
    }

    let (up, down) = copy_bidirectional(&mut client_stream, &mut backend_stream).await?;
    info!(
        "client {peer} left backend {} ({up} bytes up, {down} bytes down)",
        backend.name
    );
    Ok(())
}

async fn reject(mut client: Connection, error: ErrorResponse) -> io::Result<()> {
    debug!("client {}: {error}", client.peer_addr());
    client.send_message(&error.to_bytes()).await?;
    client.close().await
}

fn session_failure(backend: &BackendHostSetting, e: SessionError) -> ErrorResponse {
    match e {
        SessionError::Rejected(mut error) => {
            error.severity = Severity::Fatal;
            error
        }
        other => ErrorResponse::backend_unavailable(format!(
            "could not open a session on backend {}",
            backend.name
        ))
        .with_detail(other.to_string()),
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
