//! Validates an end client's credentials by relaying its handshake to a fresh
//! probe connection on the backend. The probe never outlives the check.

use std::io;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::ErrorResponse;
use crate::net::{ConnectError, Connection};
use crate::wire::types::message_type::ERROR_RESPONSE;
use crate::wire::utils::MAX_AUTH_MESSAGE_LEN;
use crate::wire::{AuthenticationRequest, build_terminate_message, is_authentication_ok, message_type};

// -----------------------------------------------------------------------------
// ----- Types -----------------------------------------------------------------

/// `Ok(())` when the backend accepted the client.
pub type AuthenticationOutcome = Result<(), ClientAuthError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Relaying,
    Accepted,
    Rejected,
    Aborted,
}

// -----------------------------------------------------------------------------
// ----- Client Authentication Relay -------------------------------------------

/// Relay `startup` and the following handshake between `client` and the
/// backend at `backend_host_port` until the backend answers AuthenticationOk
/// or ErrorResponse.
///
/// The final backend answer is forwarded to the client in both cases. The
/// probe connection is closed on every path; `client` is left open.
pub async fn authenticate_client(
    client: &mut Connection,
    backend_host_port: &str,
    startup: &[u8],
) -> AuthenticationOutcome {
    let mut probe = match Connection::connect(backend_host_port).await {
        Ok(probe) => probe,
        Err(source) => {
            error!("client auth: error connecting to {backend_host_port}: {source}");
            return Err(ClientAuthError::Connect {
                host_port: backend_host_port.to_string(),
                source,
            });
        }
    };

    let outcome = relay(client, &mut probe, backend_host_port, startup).await;

    if let Err(e) = probe.close().await {
        debug!("client auth: closing probe to {backend_host_port}: {e}");
    }

    match &outcome {
        Ok(()) => info!(
            "client auth: {:?} {} via {backend_host_port}",
            RelayState::Accepted,
            client.peer_addr()
        ),
        Err(e) => warn!(
            "client auth: {:?} {} via {backend_host_port}: {e}",
            e.state(),
            client.peer_addr()
        ),
    }

    outcome
}

// -----------------------------------------------------------------------------
// ----- Internal: Relay loop --------------------------------------------------

async fn relay(
    client: &mut Connection,
    probe: &mut Connection,
    backend_host_port: &str,
    startup: &[u8],
) -> AuthenticationOutcome {
    debug!("client auth: relay startup message to {backend_host_port}");
    probe
        .send_message(startup)
        .await
        .map_err(ClientAuthError::Backend)?;

    let mut response = probe
        .receive_message()
        .await
        .map_err(ClientAuthError::Backend)?;

    while !is_authentication_ok(&response) && message_type(&response) != ERROR_RESPONSE {
        debug!(
            "client auth: {:?} '{}' from {backend_host_port}",
            RelayState::Relaying,
            message_type(&response) as char
        );

        client
            .send_message(&response)
            .await
            .map_err(ClientAuthError::Client)?;

        if solicits_client_reply(&response) {
            let reply = client
                .receive_message_within(MAX_AUTH_MESSAGE_LEN)
                .await
                .map_err(client_receive_error)?;
            probe
                .send_message(&reply)
                .await
                .map_err(ClientAuthError::Backend)?;
        }

        response = probe
            .receive_message()
            .await
            .map_err(ClientAuthError::Backend)?;
    }

    if is_authentication_ok(&response) {
        if let Err(e) = probe.send_message(&build_terminate_message()).await {
            debug!("client auth: terminate to {backend_host_port} failed: {e}");
        }
        client
            .send_message(&response)
            .await
            .map_err(ClientAuthError::Client)?;
        return Ok(());
    }

    let rejection = ErrorResponse::from_bytes(&response).unwrap_or_else(|e| {
        ErrorResponse::protocol_violation(format!("unreadable ErrorResponse from backend: {e}"))
    });

    if let Err(e) = client.send_message(&response).await {
        debug!("client auth: could not forward rejection to client: {e}");
    }

    Err(ClientAuthError::Rejected(rejection))
}

// Backend messages other than authentication challenges (notices,
// NegotiateProtocolVersion, SASLFinal) are followed by more backend output.
fn solicits_client_reply(response: &[u8]) -> bool {
    AuthenticationRequest::parse(response).is_some_and(|request| request.solicits_response())
}

fn client_receive_error(e: io::Error) -> ClientAuthError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        info!("client auth: the client closed the connection mid-handshake");
        info!("client auth: expected when psql reconnects to prompt for a password");
        ClientAuthError::ClientDisconnected(e)
    } else {
        ClientAuthError::Client(e)
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ClientAuthError {
    #[error("cannot reach backend {host_port}: {source}")]
    Connect {
        host_port: String,
        source: ConnectError,
    },

    #[error("client closed the connection during authentication: {0}")]
    ClientDisconnected(#[source] io::Error),

    #[error("client transport error: {0}")]
    Client(#[source] io::Error),

    #[error("backend transport error: {0}")]
    Backend(#[source] io::Error),

    #[error("backend rejected the client: {0}")]
    Rejected(ErrorResponse),
}

impl ClientAuthError {
    /// Terminal relay state this error stands for.
    pub fn state(&self) -> RelayState {
        match self {
            ClientAuthError::Rejected(_) => RelayState::Rejected,
            _ => RelayState::Aborted,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
