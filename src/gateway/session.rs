use bytes::{Bytes, BytesMut};
use std::io;
use thiserror::Error;
use tracing::{info, warn};

use crate::ErrorResponse;
use crate::auth;
use crate::config::BackendHostSetting;
use crate::net::{ConnectError, Connection};
use crate::wire::types::message_type::{
    AUTHENTICATION, BACKEND_KEY_DATA, ERROR_RESPONSE, NOTICE_RESPONSE, PARAMETER_STATUS,
    READY_FOR_QUERY,
};
use crate::wire::{build_startup_message, message_type};

// -----------------------------------------------------------------------------
// ----- BackendSession --------------------------------------------------------

/// An authenticated backend connection that has reached ReadyForQuery.
#[derive(Debug)]
pub struct BackendSession {
    connection: Connection,

    /// ParameterStatus, BackendKeyData, notices and the final ReadyForQuery,
    /// in the order the backend sent them.
    greeting: BytesMut,
}

// -----------------------------------------------------------------------------
// ----- BackendSession: Static ------------------------------------------------

impl BackendSession {
    pub async fn open(backend: &BackendHostSetting) -> Result<Self, SessionError> {
        let mut connection = Connection::connect(&backend.host_port()).await?;

        let startup = build_startup_message(&backend.username, &backend.database, &backend.options);
        connection.send_message(&startup).await?;

        let first = connection.receive_message().await?;
        match message_type(&first) {
            AUTHENTICATION => {
                if !auth::authenticate(backend, &mut connection, &first).await {
                    return Err(SessionError::AuthenticationFailed {
                        backend: backend.name.clone(),
                    });
                }
            }
            ERROR_RESPONSE => return Err(rejected(&first)),
            other => return Err(SessionError::UnexpectedMessage(other)),
        }

        let mut greeting = BytesMut::new();
        loop {
            let message = connection.receive_message().await?;
            match message_type(&message) {
                ERROR_RESPONSE => return Err(rejected(&message)),
                READY_FOR_QUERY => {
                    greeting.extend_from_slice(&message);
                    break;
                }
                PARAMETER_STATUS | BACKEND_KEY_DATA | NOTICE_RESPONSE => {
                    greeting.extend_from_slice(&message);
                }
                other => {
                    warn!(
                        "backend {}: unexpected '{}' before ReadyForQuery, forwarding",
                        backend.name, other as char
                    );
                    greeting.extend_from_slice(&message);
                }
            }
        }

        info!(
            "backend {}: session ready on {} as {}",
            backend.name,
            connection.peer_addr(),
            backend.username
        );

        Ok(Self {
            connection,
            greeting,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- BackendSession: Public ------------------------------------------------

impl BackendSession {
    pub fn greeting(&self) -> &[u8] {
        &self.greeting
    }

    pub fn into_parts(self) -> (Connection, Bytes) {
        (self.connection, self.greeting.freeze())
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn rejected(frame: &[u8]) -> SessionError {
    match ErrorResponse::from_bytes(frame) {
        Ok(error) => SessionError::Rejected(error),
        Err(e) => SessionError::Rejected(ErrorResponse::protocol_violation(format!(
            "unreadable ErrorResponse from backend: {e}"
        ))),
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{0}")]
    Connect(#[from] ConnectError),

    #[error("backend transport error: {0}")]
    Io(#[from] io::Error),

    #[error("backend {backend} did not accept the configured credentials")]
    AuthenticationFailed { backend: String },

    #[error("backend refused the session: {0}")]
    Rejected(ErrorResponse),

    #[error("unexpected message tag {0:#X} during session startup")]
    UnexpectedMessage(u8),
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
