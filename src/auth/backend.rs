//! Answers a backend's authentication request with the credentials the proxy
//! holds for that backend (never the end client's).

use tracing::{debug, error, info, warn};

use crate::ErrorResponse;
use crate::config::BackendHostSetting;
use crate::net::Connection;
use crate::wire::types::message_type::ERROR_RESPONSE;
use crate::wire::{AuthenticationRequest, build_password_message, is_authentication_ok};

use super::md5::md5_password;

// -----------------------------------------------------------------------------
// ----- Backend Authenticator -------------------------------------------------

/// Complete the challenge carried by `auth_request` on `connection`.
///
/// Returns whether the backend accepted the credentials. Transport errors and
/// unsupported methods are logged and reported as `false`. The connection is
/// left open either way; on success the next unread message is whatever the
/// backend sends after AuthenticationOk.
pub async fn authenticate(
    backend: &BackendHostSetting,
    connection: &mut Connection,
    auth_request: &[u8],
) -> bool {
    let Some(request) = AuthenticationRequest::parse(auth_request) else {
        warn!(
            "backend {}: expected an authentication request, got {:?}",
            backend.name,
            auth_request.first().map(|tag| *tag as char)
        );
        return false;
    };

    match request {
        // trust / cert: nothing to answer
        AuthenticationRequest::Ok => {
            debug!("backend {}: no password challenge", backend.name);
            true
        }

        AuthenticationRequest::CleartextPassword => {
            info!("backend {}: authenticating with clear text password", backend.name);
            send_password(backend, connection, backend.password_exposed()).await
        }

        AuthenticationRequest::Md5Password { salt } => {
            info!("backend {}: authenticating with MD5 password", backend.name);
            let digest = md5_password(&backend.username, backend.password_exposed(), &salt);
            send_password(backend, connection, &digest).await
        }

        AuthenticationRequest::KerberosV5
        | AuthenticationRequest::ScmCredential
        | AuthenticationRequest::Gss
        | AuthenticationRequest::GssContinue
        | AuthenticationRequest::Sspi => {
            warn!(
                "backend {}: {request} authentication is not supported",
                backend.name
            );
            false
        }

        other => {
            warn!(
                "backend {}: unsupported authentication method {other} (code {})",
                backend.name,
                other.code()
            );
            false
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

async fn send_password(
    backend: &BackendHostSetting,
    connection: &mut Connection,
    password: &str,
) -> bool {
    let message = build_password_message(password);

    if let Err(e) = connection.send_message(&message).await {
        error!(
            "backend {}: error sending password message: {e}",
            backend.name
        );
        return false;
    }

    let response = match connection.receive_message().await {
        Ok(response) => response,
        Err(e) => {
            error!(
                "backend {}: error receiving authentication response: {e}",
                backend.name
            );
            return false;
        }
    };

    if is_authentication_ok(&response) {
        return true;
    }

    if response.first() == Some(&ERROR_RESPONSE) {
        match ErrorResponse::from_bytes(&response) {
            Ok(rejection) => warn!("backend {}: rejected credentials: {rejection}", backend.name),
            Err(e) => warn!("backend {}: rejected credentials ({e})", backend.name),
        }
    } else {
        warn!(
            "backend {}: unexpected '{}' message after password",
            backend.name,
            response[0] as char
        );
    }

    false
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
