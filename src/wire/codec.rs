//! Inspection and construction of raw protocol messages.
//!
//! Every function here works on complete byte buffers: inspection helpers
//! assume the caller already read a whole frame (see `net::Connection`), and
//! builders return finished frames with their length fields back-patched.

use bytes::{BufMut, Bytes, BytesMut};
use std::collections::BTreeMap;

use super::types::message_type::{
    AUTHENTICATION, CANCEL_REQUEST_CODE, GSSENC_REQUEST_CODE, PASSWORD_MESSAGE,
    PROTOCOL_VERSION, SSL_REQUEST_CODE, TERMINATE,
};
use super::types::authentication_request::AUTH_OK;
use super::utils::{ReadCStrError, read_cstr};

// -----------------------------------------------------------------------------
// ----- Inspection ------------------------------------------------------------

/// Tag byte of a typed message. `buf` must not be empty.
#[inline]
pub fn message_type(buf: &[u8]) -> u8 {
    buf[0]
}

/// Length field of a typed message (self-inclusive, tag-exclusive).
/// `buf` must hold at least 5 bytes.
#[inline]
pub fn message_length(buf: &[u8]) -> i32 {
    i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]])
}

/// Version/request code of a startup-family packet. `buf` must hold at least
/// 8 bytes.
#[inline]
pub fn protocol_version(buf: &[u8]) -> i32 {
    i32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]])
}

/// True only for `R` / length 8 / method 0. Truncated or malformed buffers
/// are simply not AuthenticationOk.
pub fn is_authentication_ok(buf: &[u8]) -> bool {
    let Some(header) = buf.get(..9) else {
        return false;
    };

    header[0] == AUTHENTICATION
        && message_length(header) == 8
        && i32::from_be_bytes([header[5], header[6], header[7], header[8]]) == AUTH_OK
}

pub fn is_ssl_request(buf: &[u8]) -> bool {
    buf.len() == 8 && protocol_version(buf) == SSL_REQUEST_CODE
}

pub fn is_gssenc_request(buf: &[u8]) -> bool {
    buf.len() == 8 && protocol_version(buf) == GSSENC_REQUEST_CODE
}

pub fn is_cancel_request(buf: &[u8]) -> bool {
    buf.len() == 16 && protocol_version(buf) == CANCEL_REQUEST_CODE
}

/// Name/value pairs of a regular startup message, in wire order.
pub fn startup_parameters(buf: &[u8]) -> Result<Vec<(&str, &str)>, ReadCStrError> {
    let mut rest = buf.get(8..).ok_or(ReadCStrError::UnexpectedEof)?;
    let mut params = Vec::new();

    loop {
        let key = read_cstr(&mut rest)?;
        if key.is_empty() {
            break;
        }
        let value = read_cstr(&mut rest)?;
        params.push((key, value));
    }

    Ok(params)
}

// -----------------------------------------------------------------------------
// ----- Construction ----------------------------------------------------------

/// `X`, length 4, no payload.
pub fn build_terminate_message() -> Bytes {
    let mut buf = BytesMut::with_capacity(5);
    buf.put_u8(TERMINATE);
    buf.put_u32(4);
    buf.freeze()
}

/// `p` message carrying `password` (clear text or an `md5...` digest).
pub fn build_password_message(password: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + 4 + password.len() + 1);
    buf.put_u8(PASSWORD_MESSAGE);
    buf.put_u32(0); // length placeholder
    put_cstr(&mut buf, password);

    let len = (buf.len() - 1) as u32;
    buf[1..5].copy_from_slice(&len.to_be_bytes());

    buf.freeze()
}

/// Protocol 3.0 startup message. `user` and `database` come first; `options`
/// follow in key order so the output is deterministic. Options named `user`
/// or `database` are skipped.
pub fn build_startup_message(
    username: &str,
    database: &str,
    options: &BTreeMap<String, String>,
) -> Bytes {
    let mut buf = BytesMut::with_capacity(128);
    buf.put_u32(0); // length placeholder
    buf.put_i32(PROTOCOL_VERSION);

    put_cstr(&mut buf, "user");
    put_cstr(&mut buf, username);
    put_cstr(&mut buf, "database");
    put_cstr(&mut buf, database);

    for (name, value) in options {
        if name == "user" || name == "database" {
            continue;
        }
        put_cstr(&mut buf, name);
        put_cstr(&mut buf, value);
    }

    buf.put_u8(0);

    let len = buf.len() as u32;
    buf[0..4].copy_from_slice(&len.to_be_bytes());

    buf.freeze()
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

#[inline]
fn put_cstr(buf: &mut BytesMut, value: &str) {
    buf.extend_from_slice(value.as_bytes());
    buf.put_u8(0);
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
