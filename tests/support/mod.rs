#![allow(dead_code)]

use bytes::{BufMut, BytesMut};
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use pgborg::config::{BackendHostSetting, BackendsConfig};
use pgborg::errors::{ErrorResponse, Severity};
use pgborg::net::Connection;
use pgborg::wire::codec::startup_parameters;
use pgborg::wire::{build_password_message, build_startup_message};

// Every scripted exchange must finish within this, so a broken relay fails
// the test instead of hanging it.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

// -----------------------------------------------------------------------------
// ----- Sockets ---------------------------------------------------------------

/// A listener standing in for a PostgreSQL server.
pub async fn fake_backend() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake backend");
    let host_port = listener.local_addr().unwrap().to_string();
    (listener, host_port)
}

/// A `Connection` and the raw socket at its other end.
pub async fn connection_pair() -> (Connection, TcpStream) {
    let (listener, host_port) = fake_backend().await;
    let (connected, accepted) = tokio::join!(Connection::connect(&host_port), listener.accept());
    (connected.expect("connect"), accepted.expect("accept").0)
}

/// An address nothing listens on.
pub async fn closed_port() -> String {
    let (listener, host_port) = fake_backend().await;
    drop(listener);
    host_port
}

pub async fn accept(listener: &TcpListener) -> TcpStream {
    let (stream, _) = timeout(STEP_TIMEOUT, listener.accept())
        .await
        .expect("timed out waiting for a connection")
        .expect("accept");
    stream
}

// -----------------------------------------------------------------------------
// ----- Reading ---------------------------------------------------------------

/// Read one untagged startup-family packet.
pub async fn read_startup(stream: &mut TcpStream) -> Vec<u8> {
    let mut header = [0u8; 4];
    step(stream.read_exact(&mut header)).await;
    let len = u32::from_be_bytes(header) as usize;

    let mut packet = header.to_vec();
    packet.resize(len, 0);
    step(stream.read_exact(&mut packet[4..])).await;
    packet
}

/// Read one typed message, tag and length included.
pub async fn read_message(stream: &mut TcpStream) -> Vec<u8> {
    let mut header = [0u8; 5];
    step(stream.read_exact(&mut header)).await;
    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;

    let mut frame = header.to_vec();
    frame.resize(1 + len, 0);
    step(stream.read_exact(&mut frame[5..])).await;
    frame
}

/// Everything the peer sends until it closes.
pub async fn read_to_eof(stream: &mut TcpStream) -> Vec<u8> {
    let mut rest = Vec::new();
    timeout(STEP_TIMEOUT, stream.read_to_end(&mut rest))
        .await
        .expect("timed out waiting for the peer to close")
        .expect("read to end");
    rest
}

pub fn params(startup: &[u8]) -> BTreeMap<String, String> {
    startup_parameters(startup)
        .expect("startup parameters")
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

async fn step<T>(fut: impl Future<Output = std::io::Result<T>>) -> T {
    timeout(STEP_TIMEOUT, fut)
        .await
        .expect("timed out waiting for the peer")
        .expect("read")
}

// -----------------------------------------------------------------------------
// ----- Frontend messages -----------------------------------------------------

pub fn startup(user: &str, database: &str) -> Vec<u8> {
    build_startup_message(user, database, &BTreeMap::new()).to_vec()
}

pub fn password(password: &str) -> Vec<u8> {
    build_password_message(password).to_vec()
}

pub fn ssl_request() -> Vec<u8> {
    vec![0, 0, 0, 8, 0x04, 0xD2, 0x16, 0x2F]
}

pub fn query(sql: &str) -> Vec<u8> {
    let mut body = sql.as_bytes().to_vec();
    body.push(0);
    typed(b'Q', &body)
}

// -----------------------------------------------------------------------------
// ----- Backend messages ------------------------------------------------------

pub fn auth(code: i32, data: &[u8]) -> Vec<u8> {
    let mut body = code.to_be_bytes().to_vec();
    body.extend_from_slice(data);
    typed(b'R', &body)
}

pub fn auth_ok() -> Vec<u8> {
    auth(0, &[])
}

pub fn auth_cleartext() -> Vec<u8> {
    auth(3, &[])
}

pub fn auth_md5(salt: [u8; 4]) -> Vec<u8> {
    auth(5, &salt)
}

pub fn parameter_status(name: &str, value: &str) -> Vec<u8> {
    let mut body = BytesMut::new();
    put_cstr(&mut body, name);
    put_cstr(&mut body, value);
    typed(b'S', &body)
}

pub fn backend_key_data(pid: i32, secret: i32) -> Vec<u8> {
    let mut body = BytesMut::new();
    body.put_i32(pid);
    body.put_i32(secret);
    typed(b'K', &body)
}

pub fn ready_for_query() -> Vec<u8> {
    typed(b'Z', b"I")
}

pub fn error_response(code: &str, message: &str) -> Vec<u8> {
    ErrorResponse::new(Severity::Fatal, code, message).to_bytes().to_vec()
}

/// Greeting a freshly authenticated backend sends.
pub fn greeting() -> Vec<u8> {
    [
        parameter_status("server_version", "16.4"),
        parameter_status("client_encoding", "UTF8"),
        backend_key_data(4242, 17),
        ready_for_query(),
    ]
    .concat()
}

/// RowDescription, DataRow, CommandComplete and ReadyForQuery for a single
/// int4 column holding `value`.
pub fn single_value_result(column: &str, value: &str) -> Vec<u8> {
    let mut row_description = BytesMut::new();
    row_description.put_i16(1);
    put_cstr(&mut row_description, column);
    row_description.put_i32(0); // table oid
    row_description.put_i16(0); // column number
    row_description.put_i32(23); // int4
    row_description.put_i16(4);
    row_description.put_i32(-1);
    row_description.put_i16(0); // text format

    let mut data_row = BytesMut::new();
    data_row.put_i16(1);
    data_row.put_i32(value.len() as i32);
    data_row.extend_from_slice(value.as_bytes());

    [
        typed(b'T', &row_description),
        typed(b'D', &data_row),
        typed(b'C', b"SELECT 1\0"),
        ready_for_query(),
    ]
    .concat()
}

fn typed(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(5 + body.len());
    frame.push(tag);
    frame.extend_from_slice(&(body.len() as u32 + 4).to_be_bytes());
    frame.extend_from_slice(body);
    frame
}

fn put_cstr(buf: &mut BytesMut, value: &str) {
    buf.extend_from_slice(value.as_bytes());
    buf.put_u8(0);
}

// -----------------------------------------------------------------------------
// ----- Scripted backends -----------------------------------------------------

/// Serve every connection like a `trust` server: AuthenticationOk and the
/// greeting right after the startup packet, then answer each simple query
/// with a single `1`.
pub fn spawn_trust_backend(listener: TcpListener) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };

            tokio::spawn(async move {
                read_startup(&mut stream).await;

                let hello = [auth_ok(), greeting()].concat();
                if stream.write_all(&hello).await.is_err() {
                    return;
                }

                let mut header = [0u8; 5];
                while stream.read_exact(&mut header).await.is_ok() {
                    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
                    let mut body = vec![0u8; len as usize - 4];
                    if stream.read_exact(&mut body).await.is_err() || header[0] == b'X' {
                        return;
                    }
                    if header[0] == b'Q' {
                        let _ = stream.write_all(&single_value_result("?column?", "1")).await;
                    }
                }
            });
        }
    })
}

// -----------------------------------------------------------------------------
// ----- Config ----------------------------------------------------------------

pub fn backends_config(
    name: &str,
    backend_host_port: &str,
    username: &str,
    password: &str,
    capacity: u32,
) -> BackendsConfig {
    let (host, port) = backend_host_port
        .rsplit_once(':')
        .expect("host:port");

    BackendsConfig::parse(&format!(
        r#"
        [[backends]]
        name = "{name}"
        host = "{host}"
        port = {port}
        username = "{username}"
        password = "{password}"
        proxy_port = 0
        capacity = {capacity}
        "#
    ))
    .expect("valid backends config")
}

pub fn backend_setting(username: &str, password: &str) -> Arc<BackendHostSetting> {
    backends_config("main", "127.0.0.1:5432", username, password, 5)
        .get("main")
        .expect("main backend")
}
