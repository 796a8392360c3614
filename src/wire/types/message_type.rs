//! v3 protocol Byte1 tags and startup-packet codes used by the proxy.
//! Direction disambiguates duplicates (e.g., 'p' covers every frontend auth reply).

// -----------------------------------------------------------------------------
// ----- Startup codes ---------------------------------------------------------

/// Protocol 3.0, carried in bytes `[4..8]` of a regular startup message.
pub const PROTOCOL_VERSION: i32 = 196_608;

pub const CANCEL_REQUEST_CODE: i32 = 80_877_102;
pub const SSL_REQUEST_CODE: i32 = 80_877_103;
pub const GSSENC_REQUEST_CODE: i32 = 80_877_104;

/// Single-byte answer refusing SSL or GSS encryption.
pub const ENCRYPTION_NOT_ALLOWED: u8 = b'N';

// -----------------------------------------------------------------------------
// ----- Frontend tags ---------------------------------------------------------

pub const PASSWORD_MESSAGE: u8 = b'p'; // also GSS/SASL/SSPI responses
pub const TERMINATE: u8 = b'X';

// -----------------------------------------------------------------------------
// ----- Backend tags ----------------------------------------------------------

pub const AUTHENTICATION: u8 = b'R'; // see AuthenticationRequest
pub const BACKEND_KEY_DATA: u8 = b'K';
pub const ERROR_RESPONSE: u8 = b'E';
pub const NOTICE_RESPONSE: u8 = b'N';
pub const PARAMETER_STATUS: u8 = b'S';
pub const READY_FOR_QUERY: u8 = b'Z';

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
