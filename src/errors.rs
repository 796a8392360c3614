use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use thiserror::Error;

use crate::wire::types::message_type::ERROR_RESPONSE;
use crate::wire::utils::{ReadCStrError, read_cstr};

// -----------------------------------------------------------------------------
// ----- ErrorResponse ---------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorResponse {
    pub severity: Severity, // S
    pub code: String,       // C (SQLSTATE 5-char)
    pub message: String,    // M

    pub detail: Option<String>, // D
    pub hint: Option<String>,   // H
}

// -----------------------------------------------------------------------------
// ----- ErrorResponse: Static -------------------------------------------------

impl ErrorResponse {
    pub fn new(severity: Severity, code: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.to_string(),
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, "XX000", message)
    }

    pub fn protocol_violation(message: impl Into<String>) -> Self {
        Self::new(Severity::Fatal, "08P01", message)
    }

    pub fn too_many_connections(message: impl Into<String>) -> Self {
        Self::new(Severity::Fatal, "53300", message)
    }

    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::new(Severity::Fatal, "08001", message)
    }

    /// Parse a backend `E` frame. Unknown field tags are skipped.
    pub fn from_bytes(frame: &[u8]) -> Result<Self, ErrorResponseParseError> {
        if frame.len() < 5 {
            return Err(ErrorResponseParseError::UnexpectedEof);
        }
        if frame[0] != ERROR_RESPONSE {
            return Err(ErrorResponseParseError::UnexpectedTag(frame[0]));
        }

        let mut response = ErrorResponse::default();
        let mut fields = &frame[5..];

        loop {
            let Some((&tag, rest)) = fields.split_first() else {
                return Err(ErrorResponseParseError::UnexpectedEof);
            };
            fields = rest;

            if tag == 0 {
                break;
            }

            let value = read_cstr(&mut fields)?;
            match tag {
                b'S' => response.severity = Severity::from_wire(value),
                b'C' => response.code = value.to_string(),
                b'M' => response.message = value.to_string(),
                b'D' => response.detail = Some(value.to_string()),
                b'H' => response.hint = Some(value.to_string()),
                _ => {}
            }
        }

        Ok(response)
    }
}

// -----------------------------------------------------------------------------
// ----- ErrorResponse: Builder ------------------------------------------------

impl ErrorResponse {
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// -----------------------------------------------------------------------------
// ----- ErrorResponse: Public -------------------------------------------------

impl ErrorResponse {
    /// Build the backend 'E' frame. Returns a complete wire buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(128);

        buf.put_u8(ERROR_RESPONSE);
        buf.put_u32(0); // length placeholder

        put_field(&mut buf, b'S', self.severity.as_str());
        put_field(&mut buf, b'V', self.severity.as_str());
        put_field(&mut buf, b'C', &self.code);
        put_field(&mut buf, b'M', &self.message);

        if let Some(v) = self.detail.as_deref() {
            put_field(&mut buf, b'D', v);
        }

        if let Some(v) = self.hint.as_deref() {
            put_field(&mut buf, b'H', v);
        }

        buf.put_u8(0); // terminator

        let len = (buf.len() - 1) as u32;
        buf[1..5].copy_from_slice(&len.to_be_bytes());

        buf.freeze()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.severity.as_str(), self.code, self.message)?;
        if let Some(detail) = self.detail.as_deref() {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ----- ErrorResponse: Severity -----------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Severity {
    #[default]
    Error,
    Fatal,
    Panic,
    Warning,
    Notice,
    Info,
    Debug,
    Log,
}

impl Severity {
    fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
            Severity::Panic => "PANIC",
            Severity::Warning => "WARNING",
            Severity::Notice => "NOTICE",
            Severity::Info => "INFO",
            Severity::Debug => "DEBUG",
            Severity::Log => "LOG",
        }
    }

    // Localized severities fall back to ERROR.
    fn from_wire(value: &str) -> Self {
        match value {
            "FATAL" => Severity::Fatal,
            "PANIC" => Severity::Panic,
            "WARNING" => Severity::Warning,
            "NOTICE" => Severity::Notice,
            "INFO" => Severity::Info,
            "DEBUG" => Severity::Debug,
            "LOG" => Severity::Log,
            _ => Severity::Error,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ErrorResponseParseError {
    #[error("unexpected tag: {0:#X}")]
    UnexpectedTag(u8),

    #[error("unexpected EOF")]
    UnexpectedEof,

    #[error("bad field: {0}")]
    Field(#[from] ReadCStrError),
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

#[inline]
fn put_field(buf: &mut BytesMut, tag: u8, val: &str) {
    buf.put_u8(tag);
    buf.extend_from_slice(val.as_bytes());
    buf.put_u8(0);
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
