//! Read NUL-terminated UTF-8 strings out of message payloads.

use memchr::memchr;
use std::str;
use thiserror::Error;

// -----------------------------------------------------------------------------
// ----- read_cstr -------------------------------------------------------------

/// Read a NUL-terminated UTF-8 string from the front of `input_bytes`.
///
/// Returns a `&str` borrowed from `input_bytes` and advances `input_bytes` to
/// start **after** the NUL terminator.
#[inline]
pub fn read_cstr<'a>(input_bytes: &mut &'a [u8]) -> Result<&'a str, ReadCStrError> {
    let unread_bytes = *input_bytes;

    let nul_index = memchr(0, unread_bytes).ok_or(ReadCStrError::UnexpectedEof)?;
    let (bytes_before_nul, bytes_from_nul) = unread_bytes.split_at(nul_index);

    *input_bytes = &bytes_from_nul[1..];

    str::from_utf8(bytes_before_nul).map_err(ReadCStrError::Utf8Error)
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ReadCStrError {
    #[error("unexpected EOF while reading C string")]
    UnexpectedEof,

    #[error("UTF-8 error: {0}")]
    Utf8Error(#[source] str::Utf8Error),
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_and_advances() {
        let mut input: &[u8] = b"user\0alice\0";

        assert_eq!(read_cstr(&mut input).unwrap(), "user");
        assert_eq!(read_cstr(&mut input).unwrap(), "alice");
        assert!(input.is_empty());
    }

    #[test]
    fn empty_string_is_a_bare_nul() {
        let mut input: &[u8] = b"\0rest";

        assert_eq!(read_cstr(&mut input).unwrap(), "");
        assert_eq!(input, b"rest");
    }

    #[test]
    fn eof_without_nul() {
        let mut input: &[u8] = b"no-nul";
        let err = read_cstr(&mut input).unwrap_err();

        assert!(matches!(err, ReadCStrError::UnexpectedEof));
        assert_eq!(input, b"no-nul");
    }

    #[test]
    fn invalid_utf8_before_nul() {
        let mut input: &[u8] = &[0xFF, 0xFE, 0x00];
        let err = read_cstr(&mut input).unwrap_err();

        assert!(matches!(err, ReadCStrError::Utf8Error(_)));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
