// Header checks for length-prefixed frames, used to cut complete messages out
// of a read buffer.

use thiserror::Error;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Upper bound on a typed message length (the backend's own limit).
pub const MAX_MESSAGE_LEN: usize = 1 << 30;

/// Upper bound on a frontend message during authentication (Postgres'
/// PG_MAX_AUTH_TOKEN_LENGTH).
pub const MAX_AUTH_MESSAGE_LEN: usize = 65_535;

/// Upper bound on a startup-family packet (Postgres' MAX_STARTUP_PACKET_LENGTH).
pub const MAX_STARTUP_LEN: usize = 10_000;

// -----------------------------------------------------------------------------
// ----- Peek ------------------------------------------------------------------

/// Peek a typed message (`tag` + 4-byte length + payload).
///
/// Returns the total frame length (tag included) once the whole frame is in
/// `buf`, `None` when more bytes are needed.
pub fn peek_message(buf: &[u8]) -> Result<Option<usize>, FrameError> {
    peek_message_within(buf, MAX_MESSAGE_LEN)
}

/// `peek_message` with a caller-chosen length limit. The limit is checked as
/// soon as the header is in, so an oversized frame is never buffered.
pub fn peek_message_within(buf: &[u8], max_len: usize) -> Result<Option<usize>, FrameError> {
    if buf.len() < 5 {
        return Ok(None);
    }

    let len = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
    if len < 4 {
        return Err(FrameError::InvalidLength(len));
    }
    if len > max_len {
        return Err(FrameError::TooLong(len));
    }

    let total_len = 1 + len;
    if buf.len() < total_len {
        return Ok(None);
    }

    Ok(Some(total_len))
}

/// Peek an untagged startup-family packet (4-byte length + body).
pub fn peek_startup(buf: &[u8]) -> Result<Option<usize>, FrameError> {
    if buf.len() < 4 {
        return Ok(None);
    }

    let len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if len < 8 {
        return Err(FrameError::InvalidLength(len));
    }
    if len > MAX_STARTUP_LEN {
        return Err(FrameError::TooLong(len));
    }

    if buf.len() < len {
        return Ok(None);
    }

    Ok(Some(len))
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid message length: {0}")]
    InvalidLength(usize),

    #[error("message length {0} exceeds limit")]
    TooLong(usize),
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_full_frame() {
        let frame = [b'Z', 0, 0, 0, 5, b'I'];
        assert_eq!(peek_message(&frame), Ok(Some(6)));
    }

    #[test]
    fn message_with_trailing_bytes_reports_first_frame_only() {
        let frames = [b'R', 0, 0, 0, 8, 0, 0, 0, 0, b'Z', 0, 0, 0, 5, b'I'];
        assert_eq!(peek_message(&frames), Ok(Some(9)));
    }

    #[test]
    fn message_needs_more_bytes() {
        assert_eq!(peek_message(&[b'Z', 0, 0, 0]), Ok(None));
        assert_eq!(peek_message(&[b'Z', 0, 0, 0, 5]), Ok(None));
    }

    #[test]
    fn message_rejects_short_length() {
        let frame = [b'Z', 0, 0, 0, 3, b'I'];
        assert_eq!(peek_message(&frame), Err(FrameError::InvalidLength(3)));
    }

    #[test]
    fn message_rejects_oversized_length() {
        let frame = [b'D', 0x7F, 0xFF, 0xFF, 0xFF];
        assert!(matches!(peek_message(&frame), Err(FrameError::TooLong(_))));
    }

    #[test]
    fn message_limit_applies_to_the_header() {
        let header = [b'p', 0, 1, 0, 0];
        assert_eq!(
            peek_message_within(&header, MAX_AUTH_MESSAGE_LEN),
            Err(FrameError::TooLong(65_536))
        );
        assert_eq!(peek_message(&header), Ok(None));
    }

    #[test]
    fn startup_ssl_request_is_eight_bytes() {
        let packet = [0, 0, 0, 8, 0x04, 0xD2, 0x16, 0x2F];
        assert_eq!(peek_startup(&packet), Ok(Some(8)));
        assert_eq!(peek_startup(&packet[..6]), Ok(None));
    }

    #[test]
    fn startup_rejects_bad_lengths() {
        assert_eq!(
            peek_startup(&[0, 0, 0, 7, 0, 0, 0]),
            Err(FrameError::InvalidLength(7))
        );
        assert_eq!(
            peek_startup(&[0, 0, 0x27, 0x11]),
            Err(FrameError::TooLong(10_001))
        );
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
