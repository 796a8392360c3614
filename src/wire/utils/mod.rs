pub mod frame;
pub mod read_cstr;

pub use frame::{
    FrameError, MAX_AUTH_MESSAGE_LEN, MAX_MESSAGE_LEN, MAX_STARTUP_LEN, peek_message,
    peek_message_within, peek_startup,
};
pub use read_cstr::{ReadCStrError, read_cstr};
