// Gateway orchestration; wire and authentication details live in wire/ and auth/.
pub mod dispatcher;
pub mod session;
pub mod slots;

pub use dispatcher::{DEFAULT_AUTH_TIMEOUT, Gateway};
pub use session::{BackendSession, SessionError};
pub use slots::BackendSlots;
