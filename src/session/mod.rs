//! Multiplayer session: the aggregate and the task that owns it

pub mod coordinator;
pub mod state;

pub use coordinator::{SessionCommand, SessionCoordinator, SessionHandle, SessionInput, SessionSnapshot};
pub use state::{Session, SessionError};
