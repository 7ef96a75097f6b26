//! WebSocket transport between clients and the session coordinator

pub mod handler;
pub mod protocol;
