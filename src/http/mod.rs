//! HTTP surface of the coordinator

pub mod routes;

pub use routes::build_router;
