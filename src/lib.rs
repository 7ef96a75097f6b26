//! Flappy Arena - side-scrolling obstacle game with a shared session lobby
//!
//! The `game` modules run one player's simulation frame by frame. The
//! `session`, `ws` and `http` modules make up the coordinator that groups
//! players into a session, and `client` drives a simulation against it.

pub mod app;
pub mod client;
pub mod config;
pub mod game;
pub mod http;
pub mod session;
pub mod util;
pub mod ws;
