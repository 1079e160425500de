//! A real-time text chat relay.
//!
//! Clients attach over a websocket at `/ws/{username}`; every line one
//! client sends is rebroadcast to all currently connected clients, with
//! system notices on join and leave. The [`registry`] owns the live
//! membership, the [`broadcaster`] owns fan-out and the notice policy,
//! and [`api`] is the warp transport glue on top of both.

pub mod api;
pub mod broadcaster;
pub mod config;
pub mod registry;

pub use broadcaster::Broadcaster;
pub use config::ServerConfig;
pub use registry::{ConnId, Registry};
