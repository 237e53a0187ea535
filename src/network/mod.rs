//! Network Module
//!
//! Blocking TCP request adapter in front of the engine.
//!
//! ## Architecture
//! - One acceptor loop (polling, so shutdown needs no wake-up)
//! - One thread per connection, capped by `max_connections`
//! - Commands routed through `Engine::execute`

mod server;
mod connection;

pub use server::{Server, ShutdownHandle};
pub use connection::Connection;
