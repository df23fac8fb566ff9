//! The wire layer: protocol framing, the server, and a small client.

pub mod client;
pub mod protocol;
pub mod server;

pub use client::WorldClient;
pub use protocol::{Request, Response};
pub use server::GameServer;
