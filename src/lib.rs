pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod handshake;
pub mod protocol;
pub mod telemetry;

pub use error::{HandshakeError, Result};
