//! The two roles of the handshake and the session they share.

pub mod embedded;
pub mod host;
pub mod session;

pub use embedded::{EmbeddedContext, EmbeddedEvent, Outbound, WidgetView};
pub use host::{HostEvent, HostSession};
pub use session::{Session, SessionId};
