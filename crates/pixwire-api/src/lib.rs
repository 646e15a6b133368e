// pixwire-api: Async client for the pixwire diagram server

pub mod client;
pub mod error;
pub mod feed;
pub(crate) mod sse;
pub mod transport;

pub use client::DiagramClient;
pub use error::Error;
pub use feed::{FeedHandle, FeedMessage, ReconnectConfig};
pub use transport::{TlsMode, TransportConfig};
