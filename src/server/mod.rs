//! Server: wire protocol types, request validation/dispatch, and the
//! acceptor + worker-pool TCP listener (spec.md §4.6-4.8).

pub mod handler;
pub mod listener;
pub mod protocol;

pub use handler::RequestHandler;
pub use listener::Server;
pub use protocol::{RequestHeader, RequestType, ResponseHeader, ResponseStatus};
