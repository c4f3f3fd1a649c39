//! Data transfer objects for the ingress and realtime surfaces.
//!
//! These shapes are the compatibility contract consumed by the external
//! HTTP/WebSocket layer; field names and nesting are load-bearing. No logic
//! lives here.

mod realtime;
mod request;
mod response;

pub use realtime::*;
pub use request::*;
pub use response::*;
