pub mod auth;
pub mod http;

pub use auth::{AuthProvider, SessionAuth};
pub use http::{HttpTransport, Transport, TransportResponse};
