//! HTTP middleware for the Credence API
//!
//! Security headers and request tracing. Rate limiting in this service is
//! per verified identity (the Aadhaar attempt store), not per IP, so no
//! token-bucket layer sits here.

mod security;
mod tracing;

pub use security::security_headers;
pub use tracing::request_tracing;
