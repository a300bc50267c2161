//! Account Aggregator integration
//!
//! Detached-JWS signing, FI request/fetch pipeline, and session tracking.

pub mod jws;
pub mod service;
pub mod session;

pub use jws::DetachedJwsSigner;
pub use service::{AaClient, AaSettings, FiFetchInput, FiRequestInput};
pub use session::{FiSession, FiSessionStatus, FiSessionStore};
