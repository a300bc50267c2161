//! Consent artefact lifecycle
//!
//! Typed artefact schema, validation, ACTIVE/REVOKED/PAUSED/EXPIRED
//! lifecycle, and durable-or-fallback persistence.

pub mod model;
pub mod service;

pub use model::{
    ConsentRecord, ConsentStatus, CreateConsentRequest, DataLife, DataLifeUnit, DataRange, FiType,
    Frequency, Purpose,
};
pub use service::ConsentService;
