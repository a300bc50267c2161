//! Credence Backend Library
//!
//! Credit intelligence engine: heterogeneous evidence ingestion (Account
//! Aggregator bank data, GST filings, utility bills, UPI streams, Aadhaar
//! OTP identity, behavioural questionnaire, social metadata), per-source
//! quality scoring, and auditable NovaScore aggregation.

pub mod aa;
pub mod aadhaar;
pub mod analysis;
pub mod app_state;
pub mod config;
pub mod consent;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod transport;
