//! Evidence analysers
//!
//! Pure scoring and classification over the evidence sources: bank
//! transactions, UPI activity, GST filings, utility bills, and the
//! behavioural questionnaire. The GST and utility modules also carry their
//! upstream fetch wrappers.

pub mod gst;
pub mod quiz;
pub mod transactions;
pub mod upi;
pub mod utility;
