//! API handlers for the Credence backend

pub mod aadhaar;
pub mod analysis;
pub mod consent;
pub mod fi;
pub mod quiz;
pub mod score;
pub mod social;

pub use aadhaar::{initiate_otp, verify_otp};
pub use analysis::{analyse_upi, fetch_gst_compliance, fetch_utility_reliability};
pub use consent::{create_consent, get_consent, list_consents, revoke_consent};
pub use fi::{fi_fetch, fi_request, get_fi_session};
pub use quiz::{get_questions, submit_quiz};
pub use score::aggregate_score;
pub use social::connect_social;
