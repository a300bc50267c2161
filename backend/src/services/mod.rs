//! Cross-source services
//!
//! The social metadata aggregator and the NovaScore façade that combines
//! every analyser's output.

pub mod scoring;
pub mod social;

pub use scoring::{compute_nova_score, NovaScoreResult, ScoreInputs, Tier};
pub use social::{PlatformFetcher, SamplePlatformFetcher, SocialService};
