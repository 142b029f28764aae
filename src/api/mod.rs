//! HTTP pages outside the sign-in flow
//!
//! - Profile page (session guarded)
//! - Prometheus metrics

mod metrics;
mod profile;

pub use metrics::{metrics_router, track_requests};
pub use profile::{profile_router, render_profile};
