//! Trust tier aggregation over rating histories

use crate::models::trust::{TrustSummary, TrustTier};

/// Tier boundary: a mean strictly below this is low trust
const LOW_TRUST_BELOW: f64 = 3.0;

fn mean(ratings: &[u8]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let total: u32 = ratings.iter().map(|&r| u32::from(r)).sum();
    Some(f64::from(total) / ratings.len() as f64)
}

/// Classify a rating history
pub fn trust_tier(ratings: &[u8]) -> TrustTier {
    match mean(ratings) {
        None => TrustTier::New,
        Some(avg) if avg < LOW_TRUST_BELOW => TrustTier::LowTrust,
        Some(_) => TrustTier::Trusted,
    }
}

/// Mean rating rounded to one decimal
pub fn average_rating(ratings: &[u8]) -> Option<f64> {
    mean(ratings).map(|avg| (avg * 10.0).round() / 10.0)
}

pub fn summarize(ratings: &[u8]) -> TrustSummary {
    TrustSummary {
        tier: trust_tier(ratings),
        average: average_rating(ratings),
        count: ratings.len(),
    }
}
