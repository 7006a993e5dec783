//! Trust tier types

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Advisory classification derived from a user's rating history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum TrustTier {
    New,
    LowTrust,
    Trusted,
}

/// Trust tier plus the figures it was derived from
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrustSummary {
    pub tier: TrustTier,
    /// Mean rating rounded to one decimal, absent without ratings
    pub average: Option<f64>,
    pub count: usize,
}
