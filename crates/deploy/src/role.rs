//! Scale-tier role of a node.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Role of a node in the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Outside the scaling tiers; announced to every node through the side list.
    #[display("side")]
    Side,
    /// Holds scale tier `k` (always at least 1).
    #[display("scale-{_0}")]
    Scale(u32),
}

impl Role {
    /// `Scale(ordinal)` when `1 <= ordinal <= scale_bound`, `Side` otherwise.
    ///
    /// Side membership is exactly "outside the scale bound"; the side broadcast list is derived
    /// from this function alone.
    pub fn assign(ordinal: u32, scale_bound: u32) -> Self {
        if (1..=scale_bound).contains(&ordinal) {
            Self::Scale(ordinal)
        } else {
            Self::Side
        }
    }

    /// Numeric id passed to the node binary: 0 for side nodes, the tier otherwise.
    pub fn tier_id(&self) -> u32 {
        match self {
            Self::Side => 0,
            Self::Scale(tier) => *tier,
        }
    }

    pub fn from_tier_id(tier: u32) -> Self {
        match tier {
            0 => Self::Side,
            tier => Self::Scale(tier),
        }
    }

    pub fn is_side(&self) -> bool {
        matches!(self, Self::Side)
    }
}
