//! Contributor performance tiers.
//!
//! Tiers are checked from the top down and the first one whose thresholds
//! are all met is assigned, so every user lands in exactly one tier.

use insights_core::models::PerformanceSegment;
use serde::{Deserialize, Serialize};

use crate::metrics::UserMetrics;

/// Champion: acceptance rate (%) at or above.
pub const CHAMPION_MIN_ACCEPTANCE: f64 = 40.0;
/// Champion: chat applies at or above.
pub const CHAMPION_MIN_APPLIES: u64 = 100;
/// Champion: per-user ROI (%) at or above.
pub const CHAMPION_MIN_ROI: f64 = 100.0;

pub const PRODUCER_MIN_ACCEPTANCE: f64 = 25.0;
pub const PRODUCER_MIN_APPLIES: u64 = 30;

/// Explorer needs either this many applies...
pub const EXPLORER_MIN_APPLIES: u64 = 5;
/// ...or this acceptance rate.
pub const EXPLORER_MIN_ACCEPTANCE: f64 = 10.0;

/// Assign a tier from a user's acceptance rate, apply count and ROI.
pub fn classify(acceptance_rate: f64, total_applies: u64, roi: f64) -> PerformanceSegment {
    if acceptance_rate >= CHAMPION_MIN_ACCEPTANCE
        && total_applies >= CHAMPION_MIN_APPLIES
        && roi >= CHAMPION_MIN_ROI
    {
        PerformanceSegment::Champion
    } else if acceptance_rate >= PRODUCER_MIN_ACCEPTANCE && total_applies >= PRODUCER_MIN_APPLIES {
        PerformanceSegment::Producer
    } else if total_applies >= EXPLORER_MIN_APPLIES || acceptance_rate >= EXPLORER_MIN_ACCEPTANCE {
        PerformanceSegment::Explorer
    } else {
        PerformanceSegment::Starter
    }
}

/// Number of users in one tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentCount {
    pub segment: PerformanceSegment,
    pub users: usize,
    /// Share of all users, 0–100.
    pub share: f64,
}

/// Users per tier. Always lists all four tiers, highest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentBreakdown {
    pub total_users: usize,
    pub segments: Vec<SegmentCount>,
}

impl SegmentBreakdown {
    pub fn count(&self, segment: PerformanceSegment) -> usize {
        self.segments
            .iter()
            .find(|s| s.segment == segment)
            .map_or(0, |s| s.users)
    }
}

/// Tally the tiers already assigned on `users`.
pub fn segment_users(users: &[UserMetrics]) -> SegmentBreakdown {
    let total_users = users.len();
    let segments = PerformanceSegment::ALL
        .iter()
        .map(|&segment| {
            let n = users.iter().filter(|u| u.segment == segment).count();
            SegmentCount {
                segment,
                users: n,
                share: if total_users == 0 {
                    0.0
                } else {
                    n as f64 / total_users as f64 * 100.0
                },
            }
        })
        .collect();

    SegmentBreakdown {
        total_users,
        segments,
    }
}
