use crate::config::ScoringWeights;
use crate::domain::location::{Location, LocationCapacity};
use crate::domain::types::VelocityClass;
use serde::{Deserialize, Serialize};

/// 评分分量（均归一化到 [0,1]）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub velocity_match: f64,
    pub low_occupancy: f64,
    pub zone_balance: f64,
    pub dock_distance: f64,
    pub tight_fit: f64,
    pub total: f64,
}

/// 候选集级别的归一化基准
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringBasis {
    pub preferred: VelocityClass,
    pub dock: (f64, f64),
    pub max_dock_distance: f64,
    pub max_free_after: f64,
}

impl ScoringBasis {
    /// 由候选集计算归一化基准
    pub fn from_candidates(
        candidates: &[&Location],
        preferred: VelocityClass,
        dock: (f64, f64),
        volume: f64,
    ) -> Self {
        let max_dock_distance = candidates
            .iter()
            .filter_map(|l| l.distance_to(dock))
            .fold(0.0_f64, f64::max);
        let max_free_after = candidates
            .iter()
            .map(|l| (l.free_volume() - volume).max(0.0))
            .fold(0.0_f64, f64::max);
        Self {
            preferred,
            dock,
            max_dock_distance,
            max_free_after,
        }
    }
}

pub(super) fn score_location(
    location: &Location,
    zone_avg_occupancy_pct: f64,
    volume: f64,
    basis: &ScoringBasis,
    weights: &ScoringWeights,
) -> ScoreBreakdown {
    let velocity_match = location.velocity_class.match_factor(basis.preferred);
    let low_occupancy = 1.0 - location.occupancy_pct() / 100.0;
    let zone_balance = 1.0 - zone_avg_occupancy_pct.clamp(0.0, 100.0) / 100.0;

    // 无坐标视为最远
    let dock_distance = match location.distance_to(basis.dock) {
        Some(_) if basis.max_dock_distance <= 0.0 => 1.0,
        Some(d) => 1.0 - d / basis.max_dock_distance,
        None => 0.0,
    };

    let free_after = (location.free_volume() - volume).max(0.0);
    let tight_fit = if basis.max_free_after <= 0.0 {
        1.0
    } else {
        1.0 - free_after / basis.max_free_after
    };

    let total = weights.velocity_match * velocity_match
        + weights.low_occupancy * low_occupancy
        + weights.zone_balance * zone_balance
        + weights.dock_distance * dock_distance
        + weights.tight_fit * tight_fit;

    ScoreBreakdown {
        velocity_match,
        low_occupancy,
        zone_balance,
        dock_distance,
        tight_fit,
        total,
    }
}
