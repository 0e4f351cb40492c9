// ==========================================
// 仓储货位与波次拣选系统 - 上架选位引擎
// ==========================================
// 职责: 为入库货物选择上架货位（混放存储）
// 流程:
// 1) 速度分级: 回看窗口内流水条数 > 阈值 → 偏好 HOT，否则 WARM
// 2) 合并存放: 已有同 SKU 可用批次、余量足够且兼容的货位优先
// 3) 兼容性过滤: 重量 / 温控 / 食品隔离 / 危险品
// 4) 评分: 速度匹配 > 低占用 > 区域均衡 > 近收货口 > 紧凑
// 红线: 只给建议，不修改任何状态；提交由 InventoryLedger 完成
// ==========================================

mod compatibility;
mod scoring;
#[cfg(test)]
mod tests;

pub use compatibility::{CompatibilityRules, Incompatibility};
pub use scoring::{ScoreBreakdown, ScoringBasis};

use crate::config::SlottingConfig;
use crate::db::SharedConnection;
use crate::domain::location::{Location, LocationCapacity};
use crate::domain::sku::Sku;
use crate::domain::stock::PutAwayTask;
use crate::domain::types::VelocityClass;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::inventory_ledger::validate_put_away;
use crate::repository::{LocationRepository, MovementRepository, SkuRepository};
use chrono::{Duration, NaiveDateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

/// 同分判定容差
const SCORE_EPSILON: f64 = 1e-9;

/// 选位方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotStrategy {
    Consolidation,
    Scored,
}

/// 上架建议
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSuggestion {
    pub location_id: i64,
    pub location_code: String,
    pub zone: String,
    pub velocity_class: VelocityClass,
    pub preferred_velocity: VelocityClass,
    pub strategy: SlotStrategy,
    pub score: Option<ScoreBreakdown>,
    pub existing_qty: Option<i64>,
}

/// 已评分候选
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub location: Location,
    pub score: ScoreBreakdown,
}

// ==========================================
// SlottingEngine - 上架选位引擎
// ==========================================
pub struct SlottingEngine {
    conn: SharedConnection,
    config: SlottingConfig,
}

impl SlottingEngine {
    pub fn new(conn: SharedConnection, config: SlottingConfig) -> Self {
        Self { conn, config }
    }

    pub fn config(&self) -> &SlottingConfig {
        &self.config
    }

    /// 为上架任务给出货位建议（只读）
    #[instrument(skip(self, task), fields(sku_id = task.sku_id, tenant_id = task.tenant_id, quantity = task.quantity))]
    pub fn suggest(&self, task: &PutAwayTask) -> EngineResult<SlotSuggestion> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| EngineError::TransactionFailed(format!("锁获取失败: {}", e)))?;
        Self::suggest_in(&conn, task, &self.config, Utc::now().naive_utc())
    }

    pub(crate) fn suggest_in(
        conn: &Connection,
        task: &PutAwayTask,
        config: &SlottingConfig,
        now: NaiveDateTime,
    ) -> EngineResult<SlotSuggestion> {
        validate_put_away(task)?;

        let sku = SkuRepository::require_in(conn, task.sku_id)?;
        let preferred = Self::classify_velocity_in(conn, task.sku_id, config, now)?;
        let food_locations = LocationRepository::food_location_ids_in(conn)?;
        let rules = CompatibilityRules {
            heavy_unit_weight_kg: config.heavy_unit_weight_kg,
            food_locations: &food_locations,
        };

        // 合并存放优先
        if let Some((location, existing_qty)) =
            Self::consolidation_target_in(conn, &sku, task, preferred, &rules)?
        {
            info!(
                location_id = location.location_id,
                existing_qty,
                "选位: 合并存放"
            );
            return Ok(SlotSuggestion {
                location_id: location.location_id,
                location_code: location.code,
                zone: location.zone,
                velocity_class: location.velocity_class,
                preferred_velocity: preferred,
                strategy: SlotStrategy::Consolidation,
                score: None,
                existing_qty: Some(existing_qty),
            });
        }

        let ranked = Self::rank_candidates_in(
            conn,
            &sku,
            task.volume,
            task.weight_kg,
            preferred,
            config,
            &rules,
            &|_| true,
        )?;
        // rank_candidates_in 保证非空
        let best = ranked
            .into_iter()
            .next()
            .ok_or(EngineError::NoCapacity {
                sku_id: task.sku_id,
                volume: task.volume,
                weight_kg: task.weight_kg,
            })?;

        info!(
            location_id = best.location.location_id,
            score = best.score.total,
            preferred = %preferred,
            "选位: 评分最优"
        );
        Ok(SlotSuggestion {
            location_id: best.location.location_id,
            location_code: best.location.code,
            zone: best.location.zone,
            velocity_class: best.location.velocity_class,
            preferred_velocity: preferred,
            strategy: SlotStrategy::Scored,
            score: Some(best.score),
            existing_qty: None,
        })
    }

    /// 速度分级：窗口内流水条数 > 阈值 → HOT，否则 WARM
    pub(crate) fn classify_velocity_in(
        conn: &Connection,
        sku_id: i64,
        config: &SlottingConfig,
        now: NaiveDateTime,
    ) -> EngineResult<VelocityClass> {
        let since = now - Duration::days(config.velocity_window_days.max(0));
        let count = MovementRepository::count_for_sku_since_in(conn, sku_id, since)?;
        let class = if count > config.velocity_threshold {
            VelocityClass::Hot
        } else {
            VelocityClass::Warm
        };
        debug!(sku_id, count, threshold = config.velocity_threshold, class = %class, "速度分级");
        Ok(class)
    }

    /// 合并存放目标：速度匹配降序 → 现存量降序 → location_id 升序
    fn consolidation_target_in(
        conn: &Connection,
        sku: &Sku,
        task: &PutAwayTask,
        preferred: VelocityClass,
        rules: &CompatibilityRules<'_>,
    ) -> EngineResult<Option<(Location, i64)>> {
        let mut holders: Vec<(Location, i64)> = LocationRepository::list_holding_sku_in(conn, sku.sku_id)?
            .into_iter()
            .filter(|(loc, _)| loc.can_accept(task.volume, task.weight_kg))
            .filter(|(loc, _)| rules.check(sku, loc).is_ok())
            .collect();

        holders.sort_by(|(a, qa), (b, qb)| {
            b.velocity_class
                .match_factor(preferred)
                .partial_cmp(&a.velocity_class.match_factor(preferred))
                .unwrap_or(Ordering::Equal)
                .then_with(|| qb.cmp(qa))
                .then_with(|| a.location_id.cmp(&b.location_id))
        });
        Ok(holders.into_iter().next())
    }

    /// 候选货位评分排序（得分降序，同分 location_id 升序）
    ///
    /// # 错误
    /// - NoCapacity: 没有余量足够的候选，或兼容候选均已超过占用上限
    /// - IncompatibleLocation: 有余量的候选全部不兼容
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn rank_candidates_in(
        conn: &Connection,
        sku: &Sku,
        volume: f64,
        weight_kg: f64,
        preferred: VelocityClass,
        config: &SlottingConfig,
        rules: &CompatibilityRules<'_>,
        filter: &dyn Fn(&Location) -> bool,
    ) -> EngineResult<Vec<RankedCandidate>> {
        let no_capacity = || EngineError::NoCapacity {
            sku_id: sku.sku_id,
            volume,
            weight_kg,
        };

        let with_capacity: Vec<Location> = LocationRepository::list_active_in(conn)?
            .into_iter()
            .filter(|l| filter(l))
            .filter(|l| l.can_accept(volume, weight_kg))
            .collect();
        if with_capacity.is_empty() {
            return Err(no_capacity());
        }

        let mut reasons = BTreeSet::new();
        let compatible: Vec<&Location> = with_capacity
            .iter()
            .filter(|l| match rules.check(sku, l) {
                Ok(()) => true,
                Err(reason) => {
                    reasons.insert(reason);
                    false
                }
            })
            .collect();
        if compatible.is_empty() {
            return Err(EngineError::IncompatibleLocation {
                sku_id: sku.sku_id,
                reasons: reasons
                    .iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            });
        }

        let scorable: Vec<&Location> = compatible
            .into_iter()
            .filter(|l| l.occupancy_pct() < config.max_candidate_occupancy_pct)
            .collect();
        if scorable.is_empty() {
            return Err(no_capacity());
        }

        let zone_avg = LocationRepository::zone_average_occupancy_in(conn)?;
        let basis = ScoringBasis::from_candidates(
            &scorable,
            preferred,
            (config.dock_x, config.dock_y),
            volume,
        );

        let mut ranked: Vec<RankedCandidate> = scorable
            .into_iter()
            .map(|l| RankedCandidate {
                score: scoring::score_location(
                    l,
                    zone_avg.get(&l.zone).copied().unwrap_or(0.0),
                    volume,
                    &basis,
                    &config.weights,
                ),
                location: l.clone(),
            })
            .collect();
        ranked.sort_by(compare_ranked);
        Ok(ranked)
    }
}

/// 得分降序；差值在容差内视为同分，按 location_id 升序
pub(crate) fn compare_ranked(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    let diff = b.score.total - a.score.total;
    if diff.abs() <= SCORE_EPSILON {
        a.location.location_id.cmp(&b.location.location_id)
    } else if diff > 0.0 {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}
