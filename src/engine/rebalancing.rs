// ==========================================
// 仓储货位与波次拣选系统 - 货位再平衡建议
// ==========================================
// 职责: 发现过载的 HOT 货位，给出搬移建议
// 规则:
// - 扫描 HOT 货位，占用率 > 阈值（默认 85%）
// - 取该货位数量最多的物理库存行，建议搬移约 30%（至少 1 件）
// - 搬移量不超过未被拣货任务占用的数量
// - 目标: 非 HOT 货位，沿用上架选位的兼容性与评分
// 红线: suggest 只读；execute 经 InventoryLedger::transfer 单事务执行
// ==========================================

use crate::config::{RebalanceConfig, SlottingConfig};
use crate::db::SharedConnection;
use crate::domain::location::{Location, LocationCapacity};
use crate::domain::types::VelocityClass;
use crate::engine::commitments::OpenCommitments;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::inventory_ledger::{InventoryLedger, TransferReceipt, TransferRequest};
use crate::engine::slotting::{CompatibilityRules, SlottingEngine};
use crate::repository::{LocationRepository, SkuRepository, StockRepository};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::MutexGuard;
use tracing::{debug, info, instrument};

/// 搬移建议（不具约束力）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceSuggestion {
    pub from_location_id: i64,
    pub to_location_id: i64,
    pub sku_id: i64,
    pub quantity: i64,
    pub reason: String,
}

// ==========================================
// RebalancingAdvisor - 再平衡顾问
// ==========================================
pub struct RebalancingAdvisor {
    conn: SharedConnection,
    slotting: SlottingConfig,
    rebalance: RebalanceConfig,
}

impl RebalancingAdvisor {
    pub fn new(conn: SharedConnection, slotting: SlottingConfig, rebalance: RebalanceConfig) -> Self {
        Self {
            conn,
            slotting,
            rebalance,
        }
    }

    fn lock(&self) -> EngineResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| EngineError::TransactionFailed(format!("锁获取失败: {}", e)))
    }

    /// 扫描过载 HOT 货位并给出建议（只读）
    #[instrument(skip(self))]
    pub fn suggest(&self) -> EngineResult<Vec<RebalanceSuggestion>> {
        let conn = self.lock()?;
        let food_locations = LocationRepository::food_location_ids_in(&conn)?;
        let rules = CompatibilityRules {
            heavy_unit_weight_kg: self.slotting.heavy_unit_weight_kg,
            food_locations: &food_locations,
        };

        let mut suggestions = Vec::new();
        for location in LocationRepository::list_by_velocity_in(&conn, VelocityClass::Hot)? {
            let occupancy = location.occupancy_pct();
            if occupancy <= self.rebalance.hot_occupancy_threshold_pct {
                continue;
            }
            if let Some(suggestion) = self.suggest_for_in(&conn, &location, occupancy, &rules)? {
                suggestions.push(suggestion);
            }
        }

        info!(count = suggestions.len(), "再平衡建议已生成");
        Ok(suggestions)
    }

    fn suggest_for_in(
        &self,
        conn: &Connection,
        source: &Location,
        occupancy: f64,
        rules: &CompatibilityRules<'_>,
    ) -> EngineResult<Option<RebalanceSuggestion>> {
        // 按数量降序，首行即最大库存行
        let Some(row) = StockRepository::list_physical_at_location_in(conn, source.location_id)?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };

        // 未完成拣货任务占用的数量留在原货位
        let committed = OpenCommitments::load_in(conn, Some(row.sku_id))?;
        let held: i64 = StockRepository::list_lots_at_location_in(conn, source.location_id, row.sku_id, None)?
            .iter()
            .map(|lot| committed.lot(lot.lot_id))
            .sum();
        let movable = row.quantity - held;
        if movable <= 0 {
            debug!(location_id = source.location_id, sku_id = row.sku_id, held, "库存均被拣货任务占用");
            return Ok(None);
        }

        let quantity = ((row.quantity as f64 * self.rebalance.move_fraction).round() as i64)
            .max(1)
            .min(movable);
        let (volume, weight_kg) = row.share_of(quantity);
        let sku = SkuRepository::require_in(conn, row.sku_id)?;

        let source_id = source.location_id;
        let ranked = match SlottingEngine::rank_candidates_in(
            conn,
            &sku,
            volume,
            weight_kg,
            VelocityClass::Warm,
            &self.slotting,
            rules,
            &|l: &Location| l.location_id != source_id && l.velocity_class != VelocityClass::Hot,
        ) {
            Ok(ranked) => ranked,
            Err(e @ (EngineError::NoCapacity { .. } | EngineError::IncompatibleLocation { .. })) => {
                debug!(location_id = source_id, sku_id = sku.sku_id, code = e.code(), "无合适搬移目标");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        Ok(ranked.into_iter().next().map(|target| RebalanceSuggestion {
            from_location_id: source_id,
            to_location_id: target.location.location_id,
            sku_id: sku.sku_id,
            quantity,
            reason: format!(
                "HOT 货位 {} 占用率 {:.1}% 超过 {:.1}%，建议移至 {} ({})",
                source.code,
                occupancy,
                self.rebalance.hot_occupancy_threshold_pct,
                target.location.code,
                target.location.velocity_class
            ),
        }))
    }

    /// 执行一条建议（单事务调拨）
    #[instrument(skip(self, suggestion), fields(from = suggestion.from_location_id, to = suggestion.to_location_id))]
    pub fn execute(&self, suggestion: &RebalanceSuggestion, operator: &str) -> EngineResult<TransferReceipt> {
        InventoryLedger::new(self.conn.clone()).transfer(
            &TransferRequest {
                sku_id: suggestion.sku_id,
                from_location_id: suggestion.from_location_id,
                to_location_id: suggestion.to_location_id,
                quantity: suggestion.quantity,
            },
            operator,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AllocationConfig, RouteConfig, WaveConfig};
    use crate::domain::types::{PickTaskStatus, WaveType};
    use crate::domain::wave::WaveScope;
    use crate::engine::test_fixtures::{insert_location, insert_sku, location, memory_conn, order, sku, stock};
    use crate::engine::wave_builder::WaveBuilder;

    fn advisor(conn: &SharedConnection) -> RebalancingAdvisor {
        RebalancingAdvisor::new(conn.clone(), SlottingConfig::default(), RebalanceConfig::default())
    }

    fn occupied_volume(conn: &SharedConnection, location_id: i64) -> f64 {
        let guard = conn.lock().unwrap();
        LocationRepository::require_in(&guard, location_id)
            .unwrap()
            .occupied_volume
    }

    #[test]
    fn test_overloaded_hot_location_moves_thirty_percent() {
        let conn = memory_conn();
        let sku_id = insert_sku(&conn, &sku("SKU-1"));
        let hot = insert_location(&conn, &location("A-01", "A", VelocityClass::Hot, 1.0, 0.0));
        insert_location(&conn, &location("A-02", "A", VelocityClass::Hot, 2.0, 0.0));
        let warm = insert_location(&conn, &location("B-01", "B", VelocityClass::Warm, 10.0, 0.0));
        insert_location(&conn, &location("C-01", "C", VelocityClass::Cold, 20.0, 0.0));
        stock(&conn, 1, sku_id, hot, 900, "2024-01-01");

        let suggestions = advisor(&conn).suggest().unwrap();
        assert_eq!(suggestions.len(), 1);
        let s = &suggestions[0];
        assert_eq!(s.from_location_id, hot);
        assert_eq!(s.to_location_id, warm);
        assert_eq!(s.sku_id, sku_id);
        assert_eq!(s.quantity, 270);
        assert!(s.reason.contains("A-01"));

        // 建议不改变状态
        assert_eq!(occupied_volume(&conn, hot), 900.0);
    }

    #[test]
    fn test_below_threshold_yields_nothing() {
        let conn = memory_conn();
        let sku_id = insert_sku(&conn, &sku("SKU-1"));
        let hot = insert_location(&conn, &location("A-01", "A", VelocityClass::Hot, 1.0, 0.0));
        insert_location(&conn, &location("B-01", "B", VelocityClass::Warm, 10.0, 0.0));
        stock(&conn, 1, sku_id, hot, 850, "2024-01-01");

        assert!(advisor(&conn).suggest().unwrap().is_empty());
    }

    #[test]
    fn test_no_non_hot_target_skips_location() {
        let conn = memory_conn();
        let sku_id = insert_sku(&conn, &sku("SKU-1"));
        let hot = insert_location(&conn, &location("A-01", "A", VelocityClass::Hot, 1.0, 0.0));
        insert_location(&conn, &location("A-02", "A", VelocityClass::Hot, 2.0, 0.0));
        stock(&conn, 1, sku_id, hot, 950, "2024-01-01");

        assert!(advisor(&conn).suggest().unwrap().is_empty());
    }

    #[test]
    fn test_execute_transfers_through_ledger() {
        let conn = memory_conn();
        let sku_id = insert_sku(&conn, &sku("SKU-1"));
        let hot = insert_location(&conn, &location("A-01", "A", VelocityClass::Hot, 1.0, 0.0));
        let warm = insert_location(&conn, &location("B-01", "B", VelocityClass::Warm, 10.0, 0.0));
        stock(&conn, 1, sku_id, hot, 900, "2024-01-01");

        let advisor = advisor(&conn);
        let suggestion = advisor.suggest().unwrap().remove(0);
        let receipt = advisor.execute(&suggestion, "rebalancer").unwrap();

        assert_eq!(receipt.moved_qty, 270);
        assert!((occupied_volume(&conn, hot) - 630.0).abs() < 1e-6);
        assert!((occupied_volume(&conn, warm) - 270.0).abs() < 1e-6);
        assert!(advisor.suggest().unwrap().is_empty());
    }

    #[test]
    fn test_rebalance_leaves_stock_held_by_queued_tasks() {
        let conn = memory_conn();
        let sku_id = insert_sku(&conn, &sku("SKU-1"));
        let hot = insert_location(&conn, &location("A-01", "A", VelocityClass::Hot, 1.0, 0.0));
        insert_location(&conn, &location("B-01", "B", VelocityClass::Warm, 10.0, 0.0));
        stock(&conn, 1, sku_id, hot, 900, "2024-01-01");
        order(&conn, "SO-1", 1, 5, "2024-03-01", &[(sku_id, 850)]);

        let waves = WaveBuilder::new(
            conn.clone(),
            WaveConfig::default(),
            AllocationConfig::default(),
            RouteConfig::default(),
        );
        let wave = waves
            .build_wave(WaveType::WavePicking, WaveScope::default())
            .unwrap();
        assert_eq!(wave.tasks[0].location_id, hot);

        let advisor = advisor(&conn);
        let suggestion = advisor.suggest().unwrap().remove(0);
        assert_eq!(suggestion.quantity, 50);
        advisor.execute(&suggestion, "rebalancer").unwrap();

        // 任务仍可在原货位足量拣货
        waves.start_wave(wave.wave.wave_id).unwrap();
        let task = &wave.tasks[0];
        let done = waves.confirm_pick_task(task.task_id, 850, "picker").unwrap();
        assert_eq!(done.status, PickTaskStatus::Done);
        assert!(occupied_volume(&conn, hot).abs() < 1e-6);
    }
}
