// ==========================================
// 仓储货位与波次拣选系统 - 组波引擎
// ==========================================
// 流程（单事务）:
// 1) 候选: NEW/CONFIRMED 订单，按租户/最低优先级/日期范围过滤
// 2) 选单: 按波次类型（WAVE / ZONE / BATCH / DISCRETE）
// 3) 任务生成: 逐行保存点；整载具优先，其次 FIFO 批次；同时预留
//    其他波次未完成任务占用的批次/载具数量不再分配
// 4) 初始排序 (zone, location_code, unit_load_id, sku) → 路径优化
// 5) 落库: 波次、任务、订单 → IN_WAVE、波次汇总
// 失败:
// - 无候选/无入选 → NO_ELIGIBLE_ORDERS
// - 零任务 → 整体回滚，UNFULFILLABLE_LINE（附全部不可履约行）
// 生命周期: PLANNED → IN_PROGRESS → DONE；PLANNED/IN_PROGRESS → CANCELLED
// DONE 时未拣足的订单退回 CONFIRMED
// ==========================================

mod selection;
mod tasks;
#[cfg(test)]
mod tests;

pub use selection::{dominant_zone, jaccard, select_orders};

use crate::config::{AllocationConfig, RouteConfig, WaveConfig};
use crate::db::SharedConnection;
use crate::domain::order::EligibleOrder;
use crate::domain::types::{OrderStatus, PickTaskStatus, WaveStatus, WaveType};
use crate::domain::wave::{PickTask, UnfulfillableLine, Wave, WaveScope};
use crate::engine::commitments::OpenCommitments;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::inventory_ledger::InventoryLedger;
use crate::engine::route::RouteOptimizer;
use crate::perf::PerfGuard;
use crate::repository::{OrderRepository, StockRepository, WaveRepository, WaveTotals};
use chrono::Utc;
use rusqlite::{Connection, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::MutexGuard;
use tasks::LinePlanner;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 组波结果（部分失败的行随任务一并返回）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveBuildResult {
    pub wave: Wave,
    pub tasks: Vec<PickTask>,
    pub unfulfillable: Vec<UnfulfillableLine>,
}

// ==========================================
// WaveBuilder - 组波引擎
// ==========================================
pub struct WaveBuilder {
    conn: SharedConnection,
    wave_config: WaveConfig,
    allocation_config: AllocationConfig,
    route_config: RouteConfig,
}

impl WaveBuilder {
    pub fn new(
        conn: SharedConnection,
        wave_config: WaveConfig,
        allocation_config: AllocationConfig,
        route_config: RouteConfig,
    ) -> Self {
        Self {
            conn,
            wave_config,
            allocation_config,
            route_config,
        }
    }

    fn lock(&self) -> EngineResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| EngineError::TransactionFailed(format!("锁获取失败: {}", e)))
    }

    // ==========================================
    // 组波
    // ==========================================

    /// 生成波次（scope.max_orders 为 0 时取配置默认值）
    #[instrument(skip_all, fields(wave_type = %wave_type, tenant_id = ?scope.tenant_id))]
    pub fn build_wave(&self, wave_type: WaveType, mut scope: WaveScope) -> EngineResult<WaveBuildResult> {
        if scope.max_orders == 0 {
            scope.max_orders = self.wave_config.default_max_orders;
        }
        if let (Some(from), Some(to)) = (scope.date_from, scope.date_to) {
            if from > to {
                return Err(EngineError::InvalidInput(format!(
                    "日期范围无效: {} > {}",
                    from, to
                )));
            }
        }

        let mut perf = PerfGuard::new("wave.build");
        let mut conn = self.lock()?;
        let mut tx = conn.transaction()?;

        match self.build_in(&mut tx, wave_type, &scope) {
            Ok(result) => {
                tx.commit()?;
                perf.set_items(result.tasks.len());
                info!(
                    wave_id = result.wave.wave_id,
                    orders = result.wave.total_orders,
                    picks = result.wave.total_picks,
                    unfulfillable = result.unfulfillable.len(),
                    "波次已生成"
                );
                Ok(result)
            }
            Err(e) => {
                warn!(code = e.code(), error = %e, "组波失败，事务回滚");
                Err(e)
            }
        }
    }

    fn build_in(
        &self,
        tx: &mut Transaction<'_>,
        wave_type: WaveType,
        scope: &WaveScope,
    ) -> EngineResult<WaveBuildResult> {
        let mut candidates = OrderRepository::find_eligible_in(tx, scope)?;
        if candidates.is_empty() {
            return Err(EngineError::NoEligibleOrders(format!(
                "范围内没有可组波订单: {:?}",
                scope
            )));
        }

        if wave_type == WaveType::ZonePicking {
            Self::annotate_dominant_zones_in(tx, &mut candidates)?;
        }

        let selected = select_orders(candidates, wave_type, scope.max_orders, &self.wave_config);
        if selected.is_empty() {
            return Err(EngineError::NoEligibleOrders(format!(
                "{} 策略未选中任何订单",
                wave_type
            )));
        }

        // 逐行生成任务
        let committed = OpenCommitments::load_in(tx, None)?;
        let mut planner = LinePlanner::new(&self.allocation_config, self.wave_config.max_tasks, committed);
        for eligible in &selected {
            let lines = OrderRepository::lines_for_order_in(tx, eligible.order_id())?;
            for line in &lines {
                planner.plan_line(tx, &eligible.order, line)?;
            }
        }

        let (mut planned, unfulfillable) = planner.into_parts();
        if planned.is_empty() {
            return Err(EngineError::UnfulfillableLine {
                lines: unfulfillable,
            });
        }

        // 初始排序 → 路径优化
        planned.sort_by(|a, b| {
            a.zone
                .cmp(&b.zone)
                .then_with(|| a.location_code.cmp(&b.location_code))
                .then_with(|| a.unit_load_id.cmp(&b.unit_load_id))
                .then_with(|| a.sku_id.cmp(&b.sku_id))
        });
        let route = RouteOptimizer::new(self.route_config.clone()).optimize(planned, wave_type);

        // 落库
        let now = Utc::now().naive_utc();
        let wave_number = format!("WAVE-{}", Uuid::new_v4());
        let wave_id = WaveRepository::insert_wave_in(tx, &wave_number, wave_type, scope, now)?;

        let mut order_ids = BTreeSet::new();
        let mut line_ids = BTreeSet::new();
        for task in &route.tasks {
            WaveRepository::insert_task_in(tx, wave_id, task)?;
            order_ids.insert(task.order_id);
            line_ids.insert(task.line_id);
        }
        for &order_id in &order_ids {
            OrderRepository::transition_status_in(
                tx,
                order_id,
                OrderStatus::committable(),
                OrderStatus::InWave,
            )?;
        }

        WaveRepository::update_totals_in(
            tx,
            wave_id,
            &WaveTotals {
                total_orders: order_ids.len() as i64,
                total_lines: line_ids.len() as i64,
                total_picks: route.tasks.len() as i64,
                est_distance_m: route.total_distance_m,
                est_time_s: route.total_time_s,
            },
        )?;

        Ok(WaveBuildResult {
            wave: WaveRepository::require_in(tx, wave_id)?,
            tasks: WaveRepository::list_tasks_in(tx, wave_id)?,
            unfulfillable,
        })
    }

    /// 主导库区: 订单各行 SKU 当前存放货位的库区众数
    fn annotate_dominant_zones_in(conn: &Connection, candidates: &mut [EligibleOrder]) -> EngineResult<()> {
        for candidate in candidates.iter_mut() {
            let mut zones = Vec::new();
            for &sku_id in &candidate.sku_ids {
                zones.extend(StockRepository::stock_zones_in(conn, sku_id, candidate.order.tenant_id)?);
            }
            candidate.dominant_zone = dominant_zone(zones.iter().map(String::as_str));
        }
        Ok(())
    }

    // ==========================================
    // 生命周期
    // ==========================================

    /// PLANNED → IN_PROGRESS
    #[instrument(skip(self))]
    pub fn start_wave(&self, wave_id: i64) -> EngineResult<Wave> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        Self::transition_in(&tx, wave_id, WaveStatus::InProgress)?;
        let wave = WaveRepository::require_in(&tx, wave_id)?;
        tx.commit()?;
        info!(wave_id, "波次开始拣货");
        Ok(wave)
    }

    /// 确认拣货任务（库存写入由账本完成）
    pub fn confirm_pick_task(&self, task_id: i64, picked_qty: i64, operator: &str) -> EngineResult<PickTask> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let task = InventoryLedger::confirm_pick_task_in(&tx, task_id, picked_qty, operator)?;
        tx.commit()?;
        Ok(task)
    }

    /// IN_PROGRESS → DONE；要求无未完成任务
    ///
    /// 已拣足的订单 → PICKED；短拣/跳过的订单退回 CONFIRMED，剩余量可再次组波
    #[instrument(skip(self))]
    pub fn complete_wave(&self, wave_id: i64) -> EngineResult<Wave> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let open = WaveRepository::count_open_tasks_in(&tx, wave_id)?;
        if open > 0 {
            let wave = WaveRepository::require_in(&tx, wave_id)?;
            return Err(EngineError::InvalidStateTransition {
                entity: "Wave".to_string(),
                from: format!("{}({} open tasks)", wave.status, open),
                to: WaveStatus::Done.to_string(),
            });
        }
        Self::transition_in(&tx, wave_id, WaveStatus::Done)?;

        let mut picked_orders = 0;
        let mut reopened_orders = 0;
        for order_id in WaveRepository::order_ids_in(&tx, wave_id)? {
            if OrderRepository::all_lines_picked_in(&tx, order_id)? {
                picked_orders +=
                    OrderRepository::transition_status_in(&tx, order_id, &[OrderStatus::InWave], OrderStatus::Picked)?;
            } else {
                reopened_orders +=
                    OrderRepository::transition_status_in(&tx, order_id, &[OrderStatus::InWave], OrderStatus::Confirmed)?;
            }
        }

        let wave = WaveRepository::require_in(&tx, wave_id)?;
        tx.commit()?;
        info!(wave_id, picked_orders, reopened_orders, "波次完成");
        Ok(wave)
    }

    /// PLANNED/IN_PROGRESS → CANCELLED；未完成任务 → SKIPPED 并释放预留，订单退回 CONFIRMED
    #[instrument(skip(self))]
    pub fn cancel_wave(&self, wave_id: i64) -> EngineResult<Wave> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        Self::transition_in(&tx, wave_id, WaveStatus::Cancelled)?;

        let mut released = 0;
        for task in WaveRepository::list_tasks_in(&tx, wave_id)? {
            if !task.status.is_open() {
                continue;
            }
            InventoryLedger::release_in(&tx, task.tenant_id, task.sku_id, task.requested_qty)?;
            WaveRepository::update_task_in(&tx, task.task_id, PickTaskStatus::Skipped, 0)?;
            released += task.requested_qty;
        }
        for order_id in WaveRepository::order_ids_in(&tx, wave_id)? {
            OrderRepository::transition_status_in(&tx, order_id, &[OrderStatus::InWave], OrderStatus::Confirmed)?;
        }

        let wave = WaveRepository::require_in(&tx, wave_id)?;
        tx.commit()?;
        info!(wave_id, released, "波次已取消");
        Ok(wave)
    }

    pub fn find_wave(&self, wave_id: i64) -> EngineResult<Wave> {
        let conn = self.lock()?;
        Ok(WaveRepository::require_in(&conn, wave_id)?)
    }

    pub fn list_tasks(&self, wave_id: i64) -> EngineResult<Vec<PickTask>> {
        let conn = self.lock()?;
        Ok(WaveRepository::list_tasks_in(&conn, wave_id)?)
    }

    /// 校验并执行状态流转
    fn transition_in(conn: &Connection, wave_id: i64, to: WaveStatus) -> EngineResult<()> {
        let wave = WaveRepository::require_in(conn, wave_id)?;
        if !wave.status.can_transition_to(to)
            || !WaveRepository::transition_in(conn, wave_id, wave.status, to, Utc::now().naive_utc())?
        {
            return Err(EngineError::invalid_transition("Wave", wave.status, to));
        }
        Ok(())
    }
}
