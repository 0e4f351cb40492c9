// ==========================================
// 组波任务生成（逐行，保存点隔离）
// ==========================================
// 每行:
// 1) 优先整载具: 状态 PARTIAL/FULL、启用货位、余量足够的载具 → 单条任务
// 2) 否则按 FIFO 批次分配 → 每个批次片段一条任务
// 3) 在同一保存点内预留 available → reserved
// 任一步失败仅回滚该行，记为不可履约
// ==========================================

use crate::config::AllocationConfig;
use crate::domain::order::{Order, OrderLine};
use crate::domain::stock::PickRequest;
use crate::domain::unit_load::UnitLoadSource;
use crate::domain::wave::{PlannedPickTask, UnfulfillableLine, UnfulfillableReason};
use crate::engine::commitments::OpenCommitments;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::inventory_ledger::InventoryLedger;
use crate::engine::pick_allocation::PickAllocationEngine;
use crate::repository::{StockRepository, UnitLoadRepository};
use rusqlite::{Connection, Transaction};
use std::collections::HashMap;
use tracing::debug;

/// 单行规划结果
enum LinePlan {
    Planned {
        tasks: Vec<PlannedPickTask>,
        lot_usage: Vec<(i64, i64)>,
        unit_load_usage: Option<((i64, i64, i64), i64)>,
    },
    Unfulfillable(UnfulfillableReason),
}

/// 跨行累计的占用（不重复分配已被未完成任务或本波次前序行占用的批次/载具数量）
pub(super) struct LinePlanner<'c> {
    config: &'c AllocationConfig,
    max_tasks: usize,
    consumed_lots: HashMap<i64, i64>,
    consumed_unit_loads: HashMap<(i64, i64, i64), i64>,
    tasks: Vec<PlannedPickTask>,
    unfulfillable: Vec<UnfulfillableLine>,
}

impl<'c> LinePlanner<'c> {
    /// committed: 其他波次未完成任务的占用，作为初始已占用量
    pub(super) fn new(config: &'c AllocationConfig, max_tasks: usize, committed: OpenCommitments) -> Self {
        Self {
            config,
            max_tasks,
            consumed_lots: committed.lots,
            consumed_unit_loads: committed.unit_loads,
            tasks: Vec::new(),
            unfulfillable: Vec::new(),
        }
    }

    pub(super) fn into_parts(self) -> (Vec<PlannedPickTask>, Vec<UnfulfillableLine>) {
        (self.tasks, self.unfulfillable)
    }

    /// 处理一行：成功则追加任务并保留预留；失败则回滚保存点并登记
    pub(super) fn plan_line(
        &mut self,
        tx: &mut Transaction<'_>,
        order: &Order,
        line: &OrderLine,
    ) -> EngineResult<()> {
        let quantity = line.quantity - line.picked_qty;
        if quantity <= 0 {
            return Ok(());
        }

        let sp = tx.savepoint()?;
        let mut plan = self.plan_in(&sp, order, line, quantity)?;
        if matches!(plan, LinePlan::Planned { .. }) {
            match InventoryLedger::reserve_in(&sp, order.tenant_id, line.sku_id, quantity) {
                Ok(()) => {}
                Err(EngineError::InsufficientStock { .. }) => {
                    plan = LinePlan::Unfulfillable(UnfulfillableReason::ReservationFailed);
                }
                Err(e) => return Err(e),
            }
        }

        match plan {
            LinePlan::Planned {
                tasks,
                lot_usage,
                unit_load_usage,
            } => {
                sp.commit()?;
                for (lot_id, qty) in lot_usage {
                    *self.consumed_lots.entry(lot_id).or_default() += qty;
                }
                if let Some((key, qty)) = unit_load_usage {
                    *self.consumed_unit_loads.entry(key).or_default() += qty;
                }
                self.tasks.extend(tasks);
            }
            LinePlan::Unfulfillable(reason) => {
                // sp 随 drop 回滚
                debug!(
                    order_id = order.order_id,
                    line_id = line.line_id,
                    reason = reason.as_str(),
                    "订单行不可履约"
                );
                self.unfulfillable.push(UnfulfillableLine {
                    order_id: order.order_id,
                    line_id: line.line_id,
                    sku_id: line.sku_id,
                    requested_qty: quantity,
                    reason,
                });
            }
        }
        Ok(())
    }

    fn plan_in(
        &self,
        conn: &Connection,
        order: &Order,
        line: &OrderLine,
        quantity: i64,
    ) -> EngineResult<LinePlan> {
        let task = |location_id: i64,
                    location_code: String,
                    zone: String,
                    x: Option<f64>,
                    y: Option<f64>,
                    unit_load_id: Option<i64>,
                    requested_qty: i64| PlannedPickTask {
            order_id: order.order_id,
            line_id: line.line_id,
            tenant_id: order.tenant_id,
            sku_id: line.sku_id,
            location_id,
            location_code,
            zone,
            x,
            y,
            unit_load_id,
            requested_qty,
            sequence_no: 0,
            distance_from_prev_m: 0.0,
            est_seconds: 0.0,
        };

        // 整载具优先
        if let Some((source, lot_usage)) = self.unit_load_source_in(conn, order.tenant_id, line.sku_id, quantity)? {
            if self.tasks.len() + 1 > self.max_tasks {
                return Ok(LinePlan::Unfulfillable(UnfulfillableReason::TaskCapReached));
            }
            let key = (source.unit_load_id, line.sku_id, order.tenant_id);
            return Ok(LinePlan::Planned {
                tasks: vec![task(
                    source.location_id,
                    source.location_code,
                    source.zone,
                    source.x,
                    source.y,
                    Some(source.unit_load_id),
                    quantity,
                )],
                lot_usage,
                unit_load_usage: Some((key, quantity)),
            });
        }

        // FIFO 批次
        let allocation = PickAllocationEngine::allocate_in(
            conn,
            PickRequest {
                sku_id: line.sku_id,
                tenant_id: order.tenant_id,
                quantity,
            },
            self.config,
            &self.consumed_lots,
        )?;
        if allocation.insufficient_stock {
            return Ok(LinePlan::Unfulfillable(UnfulfillableReason::InsufficientStock));
        }
        if self.tasks.len() + allocation.parts.len() > self.max_tasks {
            return Ok(LinePlan::Unfulfillable(UnfulfillableReason::TaskCapReached));
        }

        let lot_usage = allocation.parts.iter().map(|p| (p.lot_id, p.quantity)).collect();
        let tasks = allocation
            .parts
            .into_iter()
            .map(|p| task(p.location_id, p.location_code, p.zone, p.x, p.y, None, p.quantity))
            .collect();
        Ok(LinePlan::Planned {
            tasks,
            lot_usage,
            unit_load_usage: None,
        })
    }

    /// 余量足够的载具，且其货位上该租户的可用批次足以覆盖
    ///
    /// 返回载具与对应的批次占用（FIFO）
    fn unit_load_source_in(
        &self,
        conn: &Connection,
        tenant_id: i64,
        sku_id: i64,
        quantity: i64,
    ) -> EngineResult<Option<(UnitLoadSource, Vec<(i64, i64)>)>> {
        for source in UnitLoadRepository::list_pickable_in(conn, sku_id, tenant_id)? {
            let used = self
                .consumed_unit_loads
                .get(&(source.unit_load_id, sku_id, tenant_id))
                .copied()
                .unwrap_or(0);
            if source.quantity - used < quantity {
                continue;
            }

            let lots = StockRepository::list_lots_at_location_in(conn, source.location_id, sku_id, Some(tenant_id))?;
            let mut remaining = quantity;
            let mut usage = Vec::new();
            for lot in lots {
                if remaining == 0 {
                    break;
                }
                let free = lot.quantity - self.consumed_lots.get(&lot.lot_id).copied().unwrap_or(0);
                if free <= 0 {
                    continue;
                }
                let take = free.min(remaining);
                usage.push((lot.lot_id, take));
                remaining -= take;
            }
            if remaining == 0 {
                return Ok(Some((source, usage)));
            }
        }
        Ok(None)
    }
}
