// ==========================================
// 仓储货位与波次拣选系统 - 库存账本
// ==========================================
// 三层库存:
// - PhysicalStock  (location, sku)  实物
// - LogicalStock   (tenant, sku)    账面 available/reserved/in_transit
// - OwnershipLot   (location, sku, tenant) FIFO 归属批次
// 不变式: 每个 (tenant, sku) 上 available + reserved + in_transit
//         = Σ 非损坏批次数量
// 红线: 所有多表写入在且仅在一个事务内完成；任一步失败整体回滚
// ==========================================

use crate::config::SlottingConfig;
use crate::db::SharedConnection;
use crate::domain::movement::NewMovement;
use crate::domain::stock::{NewOwnershipLot, PutAwayTask, ReconciliationEntry};
use crate::domain::types::{LotStatus, MovementType, PickTaskStatus, WaveStatus};
use crate::domain::wave::PickTask;
use crate::engine::commitments::OpenCommitments;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::pick_allocation::PickAllocation;
use crate::engine::slotting::CompatibilityRules;
use crate::perf::PerfGuard;
use crate::repository::{
    LocationRepository, MovementRepository, OrderRepository, SkuRepository, StockRepository,
    UnitLoadRepository, WaveRepository,
};
use chrono::Utc;
use rusqlite::{Connection, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::MutexGuard;
use tracing::{debug, info, instrument, warn};

// ==========================================
// 操作结果
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PutAwayReceipt {
    pub location_id: i64,
    pub lot_id: i64,
    pub movement_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickReceipt {
    pub picked_qty: i64,
    pub movement_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub sku_id: i64,
    pub from_location_id: i64,
    pub to_location_id: i64,
    pub quantity: i64,
}

/// 调拨拆分出的批次片段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferredLot {
    pub source_lot_id: i64,
    pub new_lot_id: i64,
    pub tenant_id: i64,
    pub quantity: i64,
    pub movement_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub moved_qty: i64,
    pub parts: Vec<TransferredLot>,
}

// ==========================================
// InventoryLedger - 库存账本
// ==========================================
pub struct InventoryLedger {
    conn: SharedConnection,
    heavy_unit_weight_kg: f64,
}

impl InventoryLedger {
    pub fn new(conn: SharedConnection) -> Self {
        Self::with_slotting(conn, &SlottingConfig::default())
    }

    /// 提交上架时的兼容性重校验沿用选位配置
    pub fn with_slotting(conn: SharedConnection, slotting: &SlottingConfig) -> Self {
        Self {
            conn,
            heavy_unit_weight_kg: slotting.heavy_unit_weight_kg,
        }
    }

    fn lock(&self) -> EngineResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| EngineError::TransactionFailed(format!("锁获取失败: {}", e)))
    }

    /// 在单个事务内执行 op；返回 Err 时事务随 drop 回滚
    fn in_transaction<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&Transaction<'_>) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        match f(&tx) {
            Ok(out) => {
                tx.commit()?;
                Ok(out)
            }
            Err(e) => {
                warn!(op, code = e.code(), error = %e, "事务回滚");
                Err(e)
            }
        }
    }

    // ==========================================
    // 上架提交
    // ==========================================

    /// 提交上架：兼容性 → 占用 → 批次 → 物理 → 逻辑 → PUT_AWAY 流水
    #[instrument(skip(self, task), fields(sku_id = task.sku_id, tenant_id = task.tenant_id))]
    pub fn commit_put_away(
        &self,
        task: &PutAwayTask,
        location_id: i64,
        operator: &str,
    ) -> EngineResult<PutAwayReceipt> {
        validate_put_away(task)?;
        let _perf = PerfGuard::new("ledger.commit_put_away");

        let heavy_unit_weight_kg = self.heavy_unit_weight_kg;
        self.in_transaction("commit_put_away", |tx| {
            Self::commit_put_away_in(tx, task, location_id, operator, heavy_unit_weight_kg)
        })
    }

    pub(crate) fn commit_put_away_in(
        conn: &Connection,
        task: &PutAwayTask,
        location_id: i64,
        operator: &str,
        heavy_unit_weight_kg: f64,
    ) -> EngineResult<PutAwayReceipt> {
        let sku = SkuRepository::require_in(conn, task.sku_id)?;
        let location = LocationRepository::require_in(conn, location_id)?;

        // 与选位相同的兼容性规则，任何写入之前
        let food_locations = LocationRepository::food_location_ids_in(conn)?;
        let rules = CompatibilityRules {
            heavy_unit_weight_kg,
            food_locations: &food_locations,
        };
        if let Err(reason) = rules.check(&sku, &location) {
            return Err(EngineError::IncompatibleLocation {
                sku_id: sku.sku_id,
                reasons: reason.to_string(),
            });
        }

        // 提交时重校验余量
        if !LocationRepository::try_occupy_in(conn, location_id, task.volume, task.weight_kg)? {
            return Err(EngineError::CapacityExceeded {
                location_id,
                volume: task.volume,
                weight_kg: task.weight_kg,
            });
        }

        let now = Utc::now().naive_utc();
        let unit_cost = task.unit_cost.unwrap_or(0.0);
        let lot_id = StockRepository::insert_lot_in(
            conn,
            &NewOwnershipLot {
                location_id,
                sku_id: task.sku_id,
                tenant_id: task.tenant_id,
                quantity: task.quantity,
                lot_code: task.lot_code.clone(),
                load_date: task.load_date.unwrap_or_else(|| now.date()),
                expiry_date: task.expiry_date,
                unit_cost,
                status: LotStatus::Available,
                order_id: task.order_id,
            },
        )?;

        StockRepository::add_physical_in(
            conn,
            location_id,
            task.sku_id,
            task.quantity,
            task.volume,
            task.weight_kg,
            now,
        )?;
        StockRepository::add_available_in(conn, task.tenant_id, task.sku_id, task.quantity, unit_cost)?;

        let movement_id = MovementRepository::append_in(
            conn,
            &NewMovement::now(
                task.tenant_id,
                task.sku_id,
                MovementType::PutAway,
                task.quantity,
                operator,
            )
            .to_location(location_id)
            .with_lot(lot_id)
            .with_order(task.order_id)
            .with_unit_cost(unit_cost),
        )?;

        info!(location_id, lot_id, quantity = task.quantity, "上架已提交");
        Ok(PutAwayReceipt {
            location_id,
            lot_id,
            movement_id,
            quantity: task.quantity,
        })
    }

    // ==========================================
    // 临时拣货执行
    // ==========================================

    /// 执行分配结果：批次 → 物理 → 货位 → 逻辑 available → PICK 流水
    #[instrument(skip(self, allocation), fields(sku_id = allocation.request.sku_id, tenant_id = allocation.request.tenant_id))]
    pub fn execute_pick(
        &self,
        allocation: &PickAllocation,
        operator: &str,
    ) -> EngineResult<PickReceipt> {
        let request = allocation.request;
        if allocation.insufficient_stock {
            return Err(EngineError::InsufficientStock {
                tenant_id: request.tenant_id,
                sku_id: request.sku_id,
                requested: request.quantity,
                available: allocation.allocated_qty,
            });
        }

        self.in_transaction("execute_pick", |tx| {
            let now = Utc::now().naive_utc();
            let mut movement_ids = Vec::with_capacity(allocation.parts.len());
            let shortage = |available: i64| EngineError::InsufficientStock {
                tenant_id: request.tenant_id,
                sku_id: request.sku_id,
                requested: request.quantity,
                available,
            };

            // 分配与执行之间可能有新波次占用批次
            let committed = OpenCommitments::load_in(tx, Some(request.sku_id))?;
            for part in &allocation.parts {
                let free = StockRepository::find_lot_in(tx, part.lot_id)?
                    .map(|lot| lot.quantity - committed.lot(part.lot_id))
                    .unwrap_or(0);
                if free < part.quantity || !StockRepository::decrement_lot_in(tx, part.lot_id, part.quantity)? {
                    return Err(shortage(free.max(0)));
                }
                Self::remove_physical_share_in(
                    tx,
                    request.tenant_id,
                    part.location_id,
                    request.sku_id,
                    part.quantity,
                    now,
                )?;

                movement_ids.push(MovementRepository::append_in(
                    tx,
                    &NewMovement::now(
                        request.tenant_id,
                        request.sku_id,
                        MovementType::Pick,
                        part.quantity,
                        operator,
                    )
                    .from_location(part.location_id)
                    .with_lot(part.lot_id)
                    .with_distance(part.distance_m),
                )?);
            }

            if !StockRepository::take_available_in(tx, request.tenant_id, request.sku_id, allocation.allocated_qty)? {
                let available = StockRepository::find_logical_in(tx, request.tenant_id, request.sku_id)?
                    .map(|s| s.available)
                    .unwrap_or(0);
                return Err(shortage(available));
            }

            info!(picked = allocation.allocated_qty, parts = allocation.parts.len(), "拣货已执行");
            Ok(PickReceipt {
                picked_qty: allocation.allocated_qty,
                movement_ids,
            })
        })
    }

    /// 按比例扣减物理库存并释放货位占用
    fn remove_physical_share_in(
        conn: &Connection,
        tenant_id: i64,
        location_id: i64,
        sku_id: i64,
        quantity: i64,
        at: chrono::NaiveDateTime,
    ) -> EngineResult<(f64, f64)> {
        let physical = StockRepository::find_physical_in(conn, location_id, sku_id)?
            .filter(|p| p.quantity >= quantity)
            .ok_or_else(|| EngineError::InsufficientStock {
                tenant_id,
                sku_id,
                requested: quantity,
                available: 0,
            })?;
        let (volume, weight_kg) = physical.share_of(quantity);

        if !StockRepository::remove_physical_in(conn, location_id, sku_id, quantity, volume, weight_kg, at)? {
            return Err(EngineError::InsufficientStock {
                tenant_id,
                sku_id,
                requested: quantity,
                available: physical.quantity,
            });
        }
        LocationRepository::release_in(conn, location_id, volume, weight_kg)?;
        Ok((volume, weight_kg))
    }

    // ==========================================
    // 预留
    // ==========================================

    /// 预留 available → reserved（单独事务）
    pub fn reserve_line(&self, tenant_id: i64, sku_id: i64, quantity: i64) -> EngineResult<()> {
        self.in_transaction("reserve_line", |tx| Self::reserve_in(tx, tenant_id, sku_id, quantity))
    }

    pub(crate) fn reserve_in(
        conn: &Connection,
        tenant_id: i64,
        sku_id: i64,
        quantity: i64,
    ) -> EngineResult<()> {
        if StockRepository::reserve_in(conn, tenant_id, sku_id, quantity)? {
            return Ok(());
        }
        let available = StockRepository::find_logical_in(conn, tenant_id, sku_id)?
            .map(|s| s.available)
            .unwrap_or(0);
        Err(EngineError::InsufficientStock {
            tenant_id,
            sku_id,
            requested: quantity,
            available,
        })
    }

    /// 释放预留 reserved → available（单独事务）
    pub fn release_reservation(&self, tenant_id: i64, sku_id: i64, quantity: i64) -> EngineResult<()> {
        self.in_transaction("release_reservation", |tx| {
            Self::release_in(tx, tenant_id, sku_id, quantity)
        })
    }

    pub(crate) fn release_in(
        conn: &Connection,
        tenant_id: i64,
        sku_id: i64,
        quantity: i64,
    ) -> EngineResult<()> {
        if quantity <= 0 {
            return Ok(());
        }
        if StockRepository::release_reserved_in(conn, tenant_id, sku_id, quantity)? {
            Ok(())
        } else {
            Err(EngineError::TransactionFailed(format!(
                "预留量不足以释放: tenant_id={}, sku_id={}, quantity={}",
                tenant_id, sku_id, quantity
            )))
        }
    }

    // ==========================================
    // 波次拣货确认
    // ==========================================

    /// 确认拣货任务
    ///
    /// # 说明
    /// - picked_qty > 0 → DONE；picked_qty = 0 → SKIPPED
    /// - 短拣部分（requested - picked）回到 available
    #[instrument(skip(self))]
    pub fn confirm_pick_task(
        &self,
        task_id: i64,
        picked_qty: i64,
        operator: &str,
    ) -> EngineResult<PickTask> {
        self.in_transaction("confirm_pick_task", |tx| {
            Self::confirm_pick_task_in(tx, task_id, picked_qty, operator)
        })
    }

    pub(crate) fn confirm_pick_task_in(
        conn: &Connection,
        task_id: i64,
        picked_qty: i64,
        operator: &str,
    ) -> EngineResult<PickTask> {
        let task = WaveRepository::find_task_in(conn, task_id)?
            .ok_or_else(|| EngineError::not_found("PickTask", task_id))?;
        let next_status = if picked_qty > 0 {
            PickTaskStatus::Done
        } else {
            PickTaskStatus::Skipped
        };
        if !task.status.is_open() {
            return Err(EngineError::invalid_transition("PickTask", task.status, next_status));
        }

        let wave = WaveRepository::require_in(conn, task.wave_id)?;
        if wave.status != WaveStatus::InProgress {
            return Err(EngineError::invalid_transition("Wave", wave.status, "CONFIRM_PICK"));
        }
        if picked_qty < 0 || picked_qty > task.requested_qty {
            return Err(EngineError::InvalidInput(format!(
                "拣货数量超出范围: picked={}, requested={}",
                picked_qty, task.requested_qty
            )));
        }

        let shortage = |available: i64| EngineError::InsufficientStock {
            tenant_id: task.tenant_id,
            sku_id: task.sku_id,
            requested: picked_qty,
            available,
        };

        if picked_qty > 0 {
            let now = Utc::now().naive_utc();

            // 批次 FIFO 扣减（限定任务货位与租户）
            let lots = StockRepository::list_lots_at_location_in(
                conn,
                task.location_id,
                task.sku_id,
                Some(task.tenant_id),
            )?;
            let mut remaining = picked_qty;
            for lot in lots {
                if remaining == 0 {
                    break;
                }
                let take = lot.quantity.min(remaining);
                if !StockRepository::decrement_lot_in(conn, lot.lot_id, take)? {
                    return Err(shortage(picked_qty - remaining));
                }
                remaining -= take;
                MovementRepository::append_in(
                    conn,
                    &NewMovement::now(task.tenant_id, task.sku_id, MovementType::Pick, take, operator)
                        .from_location(task.location_id)
                        .with_lot(lot.lot_id)
                        .with_wave(task.wave_id)
                        .with_order(Some(task.order_id))
                        .with_distance(Some(task.distance_from_prev_m)),
                )?;
            }
            if remaining > 0 {
                return Err(shortage(picked_qty - remaining));
            }

            Self::remove_physical_share_in(
                conn,
                task.tenant_id,
                task.location_id,
                task.sku_id,
                picked_qty,
                now,
            )?;

            if let Some(unit_load_id) = task.unit_load_id {
                if !UnitLoadRepository::decrement_content_in(
                    conn,
                    unit_load_id,
                    task.sku_id,
                    task.tenant_id,
                    picked_qty,
                )? {
                    return Err(shortage(0));
                }
            }

            if !StockRepository::consume_reserved_in(conn, task.tenant_id, task.sku_id, picked_qty)? {
                return Err(EngineError::TransactionFailed(format!(
                    "预留量不足以消耗: task_id={}",
                    task_id
                )));
            }
            OrderRepository::add_picked_in(conn, task.line_id, picked_qty)?;
        }

        Self::release_in(conn, task.tenant_id, task.sku_id, task.requested_qty - picked_qty)?;
        WaveRepository::update_task_in(conn, task_id, next_status, picked_qty)?;

        debug!(task_id, picked_qty, status = %next_status, "拣货任务已确认");
        Ok(PickTask {
            picked_qty,
            status: next_status,
            ..task
        })
    }

    // ==========================================
    // 调拨
    // ==========================================

    /// 货位间调拨：按批次先进先出拆分，逻辑库存不变
    ///
    /// 未完成拣货任务占用的批次数量不可搬移
    #[instrument(skip(self))]
    pub fn transfer(&self, request: &TransferRequest, operator: &str) -> EngineResult<TransferReceipt> {
        if request.quantity <= 0 {
            return Err(EngineError::InvalidInput(format!(
                "调拨数量必须大于0: {}",
                request.quantity
            )));
        }
        if request.from_location_id == request.to_location_id {
            return Err(EngineError::InvalidInput("调拨源货位与目标货位相同".to_string()));
        }

        self.in_transaction("transfer", |tx| Self::transfer_in(tx, request, operator))
    }

    pub(crate) fn transfer_in(
        conn: &Connection,
        request: &TransferRequest,
        operator: &str,
    ) -> EngineResult<TransferReceipt> {
        let TransferRequest {
            sku_id,
            from_location_id,
            to_location_id,
            quantity,
        } = *request;

        LocationRepository::require_in(conn, to_location_id)?;

        // 可搬移量 = 源货位批次数量 - 未完成拣货任务占用
        let committed = OpenCommitments::load_in(conn, Some(sku_id))?;
        let movable: Vec<_> = StockRepository::list_lots_at_location_in(conn, from_location_id, sku_id, None)?
            .into_iter()
            .map(|lot| {
                let free = lot.quantity - committed.lot(lot.lot_id);
                (lot, free)
            })
            .filter(|(_, free)| *free > 0)
            .collect();
        let movable_qty: i64 = movable.iter().map(|(_, free)| free).sum();
        let shortage = |available: i64| EngineError::InsufficientLocationStock {
            location_id: from_location_id,
            sku_id,
            requested: quantity,
            available,
        };
        if movable_qty < quantity {
            return Err(shortage(movable_qty));
        }

        let physical = StockRepository::find_physical_in(conn, from_location_id, sku_id)?
            .filter(|p| p.quantity >= quantity)
            .ok_or_else(|| shortage(movable_qty))?;
        let (volume, weight_kg) = physical.share_of(quantity);

        // 目标余量重校验
        if !LocationRepository::try_occupy_in(conn, to_location_id, volume, weight_kg)? {
            return Err(EngineError::CapacityExceeded {
                location_id: to_location_id,
                volume,
                weight_kg,
            });
        }

        let now = Utc::now().naive_utc();
        if !StockRepository::remove_physical_in(conn, from_location_id, sku_id, quantity, volume, weight_kg, now)? {
            return Err(shortage(physical.quantity));
        }
        LocationRepository::release_in(conn, from_location_id, volume, weight_kg)?;
        StockRepository::add_physical_in(conn, to_location_id, sku_id, quantity, volume, weight_kg, now)?;

        let mut remaining = quantity;
        let mut parts = Vec::new();
        for (lot, free) in movable {
            if remaining == 0 {
                break;
            }
            let take = free.min(remaining);
            if !StockRepository::decrement_lot_in(conn, lot.lot_id, take)? {
                return Err(shortage(quantity - remaining));
            }
            let new_lot_id =
                StockRepository::insert_lot_in(conn, &NewOwnershipLot::split_from(&lot, to_location_id, take))?;
            let movement_id = MovementRepository::append_in(
                conn,
                &NewMovement::now(lot.tenant_id, sku_id, MovementType::Transfer, take, operator)
                    .from_location(from_location_id)
                    .to_location(to_location_id)
                    .with_lot(new_lot_id)
                    .with_unit_cost(lot.unit_cost)
                    .with_notes(format!("split from lot {}", lot.lot_id)),
            )?;
            remaining -= take;
            parts.push(TransferredLot {
                source_lot_id: lot.lot_id,
                new_lot_id,
                tenant_id: lot.tenant_id,
                quantity: take,
                movement_id,
            });
        }

        info!(from_location_id, to_location_id, quantity, parts = parts.len(), "调拨已提交");
        Ok(TransferReceipt {
            moved_qty: quantity,
            parts,
        })
    }

    // ==========================================
    // 对账
    // ==========================================

    /// 单个 (tenant, sku) 对账
    pub fn reconcile(&self, tenant_id: i64, sku_id: i64) -> EngineResult<ReconciliationEntry> {
        let conn = self.lock()?;
        let logical_quantity = StockRepository::find_logical_in(&conn, tenant_id, sku_id)?
            .map(|s| s.reconciled_quantity())
            .unwrap_or(0);
        let lot_quantity = StockRepository::lot_totals_in(&conn, Some((tenant_id, sku_id)))?
            .get(&(tenant_id, sku_id))
            .copied()
            .unwrap_or(0);
        Ok(ReconciliationEntry {
            tenant_id,
            sku_id,
            logical_quantity,
            lot_quantity,
        })
    }

    /// 全量对账（按 tenant_id, sku_id 升序）
    pub fn reconcile_all(&self) -> EngineResult<Vec<ReconciliationEntry>> {
        let conn = self.lock()?;
        let mut merged: BTreeMap<(i64, i64), (i64, i64)> = BTreeMap::new();

        for stock in StockRepository::list_logical_in(&conn)? {
            merged.entry((stock.tenant_id, stock.sku_id)).or_default().0 = stock.reconciled_quantity();
        }
        for (key, qty) in StockRepository::lot_totals_in(&conn, None)? {
            merged.entry(key).or_default().1 = qty;
        }

        let entries: Vec<ReconciliationEntry> = merged
            .into_iter()
            .map(|((tenant_id, sku_id), (logical_quantity, lot_quantity))| ReconciliationEntry {
                tenant_id,
                sku_id,
                logical_quantity,
                lot_quantity,
            })
            .collect();

        let unbalanced = entries.iter().filter(|e| !e.is_balanced()).count();
        if unbalanced > 0 {
            warn!(unbalanced, "对账发现不平衡条目");
        }
        Ok(entries)
    }
}

pub(crate) fn validate_put_away(task: &PutAwayTask) -> EngineResult<()> {
    if task.quantity <= 0 {
        return Err(EngineError::InvalidInput(format!(
            "上架数量必须大于0: {}",
            task.quantity
        )));
    }
    if task.volume <= 0.0 || task.weight_kg < 0.0 || !task.volume.is_finite() || !task.weight_kg.is_finite() {
        return Err(EngineError::InvalidInput(format!(
            "体积/重量无效: volume={}, weight_kg={}",
            task.volume, task.weight_kg
        )));
    }
    Ok(())
}
