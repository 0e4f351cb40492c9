// ==========================================
// 仓储货位与波次拣选系统 - 拣货分配引擎
// ==========================================
// 规则: FIFO
// - 排序: load_date 升序 → 距拣货起点距离升序 → lot_id 升序
// - 累加至满足请求；不足时返回全部可分配量并标记 insufficient_stock
// 红线: 分配只读；执行由 InventoryLedger::execute_pick 在单事务内完成
// ==========================================

use crate::config::AllocationConfig;
use crate::db::SharedConnection;
use crate::domain::stock::PickRequest;
use crate::engine::commitments::OpenCommitments;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::stock_repo::{LotWithLocation, StockRepository};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// 分配到的批次片段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatedLot {
    pub lot_id: i64,
    pub location_id: i64,
    pub location_code: String,
    pub zone: String,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub load_date: NaiveDate,
    pub quantity: i64,
    pub distance_m: Option<f64>,
}

/// 分配结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickAllocation {
    pub request: PickRequest,
    pub parts: Vec<AllocatedLot>,
    pub allocated_qty: i64,
    pub insufficient_stock: bool,
}

impl PickAllocation {
    pub fn shortfall(&self) -> i64 {
        (self.request.quantity - self.allocated_qty).max(0)
    }
}

// ==========================================
// PickAllocationEngine - 拣货分配引擎
// ==========================================
pub struct PickAllocationEngine {
    conn: SharedConnection,
    config: AllocationConfig,
}

impl PickAllocationEngine {
    pub fn new(conn: SharedConnection, config: AllocationConfig) -> Self {
        Self { conn, config }
    }

    /// 为拣货请求分配批次（只读；跳过未完成拣货任务占用的数量）
    #[instrument(skip(self), fields(sku_id = request.sku_id, tenant_id = request.tenant_id))]
    pub fn allocate(&self, request: PickRequest) -> EngineResult<PickAllocation> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| EngineError::TransactionFailed(format!("锁获取失败: {}", e)))?;
        let committed = OpenCommitments::load_in(&conn, Some(request.sku_id))?;
        Self::allocate_in(&conn, request, &self.config, &committed.lots)
    }

    /// 在给定连接上分配；consumed 为本轮已占用的批次数量（lot_id → qty）
    pub(crate) fn allocate_in(
        conn: &Connection,
        request: PickRequest,
        config: &AllocationConfig,
        consumed: &HashMap<i64, i64>,
    ) -> EngineResult<PickAllocation> {
        if request.quantity <= 0 {
            return Err(EngineError::InvalidInput(format!(
                "拣货数量必须大于0: {}",
                request.quantity
            )));
        }

        let lots = StockRepository::list_available_lots_in(conn, request.sku_id, request.tenant_id)?;
        let origin = (config.pick_origin_x, config.pick_origin_y);
        let allocation = allocate_from(request, order_lots(lots, origin), origin, consumed);

        debug!(
            parts = allocation.parts.len(),
            allocated = allocation.allocated_qty,
            insufficient = allocation.insufficient_stock,
            "拣货分配完成"
        );
        Ok(allocation)
    }
}

fn squared_distance(x: Option<f64>, y: Option<f64>, origin: (f64, f64)) -> Option<f64> {
    match (x, y) {
        (Some(x), Some(y)) => Some((x - origin.0).powi(2) + (y - origin.1).powi(2)),
        _ => None,
    }
}

/// FIFO 排序（无坐标的批次排在同日期批次之后）
pub fn order_lots(mut lots: Vec<LotWithLocation>, origin: (f64, f64)) -> Vec<LotWithLocation> {
    lots.sort_by(|a, b| {
        a.lot
            .load_date
            .cmp(&b.lot.load_date)
            .then_with(|| {
                let da = squared_distance(a.x, a.y, origin).unwrap_or(f64::INFINITY);
                let db = squared_distance(b.x, b.y, origin).unwrap_or(f64::INFINITY);
                da.partial_cmp(&db).unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.lot.lot_id.cmp(&b.lot.lot_id))
    });
    lots
}

/// 按已排序批次累加分配
pub fn allocate_from(
    request: PickRequest,
    ordered_lots: Vec<LotWithLocation>,
    origin: (f64, f64),
    consumed: &HashMap<i64, i64>,
) -> PickAllocation {
    let mut remaining = request.quantity;
    let mut parts = Vec::new();

    for entry in ordered_lots {
        if remaining <= 0 {
            break;
        }
        let free = entry.lot.quantity - consumed.get(&entry.lot.lot_id).copied().unwrap_or(0);
        if free <= 0 {
            continue;
        }
        let take = free.min(remaining);
        remaining -= take;
        parts.push(AllocatedLot {
            lot_id: entry.lot.lot_id,
            location_id: entry.lot.location_id,
            distance_m: squared_distance(entry.x, entry.y, origin).map(f64::sqrt),
            location_code: entry.location_code,
            zone: entry.zone,
            x: entry.x,
            y: entry.y,
            load_date: entry.lot.load_date,
            quantity: take,
        });
    }

    PickAllocation {
        request,
        allocated_qty: request.quantity - remaining,
        insufficient_stock: remaining > 0,
        parts,
    }
}
