// ==========================================
// 仓储货位与波次拣选系统 - 未完成拣货任务的库存占用
// ==========================================
// 拣货任务只预留 LogicalStock；确认时在任务货位按 FIFO 扣减该租户批次
// 此处按同样顺序把 QUEUED / IN_PROGRESS 任务量归属到具体批次
// 用途: 组波、临时拣货、调拨跳过已被任务占用的批次数量
// ==========================================

use crate::engine::error::EngineResult;
use crate::repository::{StockRepository, WaveRepository};
use rusqlite::Connection;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct OpenCommitments {
    /// lot_id → 已占用数量
    pub lots: HashMap<i64, i64>,
    /// (unit_load_id, sku_id, tenant_id) → 已占用数量
    pub unit_loads: HashMap<(i64, i64, i64), i64>,
}

impl OpenCommitments {
    /// 读取未完成任务占用；sku_id 为 None 时加载全部 SKU
    pub(crate) fn load_in(conn: &Connection, sku_id: Option<i64>) -> EngineResult<Self> {
        let mut per_slot: BTreeMap<(i64, i64, i64), i64> = BTreeMap::new();
        let mut unit_loads = HashMap::new();
        for c in WaveRepository::open_commitments_in(conn, sku_id)? {
            *per_slot.entry((c.location_id, c.sku_id, c.tenant_id)).or_default() += c.quantity;
            if let Some(unit_load_id) = c.unit_load_id {
                *unit_loads.entry((unit_load_id, c.sku_id, c.tenant_id)).or_default() += c.quantity;
            }
        }

        let mut lots = HashMap::new();
        for ((location_id, sku_id, tenant_id), quantity) in per_slot {
            let mut remaining = quantity;
            for lot in StockRepository::list_lots_at_location_in(conn, location_id, sku_id, Some(tenant_id))? {
                if remaining == 0 {
                    break;
                }
                let take = lot.quantity.min(remaining);
                lots.insert(lot.lot_id, take);
                remaining -= take;
            }
            if remaining > 0 {
                warn!(location_id, sku_id, tenant_id, uncovered = remaining, "未完成任务占用超出货位现存批次");
            }
        }

        Ok(Self { lots, unit_loads })
    }

    pub(crate) fn lot(&self, lot_id: i64) -> i64 {
        self.lots.get(&lot_id).copied().unwrap_or(0)
    }
}
