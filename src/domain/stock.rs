// ==========================================
// 仓储货位与波次拣选系统 - 三层库存模型
// ==========================================
// 物理层: (货位, SKU) 实物数量与占用
// 逻辑层: (租户, SKU) 可用/预留/在途/隔离数量
// 批次层: (货位, SKU, 租户) FIFO 归属批次
// ==========================================
// 红线: available + reserved + in_transit == Σ 非损坏批次数量
// ==========================================

use crate::domain::types::LotStatus;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// PhysicalStock - 物理库存
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalStock {
    pub location_id: i64,
    pub sku_id: i64,
    pub quantity: i64,
    pub occupied_volume: f64,
    pub occupied_weight_kg: f64,
    pub last_movement_at: Option<NaiveDateTime>,
}

impl PhysicalStock {
    /// 按数量比例计算移出部分的体积与重量
    pub fn share_of(&self, quantity: i64) -> (f64, f64) {
        if self.quantity <= 0 {
            return (0.0, 0.0);
        }
        let ratio = (quantity as f64 / self.quantity as f64).clamp(0.0, 1.0);
        (self.occupied_volume * ratio, self.occupied_weight_kg * ratio)
    }
}

// ==========================================
// LogicalStock - 逻辑库存（租户视角）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalStock {
    pub tenant_id: i64,
    pub sku_id: i64,
    pub available: i64,
    pub reserved: i64,
    pub in_transit: i64,
    pub quarantine: i64,
    pub avg_cost: f64,
    pub total_value: f64,
}

impl LogicalStock {
    /// 参与对账的数量（available + reserved + in_transit）
    pub fn reconciled_quantity(&self) -> i64 {
        self.available + self.reserved + self.in_transit
    }
}

// ==========================================
// OwnershipLot - 归属批次
// ==========================================
// FIFO 最小单元: 上架时创建，拣货/移库时扣减或拆分，永不为负
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipLot {
    pub lot_id: i64,
    pub location_id: i64,
    pub sku_id: i64,
    pub tenant_id: i64,
    pub quantity: i64,
    pub lot_code: Option<String>,
    pub load_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub unit_cost: f64,
    pub status: LotStatus,
    pub order_id: Option<i64>,
}

/// 新建批次（插入前，无主键）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOwnershipLot {
    pub location_id: i64,
    pub sku_id: i64,
    pub tenant_id: i64,
    pub quantity: i64,
    pub lot_code: Option<String>,
    pub load_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub unit_cost: f64,
    pub status: LotStatus,
    pub order_id: Option<i64>,
}

impl NewOwnershipLot {
    /// 由既有批次拆分出目标货位上的新批次（保留批号/入库日/效期/成本）
    pub fn split_from(lot: &OwnershipLot, location_id: i64, quantity: i64) -> Self {
        Self {
            location_id,
            sku_id: lot.sku_id,
            tenant_id: lot.tenant_id,
            quantity,
            lot_code: lot.lot_code.clone(),
            load_date: lot.load_date,
            expiry_date: lot.expiry_date,
            unit_cost: lot.unit_cost,
            status: lot.status,
            order_id: lot.order_id,
        }
    }
}

// ==========================================
// ReconciliationEntry - 对账结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationEntry {
    pub tenant_id: i64,
    pub sku_id: i64,
    pub logical_quantity: i64, // available + reserved + in_transit
    pub lot_quantity: i64,     // Σ 非损坏批次
}

impl ReconciliationEntry {
    pub fn delta(&self) -> i64 {
        self.logical_quantity - self.lot_quantity
    }

    pub fn is_balanced(&self) -> bool {
        self.delta() == 0
    }
}

// ==========================================
// PutAwayTask / PickRequest - 引擎输入
// ==========================================

/// 上架任务（volume / weight_kg 为本次上架总量）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PutAwayTask {
    pub sku_id: i64,
    pub tenant_id: i64,
    pub quantity: i64,
    pub volume: f64,
    pub weight_kg: f64,
    pub lot_code: Option<String>,
    pub load_date: Option<NaiveDate>, // 缺省取当日
    pub expiry_date: Option<NaiveDate>,
    pub unit_cost: Option<f64>,
    pub order_id: Option<i64>,
}

impl PutAwayTask {
    /// 仅数量/体积/重量的最小任务
    pub fn new(sku_id: i64, tenant_id: i64, quantity: i64, volume: f64, weight_kg: f64) -> Self {
        Self {
            sku_id,
            tenant_id,
            quantity,
            volume,
            weight_kg,
            lot_code: None,
            load_date: None,
            expiry_date: None,
            unit_cost: None,
            order_id: None,
        }
    }
}

/// 拣货请求
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickRequest {
    pub sku_id: i64,
    pub tenant_id: i64,
    pub quantity: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physical_share_is_proportional() {
        let stock = PhysicalStock {
            location_id: 1,
            sku_id: 1,
            quantity: 10,
            occupied_volume: 500.0,
            occupied_weight_kg: 5.0,
            last_movement_at: None,
        };
        assert_eq!(stock.share_of(3), (150.0, 1.5));
        assert_eq!(stock.share_of(20), (500.0, 5.0));
    }
}
