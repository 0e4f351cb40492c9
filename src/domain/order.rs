// ==========================================
// 仓储货位与波次拣选系统 - 出库订单领域模型
// ==========================================

use crate::domain::types::OrderStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// Order - 出库订单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: i64,
    pub order_number: String,
    pub tenant_id: i64,
    pub service_level: Option<String>,
    pub priority: i32, // 0..=10，越大越急
    pub order_date: NaiveDate,
    pub promised_date: Option<NaiveDate>,
    pub status: OrderStatus,
}

// ==========================================
// OrderLine - 订单行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_id: i64,
    pub order_id: i64,
    pub sku_id: i64,
    pub quantity: i64,
    pub picked_qty: i64,
}

// ==========================================
// EligibleOrder - 可组波订单（附带统计）
// ==========================================
// 用途: WaveBuilder 选单输入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibleOrder {
    pub order: Order,
    pub line_count: i64,
    pub total_quantity: i64,
    pub sku_ids: Vec<i64>,
    /// 主导库区（仅区域拣选策略需要，由引擎回填）
    pub dominant_zone: Option<String>,
}

impl EligibleOrder {
    pub fn order_id(&self) -> i64 {
        self.order.order_id
    }
}

/// 新建出库单（含明细）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_number: String,
    pub tenant_id: i64,
    pub service_level: Option<String>,
    pub priority: i32,
    pub order_date: NaiveDate,
    pub promised_date: Option<NaiveDate>,
    pub status: OrderStatus,
    pub lines: Vec<NewOrderLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub sku_id: i64,
    pub quantity: i64,
}
