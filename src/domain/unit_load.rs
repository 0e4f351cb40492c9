// ==========================================
// 仓储货位与波次拣选系统 - 载具 (UDC) 领域模型
// ==========================================
// 载具: 托盘/箱/周转箱，在单一货位上承载一个或多个 SKU
// ==========================================

use crate::domain::types::UnitLoadStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitLoad {
    pub unit_load_id: i64,
    pub code: String,
    pub location_id: i64,
    pub status: UnitLoadStatus,
}

/// 载具内容（某租户在该载具上的某 SKU 数量）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitLoadContent {
    pub unit_load_id: i64,
    pub sku_id: i64,
    pub tenant_id: i64,
    pub quantity: i64,
}

/// 可拣载具（载具 + 所在货位 + 可拣数量）
///
/// 查询口径: 载具状态 PARTIAL/FULL，货位启用，数量充足
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitLoadSource {
    pub unit_load_id: i64,
    pub unit_load_code: String,
    pub location_id: i64,
    pub location_code: String,
    pub zone: String,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub quantity: i64,
}
