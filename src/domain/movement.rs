// ==========================================
// 仓储货位与波次拣选系统 - 库存移动记录
// ==========================================
// 红线: 只追加，不更新，不删除
// 用途: 看板/审计追踪的数据来源，速度分级的统计口径
// ==========================================

use crate::domain::types::MovementType;
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Movement - 库存移动
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub movement_id: i64,
    pub tenant_id: i64,
    pub sku_id: i64,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub from_location_id: Option<i64>,
    pub to_location_id: Option<i64>,
    pub operator: String,
    pub wave_id: Option<i64>,
    pub order_id: Option<i64>,
    pub lot_id: Option<i64>,
    pub unit_cost: Option<f64>,
    pub started_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
    pub duration_s: Option<f64>,
    pub distance_m: Option<f64>,
    pub notes: Option<String>,
}

/// 新增移动记录（插入前，无主键）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMovement {
    pub tenant_id: i64,
    pub sku_id: i64,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub from_location_id: Option<i64>,
    pub to_location_id: Option<i64>,
    pub operator: String,
    pub wave_id: Option<i64>,
    pub order_id: Option<i64>,
    pub lot_id: Option<i64>,
    pub unit_cost: Option<f64>,
    pub started_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
    pub duration_s: Option<f64>,
    pub distance_m: Option<f64>,
    pub notes: Option<String>,
}

impl NewMovement {
    /// 以当前时间创建一条即时完成的移动记录
    pub fn now(
        tenant_id: i64,
        sku_id: i64,
        movement_type: MovementType,
        quantity: i64,
        operator: &str,
    ) -> Self {
        let ts = Utc::now().naive_utc();
        Self {
            tenant_id,
            sku_id,
            movement_type,
            quantity,
            from_location_id: None,
            to_location_id: None,
            operator: operator.to_string(),
            wave_id: None,
            order_id: None,
            lot_id: None,
            unit_cost: None,
            started_at: ts,
            ended_at: Some(ts),
            duration_s: Some(0.0),
            distance_m: None,
            notes: None,
        }
    }

    pub fn from_location(mut self, location_id: i64) -> Self {
        self.from_location_id = Some(location_id);
        self
    }

    pub fn to_location(mut self, location_id: i64) -> Self {
        self.to_location_id = Some(location_id);
        self
    }

    pub fn with_lot(mut self, lot_id: i64) -> Self {
        self.lot_id = Some(lot_id);
        self
    }

    pub fn with_wave(mut self, wave_id: i64) -> Self {
        self.wave_id = Some(wave_id);
        self
    }

    pub fn with_order(mut self, order_id: Option<i64>) -> Self {
        self.order_id = order_id;
        self
    }

    pub fn with_unit_cost(mut self, unit_cost: f64) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }

    pub fn with_distance(mut self, distance_m: Option<f64>) -> Self {
        self.distance_m = distance_m;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}
