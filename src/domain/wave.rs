// ==========================================
// 仓储货位与波次拣选系统 - 波次与拣货任务
// ==========================================
// 状态流转:
// - Wave: PLANNED → IN_PROGRESS → DONE；PLANNED/IN_PROGRESS → CANCELLED
// - PickTask: QUEUED → IN_PROGRESS → DONE/SKIPPED/ERROR
// ==========================================

use crate::domain::types::{PickTaskStatus, WaveStatus, WaveType};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// WaveScope - 组波范围
// ==========================================
// 所有可选条件按 AND 组合
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaveScope {
    pub tenant_id: Option<i64>,
    pub min_priority: Option<i32>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub max_orders: usize,
}

// ==========================================
// Wave - 波次
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wave {
    pub wave_id: i64,
    pub wave_number: String,
    pub status: WaveStatus,
    pub wave_type: WaveType,
    pub scope: WaveScope,

    // ===== 汇总 =====
    pub total_orders: i64,
    pub total_lines: i64,
    pub total_picks: i64,
    pub est_distance_m: f64,
    pub est_time_s: f64,

    pub created_at: NaiveDateTime,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
}

// ==========================================
// PickTask - 拣货任务
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickTask {
    pub task_id: i64,
    pub wave_id: i64,
    pub order_id: i64,
    pub line_id: i64,
    pub tenant_id: i64,
    pub sku_id: i64,
    pub location_id: i64,
    pub unit_load_id: Option<i64>,
    pub requested_qty: i64,
    pub picked_qty: i64,
    pub sequence_no: i32,
    pub zone: String,
    pub distance_from_prev_m: f64,
    pub est_seconds: f64,
    pub status: PickTaskStatus,
}

/// 待落库拣货任务（组波过程中的中间结果）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedPickTask {
    pub order_id: i64,
    pub line_id: i64,
    pub tenant_id: i64,
    pub sku_id: i64,
    pub location_id: i64,
    pub location_code: String,
    pub zone: String,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub unit_load_id: Option<i64>,
    pub requested_qty: i64,

    // ===== 路径优化回填 =====
    pub sequence_no: i32,
    pub distance_from_prev_m: f64,
    pub est_seconds: f64,
}

/// 无法生成任务的订单行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnfulfillableLine {
    pub order_id: i64,
    pub line_id: i64,
    pub sku_id: i64,
    pub requested_qty: i64,
    pub reason: UnfulfillableReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnfulfillableReason {
    InsufficientStock, // 可分配量不足
    ReservationFailed, // 预留时可用量已被并发消耗
    TaskCapReached,    // 任务数达到上限
}

impl UnfulfillableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnfulfillableReason::InsufficientStock => "INSUFFICIENT_STOCK",
            UnfulfillableReason::ReservationFailed => "RESERVATION_FAILED",
            UnfulfillableReason::TaskCapReached => "TASK_CAP_REACHED",
        }
    }
}
