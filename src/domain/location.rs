// ==========================================
// 仓储货位与波次拣选系统 - 货位领域模型
// ==========================================
// 用途: 仓库初始化时创建，每次上架/拣货/移库时更新占用
// 红线: 占用率始终在 [0,100]，占用体积/重量不为负
// ==========================================

use crate::domain::types::{LocationType, VelocityClass};
use serde::{Deserialize, Serialize};

// ==========================================
// Location - 货位
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    // ===== 主键 =====
    pub location_id: i64,
    pub code: String,
    pub zone: String,
    pub velocity_class: VelocityClass,
    pub location_type: LocationType,

    // ===== 坐标（米） =====
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,

    // ===== 尺寸与容量 =====
    pub width_cm: f64,
    pub depth_cm: f64,
    pub height_cm: f64,
    pub max_volume: f64,
    pub max_weight_kg: f64,

    // ===== 当前占用 =====
    pub occupied_volume: f64,
    pub occupied_weight_kg: f64,

    // ===== 存储条件 =====
    pub hazmat_allowed: bool,
    pub temperature_controlled: bool,
    pub current_temperature: Option<f64>,

    pub active: bool,
    pub picking_priority: i32,
}

// ==========================================
// Trait: LocationCapacity
// ==========================================
// 用途: 上架与移库时的容量约束检查
pub trait LocationCapacity {
    /// 体积占用率（%），钳制在 [0,100]
    fn occupancy_pct(&self) -> f64;

    /// 剩余可用体积
    fn free_volume(&self) -> f64;

    /// 剩余可用承重
    fn free_weight_kg(&self) -> f64;

    /// 是否能容纳指定体积与重量
    fn can_accept(&self, volume: f64, weight_kg: f64) -> bool;
}

impl LocationCapacity for Location {
    fn occupancy_pct(&self) -> f64 {
        if self.max_volume <= 0.0 {
            return 100.0;
        }
        (self.occupied_volume / self.max_volume * 100.0).clamp(0.0, 100.0)
    }

    fn free_volume(&self) -> f64 {
        (self.max_volume - self.occupied_volume).max(0.0)
    }

    fn free_weight_kg(&self) -> f64 {
        (self.max_weight_kg - self.occupied_weight_kg).max(0.0)
    }

    fn can_accept(&self, volume: f64, weight_kg: f64) -> bool {
        self.occupied_volume + volume <= self.max_volume
            && self.occupied_weight_kg + weight_kg <= self.max_weight_kg
    }
}

impl Location {
    /// 地面层（z 缺失或 ≤ 0 视为地面层）
    pub fn is_ground_level(&self) -> bool {
        self.z.map_or(true, |z| z <= 0.0)
    }

    /// 平面坐标（任一缺失返回 None）
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Some((x, y)),
            _ => None,
        }
    }

    /// 到指定平面点的欧氏距离（坐标缺失返回 None）
    pub fn distance_to(&self, origin: (f64, f64)) -> Option<f64> {
        self.position()
            .map(|(x, y)| ((x - origin.0).powi(2) + (y - origin.1).powi(2)).sqrt())
    }
}
