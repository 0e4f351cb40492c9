// ==========================================
// 仓储货位与波次拣选系统 - 引擎参数配置
// ==========================================
// 职责: 各引擎的类型化参数段及默认值
// 来源: config_kv 表（global，可被 tenant/{id} 作用域覆写）
// ==========================================

use serde::{Deserialize, Serialize};

// ==========================================
// SlottingConfig - 上架选位参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlottingConfig {
    /// 速度分级回看窗口（天）
    pub velocity_window_days: i64,
    /// 窗口内流水条数超过该值 → 偏好 HOT
    pub velocity_threshold: i64,
    /// 参与评分的货位占用率上限（%，严格小于）
    pub max_candidate_occupancy_pct: f64,
    /// 单件重量超过该值需托盘位或地面位（kg）
    pub heavy_unit_weight_kg: f64,
    /// 收货口坐标
    pub dock_x: f64,
    pub dock_y: f64,
    pub weights: ScoringWeights,
}

impl Default for SlottingConfig {
    fn default() -> Self {
        Self {
            velocity_window_days: 30,
            velocity_threshold: 10,
            max_candidate_occupancy_pct: 90.0,
            heavy_unit_weight_kg: 20.0,
            dock_x: 0.0,
            dock_y: 0.0,
            weights: ScoringWeights::default(),
        }
    }
}

/// 选位评分权重（按优先级递减）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub velocity_match: f64,
    pub low_occupancy: f64,
    pub zone_balance: f64,
    pub dock_distance: f64,
    pub tight_fit: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            velocity_match: 0.40,
            low_occupancy: 0.25,
            zone_balance: 0.15,
            dock_distance: 0.12,
            tight_fit: 0.08,
        }
    }
}

// ==========================================
// AllocationConfig - 拣货分配参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// 拣货起点坐标（同日期批次按距离该点远近排序）
    pub pick_origin_x: f64,
    pub pick_origin_y: f64,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            pick_origin_x: 0.0,
            pick_origin_y: 0.0,
        }
    }
}

// ==========================================
// WaveConfig - 组波参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveConfig {
    /// 未指定 max_orders 时的默认值
    pub default_max_orders: usize,
    /// 单波次任务数上限
    pub max_tasks: usize,
    /// 批量拣选: 相似度阈值（严格大于）
    pub batch_similarity_threshold: f64,
    /// 批量拣选: 每个种子最多附加订单数
    pub batch_max_attached: usize,
    /// 单独拣选: 优先级阈值（>=）
    pub discrete_min_priority: i32,
    /// 单独拣选: 行数阈值（<=）
    pub discrete_max_lines: i64,
    /// 单独拣选: 订单数硬上限
    pub discrete_max_orders: usize,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            default_max_orders: 50,
            max_tasks: 500,
            batch_similarity_threshold: 0.2,
            batch_max_attached: 3,
            discrete_min_priority: 8,
            discrete_max_lines: 5,
            discrete_max_orders: 10,
        }
    }
}

// ==========================================
// RouteConfig - 路径与工时参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub origin_x: f64,
    pub origin_y: f64,
    /// 每个拣货点固定耗时（秒）
    pub base_seconds: f64,
    /// 行走耗时（秒/米）
    pub seconds_per_meter: f64,
    /// 跨区附加耗时（秒）
    pub zone_change_seconds: f64,
    /// 整载具拣货附加耗时（秒）
    pub unit_load_seconds: f64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            origin_x: 0.0,
            origin_y: 0.0,
            base_seconds: 30.0,
            seconds_per_meter: 2.0,
            zone_change_seconds: 15.0,
            unit_load_seconds: 10.0,
        }
    }
}

// ==========================================
// RebalanceConfig - 再平衡参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceConfig {
    /// HOT 货位占用率超过该值（%，严格大于）视为过载
    pub hot_occupancy_threshold_pct: f64,
    /// 建议搬移比例
    pub move_fraction: f64,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            hot_occupancy_threshold_pct: 85.0,
            move_fraction: 0.30,
        }
    }
}

// ==========================================
// EngineConfig - 引擎参数全集
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub slotting: SlottingConfig,
    pub allocation: AllocationConfig,
    pub wave: WaveConfig,
    pub route: RouteConfig,
    pub rebalance: RebalanceConfig,
}
