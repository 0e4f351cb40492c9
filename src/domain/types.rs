// ==========================================
// 仓储货位与波次拣选系统 - 领域类型定义
// ==========================================
// 职责: 状态/类型字段的封闭枚举
// 约定: 数据库存储格式为 SCREAMING_SNAKE_CASE 字符串
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 为封闭枚举生成 as_str / Display / FromStr
///
/// 解析失败返回 Err(String)，由仓储层转换为 rusqlite 转换错误
macro_rules! closed_enum_text {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            /// 全部取值（按声明顺序）
            pub fn all() -> &'static [$name] {
                &[$($name::$variant,)+]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_uppercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("未知{}取值: {}", stringify!($name), other)),
                }
            }
        }
    };
}

// ==========================================
// 速度等级 (Velocity Class)
// ==========================================
// 顺序: Hot < Warm < Cold（rank 越小访问越频繁）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VelocityClass {
    Hot,  // 高频
    Warm, // 中频
    Cold, // 低频
}

closed_enum_text!(VelocityClass {
    Hot => "HOT",
    Warm => "WARM",
    Cold => "COLD",
});

impl VelocityClass {
    /// 访问频率等级序号（HOT=0, WARM=1, COLD=2）
    pub fn rank(&self) -> u8 {
        match self {
            VelocityClass::Hot => 0,
            VelocityClass::Warm => 1,
            VelocityClass::Cold => 2,
        }
    }

    /// 与目标等级的匹配度: 完全一致=1.0，相邻=0.5，相隔两级=0.0
    pub fn match_factor(&self, preferred: VelocityClass) -> f64 {
        let diff = (self.rank() as i16 - preferred.rank() as i16).unsigned_abs();
        1.0 - diff as f64 / 2.0
    }
}

// ==========================================
// 货位类型 (Location Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationType {
    Pallet, // 托盘位
    Shelf,  // 层板位
    Bin,    // 料箱位
    Floor,  // 地堆位
}

closed_enum_text!(LocationType {
    Pallet => "PALLET",
    Shelf => "SHELF",
    Bin => "BIN",
    Floor => "FLOOR",
});

// ==========================================
// 批次状态 (Lot Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LotStatus {
    Available,  // 可用
    Reserved,   // 已预留
    Quarantine, // 隔离
    Damaged,    // 损坏（不计入逻辑库存）
}

closed_enum_text!(LotStatus {
    Available => "AVAILABLE",
    Reserved => "RESERVED",
    Quarantine => "QUARANTINE",
    Damaged => "DAMAGED",
});

// ==========================================
// 库存移动类型 (Movement Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Receive,
    PutAway,
    Pick,
    Transfer,
    AdjustPlus,
    AdjustMinus,
    CrossDock,
    Replenish,
    ReturnReceive,
    Dispose,
}

closed_enum_text!(MovementType {
    Receive => "RECEIVE",
    PutAway => "PUT_AWAY",
    Pick => "PICK",
    Transfer => "TRANSFER",
    AdjustPlus => "ADJUST_PLUS",
    AdjustMinus => "ADJUST_MINUS",
    CrossDock => "CROSS_DOCK",
    Replenish => "REPLENISH",
    ReturnReceive => "RETURN_RECEIVE",
    Dispose => "DISPOSE",
});

// ==========================================
// 出库订单状态 (Order Status)
// ==========================================
// NEW/CONFIRMED 为可组波状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Confirmed,
    InWave,
    Picked,
    Shipped,
    Cancelled,
}

closed_enum_text!(OrderStatus {
    New => "NEW",
    Confirmed => "CONFIRMED",
    InWave => "IN_WAVE",
    Picked => "PICKED",
    Shipped => "SHIPPED",
    Cancelled => "CANCELLED",
});

impl OrderStatus {
    /// 可进入波次的订单状态
    pub fn committable() -> &'static [OrderStatus] {
        &[OrderStatus::New, OrderStatus::Confirmed]
    }
}

// ==========================================
// 载具状态 (Unit Load / UDC Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitLoadStatus {
    Empty,
    Partial,
    Full,
    Closed,
}

closed_enum_text!(UnitLoadStatus {
    Empty => "EMPTY",
    Partial => "PARTIAL",
    Full => "FULL",
    Closed => "CLOSED",
});

// ==========================================
// 波次状态 (Wave Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaveStatus {
    Planned,
    InProgress,
    Done,
    Cancelled,
}

closed_enum_text!(WaveStatus {
    Planned => "PLANNED",
    InProgress => "IN_PROGRESS",
    Done => "DONE",
    Cancelled => "CANCELLED",
});

impl WaveStatus {
    /// 合法状态转换
    ///
    /// PLANNED → IN_PROGRESS → DONE
    /// PLANNED/IN_PROGRESS → CANCELLED
    pub fn can_transition_to(&self, next: WaveStatus) -> bool {
        matches!(
            (self, next),
            (WaveStatus::Planned, WaveStatus::InProgress)
                | (WaveStatus::InProgress, WaveStatus::Done)
                | (WaveStatus::Planned, WaveStatus::Cancelled)
                | (WaveStatus::InProgress, WaveStatus::Cancelled)
        )
    }
}

// ==========================================
// 波次类型 (Wave Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaveType {
    ZonePicking,
    BatchPicking,
    DiscretePicking,
    WavePicking,
}

closed_enum_text!(WaveType {
    ZonePicking => "ZONE_PICKING",
    BatchPicking => "BATCH_PICKING",
    DiscretePicking => "DISCRETE_PICKING",
    WavePicking => "WAVE_PICKING",
});

impl Default for WaveType {
    fn default() -> Self {
        WaveType::WavePicking
    }
}

// ==========================================
// 拣货任务状态 (Pick Task Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PickTaskStatus {
    Queued,
    InProgress,
    Done,
    Skipped,
    Error,
}

closed_enum_text!(PickTaskStatus {
    Queued => "QUEUED",
    InProgress => "IN_PROGRESS",
    Done => "DONE",
    Skipped => "SKIPPED",
    Error => "ERROR",
});

impl PickTaskStatus {
    /// 是否仍为未完成任务（占用预留库存）
    pub fn is_open(&self) -> bool {
        matches!(self, PickTaskStatus::Queued | PickTaskStatus::InProgress)
    }
}
