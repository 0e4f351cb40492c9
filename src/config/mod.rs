// ==========================================
// 仓储货位与波次拣选系统 - 配置层
// ==========================================
// 职责: 系统配置管理,支持租户级覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod engine_config;
pub mod warehouse_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager, ConfigScope};
pub use engine_config::{
    AllocationConfig, EngineConfig, RebalanceConfig, RouteConfig, ScoringWeights, SlottingConfig,
    WaveConfig,
};
pub use warehouse_config_trait::{ConfigResult, WarehouseConfigReader};
