// ==========================================
// 仓储货位与波次拣选系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 多租户仓储后端核心（上架选位 / 库存账本 / 组波拣选）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - 主数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 性能统计（SQL 计数 / 慢 SQL）
pub mod perf;

// API 层 - 业务门面
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    LocationType, LotStatus, MovementType, OrderStatus, PickTaskStatus, UnitLoadStatus,
    VelocityClass, WaveStatus, WaveType,
};

// 领域实体
pub use domain::{
    Location, LogicalStock, Movement, Order, OrderLine, OwnershipLot, PhysicalStock, PickTask,
    PutAwayTask, Sku, UnitLoad, Wave, WaveScope,
};

// 引擎
pub use engine::{
    EngineError, EngineResult, InventoryLedger, PickAllocationEngine, RebalancingAdvisor,
    RouteOptimizer, SlottingEngine, WaveBuilder,
};

// API
pub use api::{ApiError, ApiResult, WarehouseApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "仓储货位与波次拣选系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert!(!APP_NAME.is_empty());
    }
}
