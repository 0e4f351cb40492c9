// ==========================================
// 仓储货位与波次拣选系统 - 引擎配置读取 Trait
// ==========================================
// 职责: 定义引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::engine_config::{
    AllocationConfig, EngineConfig, RebalanceConfig, RouteConfig, SlottingConfig, WaveConfig,
};
use async_trait::async_trait;
use std::error::Error;

/// 配置读取结果
pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// WarehouseConfigReader Trait
// ==========================================
// 用途: API 层在调用引擎前装配参数
// 实现者: ConfigManager（从 config_kv 表读取）
//
// tenant_id:
// - None: 仅读取 global 作用域
// - Some(id): 优先读取 tenant/{id} 作用域，缺失键回退到 global
#[async_trait]
pub trait WarehouseConfigReader: Send + Sync {
    /// 上架选位参数（速度窗口/阈值、评分权重、收货口）
    async fn get_slotting_config(&self, tenant_id: Option<i64>) -> ConfigResult<SlottingConfig>;

    /// 拣货分配参数（拣货起点）
    async fn get_allocation_config(&self, tenant_id: Option<i64>)
        -> ConfigResult<AllocationConfig>;

    /// 组波参数（默认订单数、任务上限、批量/单独拣选阈值）
    async fn get_wave_config(&self, tenant_id: Option<i64>) -> ConfigResult<WaveConfig>;

    /// 路径与工时参数
    async fn get_route_config(&self, tenant_id: Option<i64>) -> ConfigResult<RouteConfig>;

    /// 再平衡参数
    async fn get_rebalance_config(&self, tenant_id: Option<i64>)
        -> ConfigResult<RebalanceConfig>;

    /// 一次性装配全部参数段
    async fn load_engine_config(&self, tenant_id: Option<i64>) -> ConfigResult<EngineConfig> {
        Ok(EngineConfig {
            slotting: self.get_slotting_config(tenant_id).await?,
            allocation: self.get_allocation_config(tenant_id).await?,
            wave: self.get_wave_config(tenant_id).await?,
            route: self.get_route_config(tenant_id).await?,
            rebalance: self.get_rebalance_config(tenant_id).await?,
        })
    }
}
