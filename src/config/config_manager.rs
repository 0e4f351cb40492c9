// ==========================================
// 仓储货位与波次拣选系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 作用域: global → tenant/{id}（租户覆写优先）
// ==========================================

use crate::config::engine_config::{
    AllocationConfig, RebalanceConfig, RouteConfig, ScoringWeights, SlottingConfig, WaveConfig,
};
use crate::config::warehouse_config_trait::{ConfigResult, WarehouseConfigReader};
use crate::db::{open_sqlite_connection, SharedConnection};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigScope - 配置作用域
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    Global,                   // 全局
    Tenant { tenant_id: i64 }, // 租户
}

impl ConfigScope {
    pub fn scope_id(&self) -> String {
        match self {
            ConfigScope::Global => "global".to_string(),
            ConfigScope::Tenant { tenant_id } => format!("tenant/{}", tenant_id),
        }
    }

    fn scope_type(&self) -> &'static str {
        match self {
            ConfigScope::Global => "GLOBAL",
            ConfigScope::Tenant { .. } => "TENANT",
        }
    }

    fn scope_key(&self) -> String {
        match self {
            ConfigScope::Global => "global".to_string(),
            ConfigScope::Tenant { tenant_id } => tenant_id.to_string(),
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: SharedConnection,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: SharedConnection) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    fn get_conn(&self) -> ConfigResult<std::sync::MutexGuard<Connection>> {
        Ok(self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?)
    }

    /// 从 config_kv 表读取指定作用域的配置值
    fn get_scoped_value(&self, scope: ConfigScope, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![scope.scope_id(), key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取配置值：租户作用域优先，缺失时回退 global
    fn get_config_value(&self, tenant_id: Option<i64>, key: &str) -> ConfigResult<Option<String>> {
        if let Some(tenant_id) = tenant_id {
            if let Some(v) = self.get_scoped_value(ConfigScope::Tenant { tenant_id }, key)? {
                return Ok(Some(v));
            }
        }
        self.get_scoped_value(ConfigScope::Global, key)
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_scoped_value(ConfigScope::Global, key)
    }

    /// 读取租户视角下的有效配置值
    pub fn get_effective_config_value(
        &self,
        tenant_id: i64,
        key: &str,
    ) -> ConfigResult<Option<String>> {
        self.get_config_value(Some(tenant_id), key)
    }

    /// 写入 global scope 配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        self.set_config_value(ConfigScope::Global, key, value)
    }

    /// 写入指定作用域配置值（作用域不存在时自动登记）
    pub fn set_config_value(&self, scope: ConfigScope, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key) VALUES (?1, ?2, ?3)",
            params![scope.scope_id(), scope.scope_type(), scope.scope_key()],
        )?;
        tx.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = ?3, updated_at = datetime('now')
            "#,
            params![scope.scope_id(), key, value],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// 读取数值配置，缺失或格式错误时使用默认值
    fn get_parsed_or_default<T>(&self, tenant_id: Option<i64>, key: &str, default: T) -> ConfigResult<T>
    where
        T: FromStr + Copy,
    {
        match self.get_config_value(tenant_id, key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    tracing::warn!(
                        config_key = key,
                        raw_value = %raw,
                        "配置格式错误，使用默认值"
                    );
                    Ok(default)
                }
            },
        }
    }

    /// 获取 global 配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 波次/批量操作前记录配置快照，便于追溯
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.get_conn()?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    /// 从配置快照恢复 global 配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> ConfigResult<usize> {
        let config_map: HashMap<String, String> = serde_json::from_str(snapshot_json)?;

        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
        }

        tx.commit()?;
        Ok(count)
    }
}

// ==========================================
// WarehouseConfigReader Trait 实现
// ==========================================
#[async_trait]
impl WarehouseConfigReader for ConfigManager {
    async fn get_slotting_config(&self, tenant_id: Option<i64>) -> ConfigResult<SlottingConfig> {
        let d = SlottingConfig::default();
        let w = ScoringWeights::default();
        Ok(SlottingConfig {
            velocity_window_days: self.get_parsed_or_default(
                tenant_id,
                config_keys::VELOCITY_WINDOW_DAYS,
                d.velocity_window_days,
            )?,
            velocity_threshold: self.get_parsed_or_default(
                tenant_id,
                config_keys::VELOCITY_THRESHOLD,
                d.velocity_threshold,
            )?,
            max_candidate_occupancy_pct: self.get_parsed_or_default(
                tenant_id,
                config_keys::MAX_CANDIDATE_OCCUPANCY_PCT,
                d.max_candidate_occupancy_pct,
            )?,
            heavy_unit_weight_kg: self.get_parsed_or_default(
                tenant_id,
                config_keys::HEAVY_UNIT_WEIGHT_KG,
                d.heavy_unit_weight_kg,
            )?,
            dock_x: self.get_parsed_or_default(tenant_id, config_keys::DOCK_X, d.dock_x)?,
            dock_y: self.get_parsed_or_default(tenant_id, config_keys::DOCK_Y, d.dock_y)?,
            weights: ScoringWeights {
                velocity_match: self.get_parsed_or_default(
                    tenant_id,
                    config_keys::WEIGHT_VELOCITY_MATCH,
                    w.velocity_match,
                )?,
                low_occupancy: self.get_parsed_or_default(
                    tenant_id,
                    config_keys::WEIGHT_LOW_OCCUPANCY,
                    w.low_occupancy,
                )?,
                zone_balance: self.get_parsed_or_default(
                    tenant_id,
                    config_keys::WEIGHT_ZONE_BALANCE,
                    w.zone_balance,
                )?,
                dock_distance: self.get_parsed_or_default(
                    tenant_id,
                    config_keys::WEIGHT_DOCK_DISTANCE,
                    w.dock_distance,
                )?,
                tight_fit: self.get_parsed_or_default(
                    tenant_id,
                    config_keys::WEIGHT_TIGHT_FIT,
                    w.tight_fit,
                )?,
            },
        })
    }

    async fn get_allocation_config(
        &self,
        tenant_id: Option<i64>,
    ) -> ConfigResult<AllocationConfig> {
        let d = AllocationConfig::default();
        Ok(AllocationConfig {
            pick_origin_x: self.get_parsed_or_default(
                tenant_id,
                config_keys::PICK_ORIGIN_X,
                d.pick_origin_x,
            )?,
            pick_origin_y: self.get_parsed_or_default(
                tenant_id,
                config_keys::PICK_ORIGIN_Y,
                d.pick_origin_y,
            )?,
        })
    }

    async fn get_wave_config(&self, tenant_id: Option<i64>) -> ConfigResult<WaveConfig> {
        let d = WaveConfig::default();
        Ok(WaveConfig {
            default_max_orders: self.get_parsed_or_default(
                tenant_id,
                config_keys::WAVE_DEFAULT_MAX_ORDERS,
                d.default_max_orders,
            )?,
            max_tasks: self.get_parsed_or_default(
                tenant_id,
                config_keys::WAVE_MAX_TASKS,
                d.max_tasks,
            )?,
            batch_similarity_threshold: self.get_parsed_or_default(
                tenant_id,
                config_keys::BATCH_SIMILARITY_THRESHOLD,
                d.batch_similarity_threshold,
            )?,
            batch_max_attached: self.get_parsed_or_default(
                tenant_id,
                config_keys::BATCH_MAX_ATTACHED,
                d.batch_max_attached,
            )?,
            discrete_min_priority: self.get_parsed_or_default(
                tenant_id,
                config_keys::DISCRETE_MIN_PRIORITY,
                d.discrete_min_priority,
            )?,
            discrete_max_lines: self.get_parsed_or_default(
                tenant_id,
                config_keys::DISCRETE_MAX_LINES,
                d.discrete_max_lines,
            )?,
            discrete_max_orders: self.get_parsed_or_default(
                tenant_id,
                config_keys::DISCRETE_MAX_ORDERS,
                d.discrete_max_orders,
            )?,
        })
    }

    async fn get_route_config(&self, tenant_id: Option<i64>) -> ConfigResult<RouteConfig> {
        let d = RouteConfig::default();
        Ok(RouteConfig {
            origin_x: self.get_parsed_or_default(tenant_id, config_keys::ROUTE_ORIGIN_X, d.origin_x)?,
            origin_y: self.get_parsed_or_default(tenant_id, config_keys::ROUTE_ORIGIN_Y, d.origin_y)?,
            base_seconds: self.get_parsed_or_default(
                tenant_id,
                config_keys::ROUTE_BASE_SECONDS,
                d.base_seconds,
            )?,
            seconds_per_meter: self.get_parsed_or_default(
                tenant_id,
                config_keys::ROUTE_SECONDS_PER_METER,
                d.seconds_per_meter,
            )?,
            zone_change_seconds: self.get_parsed_or_default(
                tenant_id,
                config_keys::ROUTE_ZONE_CHANGE_SECONDS,
                d.zone_change_seconds,
            )?,
            unit_load_seconds: self.get_parsed_or_default(
                tenant_id,
                config_keys::ROUTE_UNIT_LOAD_SECONDS,
                d.unit_load_seconds,
            )?,
        })
    }

    async fn get_rebalance_config(
        &self,
        tenant_id: Option<i64>,
    ) -> ConfigResult<RebalanceConfig> {
        let d = RebalanceConfig::default();
        Ok(RebalanceConfig {
            hot_occupancy_threshold_pct: self.get_parsed_or_default(
                tenant_id,
                config_keys::REBALANCE_HOT_OCCUPANCY_PCT,
                d.hot_occupancy_threshold_pct,
            )?,
            move_fraction: self.get_parsed_or_default(
                tenant_id,
                config_keys::REBALANCE_MOVE_FRACTION,
                d.move_fraction,
            )?,
        })
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 上架选位
    pub const VELOCITY_WINDOW_DAYS: &str = "slotting.velocity_window_days";
    pub const VELOCITY_THRESHOLD: &str = "slotting.velocity_threshold";
    pub const MAX_CANDIDATE_OCCUPANCY_PCT: &str = "slotting.max_candidate_occupancy_pct";
    pub const HEAVY_UNIT_WEIGHT_KG: &str = "slotting.heavy_unit_weight_kg";
    pub const DOCK_X: &str = "slotting.dock_x";
    pub const DOCK_Y: &str = "slotting.dock_y";
    pub const WEIGHT_VELOCITY_MATCH: &str = "slotting.weight.velocity_match";
    pub const WEIGHT_LOW_OCCUPANCY: &str = "slotting.weight.low_occupancy";
    pub const WEIGHT_ZONE_BALANCE: &str = "slotting.weight.zone_balance";
    pub const WEIGHT_DOCK_DISTANCE: &str = "slotting.weight.dock_distance";
    pub const WEIGHT_TIGHT_FIT: &str = "slotting.weight.tight_fit";

    // 拣货分配
    pub const PICK_ORIGIN_X: &str = "allocation.pick_origin_x";
    pub const PICK_ORIGIN_Y: &str = "allocation.pick_origin_y";

    // 组波
    pub const WAVE_DEFAULT_MAX_ORDERS: &str = "wave.default_max_orders";
    pub const WAVE_MAX_TASKS: &str = "wave.max_tasks";
    pub const BATCH_SIMILARITY_THRESHOLD: &str = "wave.batch_similarity_threshold";
    pub const BATCH_MAX_ATTACHED: &str = "wave.batch_max_attached";
    pub const DISCRETE_MIN_PRIORITY: &str = "wave.discrete_min_priority";
    pub const DISCRETE_MAX_LINES: &str = "wave.discrete_max_lines";
    pub const DISCRETE_MAX_ORDERS: &str = "wave.discrete_max_orders";

    // 路径
    pub const ROUTE_ORIGIN_X: &str = "route.origin_x";
    pub const ROUTE_ORIGIN_Y: &str = "route.origin_y";
    pub const ROUTE_BASE_SECONDS: &str = "route.base_seconds";
    pub const ROUTE_SECONDS_PER_METER: &str = "route.seconds_per_meter";
    pub const ROUTE_ZONE_CHANGE_SECONDS: &str = "route.zone_change_seconds";
    pub const ROUTE_UNIT_LOAD_SECONDS: &str = "route.unit_load_seconds";

    // 再平衡
    pub const REBALANCE_HOT_OCCUPANCY_PCT: &str = "rebalance.hot_occupancy_threshold_pct";
    pub const REBALANCE_MOVE_FRACTION: &str = "rebalance.move_fraction";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let mgr = manager();
        let cfg = mgr.load_engine_config(None).await.unwrap();
        assert_eq!(cfg.slotting.velocity_threshold, 10);
        assert_eq!(cfg.slotting.velocity_window_days, 30);
        assert_eq!(cfg.wave.max_tasks, 500);
        assert_eq!(cfg.rebalance.hot_occupancy_threshold_pct, 85.0);
    }

    #[tokio::test]
    async fn test_tenant_override_falls_back_to_global() {
        let mgr = manager();
        mgr.set_global_config_value(config_keys::VELOCITY_THRESHOLD, "20").unwrap();
        mgr.set_config_value(
            ConfigScope::Tenant { tenant_id: 7 },
            config_keys::VELOCITY_THRESHOLD,
            "3",
        )
        .unwrap();

        let global = mgr.get_slotting_config(None).await.unwrap();
        let tenant7 = mgr.get_slotting_config(Some(7)).await.unwrap();
        let tenant8 = mgr.get_slotting_config(Some(8)).await.unwrap();

        assert_eq!(global.velocity_threshold, 20);
        assert_eq!(tenant7.velocity_threshold, 3);
        assert_eq!(tenant8.velocity_threshold, 20);
    }

    #[tokio::test]
    async fn test_malformed_value_uses_default() {
        let mgr = manager();
        mgr.set_global_config_value(config_keys::ROUTE_BASE_SECONDS, "thirty").unwrap();
        let route = mgr.get_route_config(None).await.unwrap();
        assert_eq!(route.base_seconds, 30.0);
    }

    #[test]
    fn test_snapshot_restore() {
        let mgr = manager();
        mgr.set_global_config_value(config_keys::WAVE_MAX_TASKS, "42").unwrap();
        let snapshot = mgr.get_config_snapshot().unwrap();

        mgr.set_global_config_value(config_keys::WAVE_MAX_TASKS, "7").unwrap();
        let restored = mgr.restore_config_from_snapshot(&snapshot).unwrap();

        assert_eq!(restored, 1);
        assert_eq!(
            mgr.get_global_config_value(config_keys::WAVE_MAX_TASKS).unwrap(),
            Some("42".to_string())
        );
    }
}
