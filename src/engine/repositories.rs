// ==========================================
// 仓储货位与波次拣选系统 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合门面层查询所需的 Repository（共享同一连接）
// ==========================================

use std::sync::Arc;

use crate::db::SharedConnection;
use crate::repository::{
    LocationRepository, MovementRepository, OrderRepository, SkuRepository, StockRepository,
    UnitLoadRepository, WaveRepository,
};

/// 仓储集合
///
/// 所有仓储共享同一个 `Arc<Mutex<Connection>>`，与引擎写入走同一把锁。
#[derive(Clone)]
pub struct WarehouseRepositories {
    pub sku_repo: Arc<SkuRepository>,
    pub location_repo: Arc<LocationRepository>,
    pub stock_repo: Arc<StockRepository>,
    pub movement_repo: Arc<MovementRepository>,
    pub order_repo: Arc<OrderRepository>,
    pub unit_load_repo: Arc<UnitLoadRepository>,
    pub wave_repo: Arc<WaveRepository>,
}

impl WarehouseRepositories {
    pub fn from_connection(conn: SharedConnection) -> Self {
        Self {
            sku_repo: Arc::new(SkuRepository::from_connection(conn.clone())),
            location_repo: Arc::new(LocationRepository::from_connection(conn.clone())),
            stock_repo: Arc::new(StockRepository::from_connection(conn.clone())),
            movement_repo: Arc::new(MovementRepository::from_connection(conn.clone())),
            order_repo: Arc::new(OrderRepository::from_connection(conn.clone())),
            unit_load_repo: Arc::new(UnitLoadRepository::from_connection(conn.clone())),
            wave_repo: Arc::new(WaveRepository::from_connection(conn)),
        }
    }
}
