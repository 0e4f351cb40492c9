// ==========================================
// 仓储货位与波次拣选系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约束: *_in(conn, ..) 行级函数接收 &Connection，可在事务/保存点内调用
// ==========================================

pub mod error;
pub mod location_repo;
pub mod movement_repo;
pub mod order_repo;
pub mod query_builder;
pub mod row_mapping;
pub mod sku_repo;
pub mod stock_repo;
pub mod unit_load_repo;
pub mod wave_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use location_repo::LocationRepository;
pub use movement_repo::{MovementQuery, MovementRepository};
pub use order_repo::OrderRepository;
pub use query_builder::QueryFilter;
pub use sku_repo::SkuRepository;
pub use stock_repo::{LotWithLocation, StockRepository};
pub use unit_load_repo::UnitLoadRepository;
pub use wave_repo::{OpenTaskCommitment, WaveRepository, WaveTotals};
