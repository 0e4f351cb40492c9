// ==========================================
// 仓储货位与波次拣选系统 - API 层
// ==========================================
// 职责: 提供异步业务门面,供宿主服务/命令行调用
// ==========================================

pub mod error;
pub mod validator;
pub mod warehouse_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult, ValidationViolation};
pub use validator::RequestValidator;
pub use warehouse_api::{PutAwayOutcome, ReconciliationSummary, WarehouseApi};
