// ==========================================
// 仓储货位与波次拣选系统 - API层错误类型
// ==========================================
// 职责: 汇总引擎/仓储/导入/配置错误，保留稳定错误码
// ==========================================

use crate::domain::wave::UnfulfillableLine;
use crate::engine::error::EngineError;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 引擎错误（错误码与引擎一致）
    // ==========================================
    #[error("无可用容量: {0}")]
    NoCapacity(String),

    #[error("提交时容量不足: {0}")]
    CapacityExceeded(String),

    #[error("无兼容货位: {0}")]
    IncompatibleLocation(String),

    #[error("库存不足: {0}")]
    InsufficientStock(String),

    #[error("无可组波订单: {0}")]
    NoEligibleOrders(String),

    #[error("订单行无法生成拣货任务: {} 行", lines.len())]
    UnfulfillableLine { lines: Vec<UnfulfillableLine> },

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效的状态转换: {entity} from={from} to={to}")]
    InvalidStateTransition {
        entity: String,
        from: String,
        to: String,
    },

    /// 请求校验失败（带逐项原因）
    #[error("请求校验失败: {reason}")]
    ValidationError {
        reason: String,
        violations: Vec<ValidationViolation>,
    },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 导入 / 配置
    // ==========================================
    #[error("文件导入失败: {message}")]
    ImportError { row: Option<usize>, message: String },

    #[error("配置读取失败: {0}")]
    ConfigError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 稳定错误码
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::NoCapacity(_) => "NO_CAPACITY",
            ApiError::CapacityExceeded(_) => "CAPACITY_EXCEEDED",
            ApiError::IncompatibleLocation(_) => "INCOMPATIBLE_LOCATION",
            ApiError::InsufficientStock(_) => "INSUFFICIENT_STOCK",
            ApiError::NoEligibleOrders(_) => "NO_ELIGIBLE_ORDERS",
            ApiError::UnfulfillableLine { .. } => "UNFULFILLABLE_LINE",
            ApiError::InvalidInput(_) | ApiError::ValidationError { .. } => "INVALID_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            ApiError::DatabaseTransactionError(_) => "TRANSACTION_FAILED",
            ApiError::DatabaseError(_) | ApiError::DatabaseConnectionError(_) => "DATABASE_ERROR",
            ApiError::ImportError { .. } => "IMPORT_FAILED",
            ApiError::ConfigError(_) => "CONFIG_ERROR",
            ApiError::InternalError(_) | ApiError::Other(_) => "INTERNAL_ERROR",
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::NoCapacity { .. } => ApiError::NoCapacity(message),
            EngineError::CapacityExceeded { .. } => ApiError::CapacityExceeded(message),
            EngineError::IncompatibleLocation { .. } => ApiError::IncompatibleLocation(message),
            EngineError::InsufficientStock { .. } | EngineError::InsufficientLocationStock { .. } => {
                ApiError::InsufficientStock(message)
            }
            EngineError::NoEligibleOrders(msg) => ApiError::NoEligibleOrders(msg),
            EngineError::UnfulfillableLine { lines } => ApiError::UnfulfillableLine { lines },
            EngineError::TransactionFailed(msg) => ApiError::DatabaseTransactionError(msg),
            EngineError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            EngineError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            EngineError::InvalidStateTransition { entity, from, to } => {
                ApiError::InvalidStateTransition { entity, from, to }
            }
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg) => ApiError::DatabaseTransactionError(msg),
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::InvalidInput(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::InvalidInput(format!("外键约束违反: {}", msg))
            }
            RepositoryError::CheckConstraintViolation(msg) => {
                ApiError::DatabaseTransactionError(format!("检查约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        ApiError::ImportError {
            row: err.row(),
            message: err.to_string(),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

// ==========================================
// 校验违规详情
// ==========================================

/// 校验违规详情
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationViolation {
    /// 字段名
    pub field: String,
    /// 违规原因
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_errors_keep_codes() {
        let cases = vec![
            EngineError::NoCapacity {
                sku_id: 1,
                volume: 1.0,
                weight_kg: 1.0,
            },
            EngineError::IncompatibleLocation {
                sku_id: 1,
                reasons: "TEMPERATURE".to_string(),
            },
            EngineError::NoEligibleOrders("none".to_string()),
            EngineError::UnfulfillableLine { lines: Vec::new() },
            EngineError::TransactionFailed("busy".to_string()),
            EngineError::not_found("Wave", 9),
            EngineError::invalid_transition("Wave", "DONE", "CANCELLED"),
        ];
        for err in cases {
            let code = err.code();
            assert_eq!(ApiError::from(err).code(), code);
        }
    }

    #[test]
    fn test_import_error_keeps_row() {
        let err: ApiError = ImportError::MissingField {
            row: 4,
            field: "zone".to_string(),
        }
        .into();
        assert!(matches!(err, ApiError::ImportError { row: Some(4), .. }));
    }
}
