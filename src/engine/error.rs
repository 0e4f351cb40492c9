// ==========================================
// 仓储货位与波次拣选系统 - 引擎层错误类型
// ==========================================
// 职责: 所有核心操作共用的 Result 契约
// 约束: code() 返回稳定的错误码字符串，供调用方分支处理
// ==========================================

use crate::domain::wave::UnfulfillableLine;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 上架选位 =====
    #[error("无可用容量: sku_id={sku_id}, volume={volume}, weight_kg={weight_kg}")]
    NoCapacity {
        sku_id: i64,
        volume: f64,
        weight_kg: f64,
    },

    #[error("提交时容量不足: location_id={location_id}, volume={volume}, weight_kg={weight_kg}")]
    CapacityExceeded {
        location_id: i64,
        volume: f64,
        weight_kg: f64,
    },

    #[error("无兼容货位: sku_id={sku_id}, 原因={reasons}")]
    IncompatibleLocation { sku_id: i64, reasons: String },

    // ===== 库存 =====
    #[error("库存不足: tenant_id={tenant_id}, sku_id={sku_id}, requested={requested}, available={available}")]
    InsufficientStock {
        tenant_id: i64,
        sku_id: i64,
        requested: i64,
        available: i64,
    },

    #[error("货位库存不足: location_id={location_id}, sku_id={sku_id}, requested={requested}, available={available}")]
    InsufficientLocationStock {
        location_id: i64,
        sku_id: i64,
        requested: i64,
        available: i64,
    },

    // ===== 组波 =====
    #[error("无可组波订单: {0}")]
    NoEligibleOrders(String),

    #[error("订单行无法生成拣货任务: {} 行", lines.len())]
    UnfulfillableLine { lines: Vec<UnfulfillableLine> },

    // ===== 通用 =====
    #[error("事务失败: {0}")]
    TransactionFailed(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("无效的状态转换: {entity} from={from} to={to}")]
    InvalidStateTransition {
        entity: String,
        from: String,
        to: String,
    },
}

impl EngineError {
    /// 稳定错误码
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NoCapacity { .. } => "NO_CAPACITY",
            EngineError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            EngineError::IncompatibleLocation { .. } => "INCOMPATIBLE_LOCATION",
            EngineError::InsufficientStock { .. } | EngineError::InsufficientLocationStock { .. } => {
                "INSUFFICIENT_STOCK"
            }
            EngineError::NoEligibleOrders(_) => "NO_ELIGIBLE_ORDERS",
            EngineError::UnfulfillableLine { .. } => "UNFULFILLABLE_LINE",
            EngineError::TransactionFailed(_) => "TRANSACTION_FAILED",
            EngineError::InvalidInput(_) => "INVALID_INPUT",
            EngineError::NotFound { .. } => "NOT_FOUND",
            EngineError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
        }
    }

    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn invalid_transition(entity: &str, from: impl ToString, to: impl ToString) -> Self {
        EngineError::InvalidStateTransition {
            entity: entity.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            other => EngineError::TransactionFailed(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        RepositoryError::from(err).into()
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(
            EngineError::NoCapacity {
                sku_id: 1,
                volume: 1.0,
                weight_kg: 1.0
            }
            .code(),
            "NO_CAPACITY"
        );
        assert_eq!(
            EngineError::UnfulfillableLine { lines: vec![] }.code(),
            "UNFULFILLABLE_LINE"
        );
        assert_eq!(
            EngineError::InsufficientLocationStock {
                location_id: 1,
                sku_id: 1,
                requested: 5,
                available: 2
            }
            .code(),
            "INSUFFICIENT_STOCK"
        );
        assert_eq!(
            EngineError::invalid_transition("Wave", "DONE", "IN_PROGRESS").code(),
            "INVALID_STATE_TRANSITION"
        );
    }

    #[test]
    fn test_repository_errors_map_to_transaction_failed() {
        let err: EngineError = RepositoryError::LockError("poisoned".to_string()).into();
        assert_eq!(err.code(), "TRANSACTION_FAILED");

        let err: EngineError = RepositoryError::NotFound {
            entity: "Sku".to_string(),
            id: "9".to_string(),
        }
        .into();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
