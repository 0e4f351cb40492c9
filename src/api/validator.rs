// ==========================================
// 仓储货位与波次拣选系统 - 请求校验器
// ==========================================
// 职责: 门面入口的参数校验（逐项收集违规，一次返回）
// ==========================================

use crate::api::error::{ApiError, ApiResult, ValidationViolation};
use crate::domain::stock::{PickRequest, PutAwayTask};
use crate::domain::wave::WaveScope;

/// 组波订单数硬上限（NN 路径为 O(n²)）
pub const MAX_WAVE_ORDERS: usize = 500;

/// 优先级取值范围
pub const PRIORITY_RANGE: std::ops::RangeInclusive<i32> = 0..=10;

#[derive(Debug, Default)]
pub struct RequestValidator {
    violations: Vec<ValidationViolation>,
}

impl RequestValidator {
    pub fn new() -> Self {
        Self::default()
    }

    fn check(&mut self, ok: bool, field: &str, reason: impl Into<String>) -> &mut Self {
        if !ok {
            self.violations.push(ValidationViolation {
                field: field.to_string(),
                reason: reason.into(),
            });
        }
        self
    }

    /// 汇总：无违规返回 Ok
    pub fn finish(self, operation: &str) -> ApiResult<()> {
        if self.violations.is_empty() {
            return Ok(());
        }
        Err(ApiError::ValidationError {
            reason: format!("{}: {} 项参数不合法", operation, self.violations.len()),
            violations: self.violations,
        })
    }

    pub fn operator(&mut self, operator: &str) -> &mut Self {
        self.check(!operator.trim().is_empty(), "operator", "操作人不能为空")
    }

    pub fn positive_id(&mut self, field: &str, id: i64) -> &mut Self {
        self.check(id > 0, field, format!("必须为正整数: {}", id))
    }

    pub fn put_away(&mut self, task: &PutAwayTask) -> &mut Self {
        self.positive_id("sku_id", task.sku_id)
            .positive_id("tenant_id", task.tenant_id)
            .check(task.quantity > 0, "quantity", format!("上架数量必须大于0: {}", task.quantity))
            .check(
                task.volume.is_finite() && task.volume > 0.0,
                "volume",
                format!("体积必须大于0: {}", task.volume),
            )
            .check(
                task.weight_kg.is_finite() && task.weight_kg >= 0.0,
                "weight_kg",
                format!("重量不能为负: {}", task.weight_kg),
            );
        if let (Some(load), Some(expiry)) = (task.load_date, task.expiry_date) {
            self.check(expiry >= load, "expiry_date", format!("过期日早于入库日: {} < {}", expiry, load));
        }
        self
    }

    pub fn pick_request(&mut self, request: &PickRequest) -> &mut Self {
        self.positive_id("sku_id", request.sku_id)
            .positive_id("tenant_id", request.tenant_id)
            .check(
                request.quantity > 0,
                "quantity",
                format!("拣货数量必须大于0: {}", request.quantity),
            )
    }

    pub fn wave_scope(&mut self, scope: &WaveScope) -> &mut Self {
        self.check(
            scope.max_orders <= MAX_WAVE_ORDERS,
            "max_orders",
            format!("超过上限 {}: {}", MAX_WAVE_ORDERS, scope.max_orders),
        );
        if let Some(tenant_id) = scope.tenant_id {
            self.positive_id("tenant_id", tenant_id);
        }
        if let Some(priority) = scope.min_priority {
            self.check(
                PRIORITY_RANGE.contains(&priority),
                "min_priority",
                format!("优先级必须在 0..=10: {}", priority),
            );
        }
        if let (Some(from), Some(to)) = (scope.date_from, scope.date_to) {
            self.check(from <= to, "date_from", format!("日期范围无效: {} > {}", from, to));
        }
        self
    }

    pub fn picked_qty(&mut self, picked_qty: i64) -> &mut Self {
        self.check(picked_qty >= 0, "picked_qty", format!("拣货数量不能为负: {}", picked_qty))
    }
}
