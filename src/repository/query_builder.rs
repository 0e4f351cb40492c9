// ==========================================
// 仓储货位与波次拣选系统 - 动态过滤条件构建器
// ==========================================
// 约束: 所有取值走占位符绑定，不拼接字面量
// ==========================================

use rusqlite::types::Value;

/// 以 AND 组合的 WHERE 条件构建器
///
/// 用法：
/// ```ignore
/// let mut filter = QueryFilter::new();
/// filter.push("o.tenant_id = ?", Value::from(7_i64));
/// let sql = format!("SELECT ... FROM outbound_order o{}", filter.where_clause());
/// stmt.query_map(params_from_iter(filter.values()), ...)
/// ```
#[derive(Debug, Default, Clone)]
pub struct QueryFilter {
    predicates: Vec<String>,
    values: Vec<Value>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个带单个占位符 `?` 的条件，占位符会被改写为 `?N`
    pub fn push(&mut self, predicate: &str, value: Value) -> &mut Self {
        let idx = self.values.len() + 1;
        self.predicates
            .push(predicate.replacen('?', &format!("?{}", idx), 1));
        self.values.push(value);
        self
    }

    /// 追加 IN 列表条件；空列表生成恒假条件
    pub fn push_in(&mut self, column: &str, values: Vec<Value>) -> &mut Self {
        if values.is_empty() {
            self.predicates.push("1 = 0".to_string());
            return self;
        }
        let start = self.values.len() + 1;
        let placeholders: Vec<String> = (0..values.len())
            .map(|i| format!("?{}", start + i))
            .collect();
        self.predicates
            .push(format!("{} IN ({})", column, placeholders.join(", ")));
        self.values.extend(values);
        self
    }

    /// 追加不带参数的固定条件
    pub fn push_raw(&mut self, predicate: &str) -> &mut Self {
        self.predicates.push(predicate.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// 下一个可用占位符序号（用于在条件之后继续追加 LIMIT 等参数）
    pub fn next_index(&self) -> usize {
        self.values.len() + 1
    }

    pub fn where_clause(&self) -> String {
        if self.predicates.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.predicates.join(" AND "))
        }
    }

    pub fn values(&self) -> Vec<Value> {
        self.values.clone()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}
