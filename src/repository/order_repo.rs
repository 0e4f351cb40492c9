// ==========================================
// 仓储货位与波次拣选系统 - 出库单仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 候选查询: 可选条件以 AND 组合（QueryFilter）
// ==========================================

use crate::db::{open_sqlite_connection, SharedConnection};
use crate::domain::order::{EligibleOrder, NewOrder, Order, OrderLine};
use crate::domain::types::OrderStatus;
use crate::domain::wave::WaveScope;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::query_builder::QueryFilter;
use crate::repository::row_mapping::{fmt_date, parse_date, parse_enum, parse_opt_date};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const ORDER_COLUMNS: &str = r#"
    o.order_id, o.order_number, o.tenant_id, o.service_level, o.priority,
    o.order_date, o.promised_date, o.status
"#;

// ==========================================
// OrderRepository - 出库单仓储
// ==========================================
pub struct OrderRepository {
    conn: SharedConnection,
}

impl OrderRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_order(row: &Row<'_>) -> rusqlite::Result<Order> {
        Ok(Order {
            order_id: row.get(0)?,
            order_number: row.get(1)?,
            tenant_id: row.get(2)?,
            service_level: row.get(3)?,
            priority: row.get(4)?,
            order_date: parse_date(5, &row.get::<_, String>(5)?)?,
            promised_date: parse_opt_date(6, row.get(6)?)?,
            status: parse_enum(7, &row.get::<_, String>(7)?)?,
        })
    }

    fn map_line(row: &Row<'_>) -> rusqlite::Result<OrderLine> {
        Ok(OrderLine {
            line_id: row.get(0)?,
            order_id: row.get(1)?,
            sku_id: row.get(2)?,
            quantity: row.get(3)?,
            picked_qty: row.get(4)?,
        })
    }

    /// 新建出库单及其明细（单事务），返回 order_id
    pub fn create(&self, order: &NewOrder) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO outbound_order (
                order_number, tenant_id, service_level, priority, order_date, promised_date, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                order.order_number,
                order.tenant_id,
                order.service_level,
                order.priority,
                fmt_date(order.order_date),
                order.promised_date.map(fmt_date),
                order.status.as_str(),
            ],
        )?;
        let order_id = tx.last_insert_rowid();

        for line in &order.lines {
            tx.execute(
                "INSERT INTO order_line (order_id, sku_id, quantity, picked_qty) VALUES (?1, ?2, ?3, 0)",
                params![order_id, line.sku_id, line.quantity],
            )?;
        }

        tx.commit()?;
        Ok(order_id)
    }

    pub fn find_by_id(&self, order_id: i64) -> RepositoryResult<Option<Order>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, order_id)
    }

    pub(crate) fn find_by_id_in(conn: &Connection, order_id: i64) -> RepositoryResult<Option<Order>> {
        let sql = format!(
            "SELECT {} FROM outbound_order o WHERE o.order_id = ?1",
            ORDER_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![order_id], Self::map_order)
            .optional()?)
    }

    pub fn lines_for_order(&self, order_id: i64) -> RepositoryResult<Vec<OrderLine>> {
        let conn = self.get_conn()?;
        Self::lines_for_order_in(&conn, order_id)
    }

    pub(crate) fn lines_for_order_in(
        conn: &Connection,
        order_id: i64,
    ) -> RepositoryResult<Vec<OrderLine>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT line_id, order_id, sku_id, quantity, picked_qty
            FROM order_line
            WHERE order_id = ?1
            ORDER BY line_id
            "#,
        )?;
        let lines = stmt
            .query_map(params![order_id], Self::map_line)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lines)
    }

    /// 查询可组波订单（状态 NEW/CONFIRMED，附带行数/总量/SKU 集合）
    ///
    /// # 说明
    /// - 返回顺序: order_date 升序, order_id 升序
    /// - dominant_zone 由组波引擎回填
    pub(crate) fn find_eligible_in(
        conn: &Connection,
        scope: &WaveScope,
    ) -> RepositoryResult<Vec<EligibleOrder>> {
        let mut filter = QueryFilter::new();
        filter.push_in(
            "o.status",
            OrderStatus::committable()
                .iter()
                .map(|s| Value::from(s.as_str().to_string()))
                .collect(),
        );
        if let Some(tenant_id) = scope.tenant_id {
            filter.push("o.tenant_id = ?", Value::from(tenant_id));
        }
        if let Some(min_priority) = scope.min_priority {
            filter.push("o.priority >= ?", Value::from(min_priority as i64));
        }
        if let Some(from) = scope.date_from {
            filter.push("o.order_date >= ?", Value::from(fmt_date(from)));
        }
        if let Some(to) = scope.date_to {
            filter.push("o.order_date <= ?", Value::from(fmt_date(to)));
        }

        let sql = format!(
            "SELECT {} FROM outbound_order o{} ORDER BY o.order_date ASC, o.order_id ASC",
            ORDER_COLUMNS,
            filter.where_clause()
        );
        let mut stmt = conn.prepare(&sql)?;
        let orders = stmt
            .query_map(params_from_iter(filter.values()), Self::map_order)?
            .collect::<Result<Vec<_>, _>>()?;

        if orders.is_empty() {
            return Ok(Vec::new());
        }

        // 明细聚合
        let mut line_filter = QueryFilter::new();
        line_filter.push_in(
            "order_id",
            orders.iter().map(|o| Value::from(o.order_id)).collect(),
        );
        let line_sql = format!(
            "SELECT line_id, order_id, sku_id, quantity, picked_qty FROM order_line{} ORDER BY line_id",
            line_filter.where_clause()
        );
        let mut line_stmt = conn.prepare(&line_sql)?;
        let mut lines_by_order: HashMap<i64, Vec<OrderLine>> = HashMap::new();
        for line in line_stmt.query_map(params_from_iter(line_filter.values()), Self::map_line)? {
            let line = line?;
            lines_by_order.entry(line.order_id).or_default().push(line);
        }

        Ok(orders
            .into_iter()
            .map(|order| {
                let lines = lines_by_order.remove(&order.order_id).unwrap_or_default();
                let mut sku_ids: Vec<i64> = lines.iter().map(|l| l.sku_id).collect();
                sku_ids.sort_unstable();
                sku_ids.dedup();
                EligibleOrder {
                    line_count: lines.len() as i64,
                    total_quantity: lines.iter().map(|l| l.quantity).sum(),
                    sku_ids,
                    dominant_zone: None,
                    order,
                }
            })
            .collect())
    }

    /// 条件状态更新：仅当当前状态在 from 集合内时生效，返回受影响行数
    pub(crate) fn transition_status_in(
        conn: &Connection,
        order_id: i64,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> RepositoryResult<usize> {
        let mut filter = QueryFilter::new();
        filter.push("order_id = ?", Value::from(order_id));
        filter.push_in(
            "status",
            from.iter().map(|s| Value::from(s.as_str().to_string())).collect(),
        );
        let sql = format!(
            "UPDATE outbound_order SET status = ?{}{}",
            filter.next_index(),
            filter.where_clause()
        );
        let mut values = filter.into_values();
        values.push(Value::from(to.as_str().to_string()));
        Ok(conn.execute(&sql, params_from_iter(values))?)
    }

    pub(crate) fn add_picked_in(conn: &Connection, line_id: i64, quantity: i64) -> RepositoryResult<()> {
        conn.execute(
            "UPDATE order_line SET picked_qty = picked_qty + ?2 WHERE line_id = ?1",
            params![line_id, quantity],
        )?;
        Ok(())
    }

    /// 订单全部明细是否已拣足
    pub(crate) fn all_lines_picked_in(conn: &Connection, order_id: i64) -> RepositoryResult<bool> {
        let short: i64 = conn.query_row(
            "SELECT COUNT(*) FROM order_line WHERE order_id = ?1 AND picked_qty < quantity",
            params![order_id],
            |row| row.get(0),
        )?;
        Ok(short == 0)
    }
}
