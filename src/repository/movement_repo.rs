// ==========================================
// 仓储货位与波次拣选系统 - 库存移动流水仓储
// ==========================================
// 红线: 只追加，不提供更新/删除
// ==========================================

use crate::db::{open_sqlite_connection, SharedConnection};
use crate::domain::movement::{Movement, NewMovement};
use crate::domain::types::MovementType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::query_builder::QueryFilter;
use crate::repository::row_mapping::{fmt_datetime, parse_datetime, parse_enum, parse_opt_datetime};
use chrono::NaiveDateTime;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::sync::{Arc, Mutex};

const MOVEMENT_COLUMNS: &str = r#"
    movement_id, tenant_id, sku_id, movement_type, quantity,
    from_location_id, to_location_id, operator, wave_id, order_id, lot_id,
    unit_cost, started_at, ended_at, duration_s, distance_m, notes
"#;

/// 流水查询条件（AND 组合）
#[derive(Debug, Clone, Default)]
pub struct MovementQuery {
    pub tenant_id: Option<i64>,
    pub sku_id: Option<i64>,
    pub wave_id: Option<i64>,
    pub movement_type: Option<MovementType>,
    pub since: Option<NaiveDateTime>,
    pub limit: Option<i64>,
}

// ==========================================
// MovementRepository - 移动流水仓储
// ==========================================
pub struct MovementRepository {
    conn: SharedConnection,
}

impl MovementRepository {
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

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Movement> {
        Ok(Movement {
            movement_id: row.get(0)?,
            tenant_id: row.get(1)?,
            sku_id: row.get(2)?,
            movement_type: parse_enum(3, &row.get::<_, String>(3)?)?,
            quantity: row.get(4)?,
            from_location_id: row.get(5)?,
            to_location_id: row.get(6)?,
            operator: row.get(7)?,
            wave_id: row.get(8)?,
            order_id: row.get(9)?,
            lot_id: row.get(10)?,
            unit_cost: row.get(11)?,
            started_at: parse_datetime(12, &row.get::<_, String>(12)?)?,
            ended_at: parse_opt_datetime(13, row.get(13)?)?,
            duration_s: row.get(14)?,
            distance_m: row.get(15)?,
            notes: row.get(16)?,
        })
    }

    /// 追加一条流水
    pub(crate) fn append_in(conn: &Connection, movement: &NewMovement) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO movement (
                tenant_id, sku_id, movement_type, quantity, from_location_id, to_location_id,
                operator, wave_id, order_id, lot_id, unit_cost,
                started_at, ended_at, duration_s, distance_m, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            params![
                movement.tenant_id,
                movement.sku_id,
                movement.movement_type.as_str(),
                movement.quantity,
                movement.from_location_id,
                movement.to_location_id,
                movement.operator,
                movement.wave_id,
                movement.order_id,
                movement.lot_id,
                movement.unit_cost,
                fmt_datetime(movement.started_at),
                movement.ended_at.map(fmt_datetime),
                movement.duration_s,
                movement.distance_m,
                movement.notes,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 统计某 SKU 自指定时间起的流水条数（速度分级依据）
    pub(crate) fn count_for_sku_since_in(
        conn: &Connection,
        sku_id: i64,
        since: NaiveDateTime,
    ) -> RepositoryResult<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM movement WHERE sku_id = ?1 AND started_at >= ?2",
            params![sku_id, fmt_datetime(since)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 按条件查询流水（movement_id 升序）
    pub fn query(&self, query: &MovementQuery) -> RepositoryResult<Vec<Movement>> {
        let conn = self.get_conn()?;

        let mut filter = QueryFilter::new();
        if let Some(tenant_id) = query.tenant_id {
            filter.push("tenant_id = ?", Value::from(tenant_id));
        }
        if let Some(sku_id) = query.sku_id {
            filter.push("sku_id = ?", Value::from(sku_id));
        }
        if let Some(wave_id) = query.wave_id {
            filter.push("wave_id = ?", Value::from(wave_id));
        }
        if let Some(movement_type) = query.movement_type {
            filter.push("movement_type = ?", Value::from(movement_type.as_str().to_string()));
        }
        if let Some(since) = query.since {
            filter.push("started_at >= ?", Value::from(fmt_datetime(since)));
        }

        let mut sql = format!(
            "SELECT {} FROM movement{} ORDER BY movement_id",
            MOVEMENT_COLUMNS,
            filter.where_clause()
        );
        let mut values = filter.values();
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT ?{}", values.len() + 1));
            values.push(Value::from(limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
