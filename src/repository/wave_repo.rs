// ==========================================
// 仓储货位与波次拣选系统 - 波次与拣货任务仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 状态更新: 以当前状态为条件，0 行受影响表示状态已变化
// ==========================================

use crate::db::{open_sqlite_connection, SharedConnection};
use crate::domain::types::{PickTaskStatus, WaveStatus, WaveType};
use crate::domain::wave::{PickTask, PlannedPickTask, Wave, WaveScope};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_mapping::{
    fmt_date, fmt_datetime, parse_datetime, parse_enum, parse_opt_date, parse_opt_datetime,
};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const WAVE_COLUMNS: &str = r#"
    wave_id, wave_number, status, wave_type, tenant_id, min_priority, date_from, date_to,
    max_orders, total_orders, total_lines, total_picks, est_distance_m, est_time_s,
    created_at, started_at, completed_at
"#;

const TASK_COLUMNS: &str = r#"
    task_id, wave_id, order_id, line_id, tenant_id, sku_id, location_id, unit_load_id,
    requested_qty, picked_qty, sequence_no, zone, distance_from_prev_m, est_seconds, status
"#;

/// 波次汇总
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WaveTotals {
    pub total_orders: i64,
    pub total_lines: i64,
    pub total_picks: i64,
    pub est_distance_m: f64,
    pub est_time_s: f64,
}

/// 未完成任务对某货位库存的占用（按 货位/SKU/租户/载具 汇总）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenTaskCommitment {
    pub location_id: i64,
    pub sku_id: i64,
    pub tenant_id: i64,
    pub unit_load_id: Option<i64>,
    pub quantity: i64,
}

// ==========================================
// WaveRepository - 波次仓储
// ==========================================
pub struct WaveRepository {
    conn: SharedConnection,
}

impl WaveRepository {
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

    fn map_wave(row: &Row<'_>) -> rusqlite::Result<Wave> {
        let max_orders: i64 = row.get(8)?;
        Ok(Wave {
            wave_id: row.get(0)?,
            wave_number: row.get(1)?,
            status: parse_enum(2, &row.get::<_, String>(2)?)?,
            wave_type: parse_enum(3, &row.get::<_, String>(3)?)?,
            scope: WaveScope {
                tenant_id: row.get(4)?,
                min_priority: row.get(5)?,
                date_from: parse_opt_date(6, row.get(6)?)?,
                date_to: parse_opt_date(7, row.get(7)?)?,
                max_orders: max_orders.max(0) as usize,
            },
            total_orders: row.get(9)?,
            total_lines: row.get(10)?,
            total_picks: row.get(11)?,
            est_distance_m: row.get(12)?,
            est_time_s: row.get(13)?,
            created_at: parse_datetime(14, &row.get::<_, String>(14)?)?,
            started_at: parse_opt_datetime(15, row.get(15)?)?,
            completed_at: parse_opt_datetime(16, row.get(16)?)?,
        })
    }

    fn map_task(row: &Row<'_>) -> rusqlite::Result<PickTask> {
        Ok(PickTask {
            task_id: row.get(0)?,
            wave_id: row.get(1)?,
            order_id: row.get(2)?,
            line_id: row.get(3)?,
            tenant_id: row.get(4)?,
            sku_id: row.get(5)?,
            location_id: row.get(6)?,
            unit_load_id: row.get(7)?,
            requested_qty: row.get(8)?,
            picked_qty: row.get(9)?,
            sequence_no: row.get(10)?,
            zone: row.get(11)?,
            distance_from_prev_m: row.get(12)?,
            est_seconds: row.get(13)?,
            status: parse_enum(14, &row.get::<_, String>(14)?)?,
        })
    }

    // ==========================================
    // 波次 wave
    // ==========================================

    /// 新建 PLANNED 波次，返回 wave_id
    pub(crate) fn insert_wave_in(
        conn: &Connection,
        wave_number: &str,
        wave_type: WaveType,
        scope: &WaveScope,
        created_at: NaiveDateTime,
    ) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO wave (
                wave_number, status, wave_type, tenant_id, min_priority, date_from, date_to,
                max_orders, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                wave_number,
                WaveStatus::Planned.as_str(),
                wave_type.as_str(),
                scope.tenant_id,
                scope.min_priority,
                scope.date_from.map(fmt_date),
                scope.date_to.map(fmt_date),
                scope.max_orders as i64,
                fmt_datetime(created_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub(crate) fn update_totals_in(
        conn: &Connection,
        wave_id: i64,
        totals: &WaveTotals,
    ) -> RepositoryResult<()> {
        conn.execute(
            r#"
            UPDATE wave
            SET total_orders = ?2, total_lines = ?3, total_picks = ?4,
                est_distance_m = ?5, est_time_s = ?6
            WHERE wave_id = ?1
            "#,
            params![
                wave_id,
                totals.total_orders,
                totals.total_lines,
                totals.total_picks,
                totals.est_distance_m,
                totals.est_time_s,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, wave_id: i64) -> RepositoryResult<Option<Wave>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, wave_id)
    }

    pub(crate) fn find_by_id_in(conn: &Connection, wave_id: i64) -> RepositoryResult<Option<Wave>> {
        let sql = format!("SELECT {} FROM wave WHERE wave_id = ?1", WAVE_COLUMNS);
        Ok(conn
            .query_row(&sql, params![wave_id], Self::map_wave)
            .optional()?)
    }

    pub(crate) fn require_in(conn: &Connection, wave_id: i64) -> RepositoryResult<Wave> {
        Self::find_by_id_in(conn, wave_id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "Wave".to_string(),
            id: wave_id.to_string(),
        })
    }

    /// 条件状态流转；started_at / completed_at 按目标状态回填
    pub(crate) fn transition_in(
        conn: &Connection,
        wave_id: i64,
        from: WaveStatus,
        to: WaveStatus,
        at: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        let ts = fmt_datetime(at);
        let updated = conn.execute(
            r#"
            UPDATE wave
            SET status = ?3,
                started_at = CASE WHEN ?3 = 'IN_PROGRESS' THEN ?4 ELSE started_at END,
                completed_at = CASE WHEN ?3 IN ('DONE', 'CANCELLED') THEN ?4 ELSE completed_at END
            WHERE wave_id = ?1 AND status = ?2
            "#,
            params![wave_id, from.as_str(), to.as_str(), ts],
        )?;
        Ok(updated == 1)
    }

    // ==========================================
    // 拣货任务 pick_task
    // ==========================================

    pub(crate) fn insert_task_in(
        conn: &Connection,
        wave_id: i64,
        task: &PlannedPickTask,
    ) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO pick_task (
                wave_id, order_id, line_id, tenant_id, sku_id, location_id, unit_load_id,
                requested_qty, picked_qty, sequence_no, zone, distance_from_prev_m, est_seconds, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                wave_id,
                task.order_id,
                task.line_id,
                task.tenant_id,
                task.sku_id,
                task.location_id,
                task.unit_load_id,
                task.requested_qty,
                task.sequence_no,
                task.zone,
                task.distance_from_prev_m,
                task.est_seconds,
                PickTaskStatus::Queued.as_str(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 波次内任务（sequence_no 升序）
    pub fn list_tasks(&self, wave_id: i64) -> RepositoryResult<Vec<PickTask>> {
        let conn = self.get_conn()?;
        Self::list_tasks_in(&conn, wave_id)
    }

    pub(crate) fn list_tasks_in(conn: &Connection, wave_id: i64) -> RepositoryResult<Vec<PickTask>> {
        let sql = format!(
            "SELECT {} FROM pick_task WHERE wave_id = ?1 ORDER BY sequence_no, task_id",
            TASK_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![wave_id], Self::map_task)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub(crate) fn find_task_in(conn: &Connection, task_id: i64) -> RepositoryResult<Option<PickTask>> {
        let sql = format!("SELECT {} FROM pick_task WHERE task_id = ?1", TASK_COLUMNS);
        Ok(conn
            .query_row(&sql, params![task_id], Self::map_task)
            .optional()?)
    }

    pub(crate) fn update_task_in(
        conn: &Connection,
        task_id: i64,
        status: PickTaskStatus,
        picked_qty: i64,
    ) -> RepositoryResult<()> {
        conn.execute(
            "UPDATE pick_task SET status = ?2, picked_qty = ?3 WHERE task_id = ?1",
            params![task_id, status.as_str(), picked_qty],
        )?;
        Ok(())
    }

    /// 仍处于 QUEUED / IN_PROGRESS 的任务数
    pub(crate) fn count_open_tasks_in(conn: &Connection, wave_id: i64) -> RepositoryResult<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pick_task WHERE wave_id = ?1 AND status IN ('QUEUED', 'IN_PROGRESS')",
            params![wave_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 所有波次中 QUEUED / IN_PROGRESS 任务的请求量汇总
    ///
    /// # 参数
    /// - sku_id: None 表示全部 SKU
    pub(crate) fn open_commitments_in(
        conn: &Connection,
        sku_id: Option<i64>,
    ) -> RepositoryResult<Vec<OpenTaskCommitment>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT location_id, sku_id, tenant_id, unit_load_id, SUM(requested_qty)
            FROM pick_task
            WHERE status IN ('QUEUED', 'IN_PROGRESS')
              AND (?1 IS NULL OR sku_id = ?1)
            GROUP BY location_id, sku_id, tenant_id, unit_load_id
            ORDER BY location_id, sku_id, tenant_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![sku_id], |row| {
                Ok(OpenTaskCommitment {
                    location_id: row.get(0)?,
                    sku_id: row.get(1)?,
                    tenant_id: row.get(2)?,
                    unit_load_id: row.get(3)?,
                    quantity: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 波次涉及的订单（去重，升序）
    pub(crate) fn order_ids_in(conn: &Connection, wave_id: i64) -> RepositoryResult<Vec<i64>> {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT order_id FROM pick_task WHERE wave_id = ?1 ORDER BY order_id",
        )?;
        let ids = stmt
            .query_map(params![wave_id], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}
