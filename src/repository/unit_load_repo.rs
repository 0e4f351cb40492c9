// ==========================================
// 仓储货位与波次拣选系统 - 载具（UDC）仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::db::{open_sqlite_connection, SharedConnection};
use crate::domain::types::UnitLoadStatus;
use crate::domain::unit_load::{UnitLoad, UnitLoadContent, UnitLoadSource};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_mapping::parse_enum;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ==========================================
// UnitLoadRepository - 载具仓储
// ==========================================
pub struct UnitLoadRepository {
    conn: SharedConnection,
}

impl UnitLoadRepository {
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

    /// 新建载具及其内容（单事务），返回 unit_load_id
    pub fn create(
        &self,
        code: &str,
        location_id: i64,
        status: UnitLoadStatus,
        contents: &[UnitLoadContent],
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO unit_load (code, location_id, status) VALUES (?1, ?2, ?3)",
            params![code, location_id, status.as_str()],
        )?;
        let unit_load_id = tx.last_insert_rowid();

        for content in contents {
            tx.execute(
                r#"
                INSERT INTO unit_load_content (unit_load_id, sku_id, tenant_id, quantity)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![unit_load_id, content.sku_id, content.tenant_id, content.quantity],
            )?;
        }

        tx.commit()?;
        Ok(unit_load_id)
    }

    pub fn find_by_id(&self, unit_load_id: i64) -> RepositoryResult<Option<UnitLoad>> {
        let conn = self.get_conn()?;
        Ok(conn
            .query_row(
                "SELECT unit_load_id, code, location_id, status FROM unit_load WHERE unit_load_id = ?1",
                params![unit_load_id],
                |row| {
                    Ok(UnitLoad {
                        unit_load_id: row.get(0)?,
                        code: row.get(1)?,
                        location_id: row.get(2)?,
                        status: parse_enum(3, &row.get::<_, String>(3)?)?,
                    })
                },
            )
            .optional()?)
    }

    pub fn contents(&self, unit_load_id: i64) -> RepositoryResult<Vec<UnitLoadContent>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT unit_load_id, sku_id, tenant_id, quantity
            FROM unit_load_content
            WHERE unit_load_id = ?1
            ORDER BY sku_id, tenant_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![unit_load_id], |row| {
                Ok(UnitLoadContent {
                    unit_load_id: row.get(0)?,
                    sku_id: row.get(1)?,
                    tenant_id: row.get(2)?,
                    quantity: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 可拣载具：PARTIAL/FULL 状态、位于启用货位、含该租户该 SKU 正数量
    ///
    /// # 说明
    /// - 返回顺序: 数量降序, unit_load_id 升序
    pub(crate) fn list_pickable_in(
        conn: &Connection,
        sku_id: i64,
        tenant_id: i64,
    ) -> RepositoryResult<Vec<UnitLoadSource>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT u.unit_load_id, u.code, l.location_id, l.code, l.zone, l.x, l.y, c.quantity
            FROM unit_load u
            JOIN unit_load_content c ON c.unit_load_id = u.unit_load_id
            JOIN location l ON l.location_id = u.location_id
            WHERE c.sku_id = ?1
              AND c.tenant_id = ?2
              AND c.quantity > 0
              AND u.status IN ('PARTIAL', 'FULL')
              AND l.active = 1
            ORDER BY c.quantity DESC, u.unit_load_id ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![sku_id, tenant_id], |row| {
                Ok(UnitLoadSource {
                    unit_load_id: row.get(0)?,
                    unit_load_code: row.get(1)?,
                    location_id: row.get(2)?,
                    location_code: row.get(3)?,
                    zone: row.get(4)?,
                    x: row.get(5)?,
                    y: row.get(6)?,
                    quantity: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 扣减载具内容；内容清空后载具置为 EMPTY
    ///
    /// # 返回
    /// - Ok(false): 载具内容不足
    pub(crate) fn decrement_content_in(
        conn: &Connection,
        unit_load_id: i64,
        sku_id: i64,
        tenant_id: i64,
        quantity: i64,
    ) -> RepositoryResult<bool> {
        let updated = conn.execute(
            r#"
            UPDATE unit_load_content
            SET quantity = quantity - ?4
            WHERE unit_load_id = ?1 AND sku_id = ?2 AND tenant_id = ?3 AND quantity >= ?4
            "#,
            params![unit_load_id, sku_id, tenant_id, quantity],
        )?;
        if updated == 0 {
            return Ok(false);
        }

        let remaining: i64 = conn.query_row(
            "SELECT COALESCE(SUM(quantity), 0) FROM unit_load_content WHERE unit_load_id = ?1",
            params![unit_load_id],
            |row| row.get(0),
        )?;
        if remaining == 0 {
            conn.execute(
                "UPDATE unit_load SET status = ?2 WHERE unit_load_id = ?1",
                params![unit_load_id, UnitLoadStatus::Empty.as_str()],
            )?;
        }
        Ok(true)
    }
}
