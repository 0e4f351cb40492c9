// ==========================================
// 仓储货位与波次拣选系统 - SKU 主数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::db::{open_sqlite_connection, SharedConnection};
use crate::domain::sku::Sku;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SKU_COLUMNS: &str = r#"
    sku_id, code, description, length_cm, width_cm, height_cm,
    unit_weight_kg, unit_volume, hazardous, fragile, requires_temp_control,
    temp_min, temp_max, food_category, food_incompatible
"#;

// ==========================================
// SkuRepository - SKU 主数据仓储
// ==========================================
pub struct SkuRepository {
    conn: SharedConnection,
}

impl SkuRepository {
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

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Sku> {
        Ok(Sku {
            sku_id: row.get(0)?,
            code: row.get(1)?,
            description: row.get(2)?,
            length_cm: row.get(3)?,
            width_cm: row.get(4)?,
            height_cm: row.get(5)?,
            unit_weight_kg: row.get(6)?,
            unit_volume: row.get(7)?,
            hazardous: row.get(8)?,
            fragile: row.get(9)?,
            requires_temp_control: row.get(10)?,
            temp_min: row.get(11)?,
            temp_max: row.get(12)?,
            food_category: row.get(13)?,
            food_incompatible: row.get(14)?,
        })
    }

    /// 按编码插入或更新 SKU，返回 sku_id
    ///
    /// # 说明
    /// - sku_id 字段被忽略，以 code 作为业务键
    pub fn upsert(&self, sku: &Sku) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::upsert_in(&conn, sku)
    }

    pub(crate) fn upsert_in(conn: &Connection, sku: &Sku) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO sku (
                code, description, length_cm, width_cm, height_cm,
                unit_weight_kg, unit_volume, hazardous, fragile, requires_temp_control,
                temp_min, temp_max, food_category, food_incompatible
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(code) DO UPDATE SET
                description = excluded.description,
                length_cm = excluded.length_cm,
                width_cm = excluded.width_cm,
                height_cm = excluded.height_cm,
                unit_weight_kg = excluded.unit_weight_kg,
                unit_volume = excluded.unit_volume,
                hazardous = excluded.hazardous,
                fragile = excluded.fragile,
                requires_temp_control = excluded.requires_temp_control,
                temp_min = excluded.temp_min,
                temp_max = excluded.temp_max,
                food_category = excluded.food_category,
                food_incompatible = excluded.food_incompatible
            "#,
            params![
                sku.code,
                sku.description,
                sku.length_cm,
                sku.width_cm,
                sku.height_cm,
                sku.unit_weight_kg,
                sku.unit_volume,
                sku.hazardous,
                sku.fragile,
                sku.requires_temp_control,
                sku.temp_min,
                sku.temp_max,
                sku.food_category,
                sku.food_incompatible,
            ],
        )?;

        let id: i64 = conn.query_row(
            "SELECT sku_id FROM sku WHERE code = ?1",
            params![sku.code],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn find_by_id(&self, sku_id: i64) -> RepositoryResult<Option<Sku>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, sku_id)
    }

    pub(crate) fn find_by_id_in(conn: &Connection, sku_id: i64) -> RepositoryResult<Option<Sku>> {
        let sql = format!("SELECT {} FROM sku WHERE sku_id = ?1", SKU_COLUMNS);
        Ok(conn
            .query_row(&sql, params![sku_id], Self::map_row)
            .optional()?)
    }

    /// 按 sku_id 读取，不存在时返回 NotFound
    pub(crate) fn require_in(conn: &Connection, sku_id: i64) -> RepositoryResult<Sku> {
        Self::find_by_id_in(conn, sku_id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "Sku".to_string(),
            id: sku_id.to_string(),
        })
    }

    pub fn find_by_code(&self, code: &str) -> RepositoryResult<Option<Sku>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM sku WHERE code = ?1", SKU_COLUMNS);
        Ok(conn
            .query_row(&sql, params![code], Self::map_row)
            .optional()?)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<Sku>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM sku ORDER BY sku_id", SKU_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let skus = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(skus)
    }
}
