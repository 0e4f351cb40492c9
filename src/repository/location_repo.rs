// ==========================================
// 仓储货位与波次拣选系统 - 货位仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 占用更新: 带条件的 UPDATE，0 行受影响即视为容量竞争失败
// ==========================================

use crate::db::{open_sqlite_connection, SharedConnection};
use crate::domain::location::Location;
use crate::domain::types::VelocityClass;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_mapping::parse_enum;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

const LOCATION_COLUMNS: &str = r#"
    l.location_id, l.code, l.zone, l.velocity_class, l.location_type,
    l.x, l.y, l.z, l.width_cm, l.depth_cm, l.height_cm,
    l.max_volume, l.max_weight_kg, l.occupied_volume, l.occupied_weight_kg,
    l.hazmat_allowed, l.temperature_controlled, l.current_temperature,
    l.active, l.picking_priority
"#;

// ==========================================
// LocationRepository - 货位仓储
// ==========================================
pub struct LocationRepository {
    conn: SharedConnection,
}

impl LocationRepository {
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

    pub(crate) fn map_row(row: &Row<'_>) -> rusqlite::Result<Location> {
        Ok(Location {
            location_id: row.get(0)?,
            code: row.get(1)?,
            zone: row.get(2)?,
            velocity_class: parse_enum(3, &row.get::<_, String>(3)?)?,
            location_type: parse_enum(4, &row.get::<_, String>(4)?)?,
            x: row.get(5)?,
            y: row.get(6)?,
            z: row.get(7)?,
            width_cm: row.get(8)?,
            depth_cm: row.get(9)?,
            height_cm: row.get(10)?,
            max_volume: row.get(11)?,
            max_weight_kg: row.get(12)?,
            occupied_volume: row.get(13)?,
            occupied_weight_kg: row.get(14)?,
            hazmat_allowed: row.get(15)?,
            temperature_controlled: row.get(16)?,
            current_temperature: row.get(17)?,
            active: row.get(18)?,
            picking_priority: row.get(19)?,
        })
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 按编码插入或更新货位主数据，返回 location_id
    ///
    /// # 说明
    /// - 已存在的货位只更新主数据字段，不覆盖占用量
    pub fn upsert(&self, location: &Location) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::upsert_in(&conn, location)
    }

    pub(crate) fn upsert_in(conn: &Connection, location: &Location) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO location (
                code, zone, velocity_class, location_type, x, y, z,
                width_cm, depth_cm, height_cm, max_volume, max_weight_kg,
                occupied_volume, occupied_weight_kg, hazmat_allowed,
                temperature_controlled, current_temperature, active, picking_priority
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            ON CONFLICT(code) DO UPDATE SET
                zone = excluded.zone,
                velocity_class = excluded.velocity_class,
                location_type = excluded.location_type,
                x = excluded.x,
                y = excluded.y,
                z = excluded.z,
                width_cm = excluded.width_cm,
                depth_cm = excluded.depth_cm,
                height_cm = excluded.height_cm,
                max_volume = excluded.max_volume,
                max_weight_kg = excluded.max_weight_kg,
                hazmat_allowed = excluded.hazmat_allowed,
                temperature_controlled = excluded.temperature_controlled,
                current_temperature = excluded.current_temperature,
                active = excluded.active,
                picking_priority = excluded.picking_priority
            "#,
            params![
                location.code,
                location.zone,
                location.velocity_class.as_str(),
                location.location_type.as_str(),
                location.x,
                location.y,
                location.z,
                location.width_cm,
                location.depth_cm,
                location.height_cm,
                location.max_volume,
                location.max_weight_kg,
                location.occupied_volume,
                location.occupied_weight_kg,
                location.hazmat_allowed,
                location.temperature_controlled,
                location.current_temperature,
                location.active,
                location.picking_priority,
            ],
        )?;

        let id: i64 = conn.query_row(
            "SELECT location_id FROM location WHERE code = ?1",
            params![location.code],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// 在容量允许时增加占用（带条件更新）
    ///
    /// # 返回
    /// - Ok(true): 占用已增加
    /// - Ok(false): 货位不存在/未启用/余量不足
    pub(crate) fn try_occupy_in(
        conn: &Connection,
        location_id: i64,
        volume: f64,
        weight_kg: f64,
    ) -> RepositoryResult<bool> {
        let updated = conn.execute(
            r#"
            UPDATE location
            SET occupied_volume = occupied_volume + ?2,
                occupied_weight_kg = occupied_weight_kg + ?3
            WHERE location_id = ?1
              AND active = 1
              AND occupied_volume + ?2 <= max_volume
              AND occupied_weight_kg + ?3 <= max_weight_kg
            "#,
            params![location_id, volume, weight_kg],
        )?;
        Ok(updated == 1)
    }

    /// 释放占用（下限钳制为 0）
    pub(crate) fn release_in(
        conn: &Connection,
        location_id: i64,
        volume: f64,
        weight_kg: f64,
    ) -> RepositoryResult<()> {
        conn.execute(
            r#"
            UPDATE location
            SET occupied_volume = MAX(0.0, occupied_volume - ?2),
                occupied_weight_kg = MAX(0.0, occupied_weight_kg - ?3)
            WHERE location_id = ?1
            "#,
            params![location_id, volume, weight_kg],
        )?;
        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn find_by_id(&self, location_id: i64) -> RepositoryResult<Option<Location>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, location_id)
    }

    pub(crate) fn find_by_id_in(
        conn: &Connection,
        location_id: i64,
    ) -> RepositoryResult<Option<Location>> {
        let sql = format!(
            "SELECT {} FROM location l WHERE l.location_id = ?1",
            LOCATION_COLUMNS
        );
        Ok(conn
            .query_row(&sql, params![location_id], Self::map_row)
            .optional()?)
    }

    pub(crate) fn require_in(conn: &Connection, location_id: i64) -> RepositoryResult<Location> {
        Self::find_by_id_in(conn, location_id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "Location".to_string(),
            id: location_id.to_string(),
        })
    }

    pub fn find_by_code(&self, code: &str) -> RepositoryResult<Option<Location>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM location l WHERE l.code = ?1", LOCATION_COLUMNS);
        Ok(conn
            .query_row(&sql, params![code], Self::map_row)
            .optional()?)
    }

    /// 查询全部启用货位（按 location_id 升序）
    pub fn list_active(&self) -> RepositoryResult<Vec<Location>> {
        let conn = self.get_conn()?;
        Self::list_active_in(&conn)
    }

    pub(crate) fn list_active_in(conn: &Connection) -> RepositoryResult<Vec<Location>> {
        let sql = format!(
            "SELECT {} FROM location l WHERE l.active = 1 ORDER BY l.location_id",
            LOCATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 查询指定速度等级的启用货位
    pub(crate) fn list_by_velocity_in(
        conn: &Connection,
        velocity: VelocityClass,
    ) -> RepositoryResult<Vec<Location>> {
        let sql = format!(
            "SELECT {} FROM location l WHERE l.active = 1 AND l.velocity_class = ?1 ORDER BY l.location_id",
            LOCATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![velocity.as_str()], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 已存放同一 SKU 可用批次的启用货位，附带该 SKU 的现存数量
    pub(crate) fn list_holding_sku_in(
        conn: &Connection,
        sku_id: i64,
    ) -> RepositoryResult<Vec<(Location, i64)>> {
        let sql = format!(
            r#"
            SELECT {}, SUM(ol.quantity) AS existing_qty
            FROM location l
            JOIN ownership_lot ol ON ol.location_id = l.location_id
            WHERE l.active = 1
              AND ol.sku_id = ?1
              AND ol.status = 'AVAILABLE'
              AND ol.quantity > 0
            GROUP BY l.location_id
            ORDER BY l.location_id
            "#,
            LOCATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![sku_id], |row| {
                Ok((Self::map_row(row)?, row.get::<_, i64>(20)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 当前存放食品类 SKU 的货位集合
    pub(crate) fn food_location_ids_in(conn: &Connection) -> RepositoryResult<HashSet<i64>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT DISTINCT ps.location_id
            FROM physical_stock ps
            JOIN sku s ON s.sku_id = ps.sku_id
            WHERE s.food_category = 1 AND ps.quantity > 0
            "#,
        )?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    /// 各区启用货位的平均占用率（%，单货位钳制在 [0,100]）
    pub(crate) fn zone_average_occupancy_in(
        conn: &Connection,
    ) -> RepositoryResult<HashMap<String, f64>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT zone,
                   AVG(CASE
                         WHEN max_volume <= 0 THEN 100.0
                         ELSE MIN(100.0, MAX(0.0, occupied_volume * 100.0 / max_volume))
                       END)
            FROM location
            WHERE active = 1
            GROUP BY zone
            "#,
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(rows)
    }
}
