// ==========================================
// 仓储货位与波次拣选系统 - 库存三层仓储
// ==========================================
// 职责: physical_stock / logical_stock / ownership_lot 的行级读写
// 红线: Repository 不含业务逻辑；多表一致性由 InventoryLedger 在事务内保证
// 约束: 所有扣减均为带条件更新，返回 false 表示数量不足（并发竞争）
// ==========================================

use crate::db::{open_sqlite_connection, SharedConnection};
use crate::domain::stock::{LogicalStock, NewOwnershipLot, OwnershipLot, PhysicalStock};
use crate::domain::types::LotStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_mapping::{
    fmt_date, fmt_datetime, parse_date, parse_enum, parse_opt_date, parse_opt_datetime,
};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

const LOT_COLUMNS: &str = r#"
    ol.lot_id, ol.location_id, ol.sku_id, ol.tenant_id, ol.quantity, ol.lot_code,
    ol.load_date, ol.expiry_date, ol.unit_cost, ol.status, ol.order_id
"#;

/// 批次及其所在货位的坐标信息（分配排序用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotWithLocation {
    pub lot: OwnershipLot,
    pub location_code: String,
    pub zone: String,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

// ==========================================
// StockRepository - 库存仓储
// ==========================================
pub struct StockRepository {
    conn: SharedConnection,
}

impl StockRepository {
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

    fn map_lot(row: &Row<'_>) -> rusqlite::Result<OwnershipLot> {
        Ok(OwnershipLot {
            lot_id: row.get(0)?,
            location_id: row.get(1)?,
            sku_id: row.get(2)?,
            tenant_id: row.get(3)?,
            quantity: row.get(4)?,
            lot_code: row.get(5)?,
            load_date: parse_date(6, &row.get::<_, String>(6)?)?,
            expiry_date: parse_opt_date(7, row.get(7)?)?,
            unit_cost: row.get(8)?,
            status: parse_enum(9, &row.get::<_, String>(9)?)?,
            order_id: row.get(10)?,
        })
    }

    fn map_physical(row: &Row<'_>) -> rusqlite::Result<PhysicalStock> {
        Ok(PhysicalStock {
            location_id: row.get(0)?,
            sku_id: row.get(1)?,
            quantity: row.get(2)?,
            occupied_volume: row.get(3)?,
            occupied_weight_kg: row.get(4)?,
            last_movement_at: parse_opt_datetime(5, row.get(5)?)?,
        })
    }

    fn map_logical(row: &Row<'_>) -> rusqlite::Result<LogicalStock> {
        Ok(LogicalStock {
            tenant_id: row.get(0)?,
            sku_id: row.get(1)?,
            available: row.get(2)?,
            reserved: row.get(3)?,
            in_transit: row.get(4)?,
            quarantine: row.get(5)?,
            avg_cost: row.get(6)?,
            total_value: row.get(7)?,
        })
    }

    // ==========================================
    // 物理库存 physical_stock
    // ==========================================

    pub(crate) fn find_physical_in(
        conn: &Connection,
        location_id: i64,
        sku_id: i64,
    ) -> RepositoryResult<Option<PhysicalStock>> {
        Ok(conn
            .query_row(
                r#"
                SELECT location_id, sku_id, quantity, occupied_volume, occupied_weight_kg, last_movement_at
                FROM physical_stock
                WHERE location_id = ?1 AND sku_id = ?2
                "#,
                params![location_id, sku_id],
                Self::map_physical,
            )
            .optional()?)
    }

    /// 增加物理库存（不存在则插入）
    pub(crate) fn add_physical_in(
        conn: &Connection,
        location_id: i64,
        sku_id: i64,
        quantity: i64,
        volume: f64,
        weight_kg: f64,
        at: NaiveDateTime,
    ) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO physical_stock (
                location_id, sku_id, quantity, occupied_volume, occupied_weight_kg, last_movement_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(location_id, sku_id) DO UPDATE SET
                quantity = quantity + excluded.quantity,
                occupied_volume = occupied_volume + excluded.occupied_volume,
                occupied_weight_kg = occupied_weight_kg + excluded.occupied_weight_kg,
                last_movement_at = excluded.last_movement_at
            "#,
            params![location_id, sku_id, quantity, volume, weight_kg, fmt_datetime(at)],
        )?;
        Ok(())
    }

    /// 扣减物理库存（数量不足返回 false；体积/重量下限钳制为 0）
    pub(crate) fn remove_physical_in(
        conn: &Connection,
        location_id: i64,
        sku_id: i64,
        quantity: i64,
        volume: f64,
        weight_kg: f64,
        at: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        let updated = conn.execute(
            r#"
            UPDATE physical_stock
            SET quantity = quantity - ?3,
                occupied_volume = MAX(0.0, occupied_volume - ?4),
                occupied_weight_kg = MAX(0.0, occupied_weight_kg - ?5),
                last_movement_at = ?6
            WHERE location_id = ?1 AND sku_id = ?2 AND quantity >= ?3
            "#,
            params![location_id, sku_id, quantity, volume, weight_kg, fmt_datetime(at)],
        )?;
        Ok(updated == 1)
    }

    /// 货位上的物理库存行（数量降序，sku_id 升序）
    pub fn list_physical_at_location(
        &self,
        location_id: i64,
    ) -> RepositoryResult<Vec<PhysicalStock>> {
        let conn = self.get_conn()?;
        Self::list_physical_at_location_in(&conn, location_id)
    }

    pub(crate) fn list_physical_at_location_in(
        conn: &Connection,
        location_id: i64,
    ) -> RepositoryResult<Vec<PhysicalStock>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT location_id, sku_id, quantity, occupied_volume, occupied_weight_kg, last_movement_at
            FROM physical_stock
            WHERE location_id = ?1 AND quantity > 0
            ORDER BY quantity DESC, sku_id ASC
            "#,
        )?;
        let rows = stmt
            .query_map(params![location_id], Self::map_physical)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ==========================================
    // 逻辑库存 logical_stock
    // ==========================================

    pub fn find_logical(&self, tenant_id: i64, sku_id: i64) -> RepositoryResult<Option<LogicalStock>> {
        let conn = self.get_conn()?;
        Self::find_logical_in(&conn, tenant_id, sku_id)
    }

    pub(crate) fn find_logical_in(
        conn: &Connection,
        tenant_id: i64,
        sku_id: i64,
    ) -> RepositoryResult<Option<LogicalStock>> {
        Ok(conn
            .query_row(
                r#"
                SELECT tenant_id, sku_id, available, reserved, in_transit, quarantine, avg_cost, total_value
                FROM logical_stock
                WHERE tenant_id = ?1 AND sku_id = ?2
                "#,
                params![tenant_id, sku_id],
                Self::map_logical,
            )
            .optional()?)
    }

    pub(crate) fn list_logical_in(conn: &Connection) -> RepositoryResult<Vec<LogicalStock>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT tenant_id, sku_id, available, reserved, in_transit, quarantine, avg_cost, total_value
            FROM logical_stock
            ORDER BY tenant_id, sku_id
            "#,
        )?;
        let rows = stmt
            .query_map([], Self::map_logical)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 增加可用量并按加权平均更新成本
    ///
    /// # 说明
    /// - SET 子句右侧引用的均为更新前的旧值
    pub(crate) fn add_available_in(
        conn: &Connection,
        tenant_id: i64,
        sku_id: i64,
        quantity: i64,
        unit_cost: f64,
    ) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO logical_stock (
                tenant_id, sku_id, available, reserved, in_transit, quarantine, avg_cost, total_value
            ) VALUES (?1, ?2, ?3, 0, 0, 0, ?4, ?3 * ?4)
            ON CONFLICT(tenant_id, sku_id) DO UPDATE SET
                available = available + excluded.available,
                total_value = total_value + excluded.total_value,
                avg_cost = CASE
                    WHEN available + reserved + in_transit + excluded.available > 0
                    THEN (total_value + excluded.total_value)
                         / (available + reserved + in_transit + excluded.available)
                    ELSE avg_cost
                END
            "#,
            params![tenant_id, sku_id, quantity, unit_cost],
        )?;
        Ok(())
    }

    /// 扣减可用量（出库）
    pub(crate) fn take_available_in(
        conn: &Connection,
        tenant_id: i64,
        sku_id: i64,
        quantity: i64,
    ) -> RepositoryResult<bool> {
        let updated = conn.execute(
            r#"
            UPDATE logical_stock
            SET available = available - ?3,
                total_value = MAX(0.0, total_value - ?3 * avg_cost)
            WHERE tenant_id = ?1 AND sku_id = ?2 AND available >= ?3
            "#,
            params![tenant_id, sku_id, quantity],
        )?;
        Ok(updated == 1)
    }

    /// 预留：available → reserved
    pub(crate) fn reserve_in(
        conn: &Connection,
        tenant_id: i64,
        sku_id: i64,
        quantity: i64,
    ) -> RepositoryResult<bool> {
        let updated = conn.execute(
            r#"
            UPDATE logical_stock
            SET available = available - ?3,
                reserved = reserved + ?3
            WHERE tenant_id = ?1 AND sku_id = ?2 AND available >= ?3
            "#,
            params![tenant_id, sku_id, quantity],
        )?;
        Ok(updated == 1)
    }

    /// 释放预留：reserved → available
    pub(crate) fn release_reserved_in(
        conn: &Connection,
        tenant_id: i64,
        sku_id: i64,
        quantity: i64,
    ) -> RepositoryResult<bool> {
        let updated = conn.execute(
            r#"
            UPDATE logical_stock
            SET reserved = reserved - ?3,
                available = available + ?3
            WHERE tenant_id = ?1 AND sku_id = ?2 AND reserved >= ?3
            "#,
            params![tenant_id, sku_id, quantity],
        )?;
        Ok(updated == 1)
    }

    /// 消耗预留量（波次拣货确认）
    pub(crate) fn consume_reserved_in(
        conn: &Connection,
        tenant_id: i64,
        sku_id: i64,
        quantity: i64,
    ) -> RepositoryResult<bool> {
        let updated = conn.execute(
            r#"
            UPDATE logical_stock
            SET reserved = reserved - ?3,
                total_value = MAX(0.0, total_value - ?3 * avg_cost)
            WHERE tenant_id = ?1 AND sku_id = ?2 AND reserved >= ?3
            "#,
            params![tenant_id, sku_id, quantity],
        )?;
        Ok(updated == 1)
    }

    // ==========================================
    // 归属批次 ownership_lot
    // ==========================================

    pub(crate) fn insert_lot_in(conn: &Connection, lot: &NewOwnershipLot) -> RepositoryResult<i64> {
        conn.execute(
            r#"
            INSERT INTO ownership_lot (
                location_id, sku_id, tenant_id, quantity, lot_code,
                load_date, expiry_date, unit_cost, status, order_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                lot.location_id,
                lot.sku_id,
                lot.tenant_id,
                lot.quantity,
                lot.lot_code,
                fmt_date(lot.load_date),
                lot.expiry_date.map(fmt_date),
                lot.unit_cost,
                lot.status.as_str(),
                lot.order_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_lot(&self, lot_id: i64) -> RepositoryResult<Option<OwnershipLot>> {
        let conn = self.get_conn()?;
        Self::find_lot_in(&conn, lot_id)
    }

    pub(crate) fn find_lot_in(conn: &Connection, lot_id: i64) -> RepositoryResult<Option<OwnershipLot>> {
        let sql = format!("SELECT {} FROM ownership_lot ol WHERE ol.lot_id = ?1", LOT_COLUMNS);
        Ok(conn
            .query_row(&sql, params![lot_id], Self::map_lot)
            .optional()?)
    }

    /// 扣减批次数量（不足返回 false）
    pub(crate) fn decrement_lot_in(
        conn: &Connection,
        lot_id: i64,
        quantity: i64,
    ) -> RepositoryResult<bool> {
        let updated = conn.execute(
            "UPDATE ownership_lot SET quantity = quantity - ?2 WHERE lot_id = ?1 AND quantity >= ?2",
            params![lot_id, quantity],
        )?;
        Ok(updated == 1)
    }

    /// 某租户某 SKU 在启用货位上的可用批次（未排序，排序由分配引擎决定）
    pub(crate) fn list_available_lots_in(
        conn: &Connection,
        sku_id: i64,
        tenant_id: i64,
    ) -> RepositoryResult<Vec<LotWithLocation>> {
        let sql = format!(
            r#"
            SELECT {}, l.code, l.zone, l.x, l.y
            FROM ownership_lot ol
            JOIN location l ON l.location_id = ol.location_id
            WHERE ol.sku_id = ?1
              AND ol.tenant_id = ?2
              AND ol.status = ?3
              AND ol.quantity > 0
              AND l.active = 1
            "#,
            LOT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![sku_id, tenant_id, LotStatus::Available.as_str()],
                |row| {
                    Ok(LotWithLocation {
                        lot: Self::map_lot(row)?,
                        location_code: row.get(11)?,
                        zone: row.get(12)?,
                        x: row.get(13)?,
                        y: row.get(14)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 货位上某 SKU 的可用批次（load_date 升序，lot_id 升序）
    ///
    /// # 参数
    /// - tenant_id: None 表示不区分租户（调拨按货位整体搬移）
    pub(crate) fn list_lots_at_location_in(
        conn: &Connection,
        location_id: i64,
        sku_id: i64,
        tenant_id: Option<i64>,
    ) -> RepositoryResult<Vec<OwnershipLot>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM ownership_lot ol
            WHERE ol.location_id = ?1
              AND ol.sku_id = ?2
              AND (?3 IS NULL OR ol.tenant_id = ?3)
              AND ol.status = 'AVAILABLE'
              AND ol.quantity > 0
            ORDER BY ol.load_date ASC, ol.lot_id ASC
            "#,
            LOT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![location_id, sku_id, tenant_id], Self::map_lot)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 存放某租户某 SKU 可用批次的货位区域（每个货位一条）
    pub(crate) fn stock_zones_in(
        conn: &Connection,
        sku_id: i64,
        tenant_id: i64,
    ) -> RepositoryResult<Vec<String>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT l.zone
            FROM location l
            WHERE l.active = 1
              AND l.location_id IN (
                  SELECT ol.location_id FROM ownership_lot ol
                  WHERE ol.sku_id = ?1 AND ol.tenant_id = ?2
                    AND ol.status = 'AVAILABLE' AND ol.quantity > 0
              )
            ORDER BY l.location_id
            "#,
        )?;
        let zones = stmt
            .query_map(params![sku_id, tenant_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(zones)
    }

    /// 按 (tenant, sku) 汇总非损坏批次数量
    pub(crate) fn lot_totals_in(
        conn: &Connection,
        filter: Option<(i64, i64)>,
    ) -> RepositoryResult<BTreeMap<(i64, i64), i64>> {
        let (tenant_id, sku_id) = match filter {
            Some((t, s)) => (Some(t), Some(s)),
            None => (None, None),
        };
        let mut stmt = conn.prepare(
            r#"
            SELECT tenant_id, sku_id, SUM(quantity)
            FROM ownership_lot
            WHERE status <> 'DAMAGED'
              AND (?1 IS NULL OR tenant_id = ?1)
              AND (?2 IS NULL OR sku_id = ?2)
            GROUP BY tenant_id, sku_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![tenant_id, sku_id], |row| {
                Ok(((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?), row.get::<_, i64>(2)?))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(rows)
    }
}
