// ==========================================
// 引擎层单元测试夹具（内存库）
// ==========================================

use crate::db::{configure_sqlite_connection, init_schema, SharedConnection};
use crate::domain::location::Location;
use crate::domain::order::{NewOrder, NewOrderLine};
use crate::domain::sku::Sku;
use crate::domain::stock::PutAwayTask;
use crate::domain::types::{LocationType, OrderStatus, VelocityClass};
use crate::engine::inventory_ledger::InventoryLedger;
use crate::repository::{LocationRepository, OrderRepository, SkuRepository};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub fn memory_conn() -> SharedConnection {
    let conn = Connection::open_in_memory().unwrap();
    configure_sqlite_connection(&conn).unwrap();
    init_schema(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

pub fn sku(code: &str) -> Sku {
    Sku {
        sku_id: 0,
        code: code.to_string(),
        description: None,
        length_cm: 10.0,
        width_cm: 10.0,
        height_cm: 10.0,
        unit_weight_kg: 1.0,
        unit_volume: 1.0,
        hazardous: false,
        fragile: false,
        requires_temp_control: false,
        temp_min: None,
        temp_max: None,
        food_category: false,
        food_incompatible: false,
    }
}

pub fn location(code: &str, zone: &str, velocity: VelocityClass, x: f64, y: f64) -> Location {
    Location {
        location_id: 0,
        code: code.to_string(),
        zone: zone.to_string(),
        velocity_class: velocity,
        location_type: LocationType::Shelf,
        x: Some(x),
        y: Some(y),
        z: Some(0.0),
        width_cm: 100.0,
        depth_cm: 100.0,
        height_cm: 100.0,
        max_volume: 1000.0,
        max_weight_kg: 100.0,
        occupied_volume: 0.0,
        occupied_weight_kg: 0.0,
        hazmat_allowed: false,
        temperature_controlled: false,
        current_temperature: None,
        active: true,
        picking_priority: 0,
    }
}

pub fn insert_sku(conn: &SharedConnection, sku: &Sku) -> i64 {
    SkuRepository::upsert_in(&conn.lock().unwrap(), sku).unwrap()
}

pub fn insert_location(conn: &SharedConnection, location: &Location) -> i64 {
    LocationRepository::upsert_in(&conn.lock().unwrap(), location).unwrap()
}

pub fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

/// 直接提交一笔上架（体积/重量按每件 1.0 计）
pub fn stock(
    conn: &SharedConnection,
    tenant_id: i64,
    sku_id: i64,
    location_id: i64,
    quantity: i64,
    load_date: &str,
) -> i64 {
    let mut task = PutAwayTask::new(sku_id, tenant_id, quantity, quantity as f64, quantity as f64 * 0.1);
    task.load_date = Some(date(load_date));
    task.unit_cost = Some(1.0);
    InventoryLedger::new(conn.clone())
        .commit_put_away(&task, location_id, "fixture")
        .unwrap()
        .lot_id
}

pub fn order(
    conn: &SharedConnection,
    number: &str,
    tenant_id: i64,
    priority: i32,
    order_date: &str,
    lines: &[(i64, i64)],
) -> i64 {
    OrderRepository::from_connection(conn.clone())
        .create(&NewOrder {
            order_number: number.to_string(),
            tenant_id,
            service_level: None,
            priority,
            order_date: date(order_date),
            promised_date: None,
            status: OrderStatus::New,
            lines: lines
                .iter()
                .map(|&(sku_id, quantity)| NewOrderLine { sku_id, quantity })
                .collect(),
        })
        .unwrap()
}
