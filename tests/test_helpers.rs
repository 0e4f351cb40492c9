// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据生成等功能
// ==========================================

#![allow(dead_code)]

use std::error::Error;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tempfile::NamedTempFile;
use warehouse_slotting::db::{init_schema, open_sqlite_connection, SharedConnection};
use warehouse_slotting::domain::location::Location;
use warehouse_slotting::domain::order::{NewOrder, NewOrderLine};
use warehouse_slotting::domain::sku::Sku;
use warehouse_slotting::domain::stock::{LogicalStock, PutAwayTask};
use warehouse_slotting::domain::types::{LocationType, OrderStatus, VelocityClass};
use warehouse_slotting::engine::InventoryLedger;
use warehouse_slotting::repository::{
    LocationRepository, OrderRepository, SkuRepository, StockRepository,
};

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - SharedConnection: 已建库的共享连接
pub fn create_test_db() -> Result<(NamedTempFile, SharedConnection), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径非 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, Arc::new(Mutex::new(conn))))
}

pub fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

// ==========================================
// Sku 构建器
// ==========================================

pub struct SkuBuilder {
    sku: Sku,
}

impl SkuBuilder {
    pub fn new(code: &str) -> Self {
        Self {
            sku: Sku {
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
            },
        }
    }

    pub fn unit(mut self, volume: f64, weight_kg: f64) -> Self {
        self.sku.unit_volume = volume;
        self.sku.unit_weight_kg = weight_kg;
        self
    }

    pub fn chilled(mut self, min: f64, max: f64) -> Self {
        self.sku.requires_temp_control = true;
        self.sku.temp_min = Some(min);
        self.sku.temp_max = Some(max);
        self
    }

    pub fn build(self) -> Sku {
        self.sku
    }

    pub fn insert(self, conn: &SharedConnection) -> i64 {
        SkuRepository::from_connection(conn.clone())
            .upsert(&self.sku)
            .unwrap()
    }
}

// ==========================================
// Location 构建器
// ==========================================

pub struct LocationBuilder {
    location: Location,
}

impl LocationBuilder {
    pub fn new(code: &str, zone: &str) -> Self {
        Self {
            location: Location {
                location_id: 0,
                code: code.to_string(),
                zone: zone.to_string(),
                velocity_class: VelocityClass::Warm,
                location_type: LocationType::Shelf,
                x: Some(0.0),
                y: Some(0.0),
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
            },
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.location.x = Some(x);
        self.location.y = Some(y);
        self
    }

    pub fn velocity(mut self, velocity: VelocityClass) -> Self {
        self.location.velocity_class = velocity;
        self
    }

    pub fn capacity(mut self, max_volume: f64, max_weight_kg: f64) -> Self {
        self.location.max_volume = max_volume;
        self.location.max_weight_kg = max_weight_kg;
        self
    }

    pub fn build(self) -> Location {
        self.location
    }

    pub fn insert(self, conn: &SharedConnection) -> i64 {
        LocationRepository::from_connection(conn.clone())
            .upsert(&self.location)
            .unwrap()
    }
}

// ==========================================
// 库存/订单种子数据
// ==========================================

/// 按指定货位上架（每件体积 1.0，重量 0.1kg）
pub fn seed_stock(
    conn: &SharedConnection,
    tenant_id: i64,
    sku_id: i64,
    location_id: i64,
    quantity: i64,
    load_date: &str,
) -> i64 {
    let mut task = PutAwayTask::new(
        sku_id,
        tenant_id,
        quantity,
        quantity as f64,
        quantity as f64 * 0.1,
    );
    task.load_date = Some(date(load_date));
    task.unit_cost = Some(2.0);
    InventoryLedger::new(conn.clone())
        .commit_put_away(&task, location_id, "seed")
        .unwrap()
        .lot_id
}

pub fn seed_order(
    conn: &SharedConnection,
    number: &str,
    tenant_id: i64,
    priority: i32,
    lines: &[(i64, i64)],
) -> i64 {
    OrderRepository::from_connection(conn.clone())
        .create(&NewOrder {
            order_number: number.to_string(),
            tenant_id,
            service_level: None,
            priority,
            order_date: date("2024-03-01"),
            promised_date: None,
            status: OrderStatus::Confirmed,
            lines: lines
                .iter()
                .map(|&(sku_id, quantity)| NewOrderLine { sku_id, quantity })
                .collect(),
        })
        .unwrap()
}

pub fn logical(conn: &SharedConnection, tenant_id: i64, sku_id: i64) -> LogicalStock {
    StockRepository::from_connection(conn.clone())
        .find_logical(tenant_id, sku_id)
        .unwrap()
        .expect("logical stock row")
}

pub fn location(conn: &SharedConnection, location_id: i64) -> Location {
    LocationRepository::from_connection(conn.clone())
        .find_by_id(location_id)
        .unwrap()
        .expect("location row")
}
