// ==========================================
// 仓储货位与波次拣选系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键/busy_timeout）
// - 提供幂等建库脚本，测试与二进制共用同一份 schema
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 显式指定数据库路径的环境变量
pub const ENV_DB_PATH: &str = "WAREHOUSE_SLOTTING_DB_PATH";

/// 共享连接句柄（由调用方注入各仓储与引擎）
pub type SharedConnection = Arc<Mutex<Connection>>;

/// 建库脚本（幂等）
///
/// 说明：
/// - 数量字段带 CHECK (>= 0)，作为“永不为负”的最后一道防线；
/// - 占用字段带 CHECK (<= 容量)，容量竞争由提交时重校验兜底。
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_scope (
    scope_id TEXT PRIMARY KEY,
    scope_type TEXT NOT NULL,
    scope_key TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(scope_type, scope_key)
);

INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
VALUES ('global', 'GLOBAL', 'global');

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS sku (
    sku_id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    description TEXT,
    length_cm REAL NOT NULL DEFAULT 0,
    width_cm REAL NOT NULL DEFAULT 0,
    height_cm REAL NOT NULL DEFAULT 0,
    unit_weight_kg REAL NOT NULL DEFAULT 0,
    unit_volume REAL NOT NULL DEFAULT 0,
    hazardous INTEGER NOT NULL DEFAULT 0,
    fragile INTEGER NOT NULL DEFAULT 0,
    requires_temp_control INTEGER NOT NULL DEFAULT 0,
    temp_min REAL,
    temp_max REAL,
    food_category INTEGER NOT NULL DEFAULT 0,
    food_incompatible INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS location (
    location_id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    zone TEXT NOT NULL,
    velocity_class TEXT NOT NULL,
    location_type TEXT NOT NULL DEFAULT 'SHELF',
    x REAL,
    y REAL,
    z REAL,
    width_cm REAL NOT NULL DEFAULT 0,
    depth_cm REAL NOT NULL DEFAULT 0,
    height_cm REAL NOT NULL DEFAULT 0,
    max_volume REAL NOT NULL,
    max_weight_kg REAL NOT NULL,
    occupied_volume REAL NOT NULL DEFAULT 0 CHECK (occupied_volume >= 0),
    occupied_weight_kg REAL NOT NULL DEFAULT 0 CHECK (occupied_weight_kg >= 0),
    hazmat_allowed INTEGER NOT NULL DEFAULT 0,
    temperature_controlled INTEGER NOT NULL DEFAULT 0,
    current_temperature REAL,
    active INTEGER NOT NULL DEFAULT 1,
    picking_priority INTEGER NOT NULL DEFAULT 0,
    CHECK (occupied_volume <= max_volume + 1e-6),
    CHECK (occupied_weight_kg <= max_weight_kg + 1e-6)
);
CREATE INDEX IF NOT EXISTS idx_location_zone ON location(zone, velocity_class);

CREATE TABLE IF NOT EXISTS physical_stock (
    location_id INTEGER NOT NULL REFERENCES location(location_id),
    sku_id INTEGER NOT NULL REFERENCES sku(sku_id),
    quantity INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
    occupied_volume REAL NOT NULL DEFAULT 0 CHECK (occupied_volume >= 0),
    occupied_weight_kg REAL NOT NULL DEFAULT 0 CHECK (occupied_weight_kg >= 0),
    last_movement_at TEXT,
    PRIMARY KEY (location_id, sku_id)
);

CREATE TABLE IF NOT EXISTS logical_stock (
    tenant_id INTEGER NOT NULL,
    sku_id INTEGER NOT NULL REFERENCES sku(sku_id),
    available INTEGER NOT NULL DEFAULT 0 CHECK (available >= 0),
    reserved INTEGER NOT NULL DEFAULT 0 CHECK (reserved >= 0),
    in_transit INTEGER NOT NULL DEFAULT 0 CHECK (in_transit >= 0),
    quarantine INTEGER NOT NULL DEFAULT 0 CHECK (quarantine >= 0),
    avg_cost REAL NOT NULL DEFAULT 0,
    total_value REAL NOT NULL DEFAULT 0,
    PRIMARY KEY (tenant_id, sku_id)
);

CREATE TABLE IF NOT EXISTS ownership_lot (
    lot_id INTEGER PRIMARY KEY AUTOINCREMENT,
    location_id INTEGER NOT NULL REFERENCES location(location_id),
    sku_id INTEGER NOT NULL REFERENCES sku(sku_id),
    tenant_id INTEGER NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity >= 0),
    lot_code TEXT,
    load_date TEXT NOT NULL,
    expiry_date TEXT,
    unit_cost REAL NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'AVAILABLE',
    order_id INTEGER
);
CREATE INDEX IF NOT EXISTS idx_lot_fifo ON ownership_lot(sku_id, tenant_id, status, load_date);
CREATE INDEX IF NOT EXISTS idx_lot_location ON ownership_lot(location_id, sku_id);

CREATE TABLE IF NOT EXISTS movement (
    movement_id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL,
    sku_id INTEGER NOT NULL,
    movement_type TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    from_location_id INTEGER,
    to_location_id INTEGER,
    operator TEXT NOT NULL,
    wave_id INTEGER,
    order_id INTEGER,
    lot_id INTEGER,
    unit_cost REAL,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    duration_s REAL,
    distance_m REAL,
    notes TEXT
);
CREATE INDEX IF NOT EXISTS idx_movement_sku_ts ON movement(sku_id, started_at);

CREATE TABLE IF NOT EXISTS outbound_order (
    order_id INTEGER PRIMARY KEY AUTOINCREMENT,
    order_number TEXT NOT NULL UNIQUE,
    tenant_id INTEGER NOT NULL,
    service_level TEXT,
    priority INTEGER NOT NULL DEFAULT 0,
    order_date TEXT NOT NULL,
    promised_date TEXT,
    status TEXT NOT NULL DEFAULT 'NEW'
);
CREATE INDEX IF NOT EXISTS idx_order_status ON outbound_order(status, order_date);

CREATE TABLE IF NOT EXISTS order_line (
    line_id INTEGER PRIMARY KEY AUTOINCREMENT,
    order_id INTEGER NOT NULL REFERENCES outbound_order(order_id),
    sku_id INTEGER NOT NULL REFERENCES sku(sku_id),
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    picked_qty INTEGER NOT NULL DEFAULT 0 CHECK (picked_qty >= 0)
);

CREATE TABLE IF NOT EXISTS unit_load (
    unit_load_id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    location_id INTEGER NOT NULL REFERENCES location(location_id),
    status TEXT NOT NULL DEFAULT 'PARTIAL'
);

CREATE TABLE IF NOT EXISTS unit_load_content (
    unit_load_id INTEGER NOT NULL REFERENCES unit_load(unit_load_id),
    sku_id INTEGER NOT NULL REFERENCES sku(sku_id),
    tenant_id INTEGER NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity >= 0),
    PRIMARY KEY (unit_load_id, sku_id, tenant_id)
);

CREATE TABLE IF NOT EXISTS wave (
    wave_id INTEGER PRIMARY KEY AUTOINCREMENT,
    wave_number TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL,
    wave_type TEXT NOT NULL,
    tenant_id INTEGER,
    min_priority INTEGER,
    date_from TEXT,
    date_to TEXT,
    max_orders INTEGER NOT NULL,
    total_orders INTEGER NOT NULL DEFAULT 0,
    total_lines INTEGER NOT NULL DEFAULT 0,
    total_picks INTEGER NOT NULL DEFAULT 0,
    est_distance_m REAL NOT NULL DEFAULT 0,
    est_time_s REAL NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT
);

CREATE TABLE IF NOT EXISTS pick_task (
    task_id INTEGER PRIMARY KEY AUTOINCREMENT,
    wave_id INTEGER NOT NULL REFERENCES wave(wave_id),
    order_id INTEGER NOT NULL REFERENCES outbound_order(order_id),
    line_id INTEGER NOT NULL REFERENCES order_line(line_id),
    tenant_id INTEGER NOT NULL,
    sku_id INTEGER NOT NULL,
    location_id INTEGER NOT NULL REFERENCES location(location_id),
    unit_load_id INTEGER,
    requested_qty INTEGER NOT NULL CHECK (requested_qty > 0),
    picked_qty INTEGER NOT NULL DEFAULT 0 CHECK (picked_qty >= 0),
    sequence_no INTEGER NOT NULL,
    zone TEXT NOT NULL,
    distance_from_prev_m REAL NOT NULL DEFAULT 0,
    est_seconds REAL NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'QUEUED'
);
CREATE INDEX IF NOT EXISTS idx_pick_task_wave ON pick_task(wave_id, sequence_no);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开连接并包装为共享句柄
pub fn open_shared_connection(db_path: &str) -> rusqlite::Result<SharedConnection> {
    Ok(Arc::new(Mutex::new(open_sqlite_connection(db_path)?)))
}

/// 执行建库脚本并登记 schema_version（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 默认数据库路径
///
/// 优先级: WAREHOUSE_SLOTTING_DB_PATH → 用户数据目录 → 当前目录
pub fn default_db_path() -> PathBuf {
    if let Ok(path) = std::env::var(ENV_DB_PATH) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    match dirs::data_dir() {
        Some(data_dir) => {
            // 开发环境使用独立目录，避免污染生产数据
            let dir = if cfg!(debug_assertions) {
                data_dir.join("warehouse-slotting-dev")
            } else {
                data_dir.join("warehouse-slotting")
            };
            if std::fs::create_dir_all(&dir).is_ok() {
                dir.join("warehouse_slotting.db")
            } else {
                PathBuf::from("./warehouse_slotting.db")
            }
        }
        None => PathBuf::from("./warehouse_slotting.db"),
    }
}
