// ==========================================
// 库存账本集成测试
// ==========================================
// 职责: 验证上架/拣货/调拨后的账本守恒与货位占用边界
// 场景: 两个批次 (A 旧 10 件, B 新 10 件) → 拣 15 → 调拨 3
// ==========================================

mod test_helpers;

use test_helpers::*;
use warehouse_slotting::config::{AllocationConfig, RouteConfig, WaveConfig};
use warehouse_slotting::domain::stock::{PickRequest, PutAwayTask};
use warehouse_slotting::domain::types::{MovementType, WaveType};
use warehouse_slotting::domain::wave::{PickTask, WaveScope};
use warehouse_slotting::engine::{
    EngineError, InventoryLedger, PickAllocationEngine, TransferRequest, WaveBuilder,
};
use warehouse_slotting::repository::{MovementQuery, MovementRepository, StockRepository};

struct Scenario {
    _db: tempfile::NamedTempFile,
    conn: warehouse_slotting::db::SharedConnection,
    sku_id: i64,
    loc_a: i64,
    loc_b: i64,
    lot_a: i64,
    lot_b: i64,
}

fn scenario() -> Scenario {
    let (db, conn) = create_test_db().unwrap();
    let sku_id = SkuBuilder::new("SKU-1").insert(&conn);
    let loc_a = LocationBuilder::new("A-01", "A").at(1.0, 0.0).insert(&conn);
    let loc_b = LocationBuilder::new("B-01", "B").at(5.0, 0.0).insert(&conn);
    let lot_a = seed_stock(&conn, 1, sku_id, loc_a, 10, "2024-01-01");
    let lot_b = seed_stock(&conn, 1, sku_id, loc_b, 10, "2024-02-01");
    Scenario {
        _db: db,
        conn,
        sku_id,
        loc_a,
        loc_b,
        lot_a,
        lot_b,
    }
}

/// 组一个波次把旧批次 A 的 10 件全部挂到 QUEUED 任务上
fn queue_wave_on_lot_a(s: &Scenario) -> Vec<PickTask> {
    seed_order(&s.conn, "SO-1", 1, 5, &[(s.sku_id, 10)]);
    let built = WaveBuilder::new(
        s.conn.clone(),
        WaveConfig::default(),
        AllocationConfig::default(),
        RouteConfig::default(),
    )
    .build_wave(WaveType::WavePicking, WaveScope::default())
    .unwrap();
    assert_eq!(built.tasks.len(), 1);
    assert_eq!(built.tasks[0].location_id, s.loc_a);
    built.tasks
}

fn assert_all_balanced(conn: &warehouse_slotting::db::SharedConnection) {
    let entries = InventoryLedger::new(conn.clone()).reconcile_all().unwrap();
    assert!(!entries.is_empty());
    for entry in entries {
        assert!(entry.is_balanced(), "账本不平衡: {:?}", entry);
    }
}

#[test]
fn test_fifo_pick_takes_oldest_lot_first() {
    let s = scenario();
    let allocation = PickAllocationEngine::new(s.conn.clone(), AllocationConfig::default())
        .allocate(PickRequest {
            sku_id: s.sku_id,
            tenant_id: 1,
            quantity: 15,
        })
        .unwrap();

    let parts: Vec<(i64, i64)> = allocation.parts.iter().map(|p| (p.lot_id, p.quantity)).collect();
    assert_eq!(parts, vec![(s.lot_a, 10), (s.lot_b, 5)]);
    assert!(!allocation.insufficient_stock);

    let receipt = InventoryLedger::new(s.conn.clone())
        .execute_pick(&allocation, "picker")
        .unwrap();
    assert_eq!(receipt.picked_qty, 15);
    assert_eq!(receipt.movement_ids.len(), 2);

    assert_eq!(logical(&s.conn, 1, s.sku_id).available, 5);
    assert!(location(&s.conn, s.loc_a).occupied_volume.abs() < 1e-9);
    assert!((location(&s.conn, s.loc_b).occupied_volume - 5.0).abs() < 1e-9);
    assert_all_balanced(&s.conn);
}

#[test]
fn test_insufficient_stock_mutates_nothing() {
    let s = scenario();
    let allocation = PickAllocationEngine::new(s.conn.clone(), AllocationConfig::default())
        .allocate(PickRequest {
            sku_id: s.sku_id,
            tenant_id: 1,
            quantity: 25,
        })
        .unwrap();
    assert!(allocation.insufficient_stock);
    assert_eq!(allocation.allocated_qty, 20);

    let err = InventoryLedger::new(s.conn.clone())
        .execute_pick(&allocation, "picker")
        .unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_STOCK");
    assert_eq!(logical(&s.conn, 1, s.sku_id).available, 20);
    assert!((location(&s.conn, s.loc_a).occupied_volume - 10.0).abs() < 1e-9);
}

#[test]
fn test_other_tenant_cannot_pick_foreign_lots() {
    let s = scenario();
    let allocation = PickAllocationEngine::new(s.conn.clone(), AllocationConfig::default())
        .allocate(PickRequest {
            sku_id: s.sku_id,
            tenant_id: 2,
            quantity: 1,
        })
        .unwrap();
    assert!(allocation.insufficient_stock);
    assert!(allocation.parts.is_empty());
}

#[test]
fn test_transfer_moves_occupancy_and_keeps_logical() {
    let s = scenario();
    let ledger = InventoryLedger::new(s.conn.clone());
    let receipt = ledger
        .transfer(
            &TransferRequest {
                sku_id: s.sku_id,
                from_location_id: s.loc_a,
                to_location_id: s.loc_b,
                quantity: 4,
            },
            "mover",
        )
        .unwrap();
    assert_eq!(receipt.moved_qty, 4);
    assert_eq!(receipt.parts.len(), 1);
    assert_eq!(receipt.parts[0].source_lot_id, s.lot_a);

    let stock = StockRepository::from_connection(s.conn.clone());
    assert_eq!(stock.find_lot(s.lot_a).unwrap().unwrap().quantity, 6);
    assert_eq!(
        stock.find_lot(receipt.parts[0].new_lot_id).unwrap().unwrap().location_id,
        s.loc_b
    );

    assert_eq!(logical(&s.conn, 1, s.sku_id).available, 20);
    assert!((location(&s.conn, s.loc_a).occupied_volume - 6.0).abs() < 1e-9);
    assert!((location(&s.conn, s.loc_b).occupied_volume - 14.0).abs() < 1e-9);

    let transfers = MovementRepository::from_connection(s.conn.clone())
        .query(&MovementQuery {
            sku_id: Some(s.sku_id),
            movement_type: Some(MovementType::Transfer),
            ..MovementQuery::default()
        })
        .unwrap();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].from_location_id, Some(s.loc_a));
    assert_eq!(transfers[0].to_location_id, Some(s.loc_b));
    assert_all_balanced(&s.conn);
}

#[test]
fn test_transfer_rejects_same_location_and_overdraw() {
    let s = scenario();
    let ledger = InventoryLedger::new(s.conn.clone());
    let same = TransferRequest {
        sku_id: s.sku_id,
        from_location_id: s.loc_a,
        to_location_id: s.loc_a,
        quantity: 1,
    };
    assert_eq!(ledger.transfer(&same, "mover").unwrap_err().code(), "INVALID_INPUT");

    let overdraw = TransferRequest {
        to_location_id: s.loc_b,
        quantity: 11,
        ..same
    };
    assert_eq!(
        ledger.transfer(&overdraw, "mover").unwrap_err().code(),
        "INSUFFICIENT_STOCK"
    );
    assert!((location(&s.conn, s.loc_a).occupied_volume - 10.0).abs() < 1e-9);
}

#[test]
fn test_ad_hoc_pick_skips_lots_held_by_queued_tasks() {
    let s = scenario();
    queue_wave_on_lot_a(&s);

    let allocation = PickAllocationEngine::new(s.conn.clone(), AllocationConfig::default())
        .allocate(PickRequest {
            sku_id: s.sku_id,
            tenant_id: 1,
            quantity: 5,
        })
        .unwrap();
    let parts: Vec<(i64, i64)> = allocation.parts.iter().map(|p| (p.lot_id, p.quantity)).collect();
    assert_eq!(parts, vec![(s.lot_b, 5)]);
}

#[test]
fn test_stale_allocation_cannot_take_lots_queued_after_it() {
    let s = scenario();
    let allocation = PickAllocationEngine::new(s.conn.clone(), AllocationConfig::default())
        .allocate(PickRequest {
            sku_id: s.sku_id,
            tenant_id: 1,
            quantity: 5,
        })
        .unwrap();
    assert_eq!(allocation.parts[0].lot_id, s.lot_a);
    queue_wave_on_lot_a(&s);

    let err = InventoryLedger::new(s.conn.clone())
        .execute_pick(&allocation, "picker")
        .unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_STOCK");
    assert!((location(&s.conn, s.loc_a).occupied_volume - 10.0).abs() < 1e-9);
    assert_all_balanced(&s.conn);
}

#[test]
fn test_transfer_cannot_move_stock_held_by_queued_tasks() {
    let s = scenario();
    queue_wave_on_lot_a(&s);
    let ledger = InventoryLedger::new(s.conn.clone());

    let err = ledger
        .transfer(
            &TransferRequest {
                sku_id: s.sku_id,
                from_location_id: s.loc_a,
                to_location_id: s.loc_b,
                quantity: 1,
            },
            "mover",
        )
        .unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_STOCK");
    match err {
        EngineError::InsufficientLocationStock {
            location_id,
            available,
            ..
        } => {
            assert_eq!(location_id, s.loc_a);
            assert_eq!(available, 0);
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert!((location(&s.conn, s.loc_a).occupied_volume - 10.0).abs() < 1e-9);

    // 未被占用的 B 货位照常调拨
    let receipt = ledger
        .transfer(
            &TransferRequest {
                sku_id: s.sku_id,
                from_location_id: s.loc_b,
                to_location_id: s.loc_a,
                quantity: 4,
            },
            "mover",
        )
        .unwrap();
    assert_eq!(receipt.parts[0].source_lot_id, s.lot_b);
    assert_all_balanced(&s.conn);
}

#[test]
fn test_commit_rechecks_capacity_and_rolls_back() {
    let (_db, conn) = create_test_db().unwrap();
    let sku_id = SkuBuilder::new("SKU-BIG").insert(&conn);
    let loc = LocationBuilder::new("C-01", "C").capacity(100.0, 50.0).insert(&conn);

    let task = PutAwayTask::new(sku_id, 1, 10, 120.0, 5.0);
    let err = InventoryLedger::new(conn.clone())
        .commit_put_away(&task, loc, "receiver")
        .unwrap_err();
    assert_eq!(err.code(), "CAPACITY_EXCEEDED");

    assert!(location(&conn, loc).occupied_volume.abs() < 1e-9);
    assert!(StockRepository::from_connection(conn.clone())
        .find_logical(1, sku_id)
        .unwrap()
        .map_or(true, |s| s.available == 0));
    assert!(MovementRepository::from_connection(conn.clone())
        .query(&MovementQuery::default())
        .unwrap()
        .is_empty());
}

#[test]
fn test_occupancy_never_exceeds_capacity() {
    let (_db, conn) = create_test_db().unwrap();
    let sku_id = SkuBuilder::new("SKU-1").insert(&conn);
    let loc = LocationBuilder::new("D-01", "D").capacity(25.0, 100.0).insert(&conn);
    let ledger = InventoryLedger::new(conn.clone());

    let mut accepted = 0;
    for _ in 0..5 {
        let task = PutAwayTask::new(sku_id, 1, 6, 6.0, 0.6);
        if ledger.commit_put_away(&task, loc, "receiver").is_ok() {
            accepted += 1;
        }
        let l = location(&conn, loc);
        assert!(l.occupied_volume <= l.max_volume + 1e-9);
        assert!(l.occupied_weight_kg <= l.max_weight_kg + 1e-9);
    }
    assert_eq!(accepted, 4);
    assert_eq!(logical(&conn, 1, sku_id).available, 24);
    assert_all_balanced(&conn);
}
