use super::*;
use crate::domain::order::Order;
use crate::domain::types::{UnitLoadStatus, VelocityClass};
use crate::domain::unit_load::UnitLoadContent;
use crate::domain::wave::UnfulfillableReason;
use crate::engine::test_fixtures::{
    date, insert_location, insert_sku, location, memory_conn, order, sku, stock,
};
use crate::repository::UnitLoadRepository;

// ==========================================
// 选单策略
// ==========================================

fn eligible(order_id: i64, zone: Option<&str>, priority: i32, line_count: i64, sku_ids: &[i64]) -> EligibleOrder {
    EligibleOrder {
        order: Order {
            order_id,
            order_number: format!("SO-{}", order_id),
            tenant_id: 1,
            service_level: None,
            priority,
            order_date: date("2024-03-01"),
            promised_date: None,
            status: OrderStatus::New,
        },
        line_count,
        total_quantity: line_count,
        sku_ids: sku_ids.to_vec(),
        dominant_zone: zone.map(str::to_string),
    }
}

fn ids(orders: &[EligibleOrder]) -> Vec<i64> {
    orders.iter().map(|o| o.order_id()).collect()
}

#[test]
fn test_zone_round_robin_takes_one_per_zone() {
    let candidates = vec![
        eligible(1, Some("A"), 0, 1, &[1]),
        eligible(2, Some("A"), 0, 1, &[1]),
        eligible(3, Some("B"), 0, 1, &[1]),
        eligible(4, Some("B"), 0, 1, &[1]),
        eligible(5, Some("C"), 0, 1, &[1]),
    ];
    let selected = select_orders(candidates, WaveType::ZonePicking, 3, &WaveConfig::default());
    let zones: Vec<&str> = selected
        .iter()
        .filter_map(|o| o.dominant_zone.as_deref())
        .collect();
    assert_eq!(zones, vec!["A", "B", "C"]);
}

#[test]
fn test_zone_round_robin_serves_largest_bucket_first() {
    let candidates = vec![
        eligible(1, Some("B"), 0, 1, &[1]),
        eligible(2, Some("A"), 0, 1, &[1]),
        eligible(3, Some("B"), 0, 1, &[1]),
        eligible(4, Some("B"), 0, 1, &[1]),
        eligible(5, None, 0, 1, &[1]),
    ];
    let selected = select_orders(candidates, WaveType::ZonePicking, 5, &WaveConfig::default());
    // 第一轮 B(3) A(1) 无区(1)；第二轮 B(2)；第三轮 B(1)
    assert_eq!(ids(&selected), vec![1, 2, 5, 3, 4]);
}

#[test]
fn test_wave_picking_is_fifo_prefix() {
    let candidates = (1..=5).map(|i| eligible(i, None, 0, 1, &[1])).collect();
    let selected = select_orders(candidates, WaveType::WavePicking, 3, &WaveConfig::default());
    assert_eq!(ids(&selected), vec![1, 2, 3]);
}

#[test]
fn test_batch_picking_clusters_similar_orders() {
    let candidates = vec![
        eligible(1, None, 0, 2, &[1, 2]),
        eligible(2, None, 0, 4, &[1, 2, 3, 4]),
        eligible(3, None, 0, 1, &[9]),
        eligible(4, None, 0, 2, &[3, 4]),
        eligible(5, None, 0, 3, &[7, 8, 9]),
    ];
    let selected = select_orders(candidates, WaveType::BatchPicking, 10, &WaveConfig::default());
    // 种子 2 → 附加 1、4（相似度 0.5）；种子 5 → 附加 3（1/3）
    assert_eq!(ids(&selected), vec![2, 1, 4, 5, 3]);
}

#[test]
fn test_batch_picking_caps_attachments_and_total() {
    let candidates = vec![
        eligible(1, None, 0, 5, &[1, 2]),
        eligible(2, None, 0, 1, &[1, 2]),
        eligible(3, None, 0, 1, &[1, 2]),
        eligible(4, None, 0, 1, &[1, 2]),
        eligible(5, None, 0, 1, &[1, 2]),
    ];
    let selected = select_orders(candidates.clone(), WaveType::BatchPicking, 10, &WaveConfig::default());
    assert_eq!(ids(&selected), vec![1, 2, 3, 4, 5]);

    let capped = select_orders(candidates, WaveType::BatchPicking, 2, &WaveConfig::default());
    assert_eq!(ids(&capped), vec![1, 2]);
}

#[test]
fn test_discrete_picking_filters_and_caps() {
    let mut candidates = vec![
        eligible(1, None, 9, 20, &[1]),
        eligible(2, None, 1, 20, &[1]),
        eligible(3, None, 1, 5, &[1]),
    ];
    candidates.extend((10..30).map(|i| eligible(i, None, 0, 1, &[1])));
    let selected = select_orders(candidates, WaveType::DiscretePicking, 50, &WaveConfig::default());
    assert_eq!(selected.len(), 10);
    assert_eq!(&ids(&selected)[..2], &[1, 3]);
}

#[test]
fn test_jaccard_and_dominant_zone() {
    assert_eq!(jaccard(&[1, 2, 3], &[2, 3, 4]), 0.5);
    assert_eq!(jaccard(&[], &[]), 0.0);
    assert_eq!(dominant_zone(["B", "A", "B", "A"]), Some("A".to_string()));
    assert_eq!(dominant_zone(["C", "B", "C"]), Some("C".to_string()));
    assert_eq!(dominant_zone(Vec::<&str>::new()), None);
}

// ==========================================
// 组波与生命周期（内存库）
// ==========================================

fn builder(conn: &SharedConnection) -> WaveBuilder {
    builder_with(conn, WaveConfig::default())
}

fn builder_with(conn: &SharedConnection, wave_config: WaveConfig) -> WaveBuilder {
    WaveBuilder::new(
        conn.clone(),
        wave_config,
        AllocationConfig::default(),
        RouteConfig::default(),
    )
}

fn logical(conn: &SharedConnection, tenant_id: i64, sku_id: i64) -> (i64, i64) {
    let guard = conn.lock().unwrap();
    let stock = StockRepository::find_logical_in(&guard, tenant_id, sku_id)
        .unwrap()
        .unwrap();
    (stock.available, stock.reserved)
}

fn order_status(conn: &SharedConnection, order_id: i64) -> OrderStatus {
    let guard = conn.lock().unwrap();
    OrderRepository::find_by_id_in(&guard, order_id)
        .unwrap()
        .unwrap()
        .status
}

/// 两个批次（2024-01-01 / 2024-02-01）各 10 件
fn seed_two_lots(conn: &SharedConnection) -> (i64, i64, i64) {
    let sku_id = insert_sku(conn, &sku("SKU-1"));
    let old = insert_location(conn, &location("A-01", "A", VelocityClass::Hot, 5.0, 0.0));
    let new = insert_location(conn, &location("A-02", "A", VelocityClass::Hot, 2.0, 0.0));
    stock(conn, 1, sku_id, old, 10, "2024-01-01");
    stock(conn, 1, sku_id, new, 10, "2024-02-01");
    (sku_id, old, new)
}

#[test]
fn test_build_wave_allocates_fifo_and_reserves() {
    let conn = memory_conn();
    let (sku_id, old, new) = seed_two_lots(&conn);
    let order_id = order(&conn, "SO-1", 1, 5, "2024-03-01", &[(sku_id, 15)]);

    let result = builder(&conn)
        .build_wave(WaveType::WavePicking, WaveScope::default())
        .unwrap();

    let mut parts: Vec<(i64, i64)> = result
        .tasks
        .iter()
        .map(|t| (t.location_id, t.requested_qty))
        .collect();
    parts.sort();
    let mut expected = vec![(old, 10), (new, 5)];
    expected.sort();
    assert_eq!(parts, expected);

    assert_eq!(result.wave.status, WaveStatus::Planned);
    assert_eq!(result.wave.total_orders, 1);
    assert_eq!(result.wave.total_lines, 1);
    assert_eq!(result.wave.total_picks, 2);
    assert_eq!(result.wave.scope.max_orders, WaveConfig::default().default_max_orders);
    // 起点 (0,0) → A-02 (2,0) → A-01 (5,0)
    assert!((result.wave.est_distance_m - 5.0).abs() < 1e-9);
    let seqs: Vec<i32> = result.tasks.iter().map(|t| t.sequence_no).collect();
    assert_eq!(seqs, vec![1, 2]);
    assert_eq!(result.tasks[0].location_id, new);

    assert!(result.unfulfillable.is_empty());
    assert_eq!(logical(&conn, 1, sku_id), (5, 15));
    assert_eq!(order_status(&conn, order_id), OrderStatus::InWave);
}

#[test]
fn test_unfulfillable_line_fails_alone() {
    let conn = memory_conn();
    let (sku_id, _, _) = seed_two_lots(&conn);
    let missing_sku = insert_sku(&conn, &sku("SKU-NONE"));
    let ok_order = order(&conn, "SO-1", 1, 5, "2024-03-01", &[(sku_id, 5)]);
    let short_order = order(&conn, "SO-2", 1, 5, "2024-03-02", &[(missing_sku, 3)]);

    let result = builder(&conn)
        .build_wave(WaveType::WavePicking, WaveScope::default())
        .unwrap();

    assert_eq!(result.tasks.len(), 1);
    assert_eq!(result.wave.total_orders, 1);
    assert_eq!(result.unfulfillable.len(), 1);
    assert_eq!(result.unfulfillable[0].order_id, short_order);
    assert_eq!(result.unfulfillable[0].reason, UnfulfillableReason::InsufficientStock);
    assert_eq!(order_status(&conn, ok_order), OrderStatus::InWave);
    assert_eq!(order_status(&conn, short_order), OrderStatus::New);
}

#[test]
fn test_zero_tasks_rolls_back_whole_wave() {
    let conn = memory_conn();
    let (sku_id, _, _) = seed_two_lots(&conn);
    let order_id = order(&conn, "SO-1", 1, 5, "2024-03-01", &[(sku_id, 500)]);

    let err = builder(&conn)
        .build_wave(WaveType::WavePicking, WaveScope::default())
        .unwrap_err();

    match err {
        EngineError::UnfulfillableLine { lines } => {
            assert_eq!(lines.len(), 1);
            assert_eq!(lines[0].requested_qty, 500);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    let guard = conn.lock().unwrap();
    let waves: i64 = guard.query_row("SELECT COUNT(*) FROM wave", [], |r| r.get(0)).unwrap();
    assert_eq!(waves, 0);
    drop(guard);
    assert_eq!(logical(&conn, 1, sku_id), (20, 0));
    assert_eq!(order_status(&conn, order_id), OrderStatus::New);
}

#[test]
fn test_no_eligible_orders() {
    let conn = memory_conn();
    let (sku_id, _, _) = seed_two_lots(&conn);
    order(&conn, "SO-1", 2, 5, "2024-03-01", &[(sku_id, 1)]);

    let scope = WaveScope {
        tenant_id: Some(1),
        ..WaveScope::default()
    };
    let err = builder(&conn).build_wave(WaveType::WavePicking, scope).unwrap_err();
    assert_eq!(err.code(), "NO_ELIGIBLE_ORDERS");

    let scope = WaveScope {
        min_priority: Some(6),
        ..WaveScope::default()
    };
    let err = builder(&conn).build_wave(WaveType::WavePicking, scope).unwrap_err();
    assert_eq!(err.code(), "NO_ELIGIBLE_ORDERS");
}

#[test]
fn test_unit_load_preferred_over_lots() {
    let conn = memory_conn();
    let (sku_id, _, _) = seed_two_lots(&conn);
    let pallet_loc = insert_location(&conn, &location("B-01", "B", VelocityClass::Warm, 30.0, 0.0));
    stock(&conn, 1, sku_id, pallet_loc, 20, "2024-05-01");
    let unit_load_id = UnitLoadRepository::from_connection(conn.clone())
        .create(
            "UDC-1",
            pallet_loc,
            UnitLoadStatus::Full,
            &[UnitLoadContent {
                unit_load_id: 0,
                sku_id,
                tenant_id: 1,
                quantity: 20,
            }],
        )
        .unwrap();
    order(&conn, "SO-1", 1, 5, "2024-03-01", &[(sku_id, 8)]);

    let result = builder(&conn)
        .build_wave(WaveType::WavePicking, WaveScope::default())
        .unwrap();

    assert_eq!(result.tasks.len(), 1);
    assert_eq!(result.tasks[0].unit_load_id, Some(unit_load_id));
    assert_eq!(result.tasks[0].location_id, pallet_loc);
    assert_eq!(result.tasks[0].requested_qty, 8);
    // 30 + 2 × 30m + 10s 载具校验
    assert!((result.wave.est_time_s - 100.0).abs() < 1e-9);
}

#[test]
fn test_second_wave_skips_lots_held_by_open_tasks() {
    let conn = memory_conn();
    let (sku_id, old, new) = seed_two_lots(&conn);
    order(&conn, "SO-1", 1, 5, "2024-03-01", &[(sku_id, 10)]);
    order(&conn, "SO-2", 1, 5, "2024-03-02", &[(sku_id, 10)]);

    let scope = WaveScope {
        max_orders: 1,
        ..WaveScope::default()
    };
    let builder = builder(&conn);
    let first = builder.build_wave(WaveType::WavePicking, scope.clone()).unwrap();
    let second = builder.build_wave(WaveType::WavePicking, scope).unwrap();

    let parts = |r: &WaveBuildResult| -> Vec<(i64, i64)> {
        r.tasks.iter().map(|t| (t.location_id, t.requested_qty)).collect()
    };
    assert_eq!(parts(&first), vec![(old, 10)]);
    assert_eq!(parts(&second), vec![(new, 10)]);

    // 两个波次的任务都能按货位确认
    for wave in [&first, &second] {
        builder.start_wave(wave.wave.wave_id).unwrap();
        for task in &wave.tasks {
            let done = builder
                .confirm_pick_task(task.task_id, task.requested_qty, "picker")
                .unwrap();
            assert_eq!(done.status, PickTaskStatus::Done);
        }
        builder.complete_wave(wave.wave.wave_id).unwrap();
    }
    assert_eq!(logical(&conn, 1, sku_id), (0, 0));
}

#[test]
fn test_unit_load_held_by_open_task_is_not_reused() {
    let conn = memory_conn();
    let (sku_id, old, _) = seed_two_lots(&conn);
    let pallet_loc = insert_location(&conn, &location("B-01", "B", VelocityClass::Warm, 30.0, 0.0));
    stock(&conn, 1, sku_id, pallet_loc, 20, "2024-05-01");
    let unit_load_id = UnitLoadRepository::from_connection(conn.clone())
        .create(
            "UDC-1",
            pallet_loc,
            UnitLoadStatus::Full,
            &[UnitLoadContent {
                unit_load_id: 0,
                sku_id,
                tenant_id: 1,
                quantity: 20,
            }],
        )
        .unwrap();
    order(&conn, "SO-1", 1, 5, "2024-03-01", &[(sku_id, 15)]);
    order(&conn, "SO-2", 1, 5, "2024-03-02", &[(sku_id, 8)]);

    let scope = WaveScope {
        max_orders: 1,
        ..WaveScope::default()
    };
    let builder = builder(&conn);
    let first = builder.build_wave(WaveType::WavePicking, scope.clone()).unwrap();
    assert_eq!(first.tasks[0].unit_load_id, Some(unit_load_id));

    // 载具只剩 5 件未被占用 → 退回 FIFO 批次
    let second = builder.build_wave(WaveType::WavePicking, scope).unwrap();
    assert_eq!(second.tasks.len(), 1);
    assert_eq!(second.tasks[0].unit_load_id, None);
    assert_eq!(second.tasks[0].location_id, old);
}

#[test]
fn test_task_cap_reports_remaining_lines() {
    let conn = memory_conn();
    let (sku_id, _, _) = seed_two_lots(&conn);
    order(&conn, "SO-1", 1, 5, "2024-03-01", &[(sku_id, 2)]);
    let capped = order(&conn, "SO-2", 1, 5, "2024-03-02", &[(sku_id, 2)]);

    let config = WaveConfig {
        max_tasks: 1,
        ..WaveConfig::default()
    };
    let result = builder_with(&conn, config)
        .build_wave(WaveType::WavePicking, WaveScope::default())
        .unwrap();

    assert_eq!(result.tasks.len(), 1);
    assert_eq!(result.unfulfillable.len(), 1);
    assert_eq!(result.unfulfillable[0].order_id, capped);
    assert_eq!(result.unfulfillable[0].reason, UnfulfillableReason::TaskCapReached);
    assert_eq!(logical(&conn, 1, sku_id), (18, 2));
}

#[test]
fn test_zone_picking_uses_stock_zones() {
    let conn = memory_conn();
    let sku_a = insert_sku(&conn, &sku("SKU-A"));
    let sku_b = insert_sku(&conn, &sku("SKU-B"));
    let loc_a = insert_location(&conn, &location("A-01", "A", VelocityClass::Hot, 1.0, 0.0));
    let loc_b = insert_location(&conn, &location("B-01", "B", VelocityClass::Hot, 9.0, 0.0));
    stock(&conn, 1, sku_a, loc_a, 50, "2024-01-01");
    stock(&conn, 1, sku_b, loc_b, 50, "2024-01-01");

    let a1 = order(&conn, "SO-1", 1, 5, "2024-03-01", &[(sku_a, 1)]);
    order(&conn, "SO-2", 1, 5, "2024-03-02", &[(sku_a, 1)]);
    let b1 = order(&conn, "SO-3", 1, 5, "2024-03-03", &[(sku_b, 1)]);

    let scope = WaveScope {
        max_orders: 2,
        ..WaveScope::default()
    };
    let result = builder(&conn).build_wave(WaveType::ZonePicking, scope).unwrap();
    let mut order_ids: Vec<i64> = result.tasks.iter().map(|t| t.order_id).collect();
    order_ids.sort();
    assert_eq!(order_ids, vec![a1, b1]);
}

#[test]
fn test_lifecycle_start_confirm_complete() {
    let conn = memory_conn();
    let (sku_id, _, _) = seed_two_lots(&conn);
    let order_id = order(&conn, "SO-1", 1, 5, "2024-03-01", &[(sku_id, 15)]);
    let builder = builder(&conn);
    let wave = builder
        .build_wave(WaveType::WavePicking, WaveScope::default())
        .unwrap();

    // PLANNED 状态下不可确认
    let first = wave.tasks[0].clone();
    let err = builder.confirm_pick_task(first.task_id, first.requested_qty, "picker").unwrap_err();
    assert_eq!(err.code(), "INVALID_STATE_TRANSITION");

    // 未完成任务时不可结束
    builder.start_wave(wave.wave.wave_id).unwrap();
    let err = builder.complete_wave(wave.wave.wave_id).unwrap_err();
    assert_eq!(err.code(), "INVALID_STATE_TRANSITION");

    for task in &wave.tasks {
        let done = builder
            .confirm_pick_task(task.task_id, task.requested_qty, "picker")
            .unwrap();
        assert_eq!(done.status, PickTaskStatus::Done);
    }
    let err = builder.confirm_pick_task(first.task_id, 1, "picker").unwrap_err();
    assert_eq!(err.code(), "INVALID_STATE_TRANSITION");

    let done = builder.complete_wave(wave.wave.wave_id).unwrap();
    assert_eq!(done.status, WaveStatus::Done);
    assert!(done.completed_at.is_some());
    assert_eq!(order_status(&conn, order_id), OrderStatus::Picked);
    assert_eq!(logical(&conn, 1, sku_id), (5, 0));

    let err = builder.cancel_wave(wave.wave.wave_id).unwrap_err();
    assert_eq!(err.code(), "INVALID_STATE_TRANSITION");
}

#[test]
fn test_short_pick_returns_remainder_to_available() {
    let conn = memory_conn();
    let (sku_id, _, _) = seed_two_lots(&conn);
    let order_id = order(&conn, "SO-1", 1, 5, "2024-03-01", &[(sku_id, 4)]);
    let builder = builder(&conn);
    let wave = builder
        .build_wave(WaveType::WavePicking, WaveScope::default())
        .unwrap();
    builder.start_wave(wave.wave.wave_id).unwrap();

    let task = &wave.tasks[0];
    let confirmed = builder.confirm_pick_task(task.task_id, 1, "picker").unwrap();
    assert_eq!(confirmed.picked_qty, 1);
    assert_eq!(logical(&conn, 1, sku_id), (19, 0));

    builder.complete_wave(wave.wave.wave_id).unwrap();
    assert_eq!(order_status(&conn, order_id), OrderStatus::Confirmed);

    // 剩余 3 件重新组波
    let again = builder
        .build_wave(WaveType::WavePicking, WaveScope::default())
        .unwrap();
    assert_eq!(again.tasks.len(), 1);
    assert_eq!(again.tasks[0].requested_qty, 3);
    assert_eq!(order_status(&conn, order_id), OrderStatus::InWave);
}

#[test]
fn test_cancel_wave_releases_reservations() {
    let conn = memory_conn();
    let (sku_id, _, _) = seed_two_lots(&conn);
    let order_id = order(&conn, "SO-1", 1, 5, "2024-03-01", &[(sku_id, 12)]);
    let builder = builder(&conn);
    let wave = builder
        .build_wave(WaveType::WavePicking, WaveScope::default())
        .unwrap();
    assert_eq!(logical(&conn, 1, sku_id), (8, 12));

    let cancelled = builder.cancel_wave(wave.wave.wave_id).unwrap();
    assert_eq!(cancelled.status, WaveStatus::Cancelled);
    assert_eq!(logical(&conn, 1, sku_id), (20, 0));
    assert_eq!(order_status(&conn, order_id), OrderStatus::Confirmed);
    assert!(builder
        .list_tasks(wave.wave.wave_id)
        .unwrap()
        .iter()
        .all(|t| t.status == PickTaskStatus::Skipped));

    // 退回 CONFIRMED 的订单可重新组波
    let again = builder
        .build_wave(WaveType::WavePicking, WaveScope::default())
        .unwrap();
    assert_eq!(again.wave.total_orders, 1);
}
