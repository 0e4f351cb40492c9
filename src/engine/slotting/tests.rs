use super::*;
use crate::config::ScoringWeights;
use crate::domain::movement::NewMovement;
use crate::domain::types::{LocationType, MovementType};
use crate::engine::test_fixtures::{insert_location, insert_sku, location, memory_conn, sku, stock};
use crate::repository::StockRepository;

fn engine(conn: &SharedConnection) -> SlottingEngine {
    SlottingEngine::new(conn.clone(), SlottingConfig::default())
}

#[test]
fn test_empty_location_fit() {
    let conn = memory_conn();
    let sku_id = insert_sku(&conn, &sku("SKU-1"));
    let mut loc = location("A-01", "A", VelocityClass::Warm, 5.0, 5.0);
    loc.max_volume = 1000.0;
    loc.max_weight_kg = 10.0;
    let loc_id = insert_location(&conn, &loc);

    let suggestion = engine(&conn)
        .suggest(&PutAwayTask::new(sku_id, 1, 50, 500.0, 5.0))
        .unwrap();

    assert_eq!(suggestion.location_id, loc_id);
    assert_eq!(suggestion.strategy, SlotStrategy::Scored);
    assert_eq!(suggestion.preferred_velocity, VelocityClass::Warm);
}

#[test]
fn test_consolidation_beats_better_empty_slot() {
    let conn = memory_conn();
    let sku_id = insert_sku(&conn, &sku("SKU-1"));
    let mut far = location("C-09", "C", VelocityClass::Cold, 80.0, 80.0);
    far.max_volume = 5000.0;
    let far_id = insert_location(&conn, &far);
    insert_location(&conn, &location("A-01", "A", VelocityClass::Warm, 1.0, 1.0));
    stock(&conn, 1, sku_id, far_id, 100, "2024-01-01");

    let suggestion = engine(&conn)
        .suggest(&PutAwayTask::new(sku_id, 2, 10, 10.0, 1.0))
        .unwrap();

    assert_eq!(suggestion.location_id, far_id);
    assert_eq!(suggestion.strategy, SlotStrategy::Consolidation);
    assert_eq!(suggestion.existing_qty, Some(100));
    assert!(suggestion.score.is_none());
}

#[test]
fn test_consolidation_skipped_without_headroom() {
    let conn = memory_conn();
    let sku_id = insert_sku(&conn, &sku("SKU-1"));
    let mut small = location("A-01", "A", VelocityClass::Warm, 1.0, 1.0);
    small.max_volume = 120.0;
    let small_id = insert_location(&conn, &small);
    let other_id = insert_location(&conn, &location("A-02", "A", VelocityClass::Warm, 2.0, 2.0));
    stock(&conn, 1, sku_id, small_id, 100, "2024-01-01");

    let suggestion = engine(&conn)
        .suggest(&PutAwayTask::new(sku_id, 1, 50, 50.0, 1.0))
        .unwrap();

    assert_eq!(suggestion.location_id, other_id);
    assert_eq!(suggestion.strategy, SlotStrategy::Scored);
}

#[test]
fn test_incompatible_temperature_sku_mutates_nothing() {
    let conn = memory_conn();
    let mut chilled = sku("CHILL-1");
    chilled.requires_temp_control = true;
    chilled.temp_min = Some(2.0);
    chilled.temp_max = Some(8.0);
    let sku_id = insert_sku(&conn, &chilled);
    let loc_id = insert_location(&conn, &location("A-01", "A", VelocityClass::Warm, 1.0, 1.0));

    let err = engine(&conn)
        .suggest(&PutAwayTask::new(sku_id, 1, 10, 10.0, 1.0))
        .unwrap_err();

    match err {
        EngineError::IncompatibleLocation { sku_id: id, reasons } => {
            assert_eq!(id, sku_id);
            assert_eq!(reasons, "TEMPERATURE_CONTROL_REQUIRED");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let guard = conn.lock().unwrap();
    let loc = LocationRepository::require_in(&guard, loc_id).unwrap();
    assert_eq!(loc.occupied_volume, 0.0);
    assert!(StockRepository::find_logical_in(&guard, 1, sku_id).unwrap().is_none());
    let movements: i64 = guard
        .query_row("SELECT COUNT(*) FROM movement", [], |r| r.get(0))
        .unwrap();
    assert_eq!(movements, 0);
}

#[test]
fn test_temperature_reading_must_be_in_range() {
    let conn = memory_conn();
    let mut chilled = sku("CHILL-1");
    chilled.requires_temp_control = true;
    chilled.temp_min = Some(2.0);
    chilled.temp_max = Some(8.0);
    let sku_id = insert_sku(&conn, &chilled);

    let mut warm_room = location("T-01", "T", VelocityClass::Warm, 1.0, 1.0);
    warm_room.temperature_controlled = true;
    warm_room.current_temperature = Some(15.0);
    insert_location(&conn, &warm_room);
    let mut cold_room = location("T-02", "T", VelocityClass::Cold, 50.0, 50.0);
    cold_room.temperature_controlled = true;
    cold_room.current_temperature = Some(4.0);
    let cold_id = insert_location(&conn, &cold_room);

    let suggestion = engine(&conn)
        .suggest(&PutAwayTask::new(sku_id, 1, 10, 10.0, 1.0))
        .unwrap();
    assert_eq!(suggestion.location_id, cold_id);
}

#[test]
fn test_no_capacity_when_nothing_fits() {
    let conn = memory_conn();
    let sku_id = insert_sku(&conn, &sku("SKU-1"));
    insert_location(&conn, &location("A-01", "A", VelocityClass::Warm, 1.0, 1.0));

    let err = engine(&conn)
        .suggest(&PutAwayTask::new(sku_id, 1, 10, 5000.0, 1.0))
        .unwrap_err();
    assert_eq!(err.code(), "NO_CAPACITY");
}

#[test]
fn test_no_capacity_when_all_candidates_too_full() {
    let conn = memory_conn();
    let sku_id = insert_sku(&conn, &sku("SKU-1"));
    let mut crowded = location("A-01", "A", VelocityClass::Warm, 1.0, 1.0);
    crowded.occupied_volume = 950.0;
    insert_location(&conn, &crowded);

    let err = engine(&conn)
        .suggest(&PutAwayTask::new(sku_id, 1, 10, 10.0, 1.0))
        .unwrap_err();
    assert_eq!(err.code(), "NO_CAPACITY");
}

#[test]
fn test_heavy_unit_goes_to_pallet_or_ground() {
    let conn = memory_conn();
    let mut heavy = sku("HEAVY-1");
    heavy.unit_weight_kg = 25.0;
    let sku_id = insert_sku(&conn, &heavy);

    let mut upper_shelf = location("A-01-03", "A", VelocityClass::Warm, 1.0, 1.0);
    upper_shelf.z = Some(2.4);
    insert_location(&conn, &upper_shelf);
    let mut pallet = location("P-01", "P", VelocityClass::Cold, 60.0, 60.0);
    pallet.location_type = LocationType::Pallet;
    pallet.z = Some(3.0);
    let pallet_id = insert_location(&conn, &pallet);

    let suggestion = engine(&conn)
        .suggest(&PutAwayTask::new(sku_id, 1, 2, 20.0, 50.0))
        .unwrap();
    assert_eq!(suggestion.location_id, pallet_id);
}

#[test]
fn test_food_incompatible_sku_avoids_food_locations() {
    let conn = memory_conn();
    let mut food = sku("FOOD-1");
    food.food_category = true;
    let food_id = insert_sku(&conn, &food);
    let mut solvent = sku("SOLV-1");
    solvent.food_incompatible = true;
    let solvent_id = insert_sku(&conn, &solvent);

    let near = insert_location(&conn, &location("A-01", "A", VelocityClass::Warm, 1.0, 1.0));
    let far = insert_location(&conn, &location("A-02", "A", VelocityClass::Warm, 40.0, 40.0));
    stock(&conn, 1, food_id, near, 10, "2024-01-01");

    let suggestion = engine(&conn)
        .suggest(&PutAwayTask::new(solvent_id, 1, 5, 5.0, 1.0))
        .unwrap();
    assert_eq!(suggestion.location_id, far);
}

#[test]
fn test_hot_sku_prefers_hot_location() {
    let conn = memory_conn();
    let sku_id = insert_sku(&conn, &sku("FAST-1"));
    let warm_id = insert_location(&conn, &location("W-01", "W", VelocityClass::Warm, 5.0, 5.0));
    let hot_id = insert_location(&conn, &location("H-01", "H", VelocityClass::Hot, 5.0, 5.0));

    let task = PutAwayTask::new(sku_id, 1, 1, 1.0, 0.1);
    assert_eq!(engine(&conn).suggest(&task).unwrap().location_id, warm_id);

    {
        let guard = conn.lock().unwrap();
        for _ in 0..11 {
            MovementRepository::append_in(
                &guard,
                &NewMovement::now(1, sku_id, MovementType::Pick, 1, "test"),
            )
            .unwrap();
        }
    }

    let suggestion = engine(&conn).suggest(&task).unwrap();
    assert_eq!(suggestion.preferred_velocity, VelocityClass::Hot);
    assert_eq!(suggestion.location_id, hot_id);
}

#[test]
fn test_suggest_is_deterministic_and_ties_break_by_id() {
    let conn = memory_conn();
    let sku_id = insert_sku(&conn, &sku("SKU-1"));
    let first = insert_location(&conn, &location("A-01", "A", VelocityClass::Warm, 3.0, 4.0));
    insert_location(&conn, &location("A-02", "A", VelocityClass::Warm, 3.0, 4.0));

    let task = PutAwayTask::new(sku_id, 1, 10, 10.0, 1.0);
    let a = engine(&conn).suggest(&task).unwrap();
    let b = engine(&conn).suggest(&task).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.location_id, first);
}

#[test]
fn test_score_location_components() {
    let mut loc = location("A-01", "A", VelocityClass::Warm, 3.0, 4.0);
    loc.occupied_volume = 250.0;
    let basis = ScoringBasis {
        preferred: VelocityClass::Hot,
        dock: (0.0, 0.0),
        max_dock_distance: 10.0,
        max_free_after: 740.0,
    };
    let score = scoring::score_location(&loc, 40.0, 10.0, &basis, &ScoringWeights::default());

    assert_eq!(score.velocity_match, 0.5);
    assert!((score.low_occupancy - 0.75).abs() < 1e-9);
    assert!((score.zone_balance - 0.6).abs() < 1e-9);
    assert!((score.dock_distance - 0.5).abs() < 1e-9);
    assert!(score.tight_fit.abs() < 1e-9);

    loc.x = None;
    let unplaced = scoring::score_location(&loc, 40.0, 10.0, &basis, &ScoringWeights::default());
    assert_eq!(unplaced.dock_distance, 0.0);
    assert!(unplaced.total < score.total);
}

#[test]
fn test_less_loaded_zone_wins_between_equal_slots() {
    let conn = memory_conn();
    let sku_id = insert_sku(&conn, &sku("SKU-1"));
    let other = insert_sku(&conn, &sku("SKU-2"));

    // A 区与 B 区位置/容量/速度完全对称，仅 A-02 已占用 80%
    let a1 = insert_location(&conn, &location("A-01", "A", VelocityClass::Warm, 3.0, 4.0));
    let a2 = insert_location(&conn, &location("A-02", "A", VelocityClass::Warm, 30.0, 40.0));
    let b1 = insert_location(&conn, &location("B-01", "B", VelocityClass::Warm, 3.0, 4.0));
    insert_location(&conn, &location("B-02", "B", VelocityClass::Warm, 30.0, 40.0));
    stock(&conn, 1, other, a2, 800, "2024-01-01");

    let suggestion = engine(&conn)
        .suggest(&PutAwayTask::new(sku_id, 1, 10, 10.0, 1.0))
        .unwrap();

    assert_ne!(suggestion.location_id, a1);
    assert_eq!(suggestion.location_id, b1);
    assert_eq!(suggestion.zone, "B");
    let score = suggestion.score.unwrap();
    assert!((score.zone_balance - 1.0).abs() < 1e-9);
}
