use fitquest_detect::ExerciseKind;
use fitquest_profile::{ProfileError, ProfileStore, SessionTotals};

fn store_with_user(name: &str) -> ProfileStore {
    let store = ProfileStore::open_in_memory().unwrap();
    store.create_user(name, 30).unwrap();
    store
}

#[test]
fn test_open_on_disk_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fitquest.db");

    {
        let store = ProfileStore::open(&path).unwrap();
        store.create_user("ana", 27).unwrap();
    }

    let store = ProfileStore::open(&path).unwrap();
    let user = store.get_user("ana").unwrap();
    assert_eq!(user.age, 27);
    assert_eq!(user.coins, 0);
}

#[test]
fn test_create_user_validation() {
    let store = ProfileStore::open_in_memory().unwrap();

    assert!(matches!(
        store.create_user("", 30),
        Err(ProfileError::InvalidUser(_))
    ));
    assert!(matches!(
        store.create_user("ana", 0),
        Err(ProfileError::InvalidUser(_))
    ));

    store.create_user("ana", 30).unwrap();
    assert!(matches!(
        store.create_user("ana", 31),
        Err(ProfileError::AlreadyExists(_))
    ));
}

#[test]
fn test_get_missing_user() {
    let store = ProfileStore::open_in_memory().unwrap();
    assert!(matches!(
        store.get_user("nobody"),
        Err(ProfileError::NotFound(_))
    ));
}

#[test]
fn test_delete_user_removes_history() {
    let store = store_with_user("ana");
    let totals = SessionTotals::for_session(ExerciseKind::Walking, "2026-08-04".into(), 3, 20);
    store.record_session("ana", &totals).unwrap();

    store.delete_user("ana").unwrap();
    assert!(store.get_user("ana").is_err());
    assert!(store.totals_by_user(ExerciseKind::Walking).unwrap().is_empty());

    assert!(matches!(
        store.delete_user("ana"),
        Err(ProfileError::NotFound(_))
    ));
}

#[test]
fn test_record_session_credits_coins_and_history() {
    let store = store_with_user("ana");

    let totals = SessionTotals::for_session(ExerciseKind::Walking, "2026-08-04".into(), 4, 20);
    assert_eq!(totals.coins_earned, 40);
    store.record_session("ana", &totals).unwrap();

    let user = store.get_user("ana").unwrap();
    assert_eq!(user.coins, 40);
    assert_eq!(user.last_exercise_date.as_deref(), Some("2026-08-04"));

    let history = store.history("ana", ExerciseKind::Walking).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].count, 4);
}

#[test]
fn test_same_date_write_overwrites_history_but_coins_accumulate() {
    let store = store_with_user("ana");

    let first = SessionTotals::for_session(ExerciseKind::ChairSit, "2026-08-04".into(), 6, 20);
    let second = SessionTotals::for_session(ExerciseKind::ChairSit, "2026-08-04".into(), 2, 20);
    store.record_session("ana", &first).unwrap();
    store.record_session("ana", &second).unwrap();

    let history = store.history("ana", ExerciseKind::ChairSit).unwrap();
    assert_eq!(history.len(), 1, "same date overwrites, not accumulates");
    assert_eq!(history[0].count, 2);

    let user = store.get_user("ana").unwrap();
    assert_eq!(user.coins, (6 + 2) * 5);
}

#[test]
fn test_squat_totals_carry_progress() {
    let store = store_with_user("ana");

    let totals = SessionTotals::for_session(ExerciseKind::Squat, "2026-08-04".into(), 10, 20);
    assert_eq!(totals.coins_earned, 50);
    assert_eq!(totals.progress_percent, Some(50.0));

    store.record_session("ana", &totals).unwrap();
    let user = store.get_user("ana").unwrap();
    assert!((user.progress - 50.0).abs() < f32::EPSILON);

    // A second session carries further but never past 100.
    let more = SessionTotals::for_session(ExerciseKind::Squat, "2026-08-05".into(), 30, 20);
    assert_eq!(more.coins_earned, 100, "coins cap at the goal");
    store.record_session("ana", &more).unwrap();
    let user = store.get_user("ana").unwrap();
    assert_eq!(user.progress, 100.0);
}

#[test]
fn test_non_squat_sessions_leave_progress_alone() {
    let store = store_with_user("ana");
    let squat = SessionTotals::for_session(ExerciseKind::Squat, "2026-08-04".into(), 5, 20);
    store.record_session("ana", &squat).unwrap();

    let walk = SessionTotals::for_session(ExerciseKind::Walking, "2026-08-05".into(), 2, 20);
    store.record_session("ana", &walk).unwrap();

    let user = store.get_user("ana").unwrap();
    assert!((user.progress - 25.0).abs() < f32::EPSILON);
}

#[test]
fn test_missed_day_penalty() {
    let store = store_with_user("ana");
    let totals = SessionTotals::for_session(ExerciseKind::Squat, "2026-08-01".into(), 10, 20);
    store.record_session("ana", &totals).unwrap();

    // Next day: no penalty.
    assert_eq!(
        store.apply_missed_day_penalty("ana", "2026-08-02").unwrap(),
        None
    );

    // Three days later: two fully missed days.
    let reduction = store.apply_missed_day_penalty("ana", "2026-08-04").unwrap();
    assert_eq!(reduction, Some(20));
    let user = store.get_user("ana").unwrap();
    assert!((user.progress - 30.0).abs() < f32::EPSILON);
}

#[test]
fn test_penalty_floors_at_zero() {
    let store = store_with_user("ana");
    let totals = SessionTotals::for_session(ExerciseKind::Squat, "2026-01-01".into(), 2, 20);
    store.record_session("ana", &totals).unwrap();

    let reduction = store.apply_missed_day_penalty("ana", "2026-03-01").unwrap();
    assert_eq!(reduction, Some(100));
    let user = store.get_user("ana").unwrap();
    assert_eq!(user.progress, 0.0);
}

#[test]
fn test_penalty_without_history_is_noop() {
    let store = store_with_user("ana");
    assert_eq!(
        store.apply_missed_day_penalty("ana", "2026-08-04").unwrap(),
        None
    );
}

#[test]
fn test_totals_by_user_sums_dates() {
    let store = ProfileStore::open_in_memory().unwrap();
    store.create_user("ana", 30).unwrap();
    store.create_user("bo", 40).unwrap();

    for (user, date, count) in [
        ("ana", "2026-08-01", 5),
        ("ana", "2026-08-02", 7),
        ("bo", "2026-08-02", 3),
    ] {
        let totals = SessionTotals::for_session(ExerciseKind::Squat, date.into(), count, 20);
        store.record_session(user, &totals).unwrap();
    }

    let totals = store.totals_by_user(ExerciseKind::Squat).unwrap();
    assert_eq!(totals, vec![("ana".to_string(), 12), ("bo".to_string(), 3)]);
}

#[test]
fn test_purchase_debits_and_stores_inventory() {
    let store = store_with_user("ana");
    let totals = SessionTotals::for_session(ExerciseKind::Walking, "2026-08-04".into(), 6, 20);
    store.record_session("ana", &totals).unwrap();

    store.purchase("ana", "Hat", 50).unwrap();
    let user = store.get_user("ana").unwrap();
    assert_eq!(user.coins, 10);
    assert_eq!(user.inventory, vec!["hat".to_string()]);

    assert!(matches!(
        store.purchase("ana", "Shirt", 70),
        Err(ProfileError::InsufficientCoins { have: 10, need: 70 })
    ));
}

#[test]
fn test_list_users_sorted() {
    let store = ProfileStore::open_in_memory().unwrap();
    store.create_user("zoe", 20).unwrap();
    store.create_user("ana", 30).unwrap();

    let users = store.list_users().unwrap();
    let names: Vec<_> = users.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec!["ana", "zoe"]);
}
