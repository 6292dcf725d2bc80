mod common;

use common::{day, ManualClock};
use speechbot_core::{LanguageCode, SessionStore, SqliteSessionStore, UserId, UserTier};
use std::sync::Arc;

fn store_at(clock: Arc<ManualClock>) -> SqliteSessionStore {
    SqliteSessionStore::open_in_memory(clock).unwrap()
}

#[tokio::test]
async fn unknown_user_has_defaults() {
    let store = store_at(Arc::new(ManualClock::new(day(2024, 1, 10))));
    let user = UserId(42);

    assert_eq!(store.get_language(user).await, LanguageCode::English);
    assert_eq!(store.get_daily_usage(user).await.unwrap(), 0);
    assert!(store.get_user(user).await.unwrap().is_none());
}

#[tokio::test]
async fn increments_accumulate_within_a_day() {
    let store = store_at(Arc::new(ManualClock::new(day(2024, 1, 10))));
    let user = UserId(7);

    for _ in 0..4 {
        store.increment_usage(user).await.unwrap();
    }
    assert_eq!(store.get_daily_usage(user).await.unwrap(), 4);

    let record = store.get_user(user).await.unwrap().unwrap();
    assert_eq!(record.tier, UserTier::Free);
    assert_eq!(record.daily_usage, 4);
    assert_eq!(record.last_reset_date, Some(day(2024, 1, 10)));
}

#[tokio::test]
async fn usage_resets_on_a_new_day() {
    let clock = Arc::new(ManualClock::new(day(2024, 1, 10)));
    let store = store_at(clock.clone());
    let user = UserId(7);

    store.increment_usage(user).await.unwrap();
    store.increment_usage(user).await.unwrap();
    assert_eq!(store.get_daily_usage(user).await.unwrap(), 2);

    clock.advance_days(1);
    assert_eq!(store.get_daily_usage(user).await.unwrap(), 0);

    store.increment_usage(user).await.unwrap();
    assert_eq!(store.get_daily_usage(user).await.unwrap(), 1);
    let record = store.get_user(user).await.unwrap().unwrap();
    assert_eq!(record.last_reset_date, Some(day(2024, 1, 11)));
}

#[tokio::test]
async fn first_increment_of_a_new_day_counts_once() {
    let clock = Arc::new(ManualClock::new(day(2024, 1, 10)));
    let store = store_at(clock.clone());
    let user = UserId(3);

    for _ in 0..5 {
        store.increment_usage(user).await.unwrap();
    }
    clock.advance_days(3);
    store.increment_usage(user).await.unwrap();

    assert_eq!(store.get_daily_usage(user).await.unwrap(), 1);
}

#[tokio::test]
async fn language_is_upserted_without_touching_usage() {
    let store = store_at(Arc::new(ManualClock::new(day(2024, 1, 10))));
    let user = UserId(9);

    store.increment_usage(user).await.unwrap();
    store.set_language(user, LanguageCode::Persian).await.unwrap();
    store.set_language(user, LanguageCode::Persian).await.unwrap();

    assert_eq!(store.get_language(user).await, LanguageCode::Persian);
    assert_eq!(store.get_daily_usage(user).await.unwrap(), 1);

    let other = UserId(10);
    store.set_language(other, LanguageCode::Persian).await.unwrap();
    assert_eq!(store.get_daily_usage(other).await.unwrap(), 0);
}

#[tokio::test]
async fn file_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("bot.db");
    let clock = Arc::new(ManualClock::new(day(2024, 5, 1)));
    let user = UserId(1);

    {
        let store = SqliteSessionStore::open(&path, clock.clone()).unwrap();
        store.set_language(user, LanguageCode::Persian).await.unwrap();
        store.increment_usage(user).await.unwrap();
        assert_eq!(store.schema_version().unwrap(), 1);
    }

    let store = SqliteSessionStore::open(&path, clock).unwrap();
    assert_eq!(store.get_language(user).await, LanguageCode::Persian);
    assert_eq!(store.get_daily_usage(user).await.unwrap(), 1);
}
