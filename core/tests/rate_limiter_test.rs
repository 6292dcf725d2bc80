use speechbot_core::{BotConfig, RateLimiter, UserId};
use std::time::{Duration, Instant};

#[test]
fn admits_up_to_the_limit_then_rejects() {
    let limiter = RateLimiter::new(20, Duration::from_secs(60));
    let user = UserId(1);
    let t0 = Instant::now();

    for i in 0..20 {
        assert!(
            limiter.check_rate_limit_at(user, t0 + Duration::from_millis(i * 100)),
            "request {i} should pass"
        );
    }
    assert!(!limiter.check_rate_limit_at(user, t0 + Duration::from_secs(3)));
    // Rejections are not recorded
    assert_eq!(limiter.in_window(user), 20);
}

#[test]
fn window_slides() {
    let limiter = RateLimiter::new(20, Duration::from_secs(60));
    let user = UserId(1);
    let t0 = Instant::now();

    for _ in 0..20 {
        assert!(limiter.check_rate_limit_at(user, t0));
    }
    assert!(!limiter.check_rate_limit_at(user, t0 + Duration::from_secs(59)));
    assert!(limiter.check_rate_limit_at(user, t0 + Duration::from_secs(61)));
    assert_eq!(limiter.in_window(user), 1);
}

#[test]
fn users_are_isolated() {
    let limiter = RateLimiter::new(2, Duration::from_secs(60));
    let t0 = Instant::now();

    assert!(limiter.check_rate_limit_at(UserId(1), t0));
    assert!(limiter.check_rate_limit_at(UserId(1), t0));
    assert!(!limiter.check_rate_limit_at(UserId(1), t0));

    assert!(limiter.check_rate_limit_at(UserId(2), t0));
    assert_eq!(limiter.tracked_users(), 2);
}

#[test]
fn default_config_allows_twenty_per_minute() {
    let limiter = RateLimiter::from_config(&BotConfig::default());
    let user = UserId(5);
    let admitted = (0..25).filter(|_| limiter.check_rate_limit(user)).count();
    assert_eq!(admitted, 20);
}

#[test]
fn slid_out_windows_are_pruned() {
    let limiter = RateLimiter::new(20, Duration::from_secs(60));
    let t0 = Instant::now();
    assert!(limiter.check_rate_limit_at(UserId(1), t0));
    assert!(limiter.check_rate_limit_at(UserId(2), t0 + Duration::from_secs(30)));

    assert_eq!(limiter.prune_idle_at(t0 + Duration::from_secs(61)), 1);
    assert_eq!(limiter.tracked_users(), 1);
    assert_eq!(limiter.in_window(UserId(2)), 1);

    assert_eq!(limiter.prune_idle_at(t0 + Duration::from_secs(120)), 1);
    assert_eq!(limiter.tracked_users(), 0);
}
