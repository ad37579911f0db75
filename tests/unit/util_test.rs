//! Tests for utility functions

use chrono::{Duration, TimeZone, Utc};
use coupon_system::util::{init_tracing, Clock, ManualClock, SystemClock};

#[test]
fn test_manual_clock_moves_only_when_told() {
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    assert_eq!(clock.now(), start);

    clock.advance(Duration::hours(25));
    assert_eq!(clock.now(), start + Duration::hours(25));

    clock.set(start);
    assert_eq!(clock.now(), start);
}

#[test]
fn test_system_clock_tracks_wall_time() {
    let before = Utc::now();
    let now = SystemClock.now();
    assert!(now >= before);
}

#[test]
fn test_init_tracing_is_repeatable() {
    init_tracing();
    init_tracing();
}
