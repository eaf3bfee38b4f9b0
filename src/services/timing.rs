//! Server-side deadline arithmetic. Nothing here ever reads client-supplied
//! durations; every timing decision is re-derived from stored absolute
//! timestamps on each call.

use time::{Duration, PrimitiveDateTime};

/// Authoritative session expiry: the sooner of the personal time budget and
/// the assessment window close.
pub(crate) fn compute_expiry(
    started_at: PrimitiveDateTime,
    duration_minutes: i32,
    window_end: PrimitiveDateTime,
) -> PrimitiveDateTime {
    let personal_deadline = started_at + Duration::minutes(duration_minutes as i64);
    if personal_deadline < window_end {
        personal_deadline
    } else {
        window_end
    }
}

/// Whole seconds until `deadline`, clamped to zero.
pub(crate) fn remaining_seconds(now: PrimitiveDateTime, deadline: PrimitiveDateTime) -> i64 {
    let remaining = (deadline - now).whole_seconds();
    remaining.max(0)
}

pub(crate) fn is_expired(now: PrimitiveDateTime, deadline: PrimitiveDateTime) -> bool {
    now >= deadline
}

/// Elapsed milliseconds since `started_at`, clamped so clock skew can never
/// produce a negative duration.
pub(crate) fn elapsed_ms(started_at: PrimitiveDateTime, now: PrimitiveDateTime) -> i64 {
    let elapsed = (now - started_at).whole_milliseconds();
    elapsed.max(0) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn personal_deadline_wins_when_inside_window() {
        let started = datetime!(2025-03-10 10:00:00);
        let window_end = datetime!(2025-03-10 12:00:00);
        assert_eq!(compute_expiry(started, 30, window_end), datetime!(2025-03-10 10:30:00));
    }

    #[test]
    fn window_close_caps_the_personal_deadline() {
        let started = datetime!(2025-03-10 11:45:00);
        let window_end = datetime!(2025-03-10 12:00:00);
        assert_eq!(compute_expiry(started, 30, window_end), window_end);
    }

    #[test]
    fn remaining_clamps_to_zero_after_deadline() {
        let deadline = datetime!(2025-03-10 10:30:00);
        assert_eq!(remaining_seconds(datetime!(2025-03-10 10:29:15), deadline), 45);
        assert_eq!(remaining_seconds(datetime!(2025-03-10 10:31:00), deadline), 0);
    }

    #[test]
    fn expiry_is_inclusive_at_the_deadline() {
        let deadline = datetime!(2025-03-10 10:30:00);
        assert!(is_expired(deadline, deadline));
        assert!(!is_expired(datetime!(2025-03-10 10:29:59), deadline));
    }

    #[test]
    fn elapsed_never_goes_negative() {
        let started = datetime!(2025-03-10 10:00:00);
        assert_eq!(elapsed_ms(started, datetime!(2025-03-10 10:00:01)), 1_000);
        assert_eq!(elapsed_ms(started, datetime!(2025-03-10 09:59:00)), 0);
    }
}
