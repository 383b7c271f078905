use chrono::{DateTime, Utc};
use rand::random;
use std::time::Duration;

/// Time left until `deadline`, clamped to zero once it has passed.
pub fn until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (deadline - now).to_std().unwrap_or(Duration::ZERO)
}

/// Formats a second count as HH:MM:SS for shift displays.
pub fn format_elapsed(total_secs: i64) -> String {
    let secs = total_secs.max(0);
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

pub fn random_index(len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let rand_value: f32 = random();
    ((rand_value * len as f32) as usize).min(len - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn until_clamps_past_deadlines_to_zero() {
        let now = Utc::now();
        assert_eq!(until(now - TimeDelta::seconds(5), now), Duration::ZERO);
        assert_eq!(until(now + TimeDelta::seconds(2), now), Duration::from_secs(2));
    }

    #[test]
    fn format_elapsed_renders_hours_minutes_seconds() {
        assert_eq!(format_elapsed(0), "00:00:00");
        assert_eq!(format_elapsed(3661), "01:01:01");
        assert_eq!(format_elapsed(-5), "00:00:00");
    }

    #[test]
    fn random_index_stays_in_bounds() {
        for _ in 0..100 {
            assert!(random_index(3) < 3);
        }
        assert_eq!(random_index(0), 0);
    }
}
