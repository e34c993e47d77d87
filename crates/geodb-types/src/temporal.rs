use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in whole seconds since the UNIX epoch.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_produces_reasonable_timestamp() {
        // Should be after 2020-01-01.
        assert!(unix_now() > 1_577_836_800);
    }

    #[test]
    fn now_is_monotonic_enough() {
        let a = unix_now();
        let b = unix_now();
        assert!(b >= a);
    }
}
