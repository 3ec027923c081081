use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as integer epoch millis. This is the only timestamp
/// representation on the wire; the hub stamps every relayed envelope with it.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_millis_is_recent() {
        // Anything after 2024-01-01 and before 2100 is sane.
        let now = now_millis();
        assert!(now > 1_704_067_200_000);
        assert!(now < 4_102_444_800_000);
    }

    #[test]
    fn now_millis_is_monotonic_enough() {
        let a = now_millis();
        let b = now_millis();
        assert!(b >= a);
    }
}
