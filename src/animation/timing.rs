//! Frame display timing in container units.

use std::time::Duration;

/// Container delay for `duration`, in hundredths of a second.
///
/// Milliseconds are divided by ten and rounded down, then clamped to
/// `[min_delay, u16::MAX]`.
pub fn delay_centiseconds(duration: Duration, min_delay: u16) -> u16 {
    let centis = (duration.as_millis() / 10).min(u128::from(u16::MAX)) as u16;
    centis.max(min_delay)
}

/// Inverse of [`delay_centiseconds`] without the clamp.
pub fn duration_from_centiseconds(delay: u16) -> Duration {
    Duration::from_millis(u64::from(delay) * 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounds_down_to_centiseconds() {
        assert_eq!(delay_centiseconds(Duration::from_millis(130), 0), 13);
        assert_eq!(delay_centiseconds(Duration::from_millis(139), 0), 13);
        assert_eq!(delay_centiseconds(Duration::from_millis(9), 0), 0);
    }

    #[test]
    fn test_minimum_and_maximum() {
        assert_eq!(delay_centiseconds(Duration::from_millis(5), 2), 2);
        assert_eq!(delay_centiseconds(Duration::from_secs(10_000), 2), u16::MAX);
    }

    #[test]
    fn test_duration_from_centiseconds() {
        assert_eq!(duration_from_centiseconds(13), Duration::from_millis(130));
        assert_eq!(
            delay_centiseconds(duration_from_centiseconds(42), 0),
            42
        );
    }
}
