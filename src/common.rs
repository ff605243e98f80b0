//! Console helpers shared by the binaries

use std::time::{Duration, Instant};

/// Counts samples and reports the average rate since creation
pub struct RateMeter {
    start: Instant,
    total: u64,
}

impl RateMeter {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            total: 0,
        }
    }

    pub fn add(&mut self, count: usize) {
        self.total += count as u64;
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Average samples per second, 0 before any time has passed
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.total as f64 / secs
        } else {
            0.0
        }
    }
}

impl Default for RateMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// Horizontal bar centred on zero
///
/// # Arguments
/// * `value` - The value to display
/// * `max_value` - Full-scale magnitude; larger values are clipped
/// * `width` - Bar width in characters, excluding the centre marker
///
/// # Example
/// ```
/// use mma8451_acquisition::create_bar;
///
/// // -1g on a ±2g scale
/// let bar = create_bar(-1.0, 2.0, 20);
/// assert_eq!(bar, "     █████|          ");
/// ```
pub fn create_bar(value: f32, max_value: f32, width: usize) -> String {
    let normalized = if max_value > 0.0 {
        (value / max_value).clamp(-1.0, 1.0)
    } else {
        0.0
    };
    let half = width / 2;
    let filled = ((normalized.abs() * half as f32).round() as usize).min(half);

    let (left, right) = if normalized < 0.0 {
        (
            format!("{}{}", " ".repeat(half - filled), "█".repeat(filled)),
            " ".repeat(half),
        )
    } else {
        (
            " ".repeat(half),
            format!("{}{}", "█".repeat(filled), " ".repeat(half - filled)),
        )
    };
    format!("{}|{}", left, right)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_width_constant() {
        for value in [-3.0, -1.0, 0.0, 0.5, 2.0, 9.0] {
            assert_eq!(create_bar(value, 2.0, 40).chars().count(), 41);
        }
    }

    #[test]
    fn test_bar_direction() {
        let positive = create_bar(1.0, 2.0, 40);
        let (left, right) = positive.split_once('|').unwrap();
        assert!(!left.contains('█'));
        assert_eq!(right.chars().filter(|c| *c == '█').count(), 10);

        let negative = create_bar(-2.0, 2.0, 40);
        let (left, right) = negative.split_once('|').unwrap();
        assert_eq!(left.chars().filter(|c| *c == '█').count(), 20);
        assert!(!right.contains('█'));
    }

    #[test]
    fn test_bar_zero_scale() {
        assert!(!create_bar(1.0, 0.0, 10).contains('█'));
    }

    #[test]
    fn test_rate_meter() {
        let mut meter = RateMeter::new();
        meter.add(100);
        meter.add(50);
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(meter.total(), 150);
        assert!(meter.rate() > 0.0);
        assert!(meter.rate() <= 15_000.0);
    }
}
