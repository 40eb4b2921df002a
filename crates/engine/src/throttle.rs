//! Piecewise-linear spike schedule.
//!
//! Nine bands of the completion count, each 3% of the concurrency ceiling
//! wide, starting at 7%, 17%, ... 87%. Inside a band the injected delay
//! follows a line that starts at [`MAX_DELAY_SECS`] and reaches zero after
//! `ceiling * SPIKE_FRACTION` completions. Outside every band there is no
//! delay.
//!
//! Both the gradient and the result are floored, not rounded. Delay values
//! must stay bit-for-bit reproducible, so that is part of the contract.

use std::time::Duration;

use latprobe_core::{ConfigError, SpikeAnchor};

pub const MAX_DELAY_SECS: f64 = 300.0;

/// Width of one spike as a fraction of the ceiling; also the run-out of
/// the linear model.
pub const SPIKE_FRACTION: f64 = 0.03;

/// `(lower, upper)` fractions of the ceiling. Both edges are exclusive.
const SPIKE_WINDOWS: [(f64, f64); 9] = [
    (0.07, 0.10),
    (0.17, 0.20),
    (0.27, 0.30),
    (0.37, 0.40),
    (0.47, 0.50),
    (0.57, 0.60),
    (0.67, 0.70),
    (0.77, 0.80),
    (0.87, 0.90),
];

/// The delay schedule for one ceiling. Cheap to copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeSchedule {
    ceiling: f64,
    gradient: f64,
    anchor: SpikeAnchor,
}

impl SpikeSchedule {
    pub fn new(ceiling: f64, anchor: SpikeAnchor) -> Result<Self, ConfigError> {
        if !ceiling.is_finite() || ceiling <= 0.0 {
            return Err(ConfigError::invalid(
                "LIMIT",
                ceiling.to_string(),
                "concurrency ceiling must be positive",
            ));
        }
        let gradient = ((0.0 - MAX_DELAY_SECS) / (ceiling * SPIKE_FRACTION)).floor();
        Ok(Self {
            ceiling,
            gradient,
            anchor,
        })
    }

    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    /// Seconds lost per completion; always a negative whole number.
    pub fn gradient(&self) -> f64 {
        self.gradient
    }

    /// Absolute `(lower, upper)` bounds of window `k`.
    pub fn window_bounds(&self, k: usize) -> Option<(f64, f64)> {
        SPIKE_WINDOWS
            .get(k)
            .map(|&(lo, hi)| (lo * self.ceiling, hi * self.ceiling))
    }

    /// Index of the window strictly containing `count`.
    pub fn window_of(&self, count: f64) -> Option<usize> {
        SPIKE_WINDOWS
            .iter()
            .position(|&(lo, hi)| count > lo * self.ceiling && count < hi * self.ceiling)
    }

    /// `floor(gradient * x + 300)`, unclamped.
    pub fn linear_model(&self, x: f64) -> i64 {
        (self.gradient * x + MAX_DELAY_SECS).floor() as i64
    }

    /// Signed delay in whole seconds before clamping. Zero outside the
    /// windows; may be negative inside them.
    pub fn raw_delay_secs(&self, count: f64) -> i64 {
        let Some(k) = self.window_of(count) else {
            return 0;
        };
        match self.anchor {
            SpikeAnchor::Origin => self.linear_model(count),
            SpikeAnchor::Window => {
                let lower = SPIKE_WINDOWS[k].0 * self.ceiling;
                self.linear_model(count - lower)
            }
        }
    }

    /// Delay to inject before new work. Negative model values mean no delay.
    pub fn delay(&self, count: f64) -> Duration {
        match self.raw_delay_secs(count) {
            secs if secs > 0 => Duration::from_secs(secs as u64),
            _ => Duration::ZERO,
        }
    }
}

/// One-shot form of [`SpikeSchedule::delay`] with the reference anchoring.
pub fn delay(count: f64, ceiling: f64) -> Result<Duration, ConfigError> {
    Ok(SpikeSchedule::new(ceiling, SpikeAnchor::Origin)?.delay(count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(ceiling: f64) -> SpikeSchedule {
        SpikeSchedule::new(ceiling, SpikeAnchor::Origin).unwrap()
    }

    fn windowed(ceiling: f64) -> SpikeSchedule {
        SpikeSchedule::new(ceiling, SpikeAnchor::Window).unwrap()
    }

    #[test]
    fn rejects_non_positive_ceiling() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(SpikeSchedule::new(bad, SpikeAnchor::Origin).is_err(), "{bad}");
            assert!(delay(10.0, bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn gradient_is_floored() {
        assert_eq!(origin(1000.0).gradient(), -10.0);
        assert_eq!(origin(100.0).gradient(), -100.0);
        assert_eq!(origin(5000.0).gradient(), -2.0);
        assert_eq!(origin(100_000.0).gradient(), -1.0);
        // -300 / 0.21 = -1428.57..
        assert_eq!(origin(7.0).gradient(), -1429.0);
    }

    #[test]
    fn linear_model_peaks_at_zero() {
        for ceiling in [7.0, 100.0, 1000.0, 123_456.0] {
            assert_eq!(origin(ceiling).linear_model(0.0), 300);
        }
    }

    #[test]
    fn zero_count_is_outside_every_window() {
        for ceiling in [1.0, 10.0, 1000.0] {
            assert_eq!(origin(ceiling).window_of(0.0), None);
            assert_eq!(delay(0.0, ceiling).unwrap(), Duration::ZERO);
            assert_eq!(windowed(ceiling).delay(0.0), Duration::ZERO);
        }
    }

    #[test]
    fn window_edges_are_exclusive() {
        let s = windowed(1000.0);
        for k in 0..9 {
            let (lo, hi) = s.window_bounds(k).unwrap();
            assert_eq!(s.window_of(lo), None, "lower edge of window {k}");
            assert_eq!(s.window_of(hi), None, "upper edge of window {k}");
            assert_eq!(s.window_of(lo + 1.0), Some(k));
            assert_eq!(s.raw_delay_secs(lo), 0);
            assert_eq!(s.raw_delay_secs(hi), 0);
        }
        assert!(s.window_bounds(9).is_none());
    }

    #[test]
    fn no_delay_outside_windows() {
        for anchor in [SpikeAnchor::Origin, SpikeAnchor::Window] {
            let s = SpikeSchedule::new(1000.0, anchor).unwrap();
            for count in 0..=1200 {
                let count = count as f64;
                if s.window_of(count).is_none() {
                    assert_eq!(s.raw_delay_secs(count), 0, "count {count}");
                    assert_eq!(s.delay(count), Duration::ZERO, "count {count}");
                }
            }
        }
    }

    #[test]
    fn raw_delay_strictly_decreases_inside_each_window() {
        for anchor in [SpikeAnchor::Origin, SpikeAnchor::Window] {
            for ceiling in [100.0, 1000.0, 5000.0] {
                let s = SpikeSchedule::new(ceiling, anchor).unwrap();
                for k in 0..9 {
                    let (lo, hi) = s.window_bounds(k).unwrap();
                    let inside: Vec<f64> = (lo.floor() as i64..=hi.ceil() as i64)
                        .map(|c| c as f64)
                        .filter(|&c| s.window_of(c) == Some(k))
                        .collect();
                    assert!(!inside.is_empty(), "window {k} of {ceiling} has no integer counts");
                    for pair in inside.windows(2) {
                        assert!(
                            s.raw_delay_secs(pair[1]) < s.raw_delay_secs(pair[0]),
                            "{anchor} ceiling {ceiling} window {k}: {} -> {}",
                            pair[0],
                            pair[1]
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn origin_anchor_goes_negative_and_clamps_to_zero() {
        let s = origin(1000.0);
        assert_eq!(s.raw_delay_secs(71.0), -410);
        assert_eq!(s.raw_delay_secs(99.0), -690);
        assert_eq!(s.delay(71.0), Duration::ZERO);
        assert_eq!(delay(885.0, 1000.0).unwrap(), Duration::ZERO);
    }

    #[test]
    fn window_anchor_tapers_from_the_window_start() {
        let s = windowed(1000.0);
        assert_eq!(s.delay(71.0), Duration::from_secs(290));
        assert_eq!(s.delay(85.0), Duration::from_secs(150));
        assert_eq!(s.delay(99.0), Duration::from_secs(10));
        // Same shape in the last window.
        assert_eq!(s.delay(871.0), Duration::from_secs(290));
        assert_eq!(s.delay(899.0), Duration::from_secs(10));
    }

    #[test]
    fn literal_window_fractions_are_kept() {
        // 0.57 * 100 is just below 57, so 57 itself falls inside window 5.
        let s = windowed(100.0);
        assert_eq!(s.window_of(57.0), Some(5));
        assert_eq!(s.window_of(60.0), None);
    }

    #[test]
    fn fractional_counts_are_accepted() {
        let s = windowed(1000.0);
        assert_eq!(s.window_of(70.5), Some(0));
        // floor(-10 * 0.5 + 300)
        assert_eq!(s.raw_delay_secs(70.5), 295);
    }
}
