// src/smoothing.rs - Exponential filters for anchor position, angle and scale
use std::ops::{Add, Mul, Sub};

/// Shortest signed angular difference `x - s`, in (-pi, pi].
pub fn wrapped_delta(x: f64, s: f64) -> f64 {
    let d = x - s;
    d.sin().atan2(d.cos())
}

/// `s <- s + alpha * (x - s)`, seeded by the first observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFilter<T> {
    value: Option<T>,
}

impl<T> Default for LinearFilter<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<T> LinearFilter<T>
where
    T: Copy + Add<Output = T> + Sub<Output = T> + Mul<f64, Output = T>,
{
    pub fn new() -> Self {
        Self { value: None }
    }

    pub fn update(&mut self, x: T, alpha: f64) -> T {
        let next = match self.value {
            None => x,
            Some(s) => s + (x - s) * alpha,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<T> {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}

/// Angle filter that steps along the shorter arc, so crossing +-pi never
/// produces a near full-turn jump.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CircularFilter {
    value: Option<f64>,
}

impl CircularFilter {
    pub fn new() -> Self {
        Self { value: None }
    }

    pub fn update(&mut self, x: f64, alpha: f64) -> f64 {
        let next = match self.value {
            None => x,
            Some(s) => s + alpha * wrapped_delta(x, s),
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    #[test]
    fn first_sample_seeds_without_smoothing() {
        let mut f = LinearFilter::new();
        assert_eq!(f.update(42.0, 0.22), 42.0);
        assert_eq!(f.value(), Some(42.0));
    }

    #[test]
    fn converges_monotonically_without_overshoot() {
        for &alpha in &[0.05, 0.22, 0.5, 1.0] {
            let mut f = LinearFilter::new();
            f.update(0.0, alpha);
            let mut prev = 0.0;
            for _ in 0..200 {
                let s = f.update(10.0, alpha);
                assert!(s >= prev, "alpha {} went backwards", alpha);
                assert!(s <= 10.0, "alpha {} overshot: {}", alpha, s);
                prev = s;
            }
            assert_relative_eq!(prev, 10.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn vector_filter_tracks_each_axis() {
        let mut f = LinearFilter::new();
        f.update(Vector2::new(0.0, 100.0), 0.5);
        let s = f.update(Vector2::new(10.0, 0.0), 0.5);
        assert_relative_eq!(s, Vector2::new(5.0, 50.0));
    }

    #[test]
    fn circular_filter_takes_short_way_across_wrap() {
        let mut f = CircularFilter::new();
        let start = 179.0_f64.to_radians();
        f.update(start, 0.22);
        let s = f.update(-179.0_f64.to_radians(), 0.22);

        // 2 degrees apart across the wrap, so the step is 0.22 * 2 degrees upward
        assert_relative_eq!(s - start, 0.44_f64.to_radians(), epsilon = 1e-9);
    }

    #[test]
    fn circular_filter_holds_constant_exactly() {
        let mut f = CircularFilter::new();
        for _ in 0..20 {
            assert_eq!(f.update(0.0, 0.22), 0.0);
        }
    }

    #[test]
    fn wrapped_delta_stays_in_half_turn() {
        assert_relative_eq!(
            wrapped_delta(3.0, -3.0),
            6.0 - 2.0 * std::f64::consts::PI,
            epsilon = 1e-12
        );
        assert_relative_eq!(wrapped_delta(0.5, 0.25), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn reset_reseeds() {
        let mut f = LinearFilter::new();
        f.update(1.0, 0.5);
        f.reset();
        assert_eq!(f.value(), None);
        assert_eq!(f.update(7.0, 0.5), 7.0);
    }
}
