// Easing curves for sampled transitions.

use serde::{Deserialize, Serialize};

/// Easing function for reveal transitions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Easing {
    Linear,
    /// CSS `ease-out`, `cubic-bezier(0, 0, 0.58, 1)`.
    EaseOut,
    EaseInOut,
    CubicBezier { x1: f64, y1: f64, x2: f64, y2: f64 },
}

impl Easing {
    /// Map linear progress `t` in `[0, 1]` to eased progress.
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match *self {
            Easing::Linear => t,
            Easing::EaseOut => cubic_bezier(0.0, 0.0, 0.58, 1.0, t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Easing::CubicBezier { x1, y1, x2, y2 } => cubic_bezier(x1, y1, x2, y2, t),
        }
    }
}

/// CSS `cubic-bezier(x1, y1, x2, y2)` evaluated at `x`.
fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64, x: f64) -> f64 {
    let t = solve_bezier_t(x, x1, x2);
    sample_bezier(t, y1, y2)
}

fn solve_bezier_t(x: f64, x1: f64, x2: f64) -> f64 {
    let mut t = x;

    for _ in 0..8 {
        let residual = sample_bezier(t, x1, x2) - x;
        if residual.abs() < 1e-7 {
            return t;
        }
        let slope = bezier_derivative(t, x1, x2);
        if slope.abs() < 1e-7 {
            break;
        }
        t -= residual / slope;
    }

    // Newton stalled; bisect.
    let (mut lo, mut hi) = (0.0, 1.0);
    t = x;
    for _ in 0..32 {
        let value = sample_bezier(t, x1, x2);
        if (value - x).abs() < 1e-7 {
            break;
        }
        if value < x {
            lo = t;
        } else {
            hi = t;
        }
        t = (lo + hi) / 2.0;
    }
    t
}

/// Cubic bezier with endpoints (0,0) and (1,1).
fn sample_bezier(t: f64, p1: f64, p2: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * t * p1 + 3.0 * mt * t * t * p2 + t * t * t
}

fn bezier_derivative(t: f64, p1: f64, p2: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * p1 + 6.0 * mt * t * (p2 - p1) + 3.0 * t * t * (1.0 - p2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn easing_bounds() {
        for easing in [
            Easing::Linear,
            Easing::EaseOut,
            Easing::EaseInOut,
            Easing::CubicBezier {
                x1: 0.25,
                y1: 0.1,
                x2: 0.25,
                y2: 1.0,
            },
        ] {
            assert!(easing.apply(0.0).abs() < 1e-6, "{easing:?} should start at 0");
            assert!((easing.apply(1.0) - 1.0).abs() < 1e-6, "{easing:?} should end at 1");
        }
    }

    #[test]
    fn ease_out_front_loads_progress() {
        let mid = Easing::EaseOut.apply(0.5);
        assert!(mid > 0.5 && mid < 1.0);
    }

    #[test]
    fn ease_out_is_monotonic() {
        let mut last = 0.0;
        for i in 0..=50 {
            let v = Easing::EaseOut.apply(i as f64 / 50.0);
            assert!(v + 1e-9 >= last);
            last = v;
        }
    }
}
