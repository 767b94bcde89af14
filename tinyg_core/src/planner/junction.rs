//! Junction-velocity policy (spec.md §4.3): the sustainable corner speed
//! given the "junction deviation" model, matching the source firmware's
//! `planner.c` corner-velocity formula exactly.

/// Sustainable cornering velocity between a predecessor exiting along
/// `exit_dir` and a successor entering along `entry_dir`, given an
/// allowed chordal deviation `delta` and centripetal acceleration `amax`.
///
/// Returns `f64::INFINITY` for a straight-through join (no direction
/// change) — the cruise-velocity clamp elsewhere bounds the result.
pub fn junction_velocity(entry_dir: [f64; 6], exit_dir: [f64; 6], delta: f64, amax: f64) -> f64 {
    let dot: f64 = entry_dir.iter().zip(exit_dir.iter()).map(|(a, b)| a * b).sum();
    let cos_theta = (-dot).clamp(-1.0, 1.0);
    let theta = cos_theta.acos();
    let sin_half = (theta / 2.0).sin();
    if sin_half > 1.0 - 1e-9 {
        return f64::INFINITY;
    }
    let radius = delta * sin_half / (1.0 - sin_half);
    (radius * amax).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const AMAX: f64 = 100_000.0;
    const DELTA: f64 = 0.05;

    #[test]
    fn straight_through_is_unbounded() {
        let dir = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let v = junction_velocity(dir, dir, DELTA, AMAX);
        assert!(v.is_infinite());
    }

    #[test]
    fn full_reversal_is_zero() {
        let entry = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let exit = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        // exit direction of predecessor equal to entry direction means a
        // reversal is encoded by negating one side relative to travel.
        let v = junction_velocity(entry, [-exit[0], -exit[1], -exit[2], -exit[3], -exit[4], -exit[5]], DELTA, AMAX);
        assert!(v.abs() < 1e-6);
    }

    #[test]
    fn ninety_degree_corner_is_finite_and_positive() {
        let entry = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let exit = [0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        let v = junction_velocity(entry, exit, DELTA, AMAX);
        assert!(v.is_finite());
        assert!(v > 0.0);
    }

    #[test]
    fn ninety_degree_path_corner_matches_spec_s2_bound() {
        // S2 scenario: G1 X10 then G1 Y10 — a 90 degree path corner, so
        // the half-angle in the formula is 45 degrees.
        let entry = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let exit = [0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        let v = junction_velocity(entry, exit, DELTA, AMAX);
        let sin_half = 45f64.to_radians().sin();
        let bound = (AMAX * DELTA * sin_half / (1.0 - sin_half)).sqrt();
        assert!((v - bound).abs() < 1e-6);
        assert!(v > 0.0 && v <= bound + 1e-6);
    }
}
