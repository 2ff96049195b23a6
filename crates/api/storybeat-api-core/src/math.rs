//! Minimal position math used for anchors and camera smoothing.

/// World position (x, y, z).
pub type Position = [f32; 3];

/// Euclidean distance between two positions.
#[inline]
pub fn distance(a: Position, b: Position) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// One exponential smoothing step: `current + (desired - current) * rate * dt`.
///
/// The blend factor is clamped to 1 so large frame times never overshoot the target.
#[inline]
pub fn smooth_toward(current: Position, desired: Position, rate: f32, dt: f32) -> Position {
    let k = (rate * dt).clamp(0.0, 1.0);
    [
        current[0] + (desired[0] - current[0]) * k,
        current[1] + (desired[1] - current[1]) * k,
        current[2] + (desired[2] - current[2]) * k,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn smoothing_moves_fraction_of_the_gap() {
        let p = smooth_toward([0.0, 0.0, 0.0], [10.0, 0.0, 0.0], 5.0, 0.1);
        assert_relative_eq!(p[0], 5.0);
        assert_relative_eq!(distance(p, [10.0, 0.0, 0.0]), 5.0);
    }

    #[test]
    fn smoothing_never_overshoots() {
        let p = smooth_toward([0.0, 0.0, 0.0], [1.0, 1.0, 1.0], 50.0, 1.0);
        assert_eq!(p, [1.0, 1.0, 1.0]);
    }
}
