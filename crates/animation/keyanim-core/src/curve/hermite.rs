//! Scalar interpolation helpers:
//! - lerp_f32 (linear)
//! - hermite (cubic Hermite segment with per-end slopes)
//! - slope (finite slope between two keyframes)

use super::keyframe::Keyframe;

/// Linear interpolation of scalars.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Cubic Hermite segment between `(t0, v0)` and `(t1, v1)` with slopes `m0`
/// (leaving the left key) and `m1` (arriving at the right key), sampled at `t`.
#[inline]
pub fn hermite(t0: f32, v0: f32, m0: f32, t1: f32, v1: f32, m1: f32, t: f32) -> f32 {
    let dt = t1 - t0;
    if dt <= 0.0 {
        return v0;
    }
    let s = ((t - t0) / dt).clamp(0.0, 1.0);
    let s2 = s * s;
    let s3 = s2 * s;
    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;
    h00 * v0 + h10 * dt * m0 + h01 * v1 + h11 * dt * m1
}

/// Evaluate the segment `[left, right]` at `t`.
///
/// A right keyframe typed `CopyPrevious` or a non-finite outgoing tangent on the
/// left keyframe makes the segment a step that holds the left value.
#[inline]
pub fn segment_value(left: &Keyframe, right: &Keyframe, t: f32) -> f32 {
    if matches!(right.curve_type, super::CurveType::CopyPrevious) || !left.out_tangent.is_finite()
    {
        return left.value;
    }
    hermite(
        left.time,
        left.value,
        left.out_tangent,
        right.time,
        right.value,
        right.in_tangent,
        t,
    )
}

/// Slope between two keyframes; zero when they share a time.
#[inline]
pub fn slope(a: &Keyframe, b: &Keyframe) -> f32 {
    let dt = b.time - a.time;
    if dt.abs() <= f32::EPSILON {
        0.0
    } else {
        (b.value - a.value) / dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hermite_hits_endpoints() {
        assert!((hermite(0.0, 1.0, 3.0, 2.0, 5.0, -1.0, 0.0) - 1.0).abs() < 1e-6);
        assert!((hermite(0.0, 1.0, 3.0, 2.0, 5.0, -1.0, 2.0) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn hermite_with_chord_slopes_is_linear() {
        // slope 2 on both ends of a 0..10 segment gives a straight line
        let v = hermite(0.0, 0.0, 2.0, 5.0, 10.0, 2.0, 2.5);
        assert!((v - 5.0).abs() < 1e-5);
    }
}
