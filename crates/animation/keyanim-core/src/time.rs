//! Time quantization helpers.
//!
//! Keyframe times are stored in seconds (`f32`) but compared and looked up on a
//! millisecond grid, so two keyframes that land on the same millisecond are the
//! same keyframe.

/// Half a millisecond; anything closer than this is the same instant.
pub const EPSILON: f32 = 0.0005;

/// One millisecond, the smallest distance two distinct keyframes can have.
pub const FRAME_GAP: f32 = 0.001;

/// Default lower bound for a clip's length, in seconds.
pub const MIN_CLIP_LENGTH: f32 = 0.001;

/// Convert seconds to whole milliseconds (rounded to nearest).
#[inline]
pub fn to_ms(seconds: f32) -> i64 {
    (f64::from(seconds) * 1000.0).round() as i64
}

/// Convert whole milliseconds back to seconds.
#[inline]
pub fn from_ms(ms: i64) -> f32 {
    (ms as f64 / 1000.0) as f32
}

/// Snap a time onto the millisecond grid.
#[inline]
pub fn snap(seconds: f32) -> f32 {
    from_ms(to_ms(seconds))
}

/// True when both times fall on the same millisecond.
#[inline]
pub fn same_instant(a: f32, b: f32) -> bool {
    to_ms(a) == to_ms(b)
}

/// Wrap `t` into `[0, length)` (loop playback). Non-positive lengths map to zero.
#[inline]
pub fn wrap(t: f32, length: f32) -> f32 {
    if length <= 0.0 {
        return 0.0;
    }
    let m = t % length;
    if m < 0.0 {
        m + length
    } else {
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snap_rounds_to_nearest_millisecond() {
        assert_eq!(to_ms(1.2344), 1234);
        assert_eq!(to_ms(1.2346), 1235);
        assert!((snap(0.0004) - 0.0).abs() < f32::EPSILON);
        assert!(same_instant(2.0, 2.0004));
        assert!(!same_instant(2.0, 2.001));
    }

    #[test]
    fn wrap_handles_negative_time() {
        assert!((wrap(2.5, 2.0) - 0.5).abs() < 1e-6);
        assert!((wrap(-0.5, 2.0) - 1.5).abs() < 1e-6);
        assert_eq!(wrap(1.0, 0.0), 0.0);
    }
}
