//! Quaternion helpers and the rotation-continuity pass.
//!
//! Rotations are stored as four independent scalar curves in `(x, y, z, w)`
//! order. `q` and `-q` are the same orientation, but interpolating between
//! keyframes of opposite sign takes the long way round; the continuity pass
//! flips signs so every neighbouring pair lies in the same hemisphere.

use nalgebra::{Quaternion, UnitQuaternion};

use crate::curve::CurveStore;

#[inline]
pub fn dot4(a: [f32; 4], b: [f32; 4]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

#[inline]
pub fn negate4(q: [f32; 4]) -> [f32; 4] {
    [-q[0], -q[1], -q[2], -q[3]]
}

#[inline]
pub fn normalize4(mut q: [f32; 4]) -> [f32; 4] {
    let len2 = dot4(q, q);
    if len2 > 0.0 {
        let inv_len = len2.sqrt().recip();
        q[0] *= inv_len;
        q[1] *= inv_len;
        q[2] *= inv_len;
        q[3] *= inv_len;
    } else {
        q = [0.0, 0.0, 0.0, 1.0];
    }
    q
}

/// Quaternion NLERP with shortest-arc correction; returns a normalized `(x,y,z,w)`.
#[inline]
pub fn nlerp_quat(a: [f32; 4], mut b: [f32; 4], t: f32) -> [f32; 4] {
    if dot4(a, b) < 0.0 {
        b = negate4(b);
    }
    normalize4([
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
        a[3] + (b[3] - a[3]) * t,
    ])
}

#[inline]
pub fn to_unit(q: [f32; 4]) -> UnitQuaternion<f32> {
    let q = normalize4(q);
    UnitQuaternion::new_unchecked(Quaternion::new(q[3], q[0], q[1], q[2]))
}

#[inline]
pub fn from_unit(q: &UnitQuaternion<f32>) -> [f32; 4] {
    let c = q.coords;
    [c.x, c.y, c.z, c.w]
}

/// Angle between two orientations in degrees, in `[0, 180]`.
#[inline]
pub fn angle_deg(a: [f32; 4], b: [f32; 4]) -> f32 {
    to_unit(a).angle_to(&to_unit(b)).to_degrees()
}

/// Flip the sign of every rotation keyframe whose quaternion has a negative dot
/// product with the (already corrected) previous keyframe. `curves` must hold the
/// x, y, z, w curves; keyframe times are enumerated from the first one and
/// times missing from any other curve are skipped.
///
/// Returns the number of flipped keyframes. Tangents are recomputed when any
/// keyframe changed.
pub fn ensure_quaternion_continuity(curves: &mut [CurveStore]) -> usize {
    if curves.len() != 4 {
        return 0;
    }
    let times = curves[0].keyframe_times();
    let mut previous: Option<[f32; 4]> = None;
    let mut flipped = 0;
    for t in times {
        let idx = [
            curves[0].index_of(t),
            curves[1].index_of(t),
            curves[2].index_of(t),
            curves[3].index_of(t),
        ];
        let [Some(ix), Some(iy), Some(iz), Some(iw)] = idx else {
            continue;
        };
        let indices = [ix, iy, iz, iw];
        let mut q = [0.0f32; 4];
        for (c, &i) in indices.iter().enumerate() {
            q[c] = curves[c].keys()[i].value;
        }
        if let Some(prev) = previous {
            if dot4(prev, q) < 0.0 {
                for (c, &i) in indices.iter().enumerate() {
                    let k = &mut curves[c].keys_mut()[i];
                    k.value = -k.value;
                }
                q = negate4(q);
                flipped += 1;
            }
        }
        previous = Some(q);
    }
    if flipped > 0 {
        log::debug!("rotation continuity flipped {flipped} keyframes");
        for curve in curves.iter_mut() {
            curve.reapply_curve_types();
        }
    }
    flipped
}
