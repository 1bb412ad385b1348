//! Keyframe and curve-type definitions.

use serde::{Deserialize, Serialize};

/// Per-keyframe interpolation policy controlling how tangents are derived.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveType {
    /// Average of the slopes to both neighbours.
    #[default]
    Smooth,
    /// Slope towards each neighbour on its own side.
    Linear,
    /// Zero slope on both sides.
    Flat,
    /// Holds the previous keyframe's value (a discrete step).
    CopyPrevious,
    /// Tangents are never recomputed.
    LeaveAsIs,
    /// Flat arrival, linear departure.
    FlatLinear,
    /// Linear arrival, flat departure.
    LinearFlat,
}

impl CurveType {
    /// Stable numeric code used by external serializers.
    #[inline]
    pub fn code(self) -> u8 {
        match self {
            Self::Smooth => 0,
            Self::Linear => 1,
            Self::Flat => 2,
            Self::CopyPrevious => 3,
            Self::LeaveAsIs => 4,
            Self::FlatLinear => 5,
            Self::LinearFlat => 6,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Smooth,
            1 => Self::Linear,
            2 => Self::Flat,
            3 => Self::CopyPrevious,
            4 => Self::LeaveAsIs,
            5 => Self::FlatLinear,
            6 => Self::LinearFlat,
            _ => return None,
        })
    }

    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Self::Smooth => "smooth",
            Self::Linear => "linear",
            Self::Flat => "flat",
            Self::CopyPrevious => "copy_previous",
            Self::LeaveAsIs => "leave_as_is",
            Self::FlatLinear => "flat_linear",
            Self::LinearFlat => "linear_flat",
        }
    }
}

/// One keyframe of a scalar curve. `time` is in seconds, already snapped to the
/// millisecond grid when it comes out of a [`CurveStore`](super::CurveStore).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
    #[serde(default)]
    pub curve_type: CurveType,
    #[serde(default)]
    pub in_tangent: f32,
    #[serde(default)]
    pub out_tangent: f32,
}

impl Keyframe {
    pub fn new(time: f32, value: f32, curve_type: CurveType) -> Self {
        Self {
            time,
            value,
            curve_type,
            in_tangent: 0.0,
            out_tangent: 0.0,
        }
    }

    /// Millisecond key of this keyframe's time.
    #[inline]
    pub fn ms(&self) -> i64 {
        crate::time::to_ms(self.time)
    }
}

/// Flat record handed to external serializers:
/// `(time, value, inTangent, outTangent, curveTypeCode)`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyframeTuple {
    pub time: f32,
    pub value: f32,
    pub in_tangent: f32,
    pub out_tangent: f32,
    pub curve_type: u8,
}

impl From<&Keyframe> for KeyframeTuple {
    fn from(k: &Keyframe) -> Self {
        Self {
            time: k.time,
            value: k.value,
            in_tangent: k.in_tangent,
            out_tangent: k.out_tangent,
            curve_type: k.curve_type.code(),
        }
    }
}

impl From<KeyframeTuple> for Keyframe {
    fn from(t: KeyframeTuple) -> Self {
        let curve_type = CurveType::from_code(t.curve_type).unwrap_or_else(|| {
            log::warn!("unknown curve type code {}, using smooth", t.curve_type);
            CurveType::Smooth
        });
        Self {
            time: t.time,
            value: t.value,
            curve_type,
            in_tangent: t.in_tangent,
            out_tangent: t.out_tangent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_type_codes_are_stable() {
        for code in 0..7u8 {
            let ty = CurveType::from_code(code).unwrap();
            assert_eq!(ty.code(), code);
        }
        assert_eq!(CurveType::from_code(42), None);
    }
}
