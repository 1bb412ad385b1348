//! Sample values seen by the reducer and the distance measures between them.

use nalgebra::Vector3;

use crate::config::ReduceSettings;
use crate::curve::CurveType;
use crate::curve::hermite::lerp_f32;
use crate::rotation::{self, dot4, negate4, nlerp_quat};

/// One channel value: a scalar, or a full controller pose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SampleValue {
    Float(f32),
    /// Position plus rotation quaternion in `(x, y, z, w)` order.
    Pose {
        position: Vector3<f32>,
        rotation: [f32; 4],
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub time: f32,
    pub value: SampleValue,
}

impl Sample {
    pub fn float(time: f32, value: f32) -> Self {
        Self {
            time,
            value: SampleValue::Float(value),
        }
    }

    pub fn pose(time: f32, position: Vector3<f32>, rotation: [f32; 4]) -> Self {
        Self {
            time,
            value: SampleValue::Pose { position, rotation },
        }
    }
}

/// A keyframe produced by the reducer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReducedKey {
    pub time: f32,
    pub value: SampleValue,
    pub curve_type: CurveType,
}

/// Raw deviation between two values of the same kind.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Deviation {
    pub distance: f32,
    /// Degrees.
    pub angle: f32,
    pub float: f32,
}

impl SampleValue {
    /// Interpolate along the chord: positions and floats linearly, rotations by nlerp.
    pub fn lerp(&self, other: &SampleValue, t: f32) -> SampleValue {
        match (self, other) {
            (SampleValue::Float(a), SampleValue::Float(b)) => {
                SampleValue::Float(lerp_f32(*a, *b, t))
            }
            (
                SampleValue::Pose {
                    position: pa,
                    rotation: ra,
                },
                SampleValue::Pose {
                    position: pb,
                    rotation: rb,
                },
            ) => SampleValue::Pose {
                position: pa.lerp(pb, t),
                rotation: nlerp_quat(*ra, *rb, t),
            },
            _ => *self,
        }
    }

    pub fn deviation(&self, other: &SampleValue) -> Deviation {
        match (self, other) {
            (SampleValue::Float(a), SampleValue::Float(b)) => Deviation {
                float: (a - b).abs(),
                ..Deviation::default()
            },
            (
                SampleValue::Pose {
                    position: pa,
                    rotation: ra,
                },
                SampleValue::Pose {
                    position: pb,
                    rotation: rb,
                },
            ) => Deviation {
                distance: (pa - pb).norm(),
                angle: rotation::angle_deg(*ra, *rb),
                float: 0.0,
            },
            _ => Deviation {
                distance: f32::INFINITY,
                angle: f32::INFINITY,
                float: f32::INFINITY,
            },
        }
    }

    /// Within the flat-run tolerance of `anchor`.
    pub fn is_near(&self, anchor: &SampleValue, settings: &ReduceSettings) -> bool {
        let d = self.deviation(anchor);
        match self {
            SampleValue::Float(_) => d.float <= settings.min_meaningful_float,
            SampleValue::Pose { .. } => {
                d.distance <= settings.min_meaningful_distance
                    && d.angle <= settings.min_meaningful_rotation
            }
        }
    }

    /// Greedy-pass score of a deviation from the chord, and the score the best
    /// candidate must exceed for the pass to continue.
    ///
    /// Poses combine position and rotation on a common scale: each channel is
    /// divided by its unit and only counts above its own minimum. Floats use the
    /// raw deviation against the float minimum.
    pub fn score(&self, chord: &SampleValue, settings: &ReduceSettings) -> (f32, f32) {
        let d = self.deviation(chord);
        match self {
            SampleValue::Float(_) => (d.float, settings.min_meaningful_float),
            SampleValue::Pose { .. } => {
                let pos = if d.distance > settings.min_meaningful_distance {
                    d.distance / settings.distance_unit
                } else {
                    0.0
                };
                let rot = if d.angle > settings.min_meaningful_rotation {
                    d.angle / settings.angle_unit
                } else {
                    0.0
                };
                (pos.max(rot), 0.0)
            }
        }
    }
}

/// Flip rotations so every sample lies in the hemisphere of its predecessor.
pub fn align_hemispheres(samples: &mut [Sample]) {
    let mut previous: Option<[f32; 4]> = None;
    for sample in samples.iter_mut() {
        if let SampleValue::Pose { rotation, .. } = &mut sample.value {
            if let Some(prev) = previous {
                if dot4(prev, *rotation) < 0.0 {
                    *rotation = negate4(*rotation);
                }
            }
            previous = Some(*rotation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_score_ignores_channels_below_their_minimum() {
        let settings = ReduceSettings::default();
        let a = SampleValue::Pose {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: [0.0, 0.0, 0.0, 1.0],
        };
        let tiny = SampleValue::Pose {
            position: Vector3::new(0.005, 0.0, 0.0),
            rotation: [0.0, 0.0, 0.0, 1.0],
        };
        assert_eq!(tiny.score(&a, &settings).0, 0.0);
        let moved = SampleValue::Pose {
            position: Vector3::new(0.2, 0.0, 0.0),
            rotation: [0.0, 0.0, 0.0, 1.0],
        };
        assert!((moved.score(&a, &settings).0 - 0.5).abs() < 1e-5);
    }

    #[test]
    fn alignment_removes_sign_flips() {
        let mut samples = vec![
            Sample::pose(0.0, Vector3::zeros(), [0.0, 0.0, 0.0, 1.0]),
            Sample::pose(0.1, Vector3::zeros(), [0.0, 0.0, 0.0, -1.0]),
        ];
        align_hemispheres(&mut samples);
        match samples[1].value {
            SampleValue::Pose { rotation, .. } => assert_eq!(rotation[3], 1.0),
            SampleValue::Float(_) => unreachable!(),
        }
    }
}
