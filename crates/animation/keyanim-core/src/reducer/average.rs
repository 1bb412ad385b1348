//! Phase 1: average interior samples onto a fixed grid.

use nalgebra::Vector3;

use super::samples::{Sample, SampleValue};
use crate::rotation::{dot4, negate4, normalize4};

/// Group interior samples into buckets of `1 / fps` seconds (measured from the
/// first sample) and replace each bucket by its mean. The first and last
/// samples are kept verbatim.
pub fn average_to_grid(samples: &[Sample], fps: f32) -> Vec<Sample> {
    let n = samples.len();
    if n < 3 || fps.is_nan() || fps <= 0.0 {
        return samples.to_vec();
    }
    let width = 1.0 / fps;
    let origin = samples[0].time;
    let mut out = Vec::with_capacity(n);
    out.push(samples[0]);

    let interior = &samples[1..n - 1];
    let mut start = 0;
    while start < interior.len() {
        let bucket = bucket_of(interior[start].time, origin, width);
        let mut end = start + 1;
        while end < interior.len() && bucket_of(interior[end].time, origin, width) == bucket {
            end += 1;
        }
        out.push(mean(&interior[start..end]));
        start = end;
    }

    out.push(samples[n - 1]);
    out
}

#[inline]
fn bucket_of(t: f32, origin: f32, width: f32) -> i64 {
    ((t - origin) / width).floor() as i64
}

fn mean(group: &[Sample]) -> Sample {
    let count = group.len() as f32;
    let time = group.iter().map(|s| s.time).sum::<f32>() / count;
    let value = match group[0].value {
        SampleValue::Float(_) => {
            let sum: f32 = group
                .iter()
                .map(|s| match s.value {
                    SampleValue::Float(v) => v,
                    SampleValue::Pose { .. } => 0.0,
                })
                .sum();
            SampleValue::Float(sum / count)
        }
        SampleValue::Pose {
            rotation: reference,
            ..
        } => {
            let mut position = Vector3::zeros();
            let mut q = [0.0f32; 4];
            for s in group {
                if let SampleValue::Pose {
                    position: p,
                    rotation: r,
                } = s.value
                {
                    position += p;
                    let r = if dot4(reference, r) < 0.0 {
                        negate4(r)
                    } else {
                        r
                    };
                    for (acc, c) in q.iter_mut().zip(r) {
                        *acc += c;
                    }
                }
            }
            SampleValue::Pose {
                position: position / count,
                rotation: normalize4(q),
            }
        }
    };
    Sample { time, value }
}
