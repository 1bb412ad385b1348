//! Keyframe reduction.
//!
//! Turns a dense curve or a raw sample stream into a sparse keyframe set in up
//! to three phases, each toggled by [`ReduceSettings`]:
//!
//! 1. grid averaging of interior samples ([`average`]),
//! 2. flat-run collapse into `FlatLinear`/`LinearFlat` plateaus ([`flatten`]),
//! 3. greedy adaptive simplification against the linear chord ([`adaptive`]).
//!
//! Identical input and settings always produce identical output.

pub mod adaptive;
pub mod average;
pub mod flatten;
pub mod job;
pub mod mocap;
pub mod samples;

use std::collections::BTreeMap;

pub use crate::config::ReduceSettings;
pub use job::{CancelToken, CaptureImportJob, JobStatus, ReduceJob};
pub use mocap::{import_controller, reduce_capture};
pub use samples::{ReducedKey, Sample, SampleValue};

use serde::{Deserialize, Serialize};

use crate::clip::ClipUpdate;
use crate::curve::{CurveStore, CurveType, Keyframe};
use crate::error::{AnimatorError, Result};
use crate::rotation;
use crate::target::{Target, TargetKind};
use crate::time::to_ms;

/// Keyframe counts before and after reducing one target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReduceReport {
    pub target: String,
    pub before: usize,
    pub after: usize,
}

/// Reduce an ordered sample stream. Fails with `InvalidOperation` on fewer
/// than two samples. The first and last sample times are always kept.
pub fn reduce_samples(input: &[Sample], settings: &ReduceSettings) -> Result<Vec<ReducedKey>> {
    if input.len() < 2 {
        return Err(AnimatorError::invalid_operation(format!(
            "reduction needs at least 2 samples, got {}",
            input.len()
        )));
    }
    let mut samples = input.to_vec();
    samples::align_hemispheres(&mut samples);
    if settings.average_to_grid
        && settings.target_fps > 0.0
        && settings.target_fps <= settings.max_average_fps
    {
        samples = average::average_to_grid(&samples, settings.target_fps);
    }

    let n = samples.len();
    let mut kept = adaptive::Kept::new();
    kept.insert(0, samples[0].value);
    kept.insert(n - 1, samples[n - 1].value);
    let mut types: BTreeMap<usize, CurveType> = BTreeMap::new();
    let mut frozen = Vec::new();

    if settings.flatten_runs {
        for run in flatten::find_runs(&samples, settings) {
            let held = samples[run.start].value;
            kept.insert(run.start, held);
            kept.insert(run.end, held);
            types.insert(run.start, CurveType::FlatLinear);
            types.insert(run.end, CurveType::LinearFlat);
            frozen.push((run.start, run.end));
        }
    }

    if settings.adaptive {
        kept = adaptive::simplify(&samples, kept, &frozen, settings);
    } else {
        for (i, sample) in samples.iter().enumerate() {
            kept.entry(i).or_insert(sample.value);
        }
    }

    let keys: Vec<ReducedKey> = kept
        .into_iter()
        .map(|(i, value)| ReducedKey {
            time: samples[i].time,
            value,
            curve_type: types
                .get(&i)
                .copied()
                .unwrap_or(settings.output_curve_type),
        })
        .collect();
    log::debug!("reduced {} samples to {} keyframes", input.len(), keys.len());
    Ok(keys)
}

/// The target's dense keyframes as samples (empty for event targets).
pub fn target_samples(target: &Target) -> Vec<Sample> {
    let times = match target.kind() {
        TargetKind::Controller { .. } | TargetKind::FloatParam { .. } => target.keyframe_times(),
        TargetKind::Trigger { .. } | TargetKind::Action { .. } => return Vec::new(),
    };
    times
        .into_iter()
        .filter_map(|t| match target.kind() {
            TargetKind::FloatParam { curve } => Some(Sample::float(t, curve.evaluate(t))),
            TargetKind::Controller { .. } => {
                let position = target.evaluate_position(t)?;
                let rotation = rotation::from_unit(&target.evaluate_rotation(t)?);
                Some(Sample::pose(t, position, rotation))
            }
            _ => None,
        })
        .collect()
}

/// Curves and settings rebuilt from reduced keys, shaped like `template`.
pub(crate) fn build_kind(
    template: &TargetKind,
    keys: &[ReducedKey],
) -> Option<(TargetKind, BTreeMap<i64, CurveType>)> {
    let settings = keys.iter().map(|k| (to_ms(k.time), k.curve_type)).collect();
    let kind = match template {
        TargetKind::FloatParam { .. } => {
            let curve = CurveStore::from_keyframes(keys.iter().filter_map(|k| match k.value {
                SampleValue::Float(v) => Some(Keyframe::new(k.time, v, k.curve_type)),
                SampleValue::Pose { .. } => None,
            }));
            TargetKind::FloatParam { curve }
        }
        TargetKind::Controller { .. } => {
            let mut curves: [CurveStore; 7] = Default::default();
            for k in keys {
                let SampleValue::Pose { position, rotation } = k.value else {
                    continue;
                };
                let values = [
                    position.x,
                    position.y,
                    position.z,
                    rotation[0],
                    rotation[1],
                    rotation[2],
                    rotation[3],
                ];
                for (curve, value) in curves.iter_mut().zip(values) {
                    curve.insert(Keyframe::new(k.time, value, k.curve_type));
                }
            }
            TargetKind::Controller { curves }
        }
        TargetKind::Trigger { .. } | TargetKind::Action { .. } => return None,
    };
    Some((kind, settings))
}

/// Reduce one curve target of the clip in place. Event targets are left as is.
pub fn reduce_target(
    scope: &mut ClipUpdate<'_>,
    name: &str,
    settings: &ReduceSettings,
) -> Result<ReduceReport> {
    let target = scope.target_mut(name)?;
    let samples = target_samples(target);
    let before = samples.len();
    if samples.is_empty() {
        return Ok(ReduceReport {
            target: name.to_string(),
            before,
            after: before,
        });
    }
    let keys = reduce_samples(&samples, settings)?;
    if let Some((kind, curve_settings)) = build_kind(target.kind(), &keys) {
        target.replace_curves(kind, curve_settings);
        target.ensure_rotation_continuity();
    }
    Ok(ReduceReport {
        target: name.to_string(),
        before,
        after: keys.len(),
    })
}
