//! Motion-capture entry points: raw controller streams to controller keyframes.

use nalgebra::{UnitQuaternion, Vector3};

use super::samples::{ReducedKey, Sample};
use super::{build_kind, reduce_samples};
use crate::clip::ClipUpdate;
use crate::config::ReduceSettings;
use crate::error::{AnimatorError, Result};
use crate::recording::MocapSample;
use crate::rotation;
use crate::target::TargetKind;

/// Convert raw samples into pose samples rebased to `origin`.
///
/// Missing channels hold the previous known value (or the first known one for
/// leading gaps). Non-finite or non-increasing timestamps are skipped.
pub fn capture_samples(raw: &[MocapSample], origin: f32) -> Vec<Sample> {
    let first_position = raw
        .iter()
        .find_map(|s| s.position)
        .unwrap_or_else(Vector3::zeros);
    let first_rotation = raw
        .iter()
        .find_map(|s| s.rotation)
        .unwrap_or_else(UnitQuaternion::identity);
    let mut position = first_position;
    let mut rotation = first_rotation;
    let mut last_time: Option<f32> = None;
    let mut out = Vec::with_capacity(raw.len());
    for s in raw {
        if !s.time.is_finite() || last_time.is_some_and(|t| s.time <= t) {
            continue;
        }
        last_time = Some(s.time);
        if let Some(p) = s.position {
            position = p;
        }
        if let Some(r) = s.rotation {
            rotation = r;
        }
        out.push(Sample::pose(
            (s.time - origin).max(0.0),
            position,
            rotation::from_unit(&rotation),
        ));
    }
    out
}

/// Reduce one controller's raw stream. Fails with `InvalidOperation` when
/// fewer than two usable samples remain.
pub fn reduce_capture(raw: &[MocapSample], settings: &ReduceSettings) -> Result<Vec<ReducedKey>> {
    let origin = raw.first().map(|s| s.time).unwrap_or(0.0);
    reduce_samples(&capture_samples(raw, origin), settings)
}

/// Write reduced keys onto the controller target `name`, creating it when the
/// clip has none. A non-controller target of that name is an error.
pub fn import_controller(scope: &mut ClipUpdate<'_>, name: &str, keys: &[ReducedKey]) -> Result<()> {
    let template = TargetKind::Controller {
        curves: Default::default(),
    };
    let Some((kind, settings)) = build_kind(&template, keys) else {
        return Ok(());
    };
    if scope.target(name).is_none() {
        scope.add_controller(name, Vector3::zeros(), UnitQuaternion::identity())?;
    }
    let target = scope.target_mut(name)?;
    if !matches!(target.kind(), TargetKind::Controller { .. }) {
        return Err(AnimatorError::invalid_operation(format!(
            "cannot import motion capture onto {} target '{name}'",
            target.kind_name()
        )));
    }
    target.replace_curves(kind, settings);
    target.ensure_rotation_continuity();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::SampleValue;

    #[test]
    fn gaps_hold_previous_values() {
        let raw = vec![
            MocapSample {
                time: 1.0,
                position: None,
                rotation: None,
            },
            MocapSample {
                time: 1.5,
                position: Some(Vector3::new(1.0, 2.0, 3.0)),
                rotation: None,
            },
            MocapSample {
                time: 1.2,
                position: Some(Vector3::new(9.0, 9.0, 9.0)),
                rotation: None,
            },
            MocapSample {
                time: 2.0,
                position: None,
                rotation: Some(UnitQuaternion::identity()),
            },
        ];
        let samples = capture_samples(&raw, 1.0);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].time, 0.0);
        match samples[2].value {
            SampleValue::Pose { position, .. } => {
                assert_eq!(position, Vector3::new(1.0, 2.0, 3.0))
            }
            SampleValue::Float(_) => unreachable!(),
        }
    }

    #[test]
    fn single_sample_stream_is_invalid() {
        let raw = vec![MocapSample {
            time: 0.0,
            position: Some(Vector3::zeros()),
            rotation: None,
        }];
        let err = reduce_capture(&raw, &ReduceSettings::default()).unwrap_err();
        assert_eq!(err.category(), "invalid_operation");
    }
}
