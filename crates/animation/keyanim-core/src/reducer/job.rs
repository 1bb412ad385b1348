//! Resumable reduction jobs.
//!
//! Both jobs are plain state machines. Each [`ReduceJob::step`] or
//! [`CaptureImportJob::step`] call does one unit of work (one target, one
//! controller) inside its own bulk-update scope, so the host can spread a long
//! reduction over frames. The cancel token is checked at the start of every
//! step; work already committed stays in the clip.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::mocap::{capture_samples, import_controller};
use super::{reduce_samples, reduce_target, ReduceReport};
use crate::clip::Clip;
use crate::config::{Config, ReduceSettings};
use crate::error::Result;
use crate::recording::{MocapCapture, MocapSample};
use crate::target::TargetKind;
use crate::time::same_instant;
use crate::transform::{resize, LengthMode};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Done,
    Cancelled,
}

/// Reduces a clip's selected curve targets, one per step.
#[derive(Debug)]
pub struct ReduceJob {
    pending: VecDeque<String>,
    settings: ReduceSettings,
    cancel: CancelToken,
    reports: Vec<ReduceReport>,
}

impl ReduceJob {
    pub fn new(clip: &Clip, settings: ReduceSettings, cancel: CancelToken) -> Self {
        let pending: VecDeque<String> = clip
            .selected_targets()
            .filter(|t| {
                matches!(
                    t.kind(),
                    TargetKind::Controller { .. } | TargetKind::FloatParam { .. }
                )
            })
            .map(|t| t.name.clone())
            .collect();
        log::debug!(
            "reduce job on clip '{}' with {} targets",
            clip.name(),
            pending.len()
        );
        Self {
            pending,
            settings,
            cancel,
            reports: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn reports(&self) -> &[ReduceReport] {
        &self.reports
    }

    /// Reduce the next target. Errors leave the clip's update scope closed.
    pub fn step(&mut self, clip: &mut Clip) -> Result<JobStatus> {
        if self.cancel.is_cancelled() {
            log::info!("reduce job cancelled with {} targets left", self.pending.len());
            return Ok(JobStatus::Cancelled);
        }
        let Some(name) = self.pending.pop_front() else {
            return Ok(JobStatus::Done);
        };
        let settings = &self.settings;
        let report = clip.update(|scope| reduce_target(scope, &name, settings))?;
        log::debug!(
            "reduced '{}': {} -> {} keyframes",
            report.target,
            report.before,
            report.after
        );
        self.reports.push(report);
        Ok(if self.pending.is_empty() {
            JobStatus::Done
        } else {
            JobStatus::Running
        })
    }

    /// Step until done, cancelled or failed.
    pub fn run_to_end(&mut self, clip: &mut Clip) -> Result<JobStatus> {
        loop {
            match self.step(clip)? {
                JobStatus::Running => continue,
                status => return Ok(status),
            }
        }
    }
}

/// Imports a motion capture into a clip, one controller per step.
///
/// Sample times are rebased so the earliest sample of the whole capture lands
/// at zero. The first step extends the clip to the capture's duration when it
/// is shorter.
#[derive(Debug)]
pub struct CaptureImportJob {
    pending: VecDeque<(String, Vec<MocapSample>)>,
    origin: f32,
    duration: f32,
    settings: ReduceSettings,
    cancel: CancelToken,
    extended: bool,
    imported: Vec<String>,
    skipped: Vec<String>,
}

impl CaptureImportJob {
    pub fn new(capture: MocapCapture, settings: ReduceSettings, cancel: CancelToken) -> Self {
        let origin = capture.start_time();
        let duration = capture.duration();
        Self {
            pending: capture.controllers.into_iter().collect(),
            origin,
            duration,
            settings,
            cancel,
            extended: false,
            imported: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Controllers written so far.
    pub fn imported(&self) -> &[String] {
        &self.imported
    }

    /// Controllers left out for having fewer than two samples.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn step(&mut self, clip: &mut Clip) -> Result<JobStatus> {
        if self.cancel.is_cancelled() {
            log::info!(
                "capture import cancelled with {} controllers left",
                self.pending.len()
            );
            return Ok(JobStatus::Cancelled);
        }
        if !self.extended {
            self.extended = true;
            if self.duration > clip.length() && !same_instant(self.duration, clip.length()) {
                let cfg = Config {
                    reduce: self.settings.clone(),
                    ..Config::default()
                };
                resize(clip, self.duration, LengthMode::CropExtendEnd, &cfg)?;
            }
        }
        let Some((name, raw)) = self.pending.pop_front() else {
            return Ok(JobStatus::Done);
        };
        let samples = capture_samples(&raw, self.origin);
        if samples.len() < 2 {
            log::warn!(
                "skipping controller '{name}': {} usable samples",
                samples.len()
            );
            self.skipped.push(name);
        } else {
            let keys = reduce_samples(&samples, &self.settings)?;
            clip.update(|scope| import_controller(scope, &name, &keys))?;
            log::debug!("imported '{name}': {} samples -> {} keyframes", raw.len(), keys.len());
            self.imported.push(name);
        }
        Ok(if self.pending.is_empty() {
            JobStatus::Done
        } else {
            JobStatus::Running
        })
    }

    pub fn run_to_end(&mut self, clip: &mut Clip) -> Result<JobStatus> {
        loop {
            match self.step(clip)? {
                JobStatus::Running => continue,
                status => return Ok(status),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use nalgebra::{UnitQuaternion, Vector3};

    use super::*;
    use crate::curve::CurveType;

    fn ramp_clip(params: &[&str]) -> Clip {
        let mut clip = Clip::new("A", 2.0);
        clip.update(|scope| {
            for name in params {
                let t = scope.add_float_param(name, 0.0)?;
                t.selected = true;
                for i in 0..=20 {
                    let time = i as f32 * 0.1;
                    t.set_float_keyframe(time, time, CurveType::Linear)?;
                }
            }
            Ok(())
        })
        .unwrap();
        clip
    }

    #[test]
    fn reduces_one_target_per_step() {
        let mut clip = ramp_clip(&["a", "b"]);
        let mut job = ReduceJob::new(&clip, ReduceSettings::default(), CancelToken::new());
        assert_eq!(job.remaining(), 2);
        assert_eq!(job.step(&mut clip).unwrap(), JobStatus::Running);
        assert_eq!(job.reports().len(), 1);
        assert_eq!(job.step(&mut clip).unwrap(), JobStatus::Done);
        assert_eq!(job.step(&mut clip).unwrap(), JobStatus::Done);
        assert_eq!(clip.target("b").unwrap().keyframe_times().len(), 2);
        assert!(!clip.is_updating());
    }

    #[test]
    fn cancel_keeps_committed_work() {
        let mut clip = ramp_clip(&["a", "b"]);
        let cancel = CancelToken::new();
        let mut job = ReduceJob::new(&clip, ReduceSettings::default(), cancel.clone());
        job.step(&mut clip).unwrap();
        cancel.cancel();
        assert_eq!(job.step(&mut clip).unwrap(), JobStatus::Cancelled);
        assert_eq!(clip.target("a").unwrap().keyframe_times().len(), 2);
        assert_eq!(clip.target("b").unwrap().keyframe_times().len(), 21);
    }

    #[test]
    fn removed_target_fails_with_scope_closed() {
        let mut clip = ramp_clip(&["a"]);
        let mut job = ReduceJob::new(&clip, ReduceSettings::default(), CancelToken::new());
        clip.update(|scope| scope.remove_target("a").map(|_| ()))
            .unwrap();
        let err = job.step(&mut clip).unwrap_err();
        assert_eq!(err.category(), "not_found");
        assert!(!clip.is_updating());
    }

    #[test]
    fn capture_import_extends_and_skips_short_streams() {
        let line: Vec<MocapSample> = (0..60)
            .map(|i| MocapSample {
                time: 5.0 + i as f32 / 20.0,
                position: Some(Vector3::new(i as f32 * 0.05, 0.0, 0.0)),
                rotation: Some(UnitQuaternion::identity()),
            })
            .collect();
        let mut controllers = BTreeMap::new();
        controllers.insert("hand".to_string(), line);
        controllers.insert(
            "blip".to_string(),
            vec![MocapSample {
                time: 5.0,
                position: None,
                rotation: None,
            }],
        );
        let capture = MocapCapture { controllers };
        let mut clip = Clip::new("take", 1.0);
        let mut job =
            CaptureImportJob::new(capture, ReduceSettings::default(), CancelToken::new());
        assert_eq!(job.run_to_end(&mut clip).unwrap(), JobStatus::Done);
        assert_eq!(job.imported(), ["hand".to_string()]);
        assert_eq!(job.skipped(), ["blip".to_string()]);
        assert!((clip.length() - 2.95).abs() < 1e-3);
        let hand = clip.target("hand").unwrap();
        assert!(hand.keyframe_times().len() <= 3);
        let end = hand.evaluate_position(2.95).unwrap();
        assert!((end.x - 2.95).abs() < 1e-2);
    }

    #[test]
    fn capture_within_a_millisecond_of_the_clip_keeps_its_length() {
        let samples = [0.0, 0.5, 1.0004]
            .iter()
            .map(|t| MocapSample {
                time: *t,
                position: Some(Vector3::new(*t, 0.0, 0.0)),
                rotation: Some(UnitQuaternion::identity()),
            })
            .collect();
        let mut controllers = BTreeMap::new();
        controllers.insert("hand".to_string(), samples);
        let capture = MocapCapture { controllers };
        let mut clip = Clip::new("take", 1.0);
        let mut job =
            CaptureImportJob::new(capture, ReduceSettings::default(), CancelToken::new());
        assert_eq!(job.run_to_end(&mut clip).unwrap(), JobStatus::Done);
        assert_eq!(clip.length(), 1.0);
        assert_eq!(job.imported(), ["hand".to_string()]);
    }
}
