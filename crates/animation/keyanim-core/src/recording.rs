//! Motion-capture recording.
//!
//! A [`RecordingSession`] is owned by the caller; it is "recording" exactly as
//! long as it exists. Each [`RecordingSession::capture`] call reads the live
//! pose of every tracked controller and stores it with a timestamp relative to
//! the session start. [`RecordingSession::finish`] yields a [`MocapCapture`]
//! ready for [`crate::reducer::CaptureImportJob`].

use std::collections::BTreeMap;

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::host::{HostClock, Rig};

/// One raw sample. Missing channels hold the previous known value on import.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MocapSample {
    pub time: f32,
    #[serde(default)]
    pub position: Option<Vector3<f32>>,
    #[serde(default)]
    pub rotation: Option<UnitQuaternion<f32>>,
}

/// Ordered samples per controller name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MocapCapture {
    pub controllers: BTreeMap<String, Vec<MocapSample>>,
}

impl MocapCapture {
    pub fn is_empty(&self) -> bool {
        self.controllers.values().all(Vec::is_empty)
    }

    /// Time span from the earliest to the latest sample across controllers.
    pub fn duration(&self) -> f32 {
        let times = self
            .controllers
            .values()
            .flat_map(|samples| samples.iter().map(|s| s.time));
        let (lo, hi) = times.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), t| {
            (lo.min(t), hi.max(t))
        });
        if hi >= lo {
            hi - lo
        } else {
            0.0
        }
    }

    /// Earliest timestamp, used to rebase imports to zero.
    pub fn start_time(&self) -> f32 {
        self.controllers
            .values()
            .filter_map(|samples| samples.first().map(|s| s.time))
            .reduce(f32::min)
            .unwrap_or(0.0)
    }
}

#[derive(Debug)]
pub struct RecordingSession {
    started_at: f64,
    capture: MocapCapture,
}

impl RecordingSession {
    /// Start recording `controllers`, timestamped from `clock.now()`.
    pub fn start<I, S>(controllers: I, clock: &dyn HostClock) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let capture = MocapCapture {
            controllers: controllers
                .into_iter()
                .map(|name| (name.into(), Vec::new()))
                .collect(),
        };
        log::debug!("recording {} controllers", capture.controllers.len());
        Self {
            started_at: clock.now(),
            capture,
        }
    }

    /// Sample every tracked controller. Controllers missing from the rig are skipped.
    pub fn capture(&mut self, rig: &mut dyn Rig, clock: &dyn HostClock) {
        let time = (clock.now() - self.started_at) as f32;
        for (name, samples) in self.capture.controllers.iter_mut() {
            let Some(controller) = rig.controller_mut(name) else {
                continue;
            };
            samples.push(MocapSample {
                time,
                position: Some(controller.position()),
                rotation: Some(controller.rotation()),
            });
        }
    }

    pub fn sample_count(&self) -> usize {
        self.capture.controllers.values().map(Vec::len).sum()
    }

    pub fn finish(self) -> MocapCapture {
        log::debug!("recording finished with {} samples", self.sample_count());
        self.capture
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ManualClock, MemoryRig};

    #[test]
    fn captures_relative_timestamps() {
        let mut clock = ManualClock { now: 10.0 };
        let mut rig = MemoryRig::new().with_controller("hand");
        let mut session = RecordingSession::start(["hand", "ghost"], &clock);
        session.capture(&mut rig, &clock);
        clock.advance(0.5);
        rig.controllers.get_mut("hand").unwrap().position = Vector3::new(1.0, 0.0, 0.0);
        session.capture(&mut rig, &clock);
        let capture = session.finish();
        let hand = &capture.controllers["hand"];
        assert_eq!(hand.len(), 2);
        assert_eq!(hand[1].time, 0.5);
        assert_eq!(hand[1].position, Some(Vector3::new(1.0, 0.0, 0.0)));
        assert!(capture.controllers["ghost"].is_empty());
        assert_eq!(capture.duration(), 0.5);
    }
}
