//! Keyanim Core (host-agnostic)
//!
//! Keyframe curves with Hermite tangents, clips of animated targets, a
//! multi-clip timeline, clip length transforms, a playback scheduler with
//! cross-fade blending and sequencing, motion-capture recording and keyframe
//! reduction. The host scene is reached only through the traits in [`host`].

pub mod clip;
pub mod config;
pub mod curve;
pub mod error;
pub mod host;
pub mod recording;
pub mod reducer;
pub mod rotation;
pub mod scheduler;
pub mod target;
pub mod time;
pub mod timeline;
pub mod transform;

// Re-exports for hosts
pub use clip::{Clip, ClipUpdate};
pub use config::{Config, ReduceSettings, SchedulerSettings, ScrubSettings};
pub use curve::{CurveStore, CurveType, Keyframe};
pub use error::{AnimatorError, Result};
pub use host::{Controller, HostClock, ManualClock, MemoryRig, Rig, SystemClock};
pub use recording::{MocapCapture, MocapSample, RecordingSession};
pub use reducer::{
    reduce_samples, CancelToken, CaptureImportJob, JobStatus, ReduceJob, ReduceReport,
    ReducedKey, Sample, SampleValue,
};
pub use scheduler::{PlaybackState, Scheduler, SchedulerEvent};
pub use target::{ActionEvent, Target, TargetKind, TriggerEvent};
pub use timeline::{Timeline, TimelineEvent};
pub use transform::{resize, LengthMode};
