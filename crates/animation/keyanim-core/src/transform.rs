//! Clip length transforms.
//!
//! Each strategy rewrites keyframe, setting and event times of every target in
//! one bulk-update scope; edge repair and tangent recomputation happen when
//! the scope closes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::clip::{Clip, ClipUpdate};
use crate::config::Config;
use crate::curve::CurveType;
use crate::error::{AnimatorError, Result};
use crate::target::Target;
use crate::time::{self, to_ms};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LengthMode {
    /// Scale every time by `new / old`.
    Stretch,
    /// Crop or extend at the end.
    CropExtendEnd,
    /// Crop or extend at the start, shifting everything.
    CropExtendBegin,
    /// Insert or remove time right after `time`.
    CropExtendAtTime { time: f32 },
    /// Like `CropExtendEnd`, keeping the old end pose at the new end.
    AddKeyframeEnd,
    /// Like `CropExtendBegin`, keeping the old start pose at the new start.
    AddKeyframeBegin,
    /// Repeat the clip a whole number of times.
    Loop,
}

impl LengthMode {
    pub fn name(&self) -> &'static str {
        match self {
            LengthMode::Stretch => "stretch",
            LengthMode::CropExtendEnd => "crop_extend_end",
            LengthMode::CropExtendBegin => "crop_extend_begin",
            LengthMode::CropExtendAtTime { .. } => "crop_extend_at_time",
            LengthMode::AddKeyframeEnd => "add_keyframe_end",
            LengthMode::AddKeyframeBegin => "add_keyframe_begin",
            LengthMode::Loop => "loop",
        }
    }
}

impl fmt::Display for LengthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LengthMode::CropExtendAtTime { time } => write!(f, "{}@{}", self.name(), time),
            _ => f.write_str(self.name()),
        }
    }
}

/// Accepts snake_case or PascalCase identifiers. The at-time mode takes its
/// anchor as a suffix: `crop_extend_at_time@1.25`.
impl FromStr for LengthMode {
    type Err = AnimatorError;

    fn from_str(s: &str) -> Result<Self> {
        let (ident, arg) = match s.split_once('@') {
            Some((ident, arg)) => (ident, Some(arg)),
            None => (s, None),
        };
        let key: String = ident
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let not_implemented = || AnimatorError::NotImplemented {
            what: format!("length mode '{s}'"),
        };
        let mode = match key.as_str() {
            "stretch" => LengthMode::Stretch,
            "cropextendend" | "croporextendend" | "croporextendlengthend" => {
                LengthMode::CropExtendEnd
            }
            "cropextendbegin" | "croporextendbegin" | "croporextendlengthbegin" => {
                LengthMode::CropExtendBegin
            }
            "cropextendattime" | "croporextendattime" | "croporextendlengthattime" => {
                let time = match arg {
                    Some(a) => a
                        .trim()
                        .parse::<f32>()
                        .map_err(|_| AnimatorError::validation(format!("bad anchor time '{a}'")))?,
                    None => 0.0,
                };
                return Ok(LengthMode::CropExtendAtTime { time });
            }
            "addkeyframeend" => LengthMode::AddKeyframeEnd,
            "addkeyframebegin" => LengthMode::AddKeyframeBegin,
            "loop" => LengthMode::Loop,
            _ => return Err(not_implemented()),
        };
        if arg.is_some() {
            return Err(not_implemented());
        }
        Ok(mode)
    }
}

/// Change the clip's length with `mode`. Returns the effective new length,
/// which differs from `new_length` when the at-time crop is clamped or a loop
/// rounds down to whole repetitions.
pub fn resize(clip: &mut Clip, new_length: f32, mode: LengthMode, cfg: &Config) -> Result<f32> {
    if !new_length.is_finite() || new_length < cfg.min_clip_length {
        return Err(AnimatorError::validation(format!(
            "new length {new_length} is below the minimum clip length {}",
            cfg.min_clip_length
        )));
    }
    let old = clip.length();
    let new = time::snap(new_length);
    if mode == LengthMode::Loop {
        let count = loop_count(old, new);
        if count < 1 {
            return Err(AnimatorError::validation(format!(
                "loop length {new} is shorter than the clip ({old})"
            )));
        }
    }

    let effective = {
        let mut scope = clip.begin_update();
        match mode {
            LengthMode::Stretch => stretch(&mut scope, old, new),
            LengthMode::CropExtendEnd => crop_extend_end(&mut scope, old, new),
            LengthMode::CropExtendBegin => crop_extend_begin(&mut scope, old, new),
            LengthMode::CropExtendAtTime { time } => {
                crop_extend_at_time(&mut scope, old, new, time)
            }
            LengthMode::AddKeyframeEnd => {
                let poses = snapshots(&scope, old);
                let len = crop_extend_end(&mut scope, old, new);
                restore(&mut scope, len, &poses);
                len
            }
            LengthMode::AddKeyframeBegin => {
                let poses = snapshots(&scope, 0.0);
                let len = crop_extend_begin(&mut scope, old, new);
                restore(&mut scope, 0.0, &poses);
                len
            }
            LengthMode::Loop => repeat(&mut scope, old, new),
        }
    };
    log::debug!(
        "resized clip '{}' with {mode}: {old} -> {effective}",
        clip.name()
    );
    Ok(effective)
}

fn loop_count(old: f32, new: f32) -> usize {
    ((new + time::EPSILON) / old).floor().max(0.0) as usize
}

fn edge_type(target: &Target, at_end: bool) -> CurveType {
    target
        .lead_curve()
        .and_then(|c| if at_end { c.last() } else { c.first() })
        .map(|k| k.curve_type)
        .unwrap_or_default()
}

fn snapshots(scope: &ClipUpdate<'_>, t: f32) -> Vec<Vec<f32>> {
    scope.targets().iter().map(|target| target.snapshot(t)).collect()
}

fn restore(scope: &mut ClipUpdate<'_>, t: f32, poses: &[Vec<f32>]) {
    for (target, values) in scope.targets_mut().zip(poses) {
        let ty = edge_type(target, t > 0.0);
        target.write_snapshot(t, values, ty);
    }
}

fn stretch(scope: &mut ClipUpdate<'_>, old: f32, new: f32) -> f32 {
    let ratio = new / old;
    for target in scope.targets_mut() {
        target.map_times(|t| Some(t * ratio));
    }
    scope.set_length(new);
    new
}

fn crop_extend_end(scope: &mut ClipUpdate<'_>, old: f32, new: f32) -> f32 {
    let new_ms = to_ms(new);
    for target in scope.targets_mut() {
        let at_end = target.snapshot(new);
        let ty = edge_type(target, true);
        if new < old {
            target.map_times(|t| (to_ms(t) <= new_ms).then_some(t));
        }
        target.write_snapshot(new, &at_end, ty);
    }
    scope.set_length(new);
    new
}

fn crop_extend_begin(scope: &mut ClipUpdate<'_>, old: f32, new: f32) -> f32 {
    let delta = new - old;
    if delta >= 0.0 {
        for target in scope.targets_mut() {
            let at_start = target.snapshot(0.0);
            let ty = edge_type(target, false);
            target.map_times(|t| Some(t + delta));
            target.write_snapshot(0.0, &at_start, ty);
        }
    } else {
        let cut = -delta;
        let cut_ms = to_ms(cut);
        for target in scope.targets_mut() {
            let at_cut = target.snapshot(cut);
            let ty = edge_type(target, false);
            target.map_times(|t| (to_ms(t) >= cut_ms).then_some(t - cut));
            target.write_snapshot(0.0, &at_cut, ty);
        }
    }
    scope.set_length(new);
    new
}

/// Earliest keyframe or event strictly after `anchor` across all targets.
fn next_time_after(scope: &ClipUpdate<'_>, anchor: f32) -> Option<f32> {
    let anchor_ms = to_ms(anchor);
    scope
        .targets()
        .iter()
        .flat_map(|target| target.keyframe_times())
        .filter(|t| to_ms(*t) > anchor_ms)
        .min_by(|a, b| a.total_cmp(b))
}

fn crop_extend_at_time(scope: &mut ClipUpdate<'_>, old: f32, new: f32, anchor: f32) -> f32 {
    let anchor = time::snap(anchor.clamp(0.0, old));
    let anchor_ms = to_ms(anchor);
    let delta = if new >= old {
        new - old
    } else {
        let allowed = next_time_after(scope, anchor)
            .map(|next| next - anchor - time::FRAME_GAP)
            .unwrap_or(0.0)
            .max(0.0);
        let requested = old - new;
        if requested > allowed {
            log::debug!("crop at {anchor} clamped from {requested} to {allowed}");
        }
        -requested.min(allowed)
    };
    if delta == 0.0 {
        return old;
    }
    for target in scope.targets_mut() {
        target.map_times(|t| {
            if to_ms(t) > anchor_ms {
                Some(t + delta)
            } else {
                Some(t)
            }
        });
    }
    let effective = time::snap(old + delta);
    scope.set_length(effective);
    effective
}

fn repeat(scope: &mut ClipUpdate<'_>, old: f32, new: f32) -> f32 {
    let count = loop_count(old, new);
    for target in scope.targets_mut() {
        target.replicate(old, count);
    }
    let effective = time::snap(old * count as f32);
    scope.set_length(effective);
    effective
}
