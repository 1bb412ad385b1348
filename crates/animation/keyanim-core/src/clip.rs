//! Clips: named fixed-length timelines of targets, and the bulk-update scope.
//!
//! Curves are only mutable through a [`ClipUpdate`] guard obtained from
//! [`Clip::begin_update`]. Tangent re-derivation, invariant repair, loop and
//! rotation continuity run once, when the outermost guard drops. Because the
//! work happens in `Drop`, the scope is closed on every exit path: normal
//! return, `?` propagation and unwinding.

use std::ops::Deref;

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::curve::hermite::slope;
use crate::curve::{CurveStore, CurveType};
use crate::error::{AnimatorError, Result};
use crate::host::Rig;
use crate::target::{Target, TargetKind};
use crate::time;

pub const DEFAULT_SEGMENT: &str = "main";
pub const DEFAULT_LAYER: &str = "main";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Clip {
    name: String,
    #[serde(default = "default_segment")]
    segment_id: String,
    #[serde(default = "default_layer")]
    layer_id: String,
    length: f32,
    #[serde(rename = "loop", default)]
    looping: bool,
    #[serde(default)]
    pub blend_duration: f32,
    /// Explicit clip name, `"(random)"`, or a `"group/*"` prefix.
    #[serde(default)]
    pub next_clip_name: Option<String>,
    /// Seconds after the clip starts at which sequencing switches clips.
    #[serde(default)]
    pub next_clip_time: f32,
    /// Transition clips blend their first and last keyframes towards their neighbours.
    #[serde(default)]
    pub transition: bool,
    #[serde(default = "default_true")]
    ensure_rotation_continuity: bool,
    #[serde(default)]
    targets: Vec<Target>,

    #[serde(skip)]
    update_depth: u32,
    #[serde(skip)]
    touched: bool,
    #[serde(skip)]
    revision: u64,
}

fn default_segment() -> String {
    DEFAULT_SEGMENT.to_string()
}

fn default_layer() -> String {
    DEFAULT_LAYER.to_string()
}

fn default_true() -> bool {
    true
}

impl Clip {
    /// Blank clip. Lengths below the minimum are clamped.
    pub fn new(name: impl Into<String>, length: f32) -> Self {
        Self {
            name: name.into(),
            segment_id: default_segment(),
            layer_id: default_layer(),
            length: time::snap(length.max(time::MIN_CLIP_LENGTH)),
            looping: false,
            blend_duration: 1.0,
            next_clip_name: None,
            next_clip_time: 0.0,
            transition: false,
            ensure_rotation_continuity: true,
            targets: Vec::new(),
            update_depth: 0,
            touched: false,
            revision: 0,
        }
    }

    /// Deep copy under a new name, with fresh change tracking.
    pub fn copy_as(&self, name: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.name = name.into();
        copy.update_depth = 0;
        copy.touched = false;
        copy.revision = 0;
        copy
    }

    /// Blank clip sharing this clip's length, layer and playback settings, with
    /// the same targets reset to the pose at time zero.
    pub fn blank_like(&self, name: impl Into<String>) -> Self {
        let mut clip = Self::new(name, self.length);
        clip.segment_id = self.segment_id.clone();
        clip.layer_id = self.layer_id.clone();
        clip.looping = self.looping;
        clip.blend_duration = self.blend_duration;
        clip.ensure_rotation_continuity = self.ensure_rotation_continuity;
        for t in &self.targets {
            let blank = match t.kind() {
                TargetKind::Controller { .. } => Target::controller(
                    t.name.clone(),
                    self.length,
                    t.evaluate_position(0.0).unwrap_or_else(Vector3::zeros),
                    t.evaluate_rotation(0.0)
                        .unwrap_or_else(UnitQuaternion::identity),
                ),
                TargetKind::FloatParam { .. } => Target::float_param(
                    t.name.clone(),
                    self.length,
                    t.evaluate_float(0.0).unwrap_or_default(),
                ),
                TargetKind::Trigger { .. } => Target::trigger(t.name.clone()),
                TargetKind::Action { .. } => Target::action(t.name.clone()),
            };
            clip.targets.push(blank);
        }
        clip
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Place the clip in a segment/layer (builder style, before it joins a timeline).
    pub fn with_layer(mut self, segment_id: impl Into<String>, layer_id: impl Into<String>) -> Self {
        self.segment_id = segment_id.into();
        self.layer_id = layer_id.into();
        self
    }

    pub(crate) fn set_layer(&mut self, segment_id: &str, layer_id: &str) {
        self.segment_id = segment_id.to_string();
        self.layer_id = layer_id.to_string();
    }

    #[inline]
    pub fn segment_id(&self) -> &str {
        &self.segment_id
    }

    #[inline]
    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.length
    }

    #[inline]
    pub fn looping(&self) -> bool {
        self.looping
    }

    #[inline]
    pub fn ensure_rotation_continuity(&self) -> bool {
        self.ensure_rotation_continuity
    }

    #[inline]
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name == name)
    }

    pub fn selected_targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter().filter(|t| t.selected)
    }

    /// Bumped every time an update scope that changed something closes.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    pub fn is_updating(&self) -> bool {
        self.update_depth > 0
    }

    /// Open a bulk-update scope. Scopes nest; work is deferred to the outermost.
    pub fn begin_update(&mut self) -> ClipUpdate<'_> {
        self.update_depth += 1;
        ClipUpdate { clip: self }
    }

    /// Run `f` inside a bulk-update scope. The scope closes even when `f` fails.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut ClipUpdate<'_>) -> Result<R>) -> Result<R> {
        let mut scope = self.begin_update();
        f(&mut scope)
    }

    /// Repair invariants and recompute every tangent.
    pub fn validate(&mut self) {
        let mut scope = self.begin_update();
        scope.clip.touched = true;
        for t in &mut scope.clip.targets {
            for c in t.curves_mut() {
                c.mark_dirty();
            }
        }
    }

    /// Map playback time into clip time: wrapped for loops, clamped otherwise.
    #[inline]
    pub fn clip_time(&self, t: f32) -> f32 {
        if self.looping {
            time::wrap(t, self.length)
        } else {
            t.clamp(0.0, self.length)
        }
    }

    /// Write every controller pose and float parameter at `t` into the rig.
    pub fn sample(&self, t: f32, rig: &mut dyn Rig) {
        let t = self.clip_time(t);
        for target in &self.targets {
            match target.kind() {
                TargetKind::Controller { .. } => {
                    if let Some(controller) = rig.controller_mut(&target.name) {
                        if let (Some(p), Some(r)) =
                            (target.evaluate_position(t), target.evaluate_rotation(t))
                        {
                            controller.set_position(p);
                            controller.set_rotation(r);
                        }
                    }
                }
                TargetKind::FloatParam { curve } => {
                    rig.set_float_param(&target.name, curve.evaluate(t));
                }
                TargetKind::Trigger { .. } | TargetKind::Action { .. } => {}
            }
        }
    }

    fn end_update(&mut self) {
        self.update_depth = self.update_depth.saturating_sub(1);
        if self.update_depth > 0 {
            return;
        }
        let changed = self.touched || self.targets.iter().any(Target::is_dirty);
        if !changed {
            return;
        }
        let length = self.length;
        for target in &mut self.targets {
            if target.repair(length) {
                log::warn!("repaired curves of target '{}'", target.name);
            }
            if self.ensure_rotation_continuity {
                target.ensure_rotation_continuity();
            }
            if self.looping {
                for curve in target.curves_mut() {
                    sync_loop_values(curve);
                }
            }
            target.reapply(false);
            if self.looping {
                for curve in target.curves_mut() {
                    sync_loop_tangents(curve);
                }
            }
            target.clear_dirty();
        }
        self.touched = false;
        self.revision += 1;
        log::debug!("clip '{}' updated (revision {})", self.name, self.revision);
    }
}

/// Last keyframe takes the first keyframe's value, unless it is left as is.
fn sync_loop_values(curve: &mut CurveStore) {
    let n = curve.len();
    if n < 2 {
        return;
    }
    let first = curve.keys()[0];
    let last = curve.keys()[n - 1];
    if last.curve_type == CurveType::LeaveAsIs || last.value == first.value {
        return;
    }
    curve.keys_mut()[n - 1].value = first.value;
}

/// Velocity continuity across the wrap: the last keyframe takes the first one's
/// tangents; a smooth first keyframe gets a slope computed across the wrap.
fn sync_loop_tangents(curve: &mut CurveStore) {
    let n = curve.len();
    if n < 2 {
        return;
    }
    let keys = curve.keys();
    let first = keys[0];
    let last = keys[n - 1];
    if last.curve_type == CurveType::LeaveAsIs {
        return;
    }
    let (in_t, out_t) = if first.curve_type == CurveType::Smooth && n >= 3 {
        let s = 0.5 * (slope(&keys[n - 2], &last) + slope(&first, &keys[1]));
        (s, s)
    } else {
        (first.in_tangent, first.out_tangent)
    };
    let keys = curve.keys_mut();
    if first.curve_type == CurveType::Smooth && n >= 3 {
        keys[0].in_tangent = in_t;
        keys[0].out_tangent = out_t;
    }
    keys[n - 1].in_tangent = in_t;
    keys[n - 1].out_tangent = out_t;
    curve.clear_dirty();
}

/// RAII bulk-update scope over a clip.
///
/// Dereferences to the clip for reads; curve edits go through the target
/// accessors. Dropping the outermost scope repairs invariants, recomputes
/// tangents and bumps the clip's revision.
pub struct ClipUpdate<'a> {
    clip: &'a mut Clip,
}

impl Deref for ClipUpdate<'_> {
    type Target = Clip;

    fn deref(&self) -> &Clip {
        self.clip
    }
}

impl Drop for ClipUpdate<'_> {
    fn drop(&mut self) {
        self.clip.end_update();
    }
}

impl ClipUpdate<'_> {
    /// Open a nested scope.
    pub fn begin_update(&mut self) -> ClipUpdate<'_> {
        self.clip.begin_update()
    }

    pub fn target_mut(&mut self, name: &str) -> Result<&mut Target> {
        self.clip
            .targets
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| AnimatorError::target_not_found(name))
    }

    pub fn targets_mut(&mut self) -> impl Iterator<Item = &mut Target> {
        self.clip.targets.iter_mut()
    }

    /// Add a target; names are unique within a clip.
    pub fn add_target(&mut self, target: Target) -> Result<&mut Target> {
        if self.clip.target(&target.name).is_some() {
            return Err(AnimatorError::validation(format!(
                "clip '{}' already has a target named '{}'",
                self.clip.name, target.name
            )));
        }
        self.clip.touched = true;
        self.clip.targets.push(target);
        let last = self.clip.targets.len() - 1;
        Ok(&mut self.clip.targets[last])
    }

    pub fn add_controller(
        &mut self,
        name: &str,
        position: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
    ) -> Result<&mut Target> {
        let length = self.clip.length;
        self.add_target(Target::controller(name, length, position, rotation))
    }

    pub fn add_float_param(&mut self, name: &str, value: f32) -> Result<&mut Target> {
        let length = self.clip.length;
        self.add_target(Target::float_param(name, length, value))
    }

    pub fn add_trigger(&mut self, name: &str) -> Result<&mut Target> {
        self.add_target(Target::trigger(name))
    }

    pub fn add_action(&mut self, name: &str) -> Result<&mut Target> {
        self.add_target(Target::action(name))
    }

    pub fn remove_target(&mut self, name: &str) -> Result<Target> {
        let index = self
            .clip
            .targets
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| AnimatorError::target_not_found(name))?;
        self.clip.touched = true;
        Ok(self.clip.targets.remove(index))
    }

    pub fn set_loop(&mut self, looping: bool) {
        if self.clip.looping != looping {
            self.clip.looping = looping;
            self.clip.touched = true;
        }
    }

    pub fn set_ensure_rotation_continuity(&mut self, enabled: bool) {
        self.clip.ensure_rotation_continuity = enabled;
        self.clip.touched = true;
    }

    pub(crate) fn set_length(&mut self, length: f32) {
        self.clip.length = time::snap(length);
        self.clip.touched = true;
    }

    pub(crate) fn targets_vec_mut(&mut self) -> &mut Vec<Target> {
        self.clip.touched = true;
        &mut self.clip.targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip_with_param(length: f32) -> Clip {
        let mut clip = Clip::new("A", length);
        {
            let mut scope = clip.begin_update();
            scope.add_float_param("p", 0.0).unwrap();
        }
        clip
    }

    #[test]
    fn scope_closes_and_bumps_revision() {
        let mut clip = clip_with_param(2.0);
        let before = clip.revision();
        {
            let mut scope = clip.begin_update();
            {
                let mut inner = scope.begin_update();
                inner
                    .target_mut("p")
                    .unwrap()
                    .set_float_keyframe(1.0, 5.0, CurveType::Smooth)
                    .unwrap();
            }
            assert!(scope.is_updating());
            assert_eq!(scope.revision(), before);
        }
        assert!(!clip.is_updating());
        assert_eq!(clip.revision(), before + 1);
        assert!(!clip.targets()[0].is_dirty());
    }

    #[test]
    fn scope_is_released_when_the_body_fails() {
        let mut clip = clip_with_param(2.0);
        let result: Result<()> = clip.update(|scope| {
            scope
                .target_mut("p")?
                .set_float_keyframe(0.5, 1.0, CurveType::Linear)?;
            scope.target_mut("missing")?;
            Ok(())
        });
        assert!(matches!(result, Err(AnimatorError::NotFound { .. })));
        assert!(!clip.is_updating());
        assert_eq!(clip.targets()[0].curves()[0].len(), 3);
    }

    #[test]
    fn scope_is_released_on_panic() {
        let mut clip = clip_with_param(2.0);
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = clip.begin_update();
            panic!("edit failed");
        }));
        assert!(outcome.is_err());
        assert!(!clip.is_updating());
    }

    #[test]
    fn loop_clip_wraps_continuously() {
        let mut clip = clip_with_param(2.0);
        clip.update(|scope| {
            scope.set_loop(true);
            let t = scope.target_mut("p")?;
            t.set_float_keyframe(0.0, 1.0, CurveType::Smooth)?;
            t.set_float_keyframe(0.7, 4.0, CurveType::Smooth)?;
            t.set_float_keyframe(1.5, -2.0, CurveType::Smooth)?;
            t.set_float_keyframe(2.0, 3.0, CurveType::Smooth)?;
            Ok(())
        })
        .unwrap();
        let curve = &clip.targets()[0].curves()[0];
        assert_eq!(curve.evaluate(0.0), curve.evaluate(2.0));
        let first = curve.first().unwrap();
        let last = curve.last().unwrap();
        assert_eq!(first.out_tangent, last.in_tangent);
    }

    #[test]
    fn duplicate_target_is_rejected() {
        let mut clip = clip_with_param(1.0);
        let mut scope = clip.begin_update();
        let err = scope.add_float_param("p", 1.0).unwrap_err();
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn sample_writes_params_and_clamps_time() {
        let mut clip = clip_with_param(2.0);
        clip.update(|scope| {
            scope
                .target_mut("p")?
                .set_float_keyframe(2.0, 4.0, CurveType::Linear)?;
            scope
                .target_mut("p")?
                .set_float_keyframe(0.0, 0.0, CurveType::Linear)?;
            Ok(())
        })
        .unwrap();
        let mut rig = crate::host::MemoryRig::new();
        clip.sample(1.0, &mut rig);
        assert!((rig.param("p").unwrap() - 2.0).abs() < 1e-5);
        clip.sample(5.0, &mut rig);
        assert_eq!(rig.param("p"), Some(4.0));
    }
}
