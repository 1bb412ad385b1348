//! Animatable channel bundles within a clip.
//!
//! A [`Target`] is a closed set of variants: a controller (3 position + 4
//! rotation curves), a float parameter (1 curve), or a discrete event map
//! (triggers and actions). Behaviour is dispatched by matching on
//! [`TargetKind`], so adding a variant is a single, compiler-checked change.

use std::collections::BTreeMap;

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::curve::{CurveStore, CurveType};
use crate::error::{AnimatorError, Result};
use crate::host::Controller;
use crate::rotation::{self, ensure_quaternion_continuity};
use crate::time::{self, from_ms, to_ms};

pub const POS_X: usize = 0;
pub const POS_Y: usize = 1;
pub const POS_Z: usize = 2;
pub const ROT_X: usize = 3;
pub const ROT_Y: usize = 4;
pub const ROT_Z: usize = 5;
pub const ROT_W: usize = 6;

/// Named host trigger fired when playback crosses its time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub name: String,
}

/// Host action invocation with an optional argument.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    pub action: String,
    #[serde(default)]
    pub argument: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetKind {
    /// Position x,y,z then rotation x,y,z,w.
    Controller { curves: [CurveStore; 7] },
    FloatParam { curve: CurveStore },
    Trigger {
        #[serde(with = "ms_keys")]
        events: BTreeMap<i64, TriggerEvent>,
    },
    Action {
        #[serde(with = "ms_keys")]
        events: BTreeMap<i64, ActionEvent>,
    },
}

/// Millisecond-keyed event maps go through string keys. The tagged enum
/// buffers its content, and buffered JSON keys no longer parse as integers.
mod ms_keys {
    use std::collections::BTreeMap;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, E>(map: &BTreeMap<i64, E>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        E: Serialize,
    {
        serializer.collect_map(map.iter().map(|(ms, event)| (ms.to_string(), event)))
    }

    pub fn deserialize<'de, D, E>(deserializer: D) -> Result<BTreeMap<i64, E>, D::Error>
    where
        D: Deserializer<'de>,
        E: Deserialize<'de>,
    {
        BTreeMap::<String, E>::deserialize(deserializer)?
            .into_iter()
            .map(|(key, event)| match key.parse::<i64>() {
                Ok(ms) => Ok((ms, event)),
                Err(_) => Err(D::Error::custom(format!(
                    "event time '{key}' is not whole milliseconds"
                ))),
            })
            .collect()
    }
}

/// One animatable channel bundle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    #[serde(default)]
    pub selected: bool,
    /// Curve type per lead-curve keyframe, keyed by millisecond.
    #[serde(default)]
    settings: BTreeMap<i64, CurveType>,
    kind: TargetKind,
}

impl Target {
    /// Controller target holding `position`/`rotation` over `[0, length]`.
    pub fn controller(
        name: impl Into<String>,
        length: f32,
        position: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
    ) -> Self {
        let q = rotation::from_unit(&rotation);
        let values = [position.x, position.y, position.z, q[0], q[1], q[2], q[3]];
        let curves = values.map(|v| CurveStore::with_edges(length, v, CurveType::Smooth));
        let mut target = Self {
            name: name.into(),
            selected: false,
            settings: BTreeMap::new(),
            kind: TargetKind::Controller { curves },
        };
        target.settings.insert(0, CurveType::Smooth);
        target.settings.insert(to_ms(length), CurveType::Smooth);
        target
    }

    pub fn float_param(name: impl Into<String>, length: f32, value: f32) -> Self {
        let mut target = Self {
            name: name.into(),
            selected: false,
            settings: BTreeMap::new(),
            kind: TargetKind::FloatParam {
                curve: CurveStore::with_edges(length, value, CurveType::Smooth),
            },
        };
        target.settings.insert(0, CurveType::Smooth);
        target.settings.insert(to_ms(length), CurveType::Smooth);
        target
    }

    pub fn trigger(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selected: false,
            settings: BTreeMap::new(),
            kind: TargetKind::Trigger {
                events: BTreeMap::new(),
            },
        }
    }

    pub fn action(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            selected: false,
            settings: BTreeMap::new(),
            kind: TargetKind::Action {
                events: BTreeMap::new(),
            },
        }
    }

    /// Swap in rebuilt curves and their settings, keeping name and selection.
    pub(crate) fn replace_curves(&mut self, kind: TargetKind, settings: BTreeMap<i64, CurveType>) {
        self.kind = kind;
        self.settings = settings;
        for curve in self.curves_mut() {
            curve.mark_dirty();
        }
    }

    #[inline]
    pub fn kind(&self) -> &TargetKind {
        &self.kind
    }

    #[inline]
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            TargetKind::Controller { .. } => "controller",
            TargetKind::FloatParam { .. } => "float_param",
            TargetKind::Trigger { .. } => "trigger",
            TargetKind::Action { .. } => "action",
        }
    }

    #[inline]
    pub fn settings(&self) -> &BTreeMap<i64, CurveType> {
        &self.settings
    }

    /// All scalar curves; empty for event targets.
    pub fn curves(&self) -> &[CurveStore] {
        match &self.kind {
            TargetKind::Controller { curves } => curves,
            TargetKind::FloatParam { curve } => std::slice::from_ref(curve),
            TargetKind::Trigger { .. } | TargetKind::Action { .. } => &[],
        }
    }

    pub(crate) fn curves_mut(&mut self) -> &mut [CurveStore] {
        match &mut self.kind {
            TargetKind::Controller { curves } => curves,
            TargetKind::FloatParam { curve } => std::slice::from_mut(curve),
            TargetKind::Trigger { .. } | TargetKind::Action { .. } => &mut [],
        }
    }

    /// The reference curve used to enumerate keyframe times.
    #[inline]
    pub fn lead_curve(&self) -> Option<&CurveStore> {
        self.curves().first()
    }

    /// Keyframe times of the lead curve, or event times for event targets.
    pub fn keyframe_times(&self) -> Vec<f32> {
        match &self.kind {
            TargetKind::Trigger { events } => events.keys().map(|ms| from_ms(*ms)).collect(),
            TargetKind::Action { events } => events.keys().map(|ms| from_ms(*ms)).collect(),
            _ => self
                .lead_curve()
                .map(CurveStore::keyframe_times)
                .unwrap_or_default(),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.curves().iter().any(CurveStore::is_dirty)
    }

    /// Write a controller pose keyframe on all seven curves.
    pub fn set_controller_keyframe(
        &mut self,
        time: f32,
        position: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
        curve_type: CurveType,
    ) -> Result<()> {
        let TargetKind::Controller { curves } = &mut self.kind else {
            return Err(self.wrong_kind("controller"));
        };
        let q = rotation::from_unit(&rotation);
        let values = [position.x, position.y, position.z, q[0], q[1], q[2], q[3]];
        for (curve, value) in curves.iter_mut().zip(values) {
            curve.set_keyframe(time, value, curve_type);
        }
        self.settings.insert(to_ms(time.max(0.0)), curve_type);
        Ok(())
    }

    /// Record the controller's current local pose as a keyframe.
    pub fn record_from(
        &mut self,
        time: f32,
        controller: &dyn Controller,
        curve_type: CurveType,
    ) -> Result<()> {
        self.set_controller_keyframe(
            time,
            controller.position(),
            controller.rotation(),
            curve_type,
        )
    }

    pub fn set_float_keyframe(&mut self, time: f32, value: f32, curve_type: CurveType) -> Result<()> {
        let TargetKind::FloatParam { curve } = &mut self.kind else {
            return Err(self.wrong_kind("float_param"));
        };
        curve.set_keyframe(time, value, curve_type);
        self.settings.insert(to_ms(time.max(0.0)), curve_type);
        Ok(())
    }

    pub fn set_trigger(&mut self, time: f32, event: TriggerEvent) -> Result<()> {
        let TargetKind::Trigger { events } = &mut self.kind else {
            return Err(self.wrong_kind("trigger"));
        };
        events.insert(to_ms(time.max(0.0)), event);
        Ok(())
    }

    pub fn set_action(&mut self, time: f32, event: ActionEvent) -> Result<()> {
        let TargetKind::Action { events } = &mut self.kind else {
            return Err(self.wrong_kind("action"));
        };
        events.insert(to_ms(time.max(0.0)), event);
        Ok(())
    }

    fn wrong_kind(&self, expected: &str) -> AnimatorError {
        AnimatorError::invalid_operation(format!(
            "target '{}' is a {} target, not {}",
            self.name,
            self.kind_name(),
            expected
        ))
    }

    /// Change the curve type at `time` on every curve of this target.
    pub fn set_curve_type(&mut self, time: f32, curve_type: CurveType) -> bool {
        let mut any = false;
        for curve in self.curves_mut() {
            any |= curve.set_curve_type(time, curve_type);
        }
        if any {
            self.settings.insert(to_ms(time), curve_type);
        }
        any
    }

    /// Delete the keyframe (or event) at `time`. Curve targets refuse when a
    /// curve would drop below two keyframes.
    pub fn delete_frame(&mut self, time: f32) -> bool {
        let ms = to_ms(time);
        match &mut self.kind {
            TargetKind::Trigger { events } => return events.remove(&ms).is_some(),
            TargetKind::Action { events } => return events.remove(&ms).is_some(),
            TargetKind::Controller { .. } | TargetKind::FloatParam { .. } => {}
        }
        if self.curves().iter().any(|c| c.len() <= 2) {
            return false;
        }
        let mut deleted = false;
        for curve in self.curves_mut() {
            deleted |= curve.delete_frame(time);
        }
        if deleted {
            self.settings.remove(&ms);
        }
        deleted
    }

    pub fn trigger_events(&self) -> Option<&BTreeMap<i64, TriggerEvent>> {
        match &self.kind {
            TargetKind::Trigger { events } => Some(events),
            _ => None,
        }
    }

    pub fn action_events(&self) -> Option<&BTreeMap<i64, ActionEvent>> {
        match &self.kind {
            TargetKind::Action { events } => Some(events),
            _ => None,
        }
    }

    pub fn evaluate_position(&self, t: f32) -> Option<Vector3<f32>> {
        match &self.kind {
            TargetKind::Controller { curves } => Some(Vector3::new(
                curves[POS_X].evaluate(t),
                curves[POS_Y].evaluate(t),
                curves[POS_Z].evaluate(t),
            )),
            _ => None,
        }
    }

    pub fn evaluate_rotation(&self, t: f32) -> Option<UnitQuaternion<f32>> {
        match &self.kind {
            TargetKind::Controller { curves } => Some(rotation::to_unit([
                curves[ROT_X].evaluate(t),
                curves[ROT_Y].evaluate(t),
                curves[ROT_Z].evaluate(t),
                curves[ROT_W].evaluate(t),
            ])),
            _ => None,
        }
    }

    pub fn evaluate_float(&self, t: f32) -> Option<f32> {
        match &self.kind {
            TargetKind::FloatParam { curve } => Some(curve.evaluate(t)),
            _ => None,
        }
    }

    /// Every curve evaluated at `t`, in curve order.
    pub fn snapshot(&self, t: f32) -> Vec<f32> {
        self.curves().iter().map(|c| c.evaluate(t)).collect()
    }

    /// Write `values` (one per curve) as keyframes at `t`.
    pub(crate) fn write_snapshot(&mut self, t: f32, values: &[f32], curve_type: CurveType) {
        let mut wrote = false;
        for (curve, value) in self.curves_mut().iter_mut().zip(values) {
            curve.set_keyframe(t, *value, curve_type);
            wrote = true;
        }
        if wrote {
            self.settings.insert(to_ms(t), curve_type);
        }
    }

    /// Remap every keyframe, setting and event time; `None` drops it.
    pub(crate) fn map_times(&mut self, mut f: impl FnMut(f32) -> Option<f32>) {
        for curve in self.curves_mut() {
            curve.map_times(&mut f);
        }
        let settings = std::mem::take(&mut self.settings);
        for (ms, ty) in settings {
            if let Some(t) = f(from_ms(ms)) {
                self.settings.insert(to_ms(t), ty);
            }
        }
        match &mut self.kind {
            TargetKind::Trigger { events } => remap_events(events, &mut f),
            TargetKind::Action { events } => remap_events(events, &mut f),
            _ => {}
        }
    }

    /// Replicate keyframes and events `count` times at offsets of `period`.
    pub(crate) fn replicate(&mut self, period: f32, count: usize) {
        let period_ms = to_ms(period);
        for curve in self.curves_mut() {
            let originals: Vec<_> = curve.keys().to_vec();
            for k in 1..count {
                let offset = time::from_ms(period_ms * k as i64);
                for key in originals.iter().filter(|key| key.ms() > 0) {
                    let mut copy = *key;
                    copy.time = key.time + offset;
                    curve.insert(copy);
                }
            }
        }
        let settings = self.settings.clone();
        for k in 1..count as i64 {
            for (ms, ty) in settings.iter().filter(|(ms, _)| **ms > 0) {
                self.settings.insert(ms + period_ms * k, *ty);
            }
        }
        match &mut self.kind {
            TargetKind::Trigger { events } => replicate_events(events, period_ms, count),
            TargetKind::Action { events } => replicate_events(events, period_ms, count),
            _ => {}
        }
    }

    /// Clip invariants: edges present, nothing beyond `length`, settings only at
    /// existing keyframes, events inside `[0, length]`.
    pub(crate) fn repair(&mut self, length: f32) -> bool {
        let mut repaired = false;
        for curve in self.curves_mut() {
            repaired |= curve.repair(length);
        }
        let length_ms = to_ms(length);
        match &mut self.kind {
            TargetKind::Trigger { events } => events.retain(|ms, _| (0..=length_ms).contains(ms)),
            TargetKind::Action { events } => events.retain(|ms, _| (0..=length_ms).contains(ms)),
            _ => {}
        }
        if let Some(lead) = self.curves().first() {
            let present: Vec<i64> = lead.keys().iter().map(|k| k.ms()).collect();
            self.settings.retain(|ms, _| present.binary_search(ms).is_ok());
        }
        repaired
    }

    /// Push settings onto the curves and recompute tangents of dirty curves.
    pub(crate) fn reapply(&mut self, force: bool) {
        let settings = std::mem::take(&mut self.settings);
        for curve in self.curves_mut() {
            if !(force || curve.is_dirty()) {
                continue;
            }
            for key in curve.keys_mut() {
                if let Some(ty) = settings.get(&key.ms()) {
                    key.curve_type = *ty;
                }
            }
            curve.reapply_curve_types();
        }
        self.settings = settings;
    }

    pub(crate) fn ensure_rotation_continuity(&mut self) -> usize {
        match &mut self.kind {
            TargetKind::Controller { curves } => {
                ensure_quaternion_continuity(&mut curves[ROT_X..=ROT_W])
            }
            _ => 0,
        }
    }

    pub(crate) fn clear_dirty(&mut self) {
        for curve in self.curves_mut() {
            curve.clear_dirty();
        }
    }
}

fn remap_events<E>(events: &mut BTreeMap<i64, E>, f: &mut impl FnMut(f32) -> Option<f32>) {
    let old = std::mem::take(events);
    for (ms, ev) in old {
        if let Some(t) = f(from_ms(ms)) {
            events.insert(to_ms(t), ev);
        }
    }
}

/// Copy events in `[0, period]` into each following cycle. An event on the old
/// end lands on every cycle end; where a cycle start shares that millisecond,
/// the start event wins.
fn replicate_events<E: Clone>(events: &mut BTreeMap<i64, E>, period_ms: i64, count: usize) {
    let originals: Vec<(i64, E)> = events
        .iter()
        .filter(|(ms, _)| **ms <= period_ms)
        .map(|(ms, e)| (*ms, e.clone()))
        .collect();
    for k in 1..count as i64 {
        for (ms, ev) in &originals {
            events.insert(ms + period_ms * k, ev.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_targets_start_with_two_edge_keyframes() {
        let t = Target::controller(
            "hand",
            2.0,
            Vector3::new(1.0, 2.0, 3.0),
            UnitQuaternion::identity(),
        );
        assert_eq!(t.curves().len(), 7);
        for c in t.curves() {
            assert_eq!(c.keyframe_times(), vec![0.0, 2.0]);
        }
        let f = Target::float_param("morph", 1.0, 0.5);
        assert_eq!(f.curves().len(), 1);
        assert_eq!(f.evaluate_float(0.3), Some(0.5));
        assert!(Target::trigger("fx").curves().is_empty());
    }

    #[test]
    fn controller_keyframe_writes_all_curves_and_settings() {
        let mut t = Target::controller("hand", 2.0, Vector3::zeros(), UnitQuaternion::identity());
        t.set_controller_keyframe(
            1.0,
            Vector3::new(0.0, 1.0, 0.0),
            UnitQuaternion::identity(),
            CurveType::Linear,
        )
        .unwrap();
        assert!(t.curves().iter().all(|c| c.len() == 3));
        assert_eq!(t.settings().get(&1000), Some(&CurveType::Linear));
        t.reapply(false);
        let p = t.evaluate_position(1.0).unwrap();
        assert!((p.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn wrong_kind_is_an_invalid_operation() {
        let mut t = Target::trigger("fx");
        let err = t.set_float_keyframe(0.0, 1.0, CurveType::Flat).unwrap_err();
        assert_eq!(err.category(), "invalid_operation");
    }

    #[test]
    fn delete_frame_removes_setting() {
        let mut t = Target::float_param("p", 2.0, 0.0);
        t.set_float_keyframe(1.0, 1.0, CurveType::Flat).unwrap();
        assert!(t.delete_frame(1.0));
        assert!(!t.settings().contains_key(&1000));
        assert!(!t.delete_frame(0.0));
    }

    #[test]
    fn event_targets_round_trip_through_json() {
        let mut fx = Target::trigger("fx");
        fx.set_trigger(1.0, TriggerEvent { name: "boom".into() }).unwrap();
        let text = serde_json::to_string(&fx).unwrap();
        assert!(text.contains("\"1000\""));
        let back: Target = serde_json::from_str(&text).unwrap();
        assert_eq!(back, fx);

        let mut voice = Target::action("voice");
        voice
            .set_action(
                0.25,
                ActionEvent {
                    action: "say".into(),
                    argument: Some("hop".into()),
                },
            )
            .unwrap();
        let back: Target = serde_json::from_str(&serde_json::to_string(&voice).unwrap()).unwrap();
        assert_eq!(
            back.action_events().unwrap().get(&250),
            voice.action_events().unwrap().get(&250)
        );
    }

    #[test]
    fn non_numeric_event_time_is_rejected() {
        let text = r#"{"name":"fx","kind":{"type":"trigger","events":{"soon":{"name":"a"}}}}"#;
        assert!(serde_json::from_str::<Target>(text).is_err());
    }

    #[test]
    fn end_events_replicate_to_every_cycle_end() {
        let mut fx = Target::trigger("fx");
        fx.set_trigger(0.5, TriggerEvent { name: "mid".into() }).unwrap();
        fx.set_trigger(2.0, TriggerEvent { name: "end".into() }).unwrap();
        fx.replicate(2.0, 3);
        assert_eq!(fx.keyframe_times(), vec![0.5, 2.0, 2.5, 4.0, 4.5, 6.0]);
        let events = fx.trigger_events().unwrap();
        assert_eq!(events[&6000].name, "end");
        assert_eq!(events[&4500].name, "mid");
    }

    #[test]
    fn cycle_start_wins_a_shared_boundary() {
        let mut fx = Target::trigger("fx");
        fx.set_trigger(0.0, TriggerEvent { name: "start".into() }).unwrap();
        fx.set_trigger(2.0, TriggerEvent { name: "end".into() }).unwrap();
        fx.replicate(2.0, 2);
        let events = fx.trigger_events().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[&2000].name, "start");
        assert_eq!(events[&4000].name, "end");
    }

    #[test]
    fn repair_drops_out_of_range_events() {
        let mut t = Target::trigger("fx");
        t.set_trigger(0.5, TriggerEvent { name: "a".into() }).unwrap();
        t.set_trigger(3.0, TriggerEvent { name: "b".into() }).unwrap();
        t.repair(2.0);
        assert_eq!(t.keyframe_times(), vec![0.5]);
    }
}
