//! Playback scheduler: play/stop, clip blending, sequencing and scrub catch-up.
//!
//! The scheduler owns the [`Timeline`] and drives the host through a [`Rig`]
//! once per tick. All work happens inside [`Scheduler::update`]; there are no
//! threads.
//!
//! - `Playing`: play-time advances by `dt * speed`, trigger/action events in
//!   the crossed window fire, and the current clip (cross-faded with an
//!   outgoing clip while a blend runs) is written to the rig.
//! - `Interpolating`: after a scrub while stopped, controllers move towards
//!   the scrubbed pose at bounded speed until within tolerance or until the
//!   wall-clock timeout forces a snap.
//! - `Stopped`: nothing advances.

pub mod picker;
pub mod playback_state;

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::clip::Clip;
use crate::config::Config;
use crate::curve::hermite::lerp_f32;
use crate::error::{AnimatorError, Result};
use crate::host::{HostClock, Rig};
use crate::rotation;
use crate::target::TargetKind;
use crate::time::{self, to_ms};
use crate::timeline::Timeline;

pub use picker::ClipPicker;
pub use playback_state::PlaybackState;

/// Discrete signals emitted while updating.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SchedulerEvent {
    ClipChanged {
        from: Option<String>,
        to: String,
    },
    TriggerFired {
        target: String,
        name: String,
        time: f32,
    },
    ActionFired {
        target: String,
        action: String,
        argument: Option<String>,
        time: f32,
    },
    PlaybackEnded {
        clip: String,
        time: f32,
    },
    /// Scrub catch-up completed; `snapped` when the timeout forced it.
    CatchUpFinished {
        snapped: bool,
    },
}

/// Outgoing clip of a cross-fade.
#[derive(Clone, Debug)]
struct Blend {
    from: String,
    time: f32,
    remaining: f32,
    duration: f32,
}

impl Blend {
    /// Weight of the outgoing clip.
    #[inline]
    fn weight(&self) -> f32 {
        (self.remaining / self.duration).clamp(0.0, 1.0)
    }
}

#[derive(Debug)]
pub struct Scheduler {
    timeline: Timeline,
    cfg: Config,
    state: PlaybackState,
    /// Position within the current clip.
    play_time: f32,
    /// Seconds of play since the current clip started; drives sequencing.
    clip_elapsed: f32,
    sequencing: bool,
    /// Events exactly at the start of the next window fire too.
    window_inclusive: bool,
    blend: Option<Blend>,
    play_queued: bool,
    /// Wall-clock start of the running catch-up, taken on its first update.
    catch_up_started: Option<f64>,
    picker: ClipPicker,
    events: Vec<SchedulerEvent>,
}

impl Scheduler {
    pub fn new(timeline: Timeline, cfg: Config) -> Self {
        let picker = ClipPicker::new(cfg.scheduler.random_seed);
        Self {
            timeline,
            cfg,
            state: PlaybackState::Stopped,
            play_time: 0.0,
            clip_elapsed: 0.0,
            sequencing: true,
            window_inclusive: true,
            blend: None,
            play_queued: false,
            catch_up_started: None,
            picker,
            events: Vec::new(),
        }
    }

    #[inline]
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    #[inline]
    pub fn timeline_mut(&mut self) -> &mut Timeline {
        &mut self.timeline
    }

    pub fn into_timeline(self) -> Timeline {
        self.timeline
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    #[inline]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Current play position within the current clip.
    #[inline]
    pub fn time(&self) -> f32 {
        self.play_time
    }

    #[inline]
    pub fn is_blending(&self) -> bool {
        self.blend.is_some()
    }

    /// Weight of the outgoing clip while a blend runs.
    pub fn blend_weight(&self) -> Option<f32> {
        self.blend.as_ref().map(Blend::weight)
    }

    #[inline]
    pub fn is_play_queued(&self) -> bool {
        self.play_queued
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.timeline.set_speed(speed);
    }

    pub fn drain_events(&mut self) -> Vec<SchedulerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Start playing the current clip. Deferred while a catch-up runs.
    pub fn play(&mut self) -> Result<()> {
        if self.state.defers_play() {
            log::debug!("play queued until catch-up completes");
            self.play_queued = true;
            return Ok(());
        }
        let clip = self.timeline.current()?;
        if !clip.looping() && self.play_time >= clip.length() {
            self.play_time = 0.0;
        }
        self.clip_elapsed = self.play_time;
        self.sequencing = true;
        self.window_inclusive = true;
        self.state = PlaybackState::Playing;
        log::debug!("playing '{}' from {}", clip.name(), self.play_time);
        Ok(())
    }

    /// Select `name` and play it from the start.
    pub fn play_clip(&mut self, name: &str) -> Result<()> {
        self.timeline.select(name)?;
        self.play_time = 0.0;
        self.blend = None;
        self.play()
    }

    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.blend = None;
        self.play_queued = false;
        self.catch_up_started = None;
    }

    /// Move the play position. While playing this jumps; otherwise controllers
    /// catch up with the new pose over the following updates.
    pub fn set_time(&mut self, t: f32) -> Result<()> {
        let clip = self.timeline.current()?;
        self.play_time = clip.clip_time(t);
        self.clip_elapsed = self.play_time;
        self.window_inclusive = true;
        if self.state.is_playing() {
            return Ok(());
        }
        self.state = PlaybackState::Interpolating;
        self.catch_up_started = None;
        Ok(())
    }

    /// Switch to `name`. Blends from the current clip while playing; otherwise
    /// snaps and samples the new clip once. A play queued behind a running
    /// catch-up starts right after the snap.
    pub fn change_animation(&mut self, name: &str, rig: &mut dyn Rig) -> Result<()> {
        let index = self
            .timeline
            .index_of(name)
            .ok_or_else(|| AnimatorError::clip_not_found(name))?;
        if self.state.is_playing() {
            self.switch_to(index);
        } else {
            let from = self.timeline.current_name().map(str::to_string);
            self.timeline.set_current(index);
            self.play_time = 0.0;
            self.clip_elapsed = 0.0;
            self.blend = None;
            self.catch_up_started = None;
            self.state = PlaybackState::Stopped;
            self.events.push(SchedulerEvent::ClipChanged {
                from,
                to: name.to_string(),
            });
            self.sample(rig)?;
            if std::mem::take(&mut self.play_queued) {
                self.play()?;
            }
        }
        Ok(())
    }

    /// Add a blank clip with the configured default blend duration.
    pub fn add_blank_clip(&mut self, name: &str, length: f32) -> Result<usize> {
        let blend = self.cfg.scheduler.default_blend_duration;
        self.timeline.add_blank(name, length, blend)
    }

    /// Write the current pose to the rig without advancing.
    pub fn sample(&self, rig: &mut dyn Rig) -> Result<()> {
        let clip = self.timeline.current()?;
        match &self.blend {
            Some(blend) => match self.timeline.clip(&blend.from) {
                Some(from) => sample_blended(
                    from,
                    blend.time,
                    clip,
                    self.play_time,
                    blend.weight(),
                    rig,
                ),
                None => clip.sample(self.play_time, rig),
            },
            None => clip.sample(self.play_time, rig),
        }
        Ok(())
    }

    /// Advance by `dt` seconds of host time.
    pub fn update(&mut self, dt: f32, rig: &mut dyn Rig, clock: &dyn HostClock) {
        match self.state {
            PlaybackState::Stopped => {}
            PlaybackState::Playing => self.advance(dt, rig),
            PlaybackState::Interpolating => self.catch_up(dt, rig, clock),
        }
    }

    /// Start a blend from the current clip and begin `index` at zero.
    fn switch_to(&mut self, index: usize) {
        let outgoing = self.timeline.current().ok().map(|clip| Blend {
            from: clip.name().to_string(),
            time: self.play_time,
            remaining: clip.blend_duration,
            duration: clip.blend_duration,
        });
        let from = outgoing.as_ref().map(|b| b.from.clone());
        let current = self.timeline.current_index();
        self.blend = outgoing.filter(|b| b.duration > 0.0 && Some(index) != current);
        self.timeline.set_current(index);
        self.play_time = 0.0;
        self.clip_elapsed = 0.0;
        self.sequencing = true;
        self.window_inclusive = true;
        let to = self
            .timeline
            .clip_at(index)
            .map(|c| c.name().to_string())
            .unwrap_or_default();
        log::debug!("switching clip {from:?} -> '{to}'");
        self.events.push(SchedulerEvent::ClipChanged { from, to });
    }

    fn advance(&mut self, dt: f32, rig: &mut dyn Rig) {
        let step = dt * self.timeline.speed();
        let Ok(clip) = self.timeline.current() else {
            self.stop();
            return;
        };
        let length = clip.length();
        let looping = clip.looping();
        let next = clip.next_clip_name.clone().filter(|_| self.sequencing);
        let next_time = if clip.next_clip_time > 0.0 {
            clip.next_clip_time
        } else {
            length
        };

        let from = self.play_time;
        let mut to = from + step;
        let inclusive = std::mem::take(&mut self.window_inclusive);
        let mut ended = false;
        if looping {
            if to >= length {
                fire_window(clip, from, length, inclusive, rig, &mut self.events);
                to = time::wrap(to, length);
                fire_window(clip, 0.0, to, true, rig, &mut self.events);
            } else {
                fire_window(clip, from, to, inclusive, rig, &mut self.events);
            }
        } else {
            if to >= length {
                to = length;
                ended = next.is_none();
            }
            fire_window(clip, from, to, inclusive, rig, &mut self.events);
        }
        self.play_time = to;
        self.clip_elapsed += step;

        if let Some(blend) = &mut self.blend {
            blend.remaining -= step.abs();
            blend.time += step;
            if blend.remaining <= 0.0 {
                self.blend = None;
            }
        }

        if let Some(next) = next {
            if self.clip_elapsed + time::EPSILON >= next_time {
                let current = self.timeline.current_index().unwrap_or(0);
                match self.picker.resolve(&self.timeline, current, &next) {
                    Some(index) => self.switch_to(index),
                    None => {
                        log::warn!("next clip '{next}' not found; sequencing disabled");
                        self.sequencing = false;
                        if !looping && self.play_time >= length {
                            ended = true;
                        }
                    }
                }
            }
        }

        if let Err(err) = self.sample(rig) {
            log::warn!("sampling failed: {err}");
        }
        if ended {
            let name = self.timeline.current_name().unwrap_or_default().to_string();
            log::debug!("'{name}' ended at {}", self.play_time);
            self.events.push(SchedulerEvent::PlaybackEnded {
                clip: name,
                time: self.play_time,
            });
            self.state = PlaybackState::Stopped;
            self.blend = None;
        }
    }

    fn catch_up(&mut self, dt: f32, rig: &mut dyn Rig, clock: &dyn HostClock) {
        let now = clock.now();
        let started = *self.catch_up_started.get_or_insert(now);
        let timed_out = now - started >= self.cfg.scrub.timeout;
        let Ok(clip) = self.timeline.current() else {
            self.stop();
            return;
        };
        let settings = &self.cfg.scrub;
        let t = clip.clip_time(self.play_time);
        let max_distance = settings.max_distance_delta * dt;
        let max_angle = settings.max_angle_delta.to_radians() * dt;
        let mut settled = true;

        for target in clip.targets() {
            match target.kind() {
                TargetKind::Controller { .. } => {
                    let (Some(goal_p), Some(goal_r)) =
                        (target.evaluate_position(t), target.evaluate_rotation(t))
                    else {
                        continue;
                    };
                    let Some(controller) = rig.controller_mut(&target.name) else {
                        continue;
                    };
                    if timed_out {
                        controller.set_position(goal_p);
                        controller.set_rotation(goal_r);
                        continue;
                    }
                    let p = move_towards(controller.position(), goal_p, max_distance);
                    let r = rotate_towards(controller.rotation(), goal_r, max_angle);
                    controller.set_position(p);
                    controller.set_rotation(r);
                    let angle = r.angle_to(&goal_r).to_degrees();
                    if (goal_p - p).norm() > settings.position_tolerance
                        || angle > settings.angle_tolerance
                    {
                        settled = false;
                    }
                }
                TargetKind::FloatParam { curve } => {
                    rig.set_float_param(&target.name, curve.evaluate(t));
                }
                TargetKind::Trigger { .. } | TargetKind::Action { .. } => {}
            }
        }

        if !(settled || timed_out) {
            return;
        }
        if timed_out && !settled {
            log::warn!("catch-up timed out after {:.3}s; snapping", now - started);
        }
        self.catch_up_started = None;
        self.state = PlaybackState::Stopped;
        self.events.push(SchedulerEvent::CatchUpFinished { snapped: timed_out });
        if std::mem::take(&mut self.play_queued) {
            if let Err(err) = self.play() {
                log::warn!("queued play failed: {err}");
            }
        }
    }
}

fn move_towards(from: Vector3<f32>, goal: Vector3<f32>, max_step: f32) -> Vector3<f32> {
    let delta = goal - from;
    let distance = delta.norm();
    if distance <= max_step || distance == 0.0 {
        goal
    } else {
        from + delta * (max_step / distance)
    }
}

fn rotate_towards(
    from: UnitQuaternion<f32>,
    goal: UnitQuaternion<f32>,
    max_angle: f32,
) -> UnitQuaternion<f32> {
    let angle = from.angle_to(&goal);
    if angle <= max_angle || angle == 0.0 {
        return goal;
    }
    from.try_slerp(&goal, max_angle / angle, 1.0e-6)
        .unwrap_or(goal)
}

/// Fire trigger and action events with millisecond keys in `(from, to]`
/// (`[from, to]` when `inclusive`).
fn fire_window(
    clip: &Clip,
    from: f32,
    to: f32,
    inclusive: bool,
    rig: &mut dyn Rig,
    out: &mut Vec<SchedulerEvent>,
) {
    let lo = to_ms(from);
    let hi = to_ms(to);
    if hi < lo {
        return;
    }
    let in_window = |ms: i64| (ms > lo || (inclusive && ms == lo)) && ms <= hi;
    for target in clip.targets() {
        match target.kind() {
            TargetKind::Trigger { events } => {
                for (ms, event) in events.range(lo..=hi).filter(|(ms, _)| in_window(**ms)) {
                    rig.fire_trigger(&target.name, event);
                    out.push(SchedulerEvent::TriggerFired {
                        target: target.name.clone(),
                        name: event.name.clone(),
                        time: time::from_ms(*ms),
                    });
                }
            }
            TargetKind::Action { events } => {
                for (ms, event) in events.range(lo..=hi).filter(|(ms, _)| in_window(**ms)) {
                    rig.invoke_action(&target.name, event);
                    out.push(SchedulerEvent::ActionFired {
                        target: target.name.clone(),
                        action: event.action.clone(),
                        argument: event.argument.clone(),
                        time: time::from_ms(*ms),
                    });
                }
            }
            TargetKind::Controller { .. } | TargetKind::FloatParam { .. } => {}
        }
    }
}

/// Cross-fade: `weight` is the outgoing clip's share.
fn sample_blended(
    from: &Clip,
    from_time: f32,
    to: &Clip,
    to_time: f32,
    weight: f32,
    rig: &mut dyn Rig,
) {
    let tf = from.clip_time(from_time);
    let tt = to.clip_time(to_time);
    let w_in = 1.0 - weight;
    for target in to.targets() {
        let outgoing = from.target(&target.name);
        match target.kind() {
            TargetKind::Controller { .. } => {
                let (Some(p_in), Some(r_in)) =
                    (target.evaluate_position(tt), target.evaluate_rotation(tt))
                else {
                    continue;
                };
                let (p, r) = match outgoing
                    .and_then(|o| Some((o.evaluate_position(tf)?, o.evaluate_rotation(tf)?)))
                {
                    Some((p_out, r_out)) => {
                        let q = rotation::nlerp_quat(
                            rotation::from_unit(&r_out),
                            rotation::from_unit(&r_in),
                            w_in,
                        );
                        (p_out.lerp(&p_in, w_in), rotation::to_unit(q))
                    }
                    None => (p_in, r_in),
                };
                if let Some(controller) = rig.controller_mut(&target.name) {
                    controller.set_position(p);
                    controller.set_rotation(r);
                }
            }
            TargetKind::FloatParam { curve } => {
                let v_in = curve.evaluate(tt);
                let v = match outgoing.and_then(|o| o.evaluate_float(tf)) {
                    Some(v_out) => lerp_f32(v_out, v_in, w_in),
                    None => v_in,
                };
                rig.set_float_param(&target.name, v);
            }
            TargetKind::Trigger { .. } | TargetKind::Action { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::curve::CurveType;
    use crate::host::{ManualClock, MemoryRig};
    use crate::target::TriggerEvent;

    fn param_clip(name: &str, length: f32, from: f32, to: f32) -> Clip {
        let mut clip = Clip::new(name, length);
        clip.update(|scope| {
            let t = scope.add_float_param("p", from)?;
            t.set_float_keyframe(0.0, from, CurveType::Linear)?;
            t.set_float_keyframe(length, to, CurveType::Linear)?;
            Ok(())
        })
        .unwrap();
        clip
    }

    fn scheduler(clips: Vec<Clip>) -> Scheduler {
        let mut cfg = Config::default();
        cfg.scheduler.random_seed = Some(9);
        Scheduler::new(Timeline::from_clips(clips).unwrap(), cfg)
    }

    #[test]
    fn non_loop_clip_stops_at_end() {
        let mut s = scheduler(vec![param_clip("A", 1.0, 0.0, 1.0)]);
        let mut rig = MemoryRig::new();
        let clock = ManualClock::default();
        s.play().unwrap();
        for _ in 0..5 {
            s.update(0.25, &mut rig, &clock);
        }
        assert_eq!(s.state(), PlaybackState::Stopped);
        assert_eq!(s.time(), 1.0);
        assert_eq!(rig.param("p"), Some(1.0));
        let events = s.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, SchedulerEvent::PlaybackEnded { clip, .. } if clip == "A")));
    }

    #[test]
    fn loop_clip_wraps() {
        let mut a = param_clip("A", 1.0, 0.0, 0.0);
        a.update(|scope| {
            scope.set_loop(true);
            Ok(())
        })
        .unwrap();
        let mut s = scheduler(vec![a]);
        let mut rig = MemoryRig::new();
        let clock = ManualClock::default();
        s.play().unwrap();
        for _ in 0..6 {
            s.update(0.25, &mut rig, &clock);
        }
        assert!(s.state().is_playing());
        assert!((s.time() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn change_animation_blends_while_playing() {
        let mut s = scheduler(vec![
            param_clip("A", 2.0, 0.0, 0.0),
            param_clip("B", 2.0, 10.0, 10.0),
        ]);
        let mut rig = MemoryRig::new();
        let clock = ManualClock::default();
        s.play().unwrap();
        s.update(0.5, &mut rig, &clock);
        s.change_animation("B", &mut rig).unwrap();
        assert!(s.is_blending());
        s.update(0.5, &mut rig, &clock);
        let v = rig.param("p").unwrap();
        assert!((v - 5.0).abs() < 1e-4, "halfway blend, got {v}");
        s.update(0.5, &mut rig, &clock);
        assert!(!s.is_blending());
        assert_eq!(rig.param("p"), Some(10.0));
    }

    #[test]
    fn change_animation_unknown_is_not_found() {
        let mut s = scheduler(vec![param_clip("A", 1.0, 0.0, 0.0)]);
        let mut rig = MemoryRig::new();
        let err = s.change_animation("Z", &mut rig).unwrap_err();
        assert_eq!(err.category(), "not_found");
    }

    #[test]
    fn change_animation_while_stopped_samples_once() {
        let mut s = scheduler(vec![
            param_clip("A", 1.0, 0.0, 0.0),
            param_clip("B", 1.0, 3.0, 3.0),
        ]);
        let mut rig = MemoryRig::new();
        s.change_animation("B", &mut rig).unwrap();
        assert_eq!(s.state(), PlaybackState::Stopped);
        assert_eq!(rig.param("p"), Some(3.0));
    }

    #[test]
    fn triggers_fire_once_when_crossed() {
        let mut clip = param_clip("A", 1.0, 0.0, 0.0);
        clip.update(|scope| {
            scope
                .add_trigger("fx")?
                .set_trigger(0.5, TriggerEvent { name: "boom".into() })?;
            Ok(())
        })
        .unwrap();
        let mut s = scheduler(vec![clip]);
        let mut rig = MemoryRig::new();
        let clock = ManualClock::default();
        s.play().unwrap();
        s.update(0.25, &mut rig, &clock);
        assert!(rig.fired.is_empty());
        s.update(0.25, &mut rig, &clock);
        s.update(0.25, &mut rig, &clock);
        assert_eq!(rig.fired, vec!["fx:boom".to_string()]);
    }

    #[test]
    fn missing_next_clip_disables_sequencing() {
        let mut a = param_clip("A", 1.0, 0.0, 0.0);
        a.next_clip_name = Some("ghost".into());
        a.next_clip_time = 0.5;
        let mut s = scheduler(vec![a]);
        let mut rig = MemoryRig::new();
        let clock = ManualClock::default();
        s.play().unwrap();
        s.update(0.75, &mut rig, &clock);
        assert!(s.state().is_playing());
        assert_eq!(s.timeline().current_name(), Some("A"));
        s.update(0.5, &mut rig, &clock);
        assert_eq!(s.state(), PlaybackState::Stopped);
    }

    /// Controller "hand" sliding linearly from the origin to x = 4 over 4 s.
    fn slide_clip() -> Clip {
        let mut clip = Clip::new("slide", 4.0);
        clip.update(|scope| {
            let hand = scope.add_controller("hand", Vector3::zeros(), UnitQuaternion::identity())?;
            let rest = UnitQuaternion::identity();
            hand.set_controller_keyframe(0.0, Vector3::zeros(), rest, CurveType::Linear)?;
            hand.set_controller_keyframe(4.0, Vector3::new(4.0, 0.0, 0.0), rest, CurveType::Linear)?;
            Ok(())
        })
        .unwrap();
        clip
    }

    fn hand_x(rig: &MemoryRig) -> f32 {
        rig.controller("hand").unwrap().position.x
    }

    #[test]
    fn scrub_catch_up_is_bounded_then_snaps_on_timeout() {
        let mut s = scheduler(vec![slide_clip()]);
        let mut rig = MemoryRig::new().with_controller("hand");
        let mut clock = ManualClock::default();
        s.set_time(4.0).unwrap();
        assert_eq!(s.state(), PlaybackState::Interpolating);

        for expected in [0.1, 0.2, 0.3] {
            s.update(0.1, &mut rig, &clock);
            clock.advance(0.1);
            assert_abs_diff_eq!(hand_x(&rig), expected, epsilon = 1e-4);
        }
        assert_eq!(s.state(), PlaybackState::Interpolating);

        s.play().unwrap();
        assert!(s.is_play_queued());
        assert_eq!(s.state(), PlaybackState::Interpolating);

        clock.advance(1.0);
        s.update(0.1, &mut rig, &clock);
        assert_abs_diff_eq!(hand_x(&rig), 4.0, epsilon = 1e-4);
        assert!(s
            .drain_events()
            .contains(&SchedulerEvent::CatchUpFinished { snapped: true }));
        assert_eq!(s.state(), PlaybackState::Playing);
        assert!(!s.is_play_queued());
    }

    #[test]
    fn scrub_catch_up_settles_within_tolerance() {
        let mut s = scheduler(vec![slide_clip()]);
        let mut rig = MemoryRig::new().with_controller("hand");
        let clock = ManualClock::default();
        s.set_time(0.2).unwrap();
        for _ in 0..5 {
            s.update(0.1, &mut rig, &clock);
        }
        assert_eq!(s.state(), PlaybackState::Stopped);
        assert_abs_diff_eq!(hand_x(&rig), 0.2, epsilon = 1e-4);
        let events = s.drain_events();
        assert!(events.contains(&SchedulerEvent::CatchUpFinished { snapped: false }));
        assert!(!events.contains(&SchedulerEvent::CatchUpFinished { snapped: true }));
    }

    #[test]
    fn change_during_catch_up_runs_the_queued_play() {
        let mut s = scheduler(vec![slide_clip(), param_clip("B", 1.0, 0.0, 1.0)]);
        let mut rig = MemoryRig::new().with_controller("hand");
        let clock = ManualClock::default();
        s.set_time(0.5).unwrap();
        s.play().unwrap();
        assert!(s.is_play_queued());
        s.change_animation("B", &mut rig).unwrap();
        assert_eq!(s.state(), PlaybackState::Playing);
        assert!(!s.is_play_queued());
        assert_eq!(s.timeline().current_name(), Some("B"));
        s.update(0.5, &mut rig, &clock);
        assert_abs_diff_eq!(rig.param("p").unwrap(), 0.5, epsilon = 1e-4);
    }

    #[test]
    fn blank_clips_take_the_configured_blend() {
        let mut cfg = Config::default();
        cfg.scheduler.default_blend_duration = 0.25;
        let timeline = Timeline::from_clips([param_clip("A", 1.0, 0.0, 1.0)]).unwrap();
        let mut s = Scheduler::new(timeline, cfg);
        s.add_blank_clip("B", 1.0).unwrap();
        let b = s.timeline().clip("B").unwrap();
        assert_eq!(b.blend_duration, 0.25);
        assert!(b.target("p").is_some());
    }

    #[test]
    fn rotate_towards_is_bounded() {
        let from = UnitQuaternion::identity();
        let goal = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 1.0);
        let r = rotate_towards(from, goal, 0.25);
        assert!((from.angle_to(&r) - 0.25).abs() < 1e-4);
        assert_eq!(rotate_towards(from, goal, 2.0), goal);
    }
}
