//! Ordered keyframe storage for a single scalar channel.

use serde::{Deserialize, Serialize};

use super::hermite::{segment_value, slope};
use super::keyframe::{CurveType, Keyframe, KeyframeTuple};
use crate::time::{self, to_ms};

/// Time-ascending keyframes of one scalar channel.
///
/// Times are snapped to milliseconds on insert; two keyframes never share a
/// millisecond. Editing marks the store dirty; tangents are recomputed by
/// [`CurveStore::reapply_curve_types`], which the owning clip runs when its
/// bulk-update scope closes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CurveStore {
    keys: Vec<Keyframe>,
    #[serde(skip)]
    dirty: bool,
}

impl CurveStore {
    /// Two-keyframe curve holding `value` over `[0, length]`.
    pub fn with_edges(length: f32, value: f32, curve_type: CurveType) -> Self {
        let mut curve = Self::default();
        curve.set_keyframe(0.0, value, curve_type);
        curve.set_keyframe(length, value, curve_type);
        curve.reapply_curve_types();
        curve
    }

    /// Build from arbitrary keyframes (sorted, snapped, later duplicates win).
    pub fn from_keyframes(keys: impl IntoIterator<Item = Keyframe>) -> Self {
        let mut curve = Self::default();
        for k in keys {
            curve.insert(k);
        }
        curve
    }

    /// Rebuild from the serializer tuple list. Tangents are kept as given.
    pub fn from_tuples(tuples: &[KeyframeTuple]) -> Self {
        let mut curve = Self::from_keyframes(tuples.iter().map(|t| Keyframe::from(*t)));
        curve.dirty = false;
        curve
    }

    /// Export for an external serializer.
    pub fn to_tuples(&self) -> Vec<KeyframeTuple> {
        self.keys.iter().map(KeyframeTuple::from).collect()
    }

    #[inline]
    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Keyframe> {
        self.keys.get(index)
    }

    #[inline]
    pub fn first(&self) -> Option<&Keyframe> {
        self.keys.first()
    }

    #[inline]
    pub fn last(&self) -> Option<&Keyframe> {
        self.keys.last()
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    #[inline]
    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn keyframe_times(&self) -> Vec<f32> {
        self.keys.iter().map(|k| k.time).collect()
    }

    /// Binary search on the millisecond grid.
    #[inline]
    fn search(&self, time: f32) -> Result<usize, usize> {
        let ms = to_ms(time);
        self.keys.binary_search_by_key(&ms, Keyframe::ms)
    }

    /// Index of the keyframe on the same millisecond as `time`.
    #[inline]
    pub fn index_of(&self, time: f32) -> Option<usize> {
        self.search(time).ok()
    }

    /// Insert or overwrite a keyframe (tangents taken from `key`).
    pub(crate) fn insert(&mut self, mut key: Keyframe) -> usize {
        key.time = time::snap(key.time.max(0.0));
        self.dirty = true;
        match self.search(key.time) {
            Ok(i) => {
                self.keys[i] = key;
                i
            }
            Err(i) => {
                self.keys.insert(i, key);
                i
            }
        }
    }

    /// Insert or overwrite the keyframe at `time`. Negative times clamp to zero.
    /// Returns the keyframe index.
    pub fn set_keyframe(&mut self, time: f32, value: f32, curve_type: CurveType) -> usize {
        let time = time::snap(time.max(0.0));
        self.dirty = true;
        match self.search(time) {
            Ok(i) => {
                let k = &mut self.keys[i];
                k.value = value;
                k.curve_type = curve_type;
                i
            }
            Err(i) => {
                self.keys.insert(i, Keyframe::new(time, value, curve_type));
                i
            }
        }
    }

    /// Change only the curve type of the keyframe at `time`.
    pub fn set_curve_type(&mut self, time: f32, curve_type: CurveType) -> bool {
        match self.search(time) {
            Ok(i) => {
                self.keys[i].curve_type = curve_type;
                self.dirty = true;
                true
            }
            Err(_) => false,
        }
    }

    /// Remove the keyframe nearest to `time` when it lies within one snap step.
    /// Refuses (returns false) when fewer than two keyframes would remain.
    pub fn delete_frame(&mut self, time: f32) -> bool {
        if self.keys.len() <= 2 {
            return false;
        }
        let Some(index) = self.nearest_index(time) else {
            return false;
        };
        if (self.keys[index].time - time).abs() > time::EPSILON {
            return false;
        }
        self.keys.remove(index);
        self.dirty = true;
        true
    }

    fn nearest_index(&self, time: f32) -> Option<usize> {
        match self.search(time) {
            Ok(i) => Some(i),
            Err(i) => {
                let before = i.checked_sub(1);
                let after = (i < self.keys.len()).then_some(i);
                match (before, after) {
                    (Some(b), Some(a)) => {
                        if (time - self.keys[b].time).abs() <= (self.keys[a].time - time).abs() {
                            Some(b)
                        } else {
                            Some(a)
                        }
                    }
                    (Some(b), None) => Some(b),
                    (None, a) => a,
                }
            }
        }
    }

    /// Sample the curve. Times outside the keyed range hold the edge values.
    pub fn evaluate(&self, time: f32) -> f32 {
        let n = self.keys.len();
        match n {
            0 => 0.0,
            1 => self.keys[0].value,
            _ => {
                let first = &self.keys[0];
                let last = &self.keys[n - 1];
                if time <= first.time {
                    return first.value;
                }
                if time >= last.time {
                    return last.value;
                }
                let right = self.keys.partition_point(|k| k.time <= time);
                let left = right - 1;
                segment_value(&self.keys[left], &self.keys[right], time)
            }
        }
    }

    /// Recompute every keyframe's tangents from its curve type and neighbours.
    ///
    /// Runs in two passes: `CopyPrevious` values are propagated first so the
    /// slope computations see final values.
    pub fn reapply_curve_types(&mut self) {
        let n = self.keys.len();
        for i in 1..n {
            if self.keys[i].curve_type == CurveType::CopyPrevious {
                self.keys[i].value = self.keys[i - 1].value;
            }
        }
        for i in 0..n {
            let prev = i.checked_sub(1).map(|p| self.keys[p]);
            let next = self.keys.get(i + 1).copied();
            let key = self.keys[i];
            let to_prev = prev.map(|p| slope(&p, &key));
            let to_next = next.map(|nx| slope(&key, &nx));
            let (in_t, out_t) = match key.curve_type {
                CurveType::LeaveAsIs => continue,
                CurveType::Smooth => {
                    let s = match (to_prev, to_next) {
                        (Some(a), Some(b)) => 0.5 * (a + b),
                        (Some(a), None) => a,
                        (None, Some(b)) => b,
                        (None, None) => 0.0,
                    };
                    (s, s)
                }
                CurveType::Linear => {
                    let inn = to_prev.or(to_next).unwrap_or(0.0);
                    let out = to_next.or(to_prev).unwrap_or(0.0);
                    (inn, out)
                }
                CurveType::Flat => (0.0, 0.0),
                CurveType::CopyPrevious => match prev {
                    Some(p) => (p.out_tangent, p.out_tangent),
                    None => (0.0, 0.0),
                },
                CurveType::FlatLinear => (0.0, to_next.unwrap_or(0.0)),
                CurveType::LinearFlat => (to_prev.unwrap_or(0.0), 0.0),
            };
            let k = &mut self.keys[i];
            k.in_tangent = in_t;
            k.out_tangent = out_t;
        }
    }

    /// Make the curve satisfy the clip invariants: at least two keyframes, first
    /// at zero, last at `length`, nothing outside `[0, length]`.
    /// Returns true when something had to be repaired.
    pub fn repair(&mut self, length: f32) -> bool {
        let length = time::snap(length);
        let mut repaired = false;
        if self.keys.is_empty() {
            self.keys.push(Keyframe::new(0.0, 0.0, CurveType::Flat));
            repaired = true;
        }
        let length_ms = to_ms(length);
        if self.keys.iter().any(|k| k.ms() > length_ms) {
            let at_end = self.evaluate(length);
            self.keys.retain(|k| k.ms() <= length_ms);
            if self.keys.last().map(Keyframe::ms) != Some(length_ms) {
                self.keys
                    .push(Keyframe::new(length, at_end, CurveType::Smooth));
            }
            repaired = true;
        }
        if self.keys.is_empty() {
            self.keys.push(Keyframe::new(0.0, 0.0, CurveType::Flat));
        }
        if self.keys[0].ms() != 0 {
            let first = self.keys[0];
            self.keys
                .insert(0, Keyframe::new(0.0, first.value, CurveType::Flat));
            repaired = true;
        }
        let last = self.keys[self.keys.len() - 1];
        if last.ms() != length_ms {
            self.keys
                .push(Keyframe::new(length, last.value, CurveType::Flat));
            repaired = true;
        }
        if repaired {
            self.dirty = true;
        }
        repaired
    }

    /// Remap every keyframe time; `None` drops the keyframe. Keyframes landing on
    /// the same millisecond collapse onto the later one.
    pub(crate) fn map_times(&mut self, mut f: impl FnMut(f32) -> Option<f32>) {
        let old = std::mem::take(&mut self.keys);
        for mut k in old {
            if let Some(t) = f(k.time) {
                k.time = t;
                self.insert(k);
            }
        }
        self.dirty = true;
    }

    /// Offset every keyframe by `offset` seconds. Keyframes pushed below zero are dropped.
    pub fn shift_times(&mut self, offset: f32) {
        self.map_times(|t| {
            let shifted = t + offset;
            (shifted >= -time::EPSILON).then_some(shifted.max(0.0))
        });
    }

    /// Keep only the keyframes matching the predicate.
    pub(crate) fn retain(&mut self, f: impl FnMut(&Keyframe) -> bool) {
        self.keys.retain(f);
        self.dirty = true;
    }

    #[inline]
    pub(crate) fn keys_mut(&mut self) -> &mut [Keyframe] {
        self.dirty = true;
        &mut self.keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(points: &[(f32, f32)]) -> CurveStore {
        let mut c = CurveStore::default();
        for (t, v) in points {
            c.set_keyframe(*t, *v, CurveType::Smooth);
        }
        c.reapply_curve_types();
        c
    }

    #[test]
    fn set_keyframe_keeps_order_and_overwrites_same_millisecond() {
        let mut c = curve(&[(0.0, 0.0), (2.0, 2.0)]);
        c.set_keyframe(1.0, 5.0, CurveType::Linear);
        c.set_keyframe(1.0004, 6.0, CurveType::Linear);
        assert_eq!(c.len(), 3);
        assert_eq!(c.keyframe_times(), vec![0.0, 1.0, 2.0]);
        assert_eq!(c.get(1).unwrap().value, 6.0);
        assert!(c.is_dirty());
    }

    #[test]
    fn delete_frame_refuses_to_go_below_two() {
        let mut c = curve(&[(0.0, 0.0), (1.0, 1.0), (2.0, 0.0)]);
        assert!(!c.delete_frame(0.7));
        assert!(c.delete_frame(1.0002));
        assert_eq!(c.len(), 2);
        assert!(!c.delete_frame(0.0));
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn linear_keys_evaluate_on_the_chord() {
        let mut c = CurveStore::default();
        c.set_keyframe(0.0, 0.0, CurveType::Linear);
        c.set_keyframe(2.0, 4.0, CurveType::Linear);
        c.reapply_curve_types();
        assert!((c.evaluate(0.5) - 1.0).abs() < 1e-5);
        assert!((c.evaluate(1.5) - 3.0).abs() < 1e-5);
        assert_eq!(c.evaluate(-1.0), 0.0);
        assert_eq!(c.evaluate(3.0), 4.0);
    }

    #[test]
    fn smooth_tangent_is_average_of_neighbour_slopes() {
        let c = curve(&[(0.0, 0.0), (1.0, 10.0), (2.0, 0.0)]);
        let mid = c.get(1).unwrap();
        assert!(mid.in_tangent.abs() < 1e-6);
        assert!(mid.out_tangent.abs() < 1e-6);
        let c = curve(&[(0.0, 0.0), (1.0, 1.0), (3.0, 5.0)]);
        let mid = c.get(1).unwrap();
        assert!((mid.out_tangent - 1.5).abs() < 1e-6);
    }

    #[test]
    fn copy_previous_holds_the_prior_value() {
        let mut c = CurveStore::default();
        c.set_keyframe(0.0, 3.0, CurveType::Linear);
        c.set_keyframe(1.0, 9.0, CurveType::CopyPrevious);
        c.set_keyframe(2.0, 0.0, CurveType::Linear);
        c.reapply_curve_types();
        assert_eq!(c.get(1).unwrap().value, 3.0);
        assert_eq!(c.evaluate(0.5), 3.0);
        assert_eq!(c.evaluate(0.999), 3.0);
    }

    #[test]
    fn flat_linear_pair_holds_a_plateau() {
        let mut c = CurveStore::default();
        c.set_keyframe(0.0, 0.0, CurveType::Linear);
        c.set_keyframe(1.0, 5.0, CurveType::FlatLinear);
        c.set_keyframe(2.0, 5.0, CurveType::LinearFlat);
        c.set_keyframe(3.0, 0.0, CurveType::Linear);
        c.reapply_curve_types();
        assert!((c.evaluate(1.5) - 5.0).abs() < 1e-6);
        assert_eq!(c.get(1).unwrap().in_tangent, 0.0);
        assert_eq!(c.get(2).unwrap().out_tangent, 0.0);
    }

    #[test]
    fn leave_as_is_tangents_survive_reapply() {
        let mut c = curve(&[(0.0, 0.0), (2.0, 2.0)]);
        c.insert(Keyframe {
            time: 1.0,
            value: 1.0,
            curve_type: CurveType::LeaveAsIs,
            in_tangent: 7.0,
            out_tangent: -7.0,
        });
        c.reapply_curve_types();
        let k = c.get(1).unwrap();
        assert_eq!((k.in_tangent, k.out_tangent), (7.0, -7.0));
    }

    #[test]
    fn repair_synthesizes_edges() {
        let mut c = CurveStore::from_keyframes([Keyframe::new(0.5, 2.0, CurveType::Smooth)]);
        assert!(c.repair(2.0));
        assert_eq!(c.keyframe_times(), vec![0.0, 0.5, 2.0]);
        assert_eq!(c.first().unwrap().value, 2.0);
        assert_eq!(c.last().unwrap().value, 2.0);

        let mut empty = CurveStore::default();
        empty.repair(1.0);
        assert_eq!(empty.len(), 2);
    }

    #[test]
    fn shift_times_drops_keys_before_zero() {
        let mut c = curve(&[(0.0, 1.0), (0.5, 2.0), (1.0, 3.0)]);
        c.shift_times(-0.5);
        assert_eq!(c.keyframe_times(), vec![0.0, 0.5]);
        assert_eq!(c.first().unwrap().value, 2.0);
        c.shift_times(0.25);
        assert_eq!(c.keyframe_times(), vec![0.25, 0.75]);
    }

    #[test]
    fn tuples_round_trip() {
        let c = curve(&[(0.0, 1.0), (0.25, 3.0), (1.0, -2.0)]);
        let back = CurveStore::from_tuples(&c.to_tuples());
        assert_eq!(back.keys(), c.keys());
    }
}
