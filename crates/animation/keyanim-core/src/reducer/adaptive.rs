//! Phase 3: greedy adaptive simplification.
//!
//! Buckets span consecutive kept samples. Each caches the sample deviating most
//! from the linear chord between its kept ends. The pass repeatedly keeps the
//! globally worst sample (ties go to the earliest bucket) and splits its bucket,
//! until no candidate exceeds the stop threshold.

use std::collections::BTreeMap;

use super::samples::{Sample, SampleValue};
use crate::config::ReduceSettings;

#[derive(Clone, Copy, Debug)]
struct Bucket {
    lo: usize,
    hi: usize,
    /// Worst sample index, its score and the score it must exceed.
    worst: Option<(usize, f32, f32)>,
}

/// Kept sample indices with the value each keyframe takes.
pub type Kept = BTreeMap<usize, SampleValue>;

fn scan(
    samples: &[Sample],
    kept: &Kept,
    lo: usize,
    hi: usize,
    settings: &ReduceSettings,
) -> Bucket {
    let mut worst: Option<(usize, f32, f32)> = None;
    if let (Some(v_lo), Some(v_hi)) = (kept.get(&lo), kept.get(&hi)) {
        let t_lo = samples[lo].time;
        let span = samples[hi].time - t_lo;
        for (k, sample) in samples.iter().enumerate().take(hi).skip(lo + 1) {
            let u = if span > 0.0 {
                (sample.time - t_lo) / span
            } else {
                0.0
            };
            let chord = v_lo.lerp(v_hi, u);
            let (score, threshold) = sample.value.score(&chord, settings);
            if worst.map_or(true, |(_, best, _)| score > best) {
                worst = Some((k, score, threshold));
            }
        }
    }
    Bucket { lo, hi, worst }
}

/// Grow `kept` (which must contain the first and last sample) greedily.
/// Buckets whose ends both belong to `frozen` are never scanned.
pub fn simplify(
    samples: &[Sample],
    mut kept: Kept,
    frozen: &[(usize, usize)],
    settings: &ReduceSettings,
) -> Kept {
    let indices: Vec<usize> = kept.keys().copied().collect();
    let mut buckets: Vec<Bucket> = indices
        .windows(2)
        .filter(|w| !frozen.contains(&(w[0], w[1])))
        .map(|w| scan(samples, &kept, w[0], w[1], settings))
        .collect();

    let cap = samples.len().saturating_mul(settings.iteration_factor.max(1));
    let mut converged = false;
    for _ in 0..cap {
        let mut pick: Option<(usize, usize, f32, f32)> = None;
        for (b, bucket) in buckets.iter().enumerate() {
            if let Some((k, score, threshold)) = bucket.worst {
                if pick.map_or(true, |(_, _, best, _)| score > best) {
                    pick = Some((b, k, score, threshold));
                }
            }
        }
        let Some((b, k, score, threshold)) = pick.filter(|p| p.2 > p.3) else {
            converged = true;
            break;
        };
        log::trace!("keeping sample {k} (score {score}, threshold {threshold})");
        kept.insert(k, samples[k].value);
        let Bucket { lo, hi, .. } = buckets[b];
        let left = scan(samples, &kept, lo, k, settings);
        let right = scan(samples, &kept, k, hi, settings);
        buckets[b] = left;
        buckets.insert(b + 1, right);
    }
    if !converged {
        log::warn!("adaptive reduction stopped at the iteration cap ({cap})");
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(samples: &[Sample]) -> Kept {
        let mut kept = Kept::new();
        kept.insert(0, samples[0].value);
        kept.insert(samples.len() - 1, samples[samples.len() - 1].value);
        kept
    }

    #[test]
    fn straight_line_keeps_only_edges() {
        let samples: Vec<Sample> = (0..50)
            .map(|i| Sample::float(i as f32 * 0.1, i as f32 * 0.5))
            .collect();
        let kept = simplify(&samples, edges(&samples), &[], &ReduceSettings::default());
        assert_eq!(kept.keys().copied().collect::<Vec<_>>(), vec![0, 49]);
    }

    #[test]
    fn peak_is_kept() {
        let values = [0.0, 1.0, 2.0, 3.0, 10.0, 3.0, 2.0, 1.0, 0.0];
        let samples: Vec<Sample> = values
            .iter()
            .enumerate()
            .map(|(i, v)| Sample::float(i as f32, *v))
            .collect();
        let kept = simplify(&samples, edges(&samples), &[], &ReduceSettings::default());
        assert!(kept.contains_key(&4));
    }

    #[test]
    fn frozen_buckets_are_not_scanned() {
        let values = [0.0, 0.0, 5.0, 0.0, 0.0, 1.0];
        let samples: Vec<Sample> = values
            .iter()
            .enumerate()
            .map(|(i, v)| Sample::float(i as f32, *v))
            .collect();
        let mut kept = edges(&samples);
        kept.insert(4, samples[4].value);
        let out = simplify(&samples, kept, &[(0, 4)], &ReduceSettings::default());
        assert_eq!(out.keys().copied().collect::<Vec<_>>(), vec![0, 4, 5]);
    }
}
