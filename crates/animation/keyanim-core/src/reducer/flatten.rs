//! Phase 2: detect stable runs that collapse into a held plateau.

use super::samples::Sample;
use crate::config::ReduceSettings;

/// Inclusive sample index range held at the value of `samples[start]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Run {
    pub start: usize,
    pub end: usize,
}

/// Maximal runs where every sample stays near the run's first sample, holding
/// more than `min_run_samples` samples over more than `min_run_duration` seconds.
pub fn find_runs(samples: &[Sample], settings: &ReduceSettings) -> Vec<Run> {
    let mut runs = Vec::new();
    let n = samples.len();
    let mut start = 0;
    while start + 1 < n {
        let anchor = samples[start].value;
        let mut end = start;
        while end + 1 < n && samples[end + 1].value.is_near(&anchor, settings) {
            end += 1;
        }
        let count = end - start + 1;
        let duration = samples[end].time - samples[start].time;
        if count > settings.min_run_samples && duration > settings.min_run_duration {
            runs.push(Run { start, end });
            start = end + 1;
        } else {
            start += 1;
        }
    }
    runs
}
