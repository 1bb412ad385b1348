//! Next-clip resolution for sequencing.

use crate::timeline::Timeline;

/// `next_clip_name` value selecting a random clip from the same layer.
pub const RANDOM: &str = "(random)";
/// Suffix marking a `next_clip_name` as a group prefix, e.g. `idle/*`.
pub const GROUP_SUFFIX: &str = "*";

/// Seeded splitmix64 stream driving random clip selection.
#[derive(Clone, Debug)]
pub struct ClipPicker {
    state: u64,
}

impl ClipPicker {
    /// A fixed seed gives a reproducible sequence; `None` seeds from a fresh v4 UUID.
    pub fn new(seed: Option<u64>) -> Self {
        let state = seed.unwrap_or_else(|| uuid::Uuid::new_v4().as_u128() as u64);
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    fn choose(&mut self, candidates: &[usize]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        let i = (self.next_u64() % candidates.len() as u64) as usize;
        Some(candidates[i])
    }

    /// Resolve `next` (explicit name, `(random)`, or `group/*`) against the
    /// timeline. `None` when nothing matches.
    pub fn resolve(&mut self, timeline: &Timeline, current: usize, next: &str) -> Option<usize> {
        if next == RANDOM {
            let clip = timeline.clip_at(current)?;
            let others: Vec<usize> = timeline
                .layer_indices(clip.segment_id(), clip.layer_id())
                .iter()
                .copied()
                .filter(|i| *i != current)
                .collect();
            return self.choose(&others);
        }
        if let Some(prefix) = next.strip_suffix(GROUP_SUFFIX) {
            let members: Vec<usize> = timeline
                .clips()
                .iter()
                .enumerate()
                .filter(|(_, c)| c.name().starts_with(prefix))
                .map(|(i, _)| i)
                .collect();
            if members == [current] {
                return Some(current);
            }
            let others: Vec<usize> = members.into_iter().filter(|i| *i != current).collect();
            return self.choose(&others);
        }
        timeline.index_of(next)
    }
}
