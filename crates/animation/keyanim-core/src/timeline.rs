//! Timeline: the clip collection, the current-clip pointer and global speed.
//!
//! Clips are kept in insertion order. A segment/layer index answers
//! same-layer queries (used by random sequencing) and is rebuilt whenever
//! clips are added, removed or moved between layers.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::clip::Clip;
use crate::error::{AnimatorError, Result};

/// Structural and content changes, drained by the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum TimelineEvent {
    ClipAdded { name: String },
    ClipRemoved { name: String },
    ClipRenamed { from: String, to: String },
    CurrentChanged { name: Option<String> },
    /// A bulk-update scope on the clip closed with changes.
    ClipChanged { name: String, revision: u64 },
}

type LayerKey = (String, String);

#[derive(Debug)]
pub struct Timeline {
    clips: Vec<Clip>,
    current: Option<usize>,
    speed: f32,
    layers: HashMap<LayerKey, Vec<usize>>,
    /// Last revision reported per clip, parallel to `clips`.
    published: Vec<u64>,
    events: Vec<TimelineEvent>,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            clips: Vec::new(),
            current: None,
            speed: 1.0,
            layers: HashMap::new(),
            published: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Build from clips, repairing each one. Duplicate names are rejected.
    pub fn from_clips(clips: impl IntoIterator<Item = Clip>) -> Result<Self> {
        let mut timeline = Self::new();
        for clip in clips {
            timeline.add_clip(clip)?;
        }
        timeline.events.clear();
        Ok(timeline)
    }

    #[inline]
    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.clips.iter().position(|c| c.name() == name)
    }

    pub fn clip(&self, name: &str) -> Option<&Clip> {
        self.clips.iter().find(|c| c.name() == name)
    }

    pub fn clip_mut(&mut self, name: &str) -> Result<&mut Clip> {
        self.clips
            .iter_mut()
            .find(|c| c.name() == name)
            .ok_or_else(|| AnimatorError::clip_not_found(name))
    }

    pub(crate) fn clip_at(&self, index: usize) -> Option<&Clip> {
        self.clips.get(index)
    }

    pub(crate) fn clip_at_mut(&mut self, index: usize) -> Option<&mut Clip> {
        self.clips.get_mut(index)
    }

    /// The current clip. Fails with `InvalidOperation` on an empty timeline.
    pub fn current(&self) -> Result<&Clip> {
        self.current
            .and_then(|i| self.clips.get(i))
            .ok_or_else(|| AnimatorError::invalid_operation("timeline has no current clip"))
    }

    pub fn current_mut(&mut self) -> Result<&mut Clip> {
        self.current
            .and_then(|i| self.clips.get_mut(i))
            .ok_or_else(|| AnimatorError::invalid_operation("timeline has no current clip"))
    }

    #[inline]
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current.and_then(|i| self.clips.get(i)).map(Clip::name)
    }

    /// Make `name` the current clip.
    pub fn select(&mut self, name: &str) -> Result<()> {
        let index = self
            .index_of(name)
            .ok_or_else(|| AnimatorError::clip_not_found(name))?;
        self.set_current(index);
        Ok(())
    }

    pub(crate) fn set_current(&mut self, index: usize) {
        if self.current == Some(index) {
            return;
        }
        self.current = Some(index);
        self.events.push(TimelineEvent::CurrentChanged {
            name: self.clips.get(index).map(|c| c.name().to_string()),
        });
    }

    /// Add a clip. The first clip added becomes current.
    pub fn add_clip(&mut self, mut clip: Clip) -> Result<usize> {
        if clip.name().is_empty() {
            return Err(AnimatorError::validation("clip name must not be empty"));
        }
        if self.index_of(clip.name()).is_some() {
            return Err(AnimatorError::validation(format!(
                "a clip named '{}' already exists",
                clip.name()
            )));
        }
        clip.validate();
        let index = self.clips.len();
        self.events.push(TimelineEvent::ClipAdded {
            name: clip.name().to_string(),
        });
        self.published.push(clip.revision());
        self.clips.push(clip);
        self.rebuild_layers();
        if self.current.is_none() {
            self.set_current(index);
        }
        Ok(index)
    }

    /// Add a blank clip sharing the current clip's layer and targets, or an
    /// empty one when the timeline has no clips.
    pub fn add_blank(&mut self, name: &str, length: f32, blend_duration: f32) -> Result<usize> {
        let clip = match self.current() {
            Ok(current) => {
                let mut clip = current.blank_like(name);
                clip.blend_duration = blend_duration;
                clip
            }
            Err(_) => {
                let mut clip = Clip::new(name, length);
                clip.blend_duration = blend_duration;
                clip
            }
        };
        self.add_clip(clip)
    }

    /// Deep-copy `source` under `new_name`, or a generated unique name.
    pub fn copy_clip(&mut self, source: &str, new_name: Option<&str>) -> Result<String> {
        let original = self
            .clip(source)
            .ok_or_else(|| AnimatorError::clip_not_found(source))?;
        let name = match new_name {
            Some(n) => n.to_string(),
            None => self.unique_name(source),
        };
        let copy = original.copy_as(name.clone());
        self.add_clip(copy)?;
        Ok(name)
    }

    /// Remove a clip. The only remaining clip cannot be deleted.
    pub fn delete_clip(&mut self, name: &str) -> Result<Clip> {
        let index = self
            .index_of(name)
            .ok_or_else(|| AnimatorError::clip_not_found(name))?;
        if self.clips.len() <= 1 {
            return Err(AnimatorError::validation(format!(
                "cannot delete '{name}': it is the only clip"
            )));
        }
        let removed = self.clips.remove(index);
        self.published.remove(index);
        self.rebuild_layers();
        self.events.push(TimelineEvent::ClipRemoved {
            name: removed.name().to_string(),
        });
        match self.current {
            Some(c) if c == index => {
                self.current = None;
                self.set_current(index.min(self.clips.len() - 1));
            }
            Some(c) if c > index => self.current = Some(c - 1),
            _ => {}
        }
        Ok(removed)
    }

    /// Rename a clip; sequencing references in other clips follow the rename.
    pub fn rename_clip(&mut self, from: &str, to: &str) -> Result<()> {
        let index = self
            .index_of(from)
            .ok_or_else(|| AnimatorError::clip_not_found(from))?;
        if from == to {
            return Ok(());
        }
        if to.is_empty() || self.index_of(to).is_some() {
            return Err(AnimatorError::validation(format!(
                "cannot rename '{from}' to '{to}'"
            )));
        }
        self.clips[index].set_name(to);
        for clip in &mut self.clips {
            if clip.next_clip_name.as_deref() == Some(from) {
                clip.next_clip_name = Some(to.to_string());
            }
        }
        self.events.push(TimelineEvent::ClipRenamed {
            from: from.to_string(),
            to: to.to_string(),
        });
        Ok(())
    }

    /// Move a clip into another segment/layer.
    pub fn move_to_layer(&mut self, name: &str, segment_id: &str, layer_id: &str) -> Result<()> {
        let index = self
            .index_of(name)
            .ok_or_else(|| AnimatorError::clip_not_found(name))?;
        self.clips[index].set_layer(segment_id, layer_id);
        self.rebuild_layers();
        Ok(())
    }

    /// `base` if free, otherwise `base (n)` for the smallest free `n`.
    pub fn unique_name(&self, base: &str) -> String {
        if self.index_of(base).is_none() {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{base} ({n})"))
            .find(|candidate| self.index_of(candidate).is_none())
            .unwrap_or_else(|| base.to_string())
    }

    /// Clips sharing a segment and layer, in timeline order.
    pub fn clips_in_layer<'a>(
        &'a self,
        segment_id: &str,
        layer_id: &str,
    ) -> impl Iterator<Item = &'a Clip> + 'a {
        self.layer_indices(segment_id, layer_id)
            .iter()
            .filter_map(|i| self.clips.get(*i))
    }

    pub(crate) fn layer_indices(&self, segment_id: &str, layer_id: &str) -> &[usize] {
        self.layers
            .get(&(segment_id.to_string(), layer_id.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn rebuild_layers(&mut self) {
        self.layers.clear();
        for (i, clip) in self.clips.iter().enumerate() {
            self.layers
                .entry((clip.segment_id().to_string(), clip.layer_id().to_string()))
                .or_default()
                .push(i);
        }
    }

    /// Take pending events, including a `ClipChanged` for every clip whose
    /// revision moved since the last drain.
    pub fn drain_events(&mut self) -> Vec<TimelineEvent> {
        for (clip, seen) in self.clips.iter().zip(self.published.iter_mut()) {
            if clip.revision() != *seen {
                *seen = clip.revision();
                self.events.push(TimelineEvent::ClipChanged {
                    name: clip.name().to_string(),
                    revision: clip.revision(),
                });
            }
        }
        std::mem::take(&mut self.events)
    }
}
