//! The read-only query façade consumed by every view.
//!
//! All queries run against frozen storage and are O(log n) or O(result
//! size). Methods returning iterators produce finite, restartable
//! sequences recomputed on each invocation; callers needing stability
//! across window changes must materialize them.

use std::collections::BTreeMap;

use rewind_core::entity::{Entity, EntityGraph, EntityId};
use rewind_core::series::SubRange;
use rewind_core::types::{Color, FrameIndex, FrameRange, Point, Transform};

use crate::reader::{DynamicParamEntry, EntityDrawCommand, LogEntry, ReplayReader};

impl ReplayReader {
    /// Number of recorded frames, counting the frame-0 sentinel.
    pub fn frame_count(&self) -> usize {
        self.frame_times.len()
    }

    /// The last recorded frame number.
    pub fn last_frame(&self) -> FrameIndex {
        (self.frame_times.len() - 1) as FrameIndex
    }

    /// Total elapsed time of the capture in seconds.
    pub fn total_time(&self) -> f64 {
        *self.frame_times.last().unwrap_or(&0.0) as f64
    }

    /// Maps a point in time to the frame current at that time.
    ///
    /// A time equal to a frame's exact timestamp maps to that frame, so
    /// [`Self::time_for_frame`] followed by `frame_for_time` recovers the
    /// frame. Clamped to `[0, last frame]`; NaN and negative times map to
    /// frame 0. The per-second skip list bounds the forward scan, keeping
    /// lookups sub-linear in practice.
    pub fn frame_for_time(&self, time: f64) -> FrameIndex {
        if !(time > 0.0) {
            return 0;
        }
        let start = self
            .frames_for_times
            .get(time as usize)
            .or(self.frames_for_times.last())
            .copied()
            .unwrap_or(0);
        for index in start..self.frame_times.len() {
            let frame_time = self.frame_times[index] as f64;
            if frame_time == time {
                return index as FrameIndex;
            }
            if frame_time > time {
                return if index > 0 { (index - 1) as FrameIndex } else { 0 };
            }
        }
        self.last_frame()
    }

    /// Maps a frame number to its elapsed time, clamped to the recorded
    /// range.
    pub fn time_for_frame(&self, frame: FrameIndex) -> f64 {
        if self.frame_times.is_empty() || frame <= 0 {
            return 0.0;
        }
        let index = (frame as usize).min(self.frame_times.len() - 1);
        self.frame_times[index] as f64
    }

    /// The frame interval covered by a time window.
    pub fn frame_range_for_times(&self, start: f64, end: f64) -> FrameRange {
        FrameRange::new(self.frame_for_time(start), self.frame_for_time(end))
    }

    /// Entities in registration order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entity_order.iter().filter_map(|id| self.registry.get(id))
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.registry.get(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.entity_order.len()
    }

    /// The reconstructed parent/child entity tree.
    pub fn graph(&self) -> &EntityGraph {
        &self.graph
    }

    /// Recorded lifetime of an entity: its undefine interval when one was
    /// seen, otherwise creation frame through the end of the capture.
    pub fn entity_lifetime(&self, id: EntityId) -> FrameRange {
        if let Some(range) = self.lifetimes.get(&id) {
            return *range;
        }
        let creation = self.registry.get(&id).map_or(0, |e| e.creation_frame);
        FrameRange::new(creation, self.last_frame())
    }

    pub fn is_alive(&self, id: EntityId, frame: FrameIndex) -> bool {
        self.entity_lifetime(id).in_range(frame)
    }

    /// Last known transform of an entity as of `frame`, falling back to
    /// its initial transform when it has no recorded transform series.
    pub fn entity_transform_at(&self, id: EntityId, frame: FrameIndex) -> Transform {
        self.transforms
            .get(&id)
            .and_then(|series| series.value_at_or_before(frame))
            .copied()
            .unwrap_or_else(|| self.registry.get(&id).map_or(Transform::IDENTITY, |e| e.initial_transform))
    }

    pub fn entity_transform_at_time(&self, id: EntityId, time: f64) -> Transform {
        self.entity_transform_at(id, self.frame_for_time(time))
    }

    pub fn entity_position_at(&self, id: EntityId, frame: FrameIndex) -> Point {
        self.entity_transform_at(id, frame).translation
    }

    pub fn entity_position_at_time(&self, id: EntityId, time: f64) -> Point {
        self.entity_transform_at_time(id, time).translation
    }

    /// The recorded transform series of an entity, if any.
    pub fn entity_transforms(&self, id: EntityId) -> Option<&rewind_core::FrameStampedSeries<Transform>> {
        self.transforms.get(&id)
    }

    /// Current values of an entity's string parameters as of `frame`,
    /// last-write-wins per name.
    pub fn dynamic_params_at(&self, id: EntityId, frame: FrameIndex) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        if let Some(series) = self.dynamic_params.get(&id) {
            for (entry_frame, (name, value)) in series.iter() {
                if entry_frame > frame {
                    break;
                }
                map.insert(name.clone(), value.clone());
            }
        }
        map
    }

    /// Current values of an entity's numeric parameters as of `frame`.
    pub fn dynamic_values_at(&self, id: EntityId, frame: FrameIndex) -> Vec<(String, f32)> {
        let mut map = BTreeMap::new();
        if let Some(series) = self.dynamic_values.get(&id) {
            for (entry_frame, (name, value)) in series.iter() {
                if entry_frame > frame {
                    break;
                }
                map.insert(name.clone(), *value);
            }
        }
        map.into_iter().collect()
    }

    /// The coalesced change history of one string parameter: only the
    /// frames where the value actually changed.
    pub fn dynamic_param_history(&self, id: EntityId, name: &str) -> &[DynamicParamEntry] {
        self.param_changes
            .get(&id)
            .and_then(|params| params.get(name))
            .map_or(&[], |changes| changes.as_slice())
    }

    /// Names of an entity's coalesced string parameters.
    pub fn dynamic_param_names(&self, id: EntityId) -> impl Iterator<Item = &str> {
        self.param_changes
            .get(&id)
            .into_iter()
            .flat_map(|params| params.keys().map(String::as_str))
    }

    /// Everything known about an entity at `frame` as one ordered
    /// key-value sequence. Identity fields come first; when the entity is
    /// not alive at `frame` the sequence stops there.
    pub fn all_parameters_at(&self, id: EntityId, frame: FrameIndex) -> Vec<(String, String)> {
        let Some(entity) = self.registry.get(&id) else {
            return Vec::new();
        };
        let alive = self.is_alive(id, frame);
        let mut out = vec![
            ("Name".to_string(), entity.name.clone()),
            ("Path".to_string(), entity.path.clone()),
            ("Id".to_string(), entity.id.to_string()),
            ("Active".to_string(), alive.to_string()),
        ];
        if !alive {
            return out;
        }
        let pos = self.entity_position_at(id, frame);
        out.push(("Position".to_string(), format!("({},{},{})", pos.x, pos.y, pos.z)));
        let static_params: BTreeMap<_, _> = entity.static_parameters.iter().collect();
        for (key, value) in static_params {
            out.push((key.clone(), value.clone()));
        }
        for (key, value) in self.dynamic_params_at(id, frame) {
            out.push((key, value));
        }
        for (key, value) in self.dynamic_values_at(id, frame) {
            out.push((key, value.to_string()));
        }
        out
    }

    /// All log entries, frame-stamped, in capture order.
    pub fn logs(&self) -> impl Iterator<Item = (FrameIndex, &LogEntry)> {
        self.logs.iter()
    }

    /// Log entries whose frame falls in the closed interval.
    pub fn logs_in_range(&self, range: FrameRange) -> SubRange<'_, LogEntry> {
        self.logs.sub_range(range)
    }

    /// Frames on which an entity logged, deduplicated, for marker
    /// rendering.
    pub fn log_frames(&self, id: EntityId) -> &[FrameIndex] {
        self.log_frames.get(&id).map_or(&[], |frames| frames.as_slice())
    }

    /// All draw commands, frame-stamped, in capture order.
    pub fn draws(&self) -> impl Iterator<Item = (FrameIndex, &EntityDrawCommand)> {
        self.draws.iter()
    }

    pub fn draws_in_range(&self, range: FrameRange) -> SubRange<'_, EntityDrawCommand> {
        self.draws.sub_range(range)
    }

    pub fn draws_at_frame(&self, frame: FrameIndex) -> impl Iterator<Item = &EntityDrawCommand> {
        self.draws.values_at_exact_frame(frame)
    }

    /// The precomputed creation draws of an entity: its static visual
    /// representation, recorded at its (re)definition frame.
    pub fn creation_draws(&self, id: EntityId) -> &[EntityDrawCommand] {
        self.creation_draws.get(&id).map_or(&[], |commands| commands.as_slice())
    }

    // Distinct-value accessors, used to populate filter UIs.

    pub fn entity_categories(&self) -> impl Iterator<Item = &str> {
        self.entity_categories.iter().map(String::as_str)
    }

    pub fn log_categories(&self) -> impl Iterator<Item = &str> {
        self.log_categories.iter().map(String::as_str)
    }

    pub fn log_colors(&self) -> impl Iterator<Item = Color> + '_ {
        self.log_colors.iter().copied()
    }

    /// Draw categories, excluding creation draws.
    pub fn draw_categories(&self) -> impl Iterator<Item = &str> {
        self.draw_categories.iter().map(String::as_str)
    }

    pub fn draw_colors(&self) -> impl Iterator<Item = Color> + '_ {
        self.draw_colors.iter().copied()
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameter_names.iter().map(String::as_str)
    }

    /// For a time window, yields per-frame `(frame, ratio of the window
    /// before the frame, ratio after it)` tuples, used for alternating
    /// per-frame background shading. Recomputed from scratch on each call;
    /// empty for a degenerate window.
    pub fn window_frame_ratios(
        &self,
        window_start: f64,
        window_end: f64,
    ) -> impl Iterator<Item = (FrameIndex, f64, f64)> + '_ {
        let span = window_end - window_start;
        let range = if span > 0.0 {
            self.frame_range_for_times(window_start, window_end)
        } else {
            FrameRange::new(1, 0) // empty
        };
        (range.start..=range.end).map(move |frame| {
            let before = ((self.time_for_frame(frame) - window_start) / span).clamp(0.0, 1.0);
            let after = ((self.time_for_frame(frame + 1) - window_start) / span).clamp(0.0, 1.0);
            (frame, before, after)
        })
    }
}
