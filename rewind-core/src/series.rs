//! The fundamental time-series storage primitive: an ordered sequence of
//! (frame, value) pairs with an append-then-freeze lifecycle.
//!
//! During the single decode pass entries are appended cheaply; `freeze`
//! then flattens the sequence into parallel arrays for binary-search
//! lookups. Frames are monotonic non-decreasing by writer responsibility
//! and are not re-validated here. Multiple entries may share a frame
//! (several draws in one frame, for example).

use crate::types::{FrameIndex, FrameRange};

/// An ordered (frame, value) sequence, append-only until frozen.
#[derive(Debug, Clone)]
pub struct FrameStampedSeries<T> {
    building: Option<Vec<(FrameIndex, T)>>,
    frames: Vec<FrameIndex>,
    values: Vec<T>,
}

impl<T> Default for FrameStampedSeries<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameStampedSeries<T> {
    pub fn new() -> Self {
        Self {
            building: Some(Vec::new()),
            frames: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Appends an entry. Valid only before `freeze`.
    ///
    /// # Panics
    /// Panics if the series has been frozen; appending after freeze is a
    /// caller bug, not a recoverable condition.
    pub fn append(&mut self, frame: FrameIndex, value: T) {
        let building = self.building.as_mut().expect("append on frozen series");
        building.push((frame, value));
    }

    /// Flattens into immutable parallel arrays. Idempotent; irreversible.
    pub fn freeze(&mut self) {
        if let Some(building) = self.building.take() {
            self.frames.reserve_exact(building.len());
            self.values.reserve_exact(building.len());
            for (frame, value) in building {
                self.frames.push(frame);
                self.values.push(value);
            }
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.building.is_none()
    }

    pub fn len(&self) -> usize {
        match &self.building {
            Some(building) => building.len(),
            None => self.frames.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn frame(&self, index: usize) -> FrameIndex {
        match &self.building {
            Some(building) => building[index].0,
            None => self.frames[index],
        }
    }

    fn value(&self, index: usize) -> &T {
        match &self.building {
            Some(building) => &building[index].1,
            None => &self.values[index],
        }
    }

    /// Smallest index whose frame is not below `frame`.
    fn lower_bound(&self, frame: FrameIndex) -> usize {
        let mut lo = 0;
        let mut hi = self.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.frame(mid) < frame {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Smallest index whose frame is >= `frame`, the last valid index when
    /// `frame` exceeds every entry, or `None` when empty.
    pub fn first_index_at_or_after(&self, frame: FrameIndex) -> Option<usize> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        Some(self.lower_bound(frame).min(len - 1))
    }

    /// The entry standing for "the value as of `frame`": the entry at the
    /// [`Self::first_index_at_or_after`] bound, or `None` when empty.
    pub fn value_at_or_before(&self, frame: FrameIndex) -> Option<&T> {
        self.first_index_at_or_after(frame).map(|i| self.value(i))
    }

    /// Lazily yields every entry whose frame falls in the closed interval,
    /// in ascending frame order. Restartable; empty when nothing
    /// qualifies.
    pub fn sub_range(&self, range: FrameRange) -> SubRange<'_, T> {
        SubRange {
            series: self,
            index: self.lower_bound(range.start),
            end: range.end,
        }
    }

    /// All values stamped with exactly `frame`.
    pub fn values_at_exact_frame(&self, frame: FrameIndex) -> impl Iterator<Item = &T> {
        self.sub_range(FrameRange::new(frame, frame)).map(|(_, v)| v)
    }

    /// All entries, in append order.
    pub fn iter(&self) -> impl Iterator<Item = (FrameIndex, &T)> {
        (0..self.len()).map(|i| (self.frame(i), self.value(i)))
    }

    /// All values, in append order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        (0..self.len()).map(|i| self.value(i))
    }
}

/// Iterator returned by [`FrameStampedSeries::sub_range`].
pub struct SubRange<'a, T> {
    series: &'a FrameStampedSeries<T>,
    index: usize,
    end: FrameIndex,
}

impl<'a, T> Iterator for SubRange<'a, T> {
    type Item = (FrameIndex, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.series.len() {
            return None;
        }
        let frame = self.series.frame(self.index);
        if frame > self.end {
            return None;
        }
        let value = self.series.value(self.index);
        self.index += 1;
        Some((frame, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(frames: &[FrameIndex]) -> FrameStampedSeries<i32> {
        let mut s = FrameStampedSeries::new();
        for (i, &f) in frames.iter().enumerate() {
            s.append(f, i as i32);
        }
        s
    }

    #[test]
    fn test_first_index_at_or_after() {
        let mut s = series(&[2, 5, 5, 9]);
        s.freeze();
        assert_eq!(s.first_index_at_or_after(0), Some(0));
        assert_eq!(s.first_index_at_or_after(2), Some(0));
        assert_eq!(s.first_index_at_or_after(3), Some(1));
        assert_eq!(s.first_index_at_or_after(5), Some(1));
        assert_eq!(s.first_index_at_or_after(9), Some(3));
        // Past the end clamps to the last valid index.
        assert_eq!(s.first_index_at_or_after(100), Some(3));
        assert_eq!(FrameStampedSeries::<i32>::new().first_index_at_or_after(0), None);
    }

    #[test]
    fn test_queries_agree_before_and_after_freeze() {
        let mut s = series(&[1, 3, 7]);
        let before: Vec<_> = s.sub_range(FrameRange::new(2, 7)).map(|(f, v)| (f, *v)).collect();
        let bound_before = s.first_index_at_or_after(4);
        s.freeze();
        let after: Vec<_> = s.sub_range(FrameRange::new(2, 7)).map(|(f, v)| (f, *v)).collect();
        assert_eq!(before, after);
        assert_eq!(bound_before, s.first_index_at_or_after(4));
    }

    #[test]
    fn test_freeze_is_idempotent() {
        let mut s = series(&[1, 2, 3]);
        s.freeze();
        let once: Vec<_> = s.iter().map(|(f, v)| (f, *v)).collect();
        s.freeze();
        let twice: Vec<_> = s.iter().map(|(f, v)| (f, *v)).collect();
        assert_eq!(once, twice);
        assert!(s.is_frozen());
    }

    #[test]
    #[should_panic(expected = "append on frozen series")]
    fn test_append_after_freeze_panics() {
        let mut s = series(&[1]);
        s.freeze();
        s.append(2, 0);
    }

    #[test]
    fn test_sub_range_bounds() {
        let mut s = series(&[2, 4, 6, 8]);
        s.freeze();
        let frames: Vec<_> = s.sub_range(FrameRange::new(4, 6)).map(|(f, _)| f).collect();
        assert_eq!(frames, vec![4, 6]);
        // Nothing qualifies: empty, not an error.
        assert_eq!(s.sub_range(FrameRange::new(9, 20)).count(), 0);
        assert_eq!(s.sub_range(FrameRange::new(0, 1)).count(), 0);
        // Restartable.
        let again: Vec<_> = s.sub_range(FrameRange::new(4, 6)).map(|(f, _)| f).collect();
        assert_eq!(again, frames);
    }

    #[test]
    fn test_values_at_exact_frame() {
        let mut s = FrameStampedSeries::new();
        s.append(3, "a");
        s.append(3, "b");
        s.append(5, "c");
        s.freeze();
        let at3: Vec<_> = s.values_at_exact_frame(3).copied().collect();
        assert_eq!(at3, vec!["a", "b"]);
        assert_eq!(s.values_at_exact_frame(4).count(), 0);
    }

    #[test]
    fn test_value_at_or_before_bound_semantics() {
        let mut s = series(&[10, 20]);
        s.freeze();
        // Entry at the at-or-after bound; past the end returns the last.
        assert_eq!(s.value_at_or_before(10), Some(&0));
        assert_eq!(s.value_at_or_before(20), Some(&1));
        assert_eq!(s.value_at_or_before(500), Some(&1));
        assert_eq!(FrameStampedSeries::<i32>::new().value_at_or_before(5), None);
    }
}
