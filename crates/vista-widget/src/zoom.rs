//! Drag-to-zoom range selection for line charts.
//!
//! Indices passed to [`ZoomSelection::press`] and [`ZoomSelection::drag_to`]
//! are relative to the currently visible window, so zooming inside a zoomed
//! window narrows it further.

use std::ops::Range;

/// Series length above which tick labels are thinned.
pub const TICK_THINNING_THRESHOLD: usize = 12;

/// Approximate tick count after thinning.
pub const TARGET_TICKS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Drag {
    anchor: usize,
    current: usize,
}

/// Zoom window over a series of `len` points.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoomSelection {
    len: usize,
    /// Committed absolute window, inclusive
    window: Option<(usize, usize)>,
    drag: Option<Drag>,
}

impl ZoomSelection {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            window: None,
            drag: None,
        }
    }

    /// Replace the underlying series; any zoom is dropped.
    pub fn set_len(&mut self, len: usize) {
        *self = Self::new(len);
    }

    /// Absolute index range currently visible.
    pub fn visible_range(&self) -> Range<usize> {
        match self.window {
            Some((start, end)) => start..end + 1,
            None => 0..self.len,
        }
    }

    pub fn visible_len(&self) -> usize {
        self.visible_range().len()
    }

    pub fn is_zoomed(&self) -> bool {
        self.window.is_some()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Start a selection at the visible point `index`.
    pub fn press(&mut self, index: usize) {
        let Some(last) = self.visible_len().checked_sub(1) else {
            return;
        };
        let index = index.min(last);
        self.drag = Some(Drag {
            anchor: index,
            current: index,
        });
    }

    /// Move the provisional right boundary.
    pub fn drag_to(&mut self, index: usize) {
        let last = self.visible_len().saturating_sub(1);
        if let Some(drag) = &mut self.drag {
            drag.current = index.min(last);
        }
    }

    /// Finish the selection. Returns true when a new window was committed.
    pub fn release(&mut self) -> bool {
        let Some(drag) = self.drag.take() else {
            return false;
        };
        if drag.anchor == drag.current {
            return false;
        }
        let offset = self.visible_range().start;
        let (lo, hi) = normalize(drag.anchor, drag.current);
        self.window = Some((offset + lo, offset + hi));
        true
    }

    /// Band to shade while dragging, relative to the visible window.
    pub fn selection_band(&self) -> Option<(usize, usize)> {
        self.drag
            .filter(|d| d.anchor != d.current)
            .map(|d| normalize(d.anchor, d.current))
    }

    /// Restore the full series.
    pub fn reset(&mut self) {
        self.window = None;
        self.drag = None;
    }

    /// The visible slice of `series`.
    pub fn slice<'a, T>(&self, series: &'a [T]) -> &'a [T] {
        let range = self.visible_range();
        let end = range.end.min(series.len());
        let start = range.start.min(end);
        &series[start..end]
    }

    /// Tick positions for the visible window.
    pub fn ticks(&self) -> Vec<usize> {
        tick_indices(self.visible_len())
    }
}

fn normalize(a: usize, b: usize) -> (usize, usize) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Indices that get a tick label in a series of `len` points.
pub fn tick_indices(len: usize) -> Vec<usize> {
    if len <= TICK_THINNING_THRESHOLD {
        return (0..len).collect();
    }
    let step = len.div_ceil(TARGET_TICKS);
    (0..len).step_by(step).collect()
}
