//! Fetch bookkeeping shared by the widget runtimes.

use crate::source::PageQuery;

/// Lifecycle of a widget's data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Not mounted yet
    #[default]
    Idle,
    /// A request is in flight
    Loading,
    Loaded,
    /// Last request failed; retry is offered
    Error(String),
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LoadState::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// One request a runtime wants issued.
///
/// The response must be handed back with the same `generation`; anything
/// older than the runtime's latest ticket is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub widget_id: String,
    pub generation: u64,
    pub query: PageQuery,
}

/// Outcome of one user interaction with a runtime.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transition {
    /// Request to issue, if the interaction changed server parameters
    pub fetch: Option<FetchTicket>,
    /// Whether the interaction diverges from the active view
    pub dirty: bool,
}

impl Transition {
    /// The interaction changed nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Local change that still counts as an edit.
    pub fn edit() -> Self {
        Self {
            fetch: None,
            dirty: true,
        }
    }

    /// Change that needs a refetch.
    pub fn refetch(ticket: FetchTicket, dirty: bool) -> Self {
        Self {
            fetch: Some(ticket),
            dirty,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.fetch.is_none() && !self.dirty
    }
}

/// Monotonic generation counter; last issued wins.
#[derive(Debug, Clone, Default)]
pub(crate) struct Generations {
    latest: u64,
}

impl Generations {
    pub(crate) fn next(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        generation == self.latest
    }

    pub(crate) fn latest(&self) -> u64 {
        self.latest
    }

    /// Continue numbering after `latest` so replies to a replaced runtime stay stale.
    pub(crate) fn resume_after(&mut self, latest: u64) {
        self.latest = self.latest.max(latest);
    }
}
