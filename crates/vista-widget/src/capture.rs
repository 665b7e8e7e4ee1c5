//! Override capture protocol and the page-scoped widget registry.
//!
//! Every runtime can report its effective parameters as a
//! [`WidgetStateOverride`] on demand. The [`WidgetBoard`] keeps one
//! [`WidgetHandle`] per widget id so a page can capture one widget or all of
//! them when saving a view or freezing a schedule.

use tracing::debug;
use vista_core::{Result, VistaError};

use crate::chart::ChartRuntime;
use crate::fetch::{FetchTicket, LoadState};
use crate::list::ListRuntime;
use crate::model::{PageEnvelope, WidgetConfig, WidgetStateOverride, WidgetType};

/// Synchronous state capture.
pub trait StateCapture {
    fn widget_id(&self) -> &str;

    /// Snapshot of the current effective parameters.
    fn capture_state(&self) -> WidgetStateOverride;
}

/// A runtime of either variant, chosen from `widget_type`.
#[derive(Debug, Clone)]
pub enum WidgetRuntime {
    List(ListRuntime),
    Chart(ChartRuntime),
}

impl WidgetRuntime {
    pub fn from_config(config: WidgetConfig) -> Self {
        match config.widget_type {
            WidgetType::List => WidgetRuntime::List(ListRuntime::new(config)),
            WidgetType::Chart => WidgetRuntime::Chart(ChartRuntime::new(config)),
        }
    }

    pub fn config(&self) -> &WidgetConfig {
        match self {
            WidgetRuntime::List(r) => r.config(),
            WidgetRuntime::Chart(r) => r.config(),
        }
    }

    pub fn state(&self) -> &LoadState {
        match self {
            WidgetRuntime::List(r) => r.state(),
            WidgetRuntime::Chart(r) => r.state(),
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            WidgetRuntime::List(r) => r.generation(),
            WidgetRuntime::Chart(r) => r.generation(),
        }
    }

    fn resume_after(&mut self, latest: u64) {
        match self {
            WidgetRuntime::List(r) => r.generations_mut().resume_after(latest),
            WidgetRuntime::Chart(r) => r.generations_mut().resume_after(latest),
        }
    }

    pub fn mount(&mut self) -> FetchTicket {
        match self {
            WidgetRuntime::List(r) => r.mount(),
            WidgetRuntime::Chart(r) => r.mount(),
        }
    }

    pub fn retry(&mut self) -> FetchTicket {
        match self {
            WidgetRuntime::List(r) => r.retry(),
            WidgetRuntime::Chart(r) => r.retry(),
        }
    }

    pub fn apply_response(&mut self, generation: u64, result: Result<PageEnvelope>) -> bool {
        match self {
            WidgetRuntime::List(r) => r.apply_response(generation, result),
            WidgetRuntime::Chart(r) => r.apply_response(generation, result),
        }
    }

    pub fn as_list(&self) -> Option<&ListRuntime> {
        match self {
            WidgetRuntime::List(r) => Some(r),
            WidgetRuntime::Chart(_) => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut ListRuntime> {
        match self {
            WidgetRuntime::List(r) => Some(r),
            WidgetRuntime::Chart(_) => None,
        }
    }

    pub fn as_chart(&self) -> Option<&ChartRuntime> {
        match self {
            WidgetRuntime::Chart(r) => Some(r),
            WidgetRuntime::List(_) => None,
        }
    }

    pub fn as_chart_mut(&mut self) -> Option<&mut ChartRuntime> {
        match self {
            WidgetRuntime::Chart(r) => Some(r),
            WidgetRuntime::List(_) => None,
        }
    }
}

impl StateCapture for WidgetRuntime {
    fn widget_id(&self) -> &str {
        match self {
            WidgetRuntime::List(r) => r.widget_id(),
            WidgetRuntime::Chart(r) => r.widget_id(),
        }
    }

    fn capture_state(&self) -> WidgetStateOverride {
        match self {
            WidgetRuntime::List(r) => r.capture_state(),
            WidgetRuntime::Chart(r) => r.capture_state(),
        }
    }
}

/// Registry slot for one widget. Survives reloads of the same widget id.
#[derive(Debug, Clone)]
pub struct WidgetHandle {
    serial: u64,
    runtime: WidgetRuntime,
}

impl WidgetHandle {
    /// Board-unique number assigned when the handle was first created.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn runtime(&self) -> &WidgetRuntime {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut WidgetRuntime {
        &mut self.runtime
    }
}

impl StateCapture for WidgetHandle {
    fn widget_id(&self) -> &str {
        self.runtime.widget_id()
    }

    fn capture_state(&self) -> WidgetStateOverride {
        self.runtime.capture_state()
    }
}

/// Ordered widget handles for one entity page.
#[derive(Debug, Clone, Default)]
pub struct WidgetBoard {
    handles: Vec<WidgetHandle>,
    next_serial: u64,
}

impl WidgetBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the page's widgets and mount each one.
    ///
    /// Handles for ids already on the board are kept; handles whose id is
    /// missing from `configs` are dropped.
    pub fn load(&mut self, configs: Vec<WidgetConfig>) -> Vec<FetchTicket> {
        let mut previous = std::mem::take(&mut self.handles);
        let mut tickets = Vec::with_capacity(configs.len());

        for config in configs {
            let mut runtime = WidgetRuntime::from_config(config);
            let existing = previous
                .iter()
                .position(|h| h.widget_id() == runtime.widget_id())
                .map(|idx| previous.swap_remove(idx));

            let mut handle = match existing {
                Some(mut handle) => {
                    runtime.resume_after(handle.runtime.generation());
                    handle.runtime = runtime;
                    handle
                }
                None => {
                    self.next_serial += 1;
                    WidgetHandle {
                        serial: self.next_serial,
                        runtime,
                    }
                }
            };
            tickets.push(handle.runtime.mount());
            self.handles.push(handle);
        }

        for dropped in &previous {
            debug!(widget_id = %dropped.widget_id(), "widget removed from board");
        }
        debug!(widgets = self.handles.len(), "board loaded");
        tickets
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn handles(&self) -> &[WidgetHandle] {
        &self.handles
    }

    pub fn widget_ids(&self) -> Vec<String> {
        self.handles.iter().map(|h| h.widget_id().to_string()).collect()
    }

    pub fn get(&self, widget_id: &str) -> Option<&WidgetHandle> {
        self.handles.iter().find(|h| h.widget_id() == widget_id)
    }

    pub fn get_mut(&mut self, widget_id: &str) -> Option<&mut WidgetHandle> {
        self.handles.iter_mut().find(|h| h.widget_id() == widget_id)
    }

    /// Runtime at a display position.
    pub fn runtime_at_mut(&mut self, index: usize) -> Option<&mut WidgetRuntime> {
        self.handles.get_mut(index).map(|h| &mut h.runtime)
    }

    /// Configs as currently loaded, in display order.
    pub fn configs(&self) -> Vec<&WidgetConfig> {
        self.handles.iter().map(|h| h.runtime.config()).collect()
    }

    /// Route a fetch result to its widget. Returns false for unknown widgets
    /// and stale generations.
    pub fn apply_response(
        &mut self,
        widget_id: &str,
        generation: u64,
        result: Result<PageEnvelope>,
    ) -> bool {
        match self.get_mut(widget_id) {
            Some(handle) => handle.runtime.apply_response(generation, result),
            None => {
                debug!(widget_id, "response for widget no longer on board");
                false
            }
        }
    }

    /// Capture one widget.
    pub fn capture(&self, widget_id: &str) -> Result<WidgetStateOverride> {
        self.get(widget_id)
            .map(StateCapture::capture_state)
            .ok_or_else(|| VistaError::UnknownWidget {
                widget_id: widget_id.to_string(),
            })
    }

    /// Capture every widget in display order.
    pub fn capture_all(&self) -> Vec<WidgetStateOverride> {
        self.handles.iter().map(StateCapture::capture_state).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChartConfig, ChartType, ColumnConfig};

    fn configs() -> Vec<WidgetConfig> {
        vec![
            WidgetConfig::list("people", "/people").with_column(ColumnConfig::new("name", "Name")),
            WidgetConfig::chart("peers", "/peers", ChartConfig::new(ChartType::Bar, "t", "v")),
        ]
    }

    #[test]
    fn test_dispatch_on_widget_type() {
        let mut configs = configs();
        assert!(matches!(
            WidgetRuntime::from_config(configs.remove(0)),
            WidgetRuntime::List(_)
        ));
        assert!(matches!(
            WidgetRuntime::from_config(configs.remove(0)),
            WidgetRuntime::Chart(_)
        ));
    }

    #[test]
    fn test_load_mounts_every_widget() {
        let mut board = WidgetBoard::new();
        let tickets = board.load(configs());
        assert_eq!(tickets.len(), 2);
        assert_eq!(board.widget_ids(), vec!["people", "peers"]);
        assert!(board.handles().iter().all(|h| h.runtime().state().is_loading()));
    }

    #[test]
    fn test_handles_stable_across_reload() {
        let mut board = WidgetBoard::new();
        board.load(configs());
        let serial = board.get("people").unwrap().serial();

        board.load(configs());
        assert_eq!(board.get("people").unwrap().serial(), serial);

        board.load(vec![configs().remove(1)]);
        assert!(board.get("people").is_none());

        board.load(configs());
        assert_ne!(board.get("people").unwrap().serial(), serial);
    }

    #[test]
    fn test_reload_keeps_old_replies_stale() {
        let mut board = WidgetBoard::new();
        let before = board.load(configs());
        let after = board.load(configs());
        assert!(after[0].generation > before[0].generation);
        assert!(!board.apply_response("people", before[0].generation, Ok(PageEnvelope::default())));
        assert!(board.apply_response("people", after[0].generation, Ok(PageEnvelope::default())));
    }

    #[test]
    fn test_capture_unknown_widget() {
        let board = WidgetBoard::new();
        let err = board.capture("ghost").unwrap_err();
        assert!(matches!(err, VistaError::UnknownWidget { .. }));
    }

    #[test]
    fn test_capture_all_in_order() {
        let mut board = WidgetBoard::new();
        board.load(configs());
        let all = board.capture_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].widget_id, "people");
        assert!(all[1].is_empty());
    }

    #[test]
    fn test_response_for_removed_widget_ignored() {
        let mut board = WidgetBoard::new();
        let tickets = board.load(configs());
        board.load(Vec::new());
        assert!(!board.apply_response(
            &tickets[0].widget_id,
            tickets[0].generation,
            Ok(PageEnvelope::default())
        ));
    }
}
