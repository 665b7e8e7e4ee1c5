//! Tabular widget runtime.
//!
//! [`ListRuntime`] is a sans-IO state machine. Interactions return a
//! [`Transition`] that may carry a [`FetchTicket`]; the caller runs the fetch
//! and hands the result back through [`ListRuntime::apply_response`].

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, warn};
use vista_core::Result;

use crate::capture::StateCapture;
use crate::fetch::{FetchTicket, Generations, LoadState, Transition};
use crate::format::{format_value, plain_text};
use crate::model::{ColumnConfig, PageEnvelope, Record, SortOrder, WidgetConfig, WidgetStateOverride};
use crate::source::PageQuery;

/// Page sizes offered when cycling.
pub const PAGE_SIZE_OPTIONS: [u32; 3] = [10, 20, 50];

/// Runtime for one list widget.
#[derive(Debug, Clone)]
pub struct ListRuntime {
    config: WidgetConfig,
    state: LoadState,
    generations: Generations,
    page: u32,
    page_size: u32,
    sort_by: Option<String>,
    sort_order: Option<SortOrder>,
    server_filters: BTreeMap<String, String>,
    visible: HashSet<String>,
    quick_filter: String,
    envelope: Option<PageEnvelope>,
}

impl ListRuntime {
    /// Build a runtime whose parameters start from the config's initial values.
    pub fn new(config: WidgetConfig) -> Self {
        let sort_by = config.initial_sort_by.clone().filter(|k| !k.is_empty());
        let sort_order = sort_by
            .as_ref()
            .map(|_| config.initial_sort_order.unwrap_or_default());
        let server_filters = config
            .initial_filters
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let visible = config.default_visible_columns().into_iter().collect();

        Self {
            page: 1,
            page_size: config.default_page_size.max(1),
            sort_by,
            sort_order,
            server_filters,
            visible,
            quick_filter: String::new(),
            envelope: None,
            state: LoadState::Idle,
            generations: Generations::default(),
            config,
        }
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Generation of the latest issued ticket.
    pub fn generation(&self) -> u64 {
        self.generations.latest()
    }

    pub(crate) fn generations_mut(&mut self) -> &mut Generations {
        &mut self.generations
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn sort(&self) -> Option<(&str, SortOrder)> {
        self.sort_by
            .as_deref()
            .map(|key| (key, self.sort_order.unwrap_or_default()))
    }

    pub fn server_filters(&self) -> &BTreeMap<String, String> {
        &self.server_filters
    }

    pub fn quick_filter(&self) -> &str {
        &self.quick_filter
    }

    /// Last applied page, if any.
    pub fn envelope(&self) -> Option<&PageEnvelope> {
        self.envelope.as_ref()
    }

    pub fn total_pages(&self) -> u32 {
        self.envelope.as_ref().map_or(1, |e| e.total_pages.max(1))
    }

    pub fn total_records(&self) -> u64 {
        self.envelope.as_ref().map_or(0, |e| e.total_records)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    /// Whether local substring filtering is offered.
    pub fn supports_quick_filter(&self) -> bool {
        !self.config.client_filterable_columns.is_empty()
    }

    /// Visible columns in config order.
    pub fn visible_columns(&self) -> Vec<&ColumnConfig> {
        self.config
            .columns
            .iter()
            .filter(|c| self.visible.contains(&c.key))
            .collect()
    }

    pub fn is_column_visible(&self, key: &str) -> bool {
        self.visible.contains(key)
    }

    /// Header indicator for a column's current sort, if it is the sort key.
    pub fn sort_indicator(&self, key: &str) -> Option<&'static str> {
        match self.sort() {
            Some((sorted, order)) if sorted == key => Some(order.indicator()),
            _ => None,
        }
    }

    // =========================================================================
    // Fetch cycle
    // =========================================================================

    /// Parameters of the request the current state implies.
    pub fn query(&self) -> PageQuery {
        PageQuery {
            endpoint: self.config.endpoint.clone(),
            page: Some(self.page),
            page_size: Some(self.page_size),
            sort_by: self.sort_by.clone(),
            sort_order: self.sort_by.as_ref().and(self.sort_order),
            filters: self.server_filters.clone(),
        }
    }

    /// Start the first fetch.
    pub fn mount(&mut self) -> FetchTicket {
        self.issue()
    }

    /// Re-issue the current request after a failure.
    pub fn retry(&mut self) -> FetchTicket {
        self.issue()
    }

    fn issue(&mut self) -> FetchTicket {
        let generation = self.generations.next();
        self.state = LoadState::Loading;
        let ticket = FetchTicket {
            widget_id: self.config.widget_id.clone(),
            generation,
            query: self.query(),
        };
        debug!(
            widget_id = %ticket.widget_id,
            generation,
            page = self.page,
            "issuing list fetch"
        );
        ticket
    }

    /// Apply a fetch result. Returns false when the response is stale.
    pub fn apply_response(&mut self, generation: u64, result: Result<PageEnvelope>) -> bool {
        if !self.generations.is_current(generation) {
            warn!(
                widget_id = %self.config.widget_id,
                generation,
                latest = self.generations.latest(),
                "dropping stale list response"
            );
            return false;
        }

        match result {
            Ok(envelope) => {
                debug!(
                    widget_id = %self.config.widget_id,
                    generation,
                    rows = envelope.data.len(),
                    total = envelope.total_records,
                    "list page applied"
                );
                self.page = envelope.page.max(1);
                self.envelope = Some(envelope);
                self.state = LoadState::Loaded;
            }
            Err(e) => {
                warn!(widget_id = %self.config.widget_id, error = %e, "list fetch failed");
                self.state = LoadState::Error(e.friendly_message());
            }
        }
        true
    }

    // =========================================================================
    // Interactions
    // =========================================================================

    /// Cycle the sort on `key`: unset → asc → desc → asc …
    ///
    /// Switching to another column starts at ascending. Unknown or
    /// unsortable columns are ignored.
    pub fn toggle_sort(&mut self, key: &str) -> Transition {
        match self.config.column(key) {
            Some(column) if column.sortable => {}
            _ => return Transition::none(),
        }

        let order = match (self.sort_by.as_deref(), self.sort_order) {
            (Some(current), Some(SortOrder::Asc)) if current == key => SortOrder::Desc,
            _ => SortOrder::Asc,
        };
        self.sort_by = Some(key.to_string());
        self.sort_order = Some(order);
        self.page = 1;
        Transition::refetch(self.issue(), true)
    }

    /// Set or clear (empty value) a server filter.
    pub fn set_server_filter(&mut self, field: &str, value: &str) -> Transition {
        let current = self.server_filters.get(field).map(String::as_str).unwrap_or("");
        if current == value {
            return Transition::none();
        }
        if value.is_empty() {
            self.server_filters.remove(field);
        } else {
            self.server_filters.insert(field.to_string(), value.to_string());
        }
        self.page = 1;
        Transition::refetch(self.issue(), true)
    }

    /// Advance a defined filter to its next option, wrapping to "All".
    pub fn cycle_server_filter(&mut self, field: &str) -> Transition {
        let Some(definition) = self
            .config
            .filter_definitions
            .iter()
            .find(|d| d.field == field)
        else {
            return Transition::none();
        };
        let next = definition.next_value(self.server_filters.get(field).map(String::as_str));
        self.set_server_filter(field, &next)
    }

    /// Update the local substring filter. Never refetches.
    pub fn set_quick_filter(&mut self, text: &str) -> Transition {
        self.quick_filter = text.to_string();
        Transition::none()
    }

    /// Show or hide a column. The last visible column stays.
    pub fn toggle_column(&mut self, key: &str) -> Transition {
        if self.config.column(key).is_none() {
            return Transition::none();
        }
        if self.visible.contains(key) {
            if self.visible.len() <= 1 {
                return Transition::none();
            }
            self.visible.remove(key);
        } else {
            self.visible.insert(key.to_string());
        }
        Transition::edit()
    }

    /// Jump to a page within `1..=total_pages`.
    pub fn go_to_page(&mut self, page: u32) -> Transition {
        if page < 1 || page > self.total_pages() || page == self.page {
            return Transition::none();
        }
        self.page = page;
        Transition::refetch(self.issue(), false)
    }

    pub fn next_page(&mut self) -> Transition {
        self.go_to_page(self.page.saturating_add(1))
    }

    pub fn previous_page(&mut self) -> Transition {
        self.go_to_page(self.page.saturating_sub(1))
    }

    /// Change rows per page; resets to page 1.
    pub fn set_page_size(&mut self, page_size: u32) -> Transition {
        if page_size == 0 || page_size == self.page_size {
            return Transition::none();
        }
        self.page_size = page_size;
        self.page = 1;
        Transition::refetch(self.issue(), true)
    }

    /// Step to the next larger entry of [`PAGE_SIZE_OPTIONS`], wrapping to the smallest.
    pub fn cycle_page_size(&mut self) -> Transition {
        let next = PAGE_SIZE_OPTIONS
            .iter()
            .copied()
            .find(|&size| size > self.page_size)
            .unwrap_or(PAGE_SIZE_OPTIONS[0]);
        self.set_page_size(next)
    }

    // =========================================================================
    // Display
    // =========================================================================

    /// Rows of the current page that pass the quick filter.
    pub fn display_rows(&self) -> Vec<&Record> {
        let Some(envelope) = &self.envelope else {
            return Vec::new();
        };
        let needle = self.quick_filter.trim().to_lowercase();
        if needle.is_empty() || !self.supports_quick_filter() {
            return envelope.data.iter().collect();
        }
        envelope
            .data
            .iter()
            .filter(|row| {
                self.config.client_filterable_columns.iter().any(|key| {
                    row.get(key)
                        .map(|v| plain_text(v).to_lowercase().contains(&needle))
                        .unwrap_or(false)
                })
            })
            .collect()
    }

    /// Formatted cells of the visible columns for each displayed row.
    pub fn display_cells(&self) -> Vec<Vec<String>> {
        let columns = self.visible_columns();
        self.display_rows()
            .into_iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| format_value(row.get(&c.key), c.format))
                    .collect()
            })
            .collect()
    }
}

impl StateCapture for ListRuntime {
    fn widget_id(&self) -> &str {
        &self.config.widget_id
    }

    fn capture_state(&self) -> WidgetStateOverride {
        let visible: Vec<String> = self.visible_columns().iter().map(|c| c.key.clone()).collect();
        let visible_columns = (visible != self.config.default_visible_columns()).then_some(visible);

        WidgetStateOverride {
            widget_id: self.config.widget_id.clone(),
            server_filters: self.server_filters.clone(),
            sort_by: self.sort_by.clone(),
            sort_order: self.sort_by.as_ref().and(self.sort_order),
            visible_columns,
            page_size: Some(self.page_size),
        }
    }
}
