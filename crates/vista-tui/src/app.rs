//! Main application state and loop for the Vista TUI.
//!
//! The UI thread owns the [`ViewController`]. Widget fetches and entity
//! searches run as tasks on a tokio runtime and post their results back over
//! a channel, which the loop drains once per frame. View and schedule
//! mutations are short request/response exchanges and run to completion on
//! the UI thread.

use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use vista_core::debounce::DEFAULT_DEBOUNCE;
use vista_core::{Debouncer, Result, VistaError};
use vista_views::{DisplayZone, ScheduleStore, SnapshotBuilder, ViewController, format_schedule};
use vista_widget::{
    ChartType, EntityResolution, FetchTicket, ListRuntime, PageEnvelope, Transition,
    WidgetDataSource, WidgetRuntime, ZoomSelection, format_value,
};

use crate::event::{AppEvent, InputHandler, InputMode};
use crate::schedule::{
    ScheduleForm, ScheduleFormPanel, ScheduleList, ScheduleListPanel, delivery_notice, overlay_area,
};
use crate::theme::Theme;
use crate::widget::{BarChartPanel, LineChartPanel, TablePanel, Toolbar, index_at, line_plot_area};

/// Result type for app operations.
pub type AppResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Target frame rate (60 FPS = ~16.67ms per frame).
const TARGET_FPS: u64 = 60;
const FRAME_DURATION: Duration = Duration::from_millis(1000 / TARGET_FPS);

/// Two clicks on the same chart within this window reset its zoom.
const DOUBLE_CLICK: Duration = Duration::from_millis(400);

/// Candidates shown under the search prompt.
const MAX_CANDIDATES: usize = 5;

/// Results posted back from background tasks.
enum Message {
    Fetched {
        ticket: FetchTicket,
        result: Result<PageEnvelope>,
    },
    Resolved {
        query: String,
        result: Result<EntityResolution>,
    },
}

/// Open text prompt, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Prompt {
    None,
    /// Typing a quick filter into the widget at `widget`; Esc restores `original`
    QuickFilter { widget: usize, original: String },
    ViewName,
    Search,
}

/// Main application state.
pub struct App {
    controller: ViewController,
    data: Arc<dyn WidgetDataSource>,
    handle: Handle,
    tx: Sender<Message>,
    rx: Receiver<Message>,
    /// Fetches spawned but not yet applied
    in_flight: usize,
    input_handler: InputHandler,
    theme: Theme,
    /// Index of the focused widget on the board
    focus: usize,
    /// Column cursor inside the focused table
    column_cursor: usize,
    prompt: Prompt,
    input: String,
    search: Debouncer,
    search_results: Option<EntityResolution>,
    schedules: Option<Arc<dyn ScheduleStore>>,
    zone: DisplayZone,
    schedule_form: Option<ScheduleForm>,
    schedule_list: Option<ScheduleList>,
    status_message: Option<String>,
    should_quit: bool,
    needs_redraw: bool,
    /// Areas of the widgets as last drawn, in board order
    widget_areas: Vec<Rect>,
    /// Line chart currently being drag-selected
    drag_widget: Option<usize>,
    last_click: Option<(usize, Instant)>,
}

impl App {
    /// Create an app around a controller. Fetches spawn onto `handle`.
    pub fn new(controller: ViewController, data: Arc<dyn WidgetDataSource>, handle: Handle) -> Self {
        let (tx, rx) = mpsc::channel();
        let search = Debouncer::new(handle.clone(), DEFAULT_DEBOUNCE);
        Self {
            controller,
            data,
            handle,
            tx,
            rx,
            in_flight: 0,
            input_handler: InputHandler::new(),
            theme: Theme::default(),
            focus: 0,
            column_cursor: 0,
            prompt: Prompt::None,
            input: String::new(),
            search,
            search_results: None,
            schedules: None,
            zone: DisplayZone::default(),
            schedule_form: None,
            schedule_list: None,
            status_message: None,
            should_quit: false,
            needs_redraw: true,
            widget_areas: Vec::new(),
            drag_widget: None,
            last_click: None,
        }
    }

    /// Quiet period before an entity search is sent.
    pub fn with_search_delay(mut self, delay: Duration) -> Self {
        self.search = Debouncer::new(self.handle.clone(), delay);
        self
    }

    /// Enable email schedules; times are shown in `zone`.
    pub fn with_schedules(mut self, store: Arc<dyn ScheduleStore>, zone: DisplayZone) -> Self {
        self.schedules = Some(store);
        self.zone = zone;
        self
    }

    pub fn controller(&self) -> &ViewController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ViewController {
        &mut self.controller
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn column_cursor(&self) -> usize {
        self.column_cursor
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn search_results(&self) -> Option<&EntityResolution> {
        self.search_results.as_ref()
    }

    pub fn schedule_form(&self) -> Option<&ScheduleForm> {
        self.schedule_form.as_ref()
    }

    pub fn schedule_list(&self) -> Option<&ScheduleList> {
        self.schedule_list.as_ref()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Widget areas from the last draw, in board order.
    pub fn widget_areas(&self) -> &[Rect] {
        &self.widget_areas
    }

    /// Load the entity page and start every widget's first fetch.
    pub fn start(&mut self) -> Result<()> {
        let handle = self.handle.clone();
        let tickets = handle.block_on(self.controller.load())?;
        self.page_loaded(tickets);
        Ok(())
    }

    // =========================================================================
    // Background work
    // =========================================================================

    fn dispatch(&mut self, tickets: Vec<FetchTicket>) {
        for ticket in tickets {
            let data = Arc::clone(&self.data);
            let tx = self.tx.clone();
            self.in_flight += 1;
            debug!(widget_id = %ticket.widget_id, generation = ticket.generation, "spawning fetch");
            self.handle.spawn(async move {
                let result = data.fetch_page(&ticket.query).await;
                // The receiver is gone only when the app is shutting down.
                let _ = tx.send(Message::Fetched { ticket, result });
            });
        }
        self.needs_redraw = true;
    }

    /// A fresh board replaced the old one: reset cursors, mark charts with
    /// the current entity and fetch.
    fn page_loaded(&mut self, tickets: Vec<FetchTicket>) {
        let entity_id = self.controller.entity_id().to_string();
        let board = self.controller.board_mut();
        for index in 0..board.len() {
            if let Some(chart) = board.runtime_at_mut(index).and_then(WidgetRuntime::as_chart_mut) {
                chart.set_focus(Some(entity_id.clone()));
            }
        }
        if self.focus >= self.controller.board().len() {
            self.focus = 0;
        }
        self.column_cursor = 0;
        self.drag_widget = None;
        self.dispatch(tickets);
    }

    fn apply_transition(&mut self, transition: Transition) {
        self.controller.record(&transition);
        if let Some(ticket) = transition.fetch {
            self.dispatch(vec![ticket]);
        }
        self.needs_redraw = true;
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Fetched { ticket, result } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                if let Err(e) = &result {
                    warn!(widget_id = %ticket.widget_id, error = %e, "widget fetch failed");
                }
                if !self.controller.apply_response(&ticket, result) {
                    debug!(widget_id = %ticket.widget_id, generation = ticket.generation, "stale response dropped");
                }
            }
            Message::Resolved { query, result } => {
                if self.prompt != Prompt::Search || query != self.input {
                    return;
                }
                match result {
                    Ok(resolution) => self.search_results = Some(resolution),
                    Err(e) => {
                        warn!(query = %query, error = %e, "entity search failed");
                        self.status_message = Some(e.friendly_message());
                    }
                }
            }
        }
        self.needs_redraw = true;
    }

    /// Apply every result that has arrived. Returns true if any did.
    pub fn poll_messages(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.rx.try_recv() {
            self.handle_message(message);
            changed = true;
        }
        changed
    }

    /// Block until every spawned fetch has been applied or `timeout` passes.
    /// Returns the number still outstanding.
    pub fn settle(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(message) => self.handle_message(message),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
            }
        }
        self.in_flight
    }

    /// Wait up to `timeout` for suggestions matching the current search text.
    pub fn settle_search(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.search_results.is_none() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(message) => self.handle_message(message),
                Err(_) => return false,
            }
        }
        true
    }

    // =========================================================================
    // Input
    // =========================================================================

    pub fn handle_key_event(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        let event = self.input_handler.handle_key(key);
        self.handle_app_event(event);
    }

    pub fn handle_app_event(&mut self, event: AppEvent) {
        self.needs_redraw = true;
        if self.schedule_form.is_some() && self.handle_form_event(&event) {
            return;
        }
        match event {
            AppEvent::Quit | AppEvent::ForceQuit => self.should_quit = true,

            AppEvent::FocusNext => self.move_focus(1),
            AppEvent::FocusPrev => self.move_focus(-1),
            AppEvent::ColumnLeft => self.move_cursor(-1),
            AppEvent::ColumnRight => self.move_cursor(1),

            AppEvent::Sort => self.with_cursor_column(|list, key| list.toggle_sort(key)),
            AppEvent::ToggleColumn => self.with_cursor_column(|list, key| list.toggle_column(key)),
            AppEvent::PagePrev => self.with_focused_list(|list| list.previous_page()),
            AppEvent::PageNext => self.with_focused_list(|list| list.next_page()),
            AppEvent::CyclePageSize => self.with_focused_list(|list| list.cycle_page_size()),
            AppEvent::CycleFilter => self.cycle_filter(),
            AppEvent::BeginQuickFilter => self.begin_quick_filter(),

            AppEvent::Retry => {
                let focus = self.focus;
                if let Some(runtime) = self.controller.board_mut().runtime_at_mut(focus) {
                    let ticket = runtime.retry();
                    self.dispatch(vec![ticket]);
                }
            }
            AppEvent::ResetZoom => self.reset_zoom(self.focus),

            AppEvent::SelectDefault => self.select_view(None),
            AppEvent::SelectView(n) => {
                let id = self
                    .controller
                    .saved_views()
                    .get(n.saturating_sub(1))
                    .map(|v| v.view_id.clone());
                match id {
                    Some(id) => self.select_view(Some(id)),
                    None => self.status_message = Some(format!("No view {n}")),
                }
            }
            AppEvent::BeginSaveNew => {
                if self.controller.can_save_new() {
                    self.prompt = Prompt::ViewName;
                    self.input.clear();
                } else {
                    self.input_handler.set_mode(InputMode::Normal);
                    self.status_message = Some("No unsaved changes".to_string());
                }
            }
            AppEvent::Overwrite => self.overwrite(),
            AppEvent::Delete => self.delete_view(),
            AppEvent::BeginSchedule => self.begin_schedule(),
            AppEvent::OpenSchedules => self.open_schedules(),
            AppEvent::SelectUp => self.with_schedule_list(|list| list.move_selection(-1)),
            AppEvent::SelectDown => self.with_schedule_list(|list| list.move_selection(1)),
            AppEvent::SendNow => self.send_now(),
            AppEvent::ShowLogs => self.show_logs(),
            AppEvent::DeleteSchedule => self.delete_schedule(),
            AppEvent::BeginSearch => {
                self.prompt = Prompt::Search;
                self.input.clear();
                self.search_results = None;
            }

            AppEvent::TextInput(c) => {
                self.input.push(c);
                self.input_changed();
            }
            AppEvent::Backspace => {
                self.input.pop();
                self.input_changed();
            }
            AppEvent::Submit => self.submit(),
            AppEvent::Cancel => self.cancel(),

            AppEvent::None => {}
        }
    }

    fn move_focus(&mut self, step: isize) {
        let len = self.controller.board().len();
        if len == 0 {
            return;
        }
        self.focus = (self.focus as isize + step).rem_euclid(len as isize) as usize;
        self.column_cursor = 0;
    }

    fn move_cursor(&mut self, step: isize) {
        let Some(columns) = self.focused_runtime().and_then(|r| r.as_list()).map(|l| l.config().columns.len()) else {
            return;
        };
        if columns == 0 {
            return;
        }
        self.column_cursor = (self.column_cursor as isize + step).clamp(0, columns as isize - 1) as usize;
    }

    fn focused_runtime(&self) -> Option<&WidgetRuntime> {
        self.controller
            .board()
            .handles()
            .get(self.focus)
            .map(|h| h.runtime())
    }

    fn with_focused_list(&mut self, action: impl FnOnce(&mut ListRuntime) -> Transition) {
        let focus = self.focus;
        let transition = self
            .controller
            .board_mut()
            .runtime_at_mut(focus)
            .and_then(WidgetRuntime::as_list_mut)
            .map(action);
        if let Some(transition) = transition {
            self.apply_transition(transition);
        }
    }

    fn with_cursor_column(&mut self, action: impl FnOnce(&mut ListRuntime, &str) -> Transition) {
        let cursor = self.column_cursor;
        self.with_focused_list(|list| {
            let Some(key) = list.config().columns.get(cursor).map(|c| c.key.clone()) else {
                return Transition::none();
            };
            action(list, &key)
        });
    }

    /// Cycle the filter on the cursor column, or the first one there is.
    fn cycle_filter(&mut self) {
        let cursor = self.column_cursor;
        self.with_focused_list(|list| {
            let config = list.config();
            let cursor_key = config.columns.get(cursor).map(|c| c.key.as_str());
            let field = config
                .filter_definitions
                .iter()
                .find(|d| Some(d.field.as_str()) == cursor_key)
                .or_else(|| config.filter_definitions.first())
                .map(|d| d.field.clone());
            match field {
                Some(field) => list.cycle_server_filter(&field),
                None => Transition::none(),
            }
        });
    }

    fn begin_quick_filter(&mut self) {
        let focus = self.focus;
        let original = self
            .focused_runtime()
            .and_then(WidgetRuntime::as_list)
            .filter(|l| l.supports_quick_filter())
            .map(|l| l.quick_filter().to_string());
        match original {
            Some(original) => {
                self.input = original.clone();
                self.prompt = Prompt::QuickFilter { widget: focus, original };
            }
            None => {
                self.input_handler.set_mode(InputMode::Normal);
                self.status_message = Some("No quick filter on this widget".to_string());
            }
        }
    }

    fn set_quick_filter(&mut self, widget: usize, text: &str) {
        if let Some(list) = self
            .controller
            .board_mut()
            .runtime_at_mut(widget)
            .and_then(WidgetRuntime::as_list_mut)
        {
            let transition = list.set_quick_filter(text);
            self.controller.record(&transition);
        }
    }

    fn input_changed(&mut self) {
        match self.prompt.clone() {
            Prompt::QuickFilter { widget, .. } => {
                let text = self.input.clone();
                self.set_quick_filter(widget, &text);
            }
            Prompt::Search => self.schedule_search(),
            Prompt::ViewName | Prompt::None => {}
        }
    }

    fn schedule_search(&mut self) {
        let query = self.input.trim().to_string();
        if query.is_empty() {
            self.search.cancel();
            self.search_results = None;
            return;
        }
        let source = self.controller.entity_source();
        let tx = self.tx.clone();
        let raw = self.input.clone();
        self.search.schedule(async move {
            let result = source.resolve(&query).await;
            let _ = tx.send(Message::Resolved { query: raw, result });
        });
    }

    fn submit(&mut self) {
        let prompt = std::mem::replace(&mut self.prompt, Prompt::None);
        let text = std::mem::take(&mut self.input);
        match prompt {
            Prompt::ViewName => self.save_as_new(&text),
            Prompt::Search => self.go_to_entity(&text),
            Prompt::QuickFilter { .. } | Prompt::None => {}
        }
    }

    fn cancel(&mut self) {
        if self.schedule_list.take().is_some() {
            return;
        }
        let prompt = std::mem::replace(&mut self.prompt, Prompt::None);
        self.input.clear();
        match prompt {
            Prompt::QuickFilter { widget, original } => self.set_quick_filter(widget, &original),
            Prompt::Search => {
                self.search.cancel();
                self.search_results = None;
            }
            Prompt::ViewName => {}
            Prompt::None => self.status_message = None,
        }
    }

    fn reset_zoom(&mut self, widget: usize) {
        if let Some(zoom) = self
            .controller
            .board_mut()
            .runtime_at_mut(widget)
            .and_then(WidgetRuntime::as_chart_mut)
            .and_then(|c| c.zoom_mut())
        {
            zoom.reset();
        }
    }

    /// Route a mouse event to the line chart under it.
    pub fn handle_mouse_event(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let Some(index) = self.widget_at(mouse.column, mouse.row) else {
                    return;
                };
                if self.focus != index {
                    self.focus = index;
                    self.column_cursor = 0;
                }
                self.needs_redraw = true;

                let double = self
                    .last_click
                    .is_some_and(|(w, at)| w == index && at.elapsed() <= DOUBLE_CLICK);
                if double {
                    self.last_click = None;
                    self.drag_widget = None;
                    self.reset_zoom(index);
                    return;
                }
                self.last_click = Some((index, Instant::now()));

                if let Some((point, zoom)) = self.zoom_target(index, mouse.column) {
                    zoom.press(point);
                    self.drag_widget = Some(index);
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let Some(index) = self.drag_widget else {
                    return;
                };
                if let Some((point, zoom)) = self.zoom_target(index, mouse.column) {
                    zoom.drag_to(point);
                    self.needs_redraw = true;
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                let Some(index) = self.drag_widget.take() else {
                    return;
                };
                if let Some((point, zoom)) = self.zoom_target(index, mouse.column) {
                    zoom.drag_to(point);
                    let committed = zoom.release();
                    if committed {
                        debug!(widget = index, "chart zoomed");
                        // A drag is not the first half of a double-click.
                        self.last_click = None;
                    }
                    self.needs_redraw = true;
                }
            }
            _ => {}
        }
    }

    fn widget_at(&self, column: u16, row: u16) -> Option<usize> {
        self.widget_areas.iter().position(|area| {
            column >= area.x && column < area.right() && row >= area.y && row < area.bottom()
        })
    }

    /// The zoom of the line chart at `widget` and the point under `column`.
    fn zoom_target(&mut self, widget: usize, column: u16) -> Option<(usize, &mut ZoomSelection)> {
        let plot = line_plot_area(*self.widget_areas.get(widget)?);
        let chart = self
            .controller
            .board_mut()
            .runtime_at_mut(widget)
            .and_then(WidgetRuntime::as_chart_mut)?;
        let zoom = chart.zoom_mut()?;
        let point = index_at(plot, zoom.visible_len(), column);
        Some((point, zoom))
    }

    // =========================================================================
    // View operations
    // =========================================================================

    fn report(&mut self, action: &str, error: &VistaError) {
        warn!(action, error = %error, "operation failed");
        self.status_message = Some(error.friendly_message());
    }

    fn select_view(&mut self, view_id: Option<String>) {
        let handle = self.handle.clone();
        match handle.block_on(self.controller.select_view(view_id.as_deref())) {
            Ok(tickets) => {
                self.status_message = None;
                self.page_loaded(tickets);
            }
            Err(e) => self.report("select view", &e),
        }
    }

    fn save_as_new(&mut self, name: &str) {
        let handle = self.handle.clone();
        match handle.block_on(self.controller.save_as_new(name, false)) {
            Ok(view) => {
                info!(view_id = %view.view_id, "saved new view");
                self.status_message = Some(format!("Saved \"{}\"", view.name));
            }
            Err(e) => self.report("save view", &e),
        }
    }

    fn overwrite(&mut self) {
        let handle = self.handle.clone();
        match handle.block_on(self.controller.overwrite()) {
            Ok(tickets) => {
                self.status_message = Some("View updated".to_string());
                self.page_loaded(tickets);
            }
            Err(e) => self.report("overwrite view", &e),
        }
    }

    fn delete_view(&mut self) {
        let handle = self.handle.clone();
        match handle.block_on(self.controller.delete()) {
            Ok(tickets) => {
                self.status_message = Some("View deleted".to_string());
                self.page_loaded(tickets);
            }
            Err(e) => self.report("delete view", &e),
        }
    }

    // =========================================================================
    // Schedules
    // =========================================================================

    fn schedules_unavailable(&mut self) {
        self.input_handler.set_mode(InputMode::Normal);
        self.status_message = Some("Email schedules are not available".to_string());
    }

    /// Open the schedule form for the focused widget.
    fn begin_schedule(&mut self) {
        if self.schedules.is_none() {
            self.schedules_unavailable();
            return;
        }
        let form = self.focused_runtime().map(|runtime| {
            let config = runtime.config();
            let title = if config.title.is_empty() {
                &config.widget_id
            } else {
                &config.title
            };
            ScheduleForm::new(config.widget_id.clone(), title.clone())
        });
        match form {
            Some(form) => self.schedule_form = Some(form),
            None => self.input_handler.set_mode(InputMode::Normal),
        }
    }

    /// Form keys. Returns false for events the form does not take.
    fn handle_form_event(&mut self, event: &AppEvent) -> bool {
        match event {
            AppEvent::Submit => {
                self.create_schedule();
                return true;
            }
            AppEvent::Cancel => {
                self.schedule_form = None;
                return true;
            }
            _ => {}
        }
        let Some(form) = self.schedule_form.as_mut() else {
            return false;
        };
        match event {
            AppEvent::FocusNext => form.move_field(1),
            AppEvent::FocusPrev => form.move_field(-1),
            AppEvent::ColumnLeft => form.adjust(-1, &self.zone),
            AppEvent::ColumnRight => form.adjust(1, &self.zone),
            AppEvent::TextInput(c) => form.type_char(*c),
            AppEvent::Backspace => form.backspace(),
            _ => return false,
        }
        true
    }

    /// Validate the form and create a schedule frozen from the widget's live state.
    fn create_schedule(&mut self) {
        let (Some(store), Some(form)) = (self.schedules.clone(), self.schedule_form.as_ref()) else {
            return;
        };
        let widget_id = form.widget_id().to_string();
        let body = SnapshotBuilder::from_widget(self.controller.board(), &widget_id).and_then(|overrides| {
            form.draft()
                .to_create(self.controller.entity_type(), self.controller.entity_id(), overrides)
        });
        let mut body = match body {
            Ok(body) => body,
            Err(e) => {
                if let Some(form) = self.schedule_form.as_mut() {
                    form.set_error(e.friendly_message());
                }
                return;
            }
        };
        body.widget_ids = Some(vec![widget_id.clone()]);

        let handle = self.handle.clone();
        match handle.block_on(store.create_schedule(&body)) {
            Ok(schedule) => {
                info!(schedule_id = %schedule.schedule_id, widget_id = %widget_id, "schedule created");
                self.schedule_form = None;
                self.input_handler.set_mode(InputMode::Normal);
                self.status_message = Some(format!(
                    "Scheduled \"{}\" {}",
                    schedule.name,
                    format_schedule(&schedule.recurrence, &self.zone)
                ));
            }
            Err(e) => {
                warn!(widget_id = %widget_id, error = %e, "schedule create failed");
                if let Some(form) = self.schedule_form.as_mut() {
                    form.set_error("Failed to create schedule. Please try again.");
                }
            }
        }
    }

    /// Fetch the entity's schedules and show them.
    fn open_schedules(&mut self) {
        let Some(store) = self.schedules.clone() else {
            self.schedules_unavailable();
            return;
        };
        let handle = self.handle.clone();
        let result = handle.block_on(store.list_schedules(
            Some(self.controller.entity_type()),
            Some(self.controller.entity_id()),
        ));
        match result {
            Ok(schedules) => self.schedule_list = Some(ScheduleList::new(schedules)),
            Err(e) => {
                self.input_handler.set_mode(InputMode::Normal);
                self.report("list schedules", &e);
            }
        }
    }

    fn with_schedule_list(&mut self, action: impl FnOnce(&mut ScheduleList)) {
        if let Some(list) = self.schedule_list.as_mut() {
            action(list);
        }
    }

    /// Store and id of the selected schedule, when the list is open.
    fn selected_schedule(&self) -> Option<(Arc<dyn ScheduleStore>, String)> {
        let store = self.schedules.clone()?;
        let id = self.schedule_list.as_ref()?.selected()?.schedule_id.clone();
        Some((store, id))
    }

    fn send_now(&mut self) {
        let Some((store, id)) = self.selected_schedule() else {
            return;
        };
        let handle = self.handle.clone();
        let notice = match handle.block_on(store.send_now(&id)) {
            Ok(log) => delivery_notice(&log),
            Err(e) => {
                warn!(schedule_id = %id, error = %e, "send now failed");
                "Failed to send email.".to_string()
            }
        };
        self.with_schedule_list(|list| list.set_notice(notice));
    }

    fn show_logs(&mut self) {
        let Some((store, id)) = self.selected_schedule() else {
            return;
        };
        let handle = self.handle.clone();
        match handle.block_on(store.schedule_logs(&id)) {
            Ok(logs) => self.with_schedule_list(|list| list.show_logs(logs)),
            Err(e) => {
                warn!(schedule_id = %id, error = %e, "loading deliveries failed");
                self.with_schedule_list(|list| list.set_notice("Failed to load deliveries."));
            }
        }
    }

    fn delete_schedule(&mut self) {
        let Some((store, id)) = self.selected_schedule() else {
            return;
        };
        let handle = self.handle.clone();
        if let Err(e) = handle.block_on(store.delete_schedule(&id)) {
            warn!(schedule_id = %id, error = %e, "schedule delete failed");
            self.with_schedule_list(|list| list.set_notice("Failed to delete schedule."));
            return;
        }
        info!(schedule_id = %id, "schedule deleted");
        let refreshed = handle.block_on(store.list_schedules(
            Some(self.controller.entity_type()),
            Some(self.controller.entity_id()),
        ));
        self.with_schedule_list(|list| {
            match refreshed {
                Ok(schedules) => list.replace(schedules),
                Err(_) => {
                    let remaining = list
                        .schedules()
                        .iter()
                        .filter(|s| s.schedule_id != id)
                        .cloned()
                        .collect();
                    list.replace(remaining);
                }
            }
            list.set_notice("Schedule deleted");
        });
    }

    /// Resolve `query` and move the page to the entity it names.
    fn go_to_entity(&mut self, query: &str) {
        self.search.cancel();
        self.search_results = None;
        let query = query.trim();
        if query.is_empty() {
            return;
        }

        let handle = self.handle.clone();
        let source = self.controller.entity_source();
        let resolution = match handle.block_on(source.resolve(query)) {
            Ok(resolution) => resolution,
            Err(e) => {
                self.report("resolve entity", &e);
                return;
            }
        };
        let target = if resolution.resolved {
            resolution.entity_type.clone().zip(resolution.entity_id.clone())
        } else if let [only] = resolution.candidates.as_slice() {
            Some((only.entity_type.clone(), only.entity_id.clone()))
        } else {
            None
        };
        let Some((entity_type, entity_id)) = target else {
            self.status_message = Some(
                resolution
                    .message
                    .unwrap_or_else(|| format!("No entity matches '{query}'")),
            );
            return;
        };

        match handle.block_on(self.controller.switch_entity(&entity_type, &entity_id)) {
            Ok(tickets) => {
                self.status_message = None;
                self.focus = 0;
                self.page_loaded(tickets);
            }
            Err(e) => self.report("switch entity", &e),
        }
    }

    // =========================================================================
    // Loop
    // =========================================================================

    /// Run the main application loop.
    pub fn run(&mut self) -> AppResult<()> {
        // Setup terminal
        crossterm::terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        crossterm::execute!(
            stdout,
            crossterm::terminal::EnterAlternateScreen,
            crossterm::event::EnableMouseCapture
        )?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.run_loop(&mut terminal);

        // Restore terminal
        crossterm::terminal::disable_raw_mode()?;
        crossterm::execute!(
            terminal.backend_mut(),
            crossterm::terminal::LeaveAlternateScreen,
            crossterm::event::DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> AppResult<()> {
        while !self.should_quit {
            let frame_start = Instant::now();

            if self.poll_messages() {
                self.needs_redraw = true;
            }
            if std::mem::take(&mut self.needs_redraw) {
                terminal.draw(|frame| self.draw(frame))?;
            }

            let elapsed = frame_start.elapsed();
            let timeout = FRAME_DURATION.saturating_sub(elapsed).max(Duration::from_millis(1));
            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) => self.handle_key_event(key),
                    Event::Mouse(mouse) => self.handle_mouse_event(mouse),
                    Event::Resize(..) => self.needs_redraw = true,
                    _ => {}
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Drawing
    // =========================================================================

    /// Draw the UI.
    pub fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let toolbar_height = if self.prompt == Prompt::ViewName { 3 } else { 2 };
        let footer_height = if self.prompt == Prompt::Search { 2 } else { 1 };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),              // Header
                Constraint::Length(toolbar_height), // Views
                Constraint::Min(6),                 // Widgets
                Constraint::Length(footer_height),  // Status
            ])
            .split(area);

        self.draw_header(frame, chunks[0]);
        self.draw_toolbar(frame, chunks[1]);
        self.draw_widgets(frame, chunks[2]);
        self.draw_footer(frame, chunks[3]);
        self.draw_schedules(frame, area);
    }

    fn draw_schedules(&self, frame: &mut Frame, area: Rect) {
        if let Some(form) = &self.schedule_form {
            let panel = ScheduleFormPanel {
                form,
                zone: &self.zone,
                theme: &self.theme,
            };
            frame.render_widget(panel, overlay_area(area, 76, 11));
        } else if let Some(list) = &self.schedule_list {
            let logs = list.logs().map_or(0, |l| l.len().max(1) + 2);
            let rows = list.schedules().len().max(1) + logs + 5;
            let panel = ScheduleListPanel {
                list,
                zone: &self.zone,
                theme: &self.theme,
            };
            frame.render_widget(panel, overlay_area(area, 96, rows as u16));
        }
    }

    fn draw_header(&self, frame: &mut Frame, area: Rect) {
        let colors = &self.theme.colors;
        let mut title = vec![Span::styled(
            format!(" {} ", self.controller.entity_id()),
            Style::default().fg(colors.header).add_modifier(Modifier::BOLD),
        )];
        let mut fields = Vec::new();
        if let Some(detail) = self.controller.detail() {
            title.push(Span::styled(detail.display_name.clone(), Style::default().fg(colors.text)));
            for field in &detail.header_fields {
                fields.push(Span::styled(format!(" {}: ", field.label), Style::default().fg(colors.text_dim)));
                fields.push(Span::styled(
                    format_value(field.value.as_ref(), field.format),
                    Style::default().fg(colors.text),
                ));
            }
        }
        if self.in_flight > 0 {
            title.push(Span::styled(
                format!("  [Loading {}]", self.in_flight),
                Style::default().fg(colors.loading),
            ));
        }
        frame.render_widget(Paragraph::new(vec![Line::from(title), Line::from(fields)]), area);
    }

    fn draw_toolbar(&self, frame: &mut Frame, area: Rect) {
        let active_name = self.controller.active_view_name();
        let toolbar = Toolbar {
            views: self.controller.saved_views(),
            username: self.controller.username(),
            active_view_id: self.controller.active_view_id(),
            active_view_name: &active_name,
            dirty: self.controller.is_dirty(),
            can_save_new: self.controller.can_save_new(),
            can_overwrite: self.controller.can_overwrite(),
            can_delete: self.controller.can_delete(),
            naming: (self.prompt == Prompt::ViewName).then_some(self.input.as_str()),
            theme: &self.theme,
        };
        frame.render_widget(toolbar, area);
    }

    fn draw_widgets(&mut self, frame: &mut Frame, area: Rect) {
        let handles = self.controller.board().handles();
        if handles.is_empty() {
            self.widget_areas.clear();
            let text = if self.controller.detail().is_some() {
                "No widgets"
            } else {
                "Loading..."
            };
            frame.render_widget(
                Paragraph::new(text).style(Style::default().fg(self.theme.colors.text_dim)),
                area,
            );
            return;
        }

        let count = handles.len() as u32;
        let areas = Layout::default()
            .direction(Direction::Vertical)
            .constraints((0..count).map(|_| Constraint::Ratio(1, count)))
            .split(area);

        let quick_filter = match &self.prompt {
            Prompt::QuickFilter { widget, .. } => Some((*widget, self.input.as_str())),
            _ => None,
        };
        for (index, (handle, rect)) in handles.iter().zip(areas.iter()).enumerate() {
            let focused = index == self.focus;
            match handle.runtime() {
                WidgetRuntime::List(list) => {
                    let editing = quick_filter.filter(|(w, _)| *w == index).map(|(_, text)| text);
                    let panel = TablePanel::new(list, &self.theme)
                        .focused(focused)
                        .cursor(if focused { self.column_cursor } else { usize::MAX })
                        .editing(editing);
                    frame.render_widget(panel, *rect);
                }
                WidgetRuntime::Chart(chart) if chart.chart_type() == ChartType::Line => {
                    frame.render_widget(LineChartPanel::new(chart, &self.theme).focused(focused), *rect);
                }
                WidgetRuntime::Chart(chart) => {
                    frame.render_widget(BarChartPanel::new(chart, &self.theme).focused(focused), *rect);
                }
            }
        }
        self.widget_areas = areas.to_vec();
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let colors = &self.theme.colors;
        let mut lines = Vec::new();
        if self.prompt == Prompt::Search {
            lines.push(Line::from(vec![
                Span::styled("Go to: ", Style::default().fg(colors.hotkey)),
                Span::styled(format!("{}▏", self.input), Style::default().fg(colors.text)),
            ]));
            let candidates = self.search_results.as_ref().map_or_else(String::new, |r| {
                if r.candidates.is_empty() {
                    r.message.clone().unwrap_or_default()
                } else {
                    r.candidates
                        .iter()
                        .take(MAX_CANDIDATES)
                        .map(|c| format!("{} {}", c.entity_id, c.display_name))
                        .collect::<Vec<_>>()
                        .join("  |  ")
                }
            });
            lines.push(Line::from(Span::styled(candidates, Style::default().fg(colors.text_dim))));
        } else if let Some(message) = &self.status_message {
            lines.push(Line::from(Span::styled(message.clone(), Style::default().fg(colors.error))));
        } else {
            let hint = |key: &str, label: &str| {
                [
                    Span::styled(key.to_string(), Style::default().fg(colors.hotkey)),
                    Span::styled(format!(" {label}  "), Style::default().fg(colors.text_dim)),
                ]
            };
            let spans: Vec<Span> = [
                ("Tab", "focus"),
                ("←→", "column"),
                ("s", "sort"),
                ("[ ]", "page"),
                ("p", "page size"),
                ("/", "filter"),
                ("f", "cycle filter"),
                ("e", "email"),
                ("g", "go to"),
                ("q", "quit"),
            ]
            .iter()
            .flat_map(|(key, label)| hint(key, label))
            .collect();
            lines.push(Line::from(spans));
        }
        frame.render_widget(Paragraph::new(lines), area);
    }
}
