//! Widget renderers for the Vista TUI.
//!
//! Each panel borrows a runtime and draws it; none of them hold state. The
//! line chart exposes its plot geometry so the app can turn mouse columns
//! into point indices with the same mapping the renderer used.

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, Widget},
};
use vista_views::SavedView;
use vista_widget::{ChartRuntime, ListRuntime, LoadState, WidgetConfig};

use crate::theme::{CANVAS, Theme, blend, solid};

/// Bordered block with a focus marker in the title.
fn panel_block<'a>(title: &str, focused: bool, theme: &Theme) -> Block<'a> {
    let focus_icon = if focused { "◆" } else { "◇" };
    let (border, title_style) = if focused {
        (
            Style::default().fg(theme.colors.focus_highlight),
            Style::default()
                .fg(theme.colors.focus_highlight)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        (
            Style::default().fg(theme.colors.border_dim),
            Style::default().fg(theme.colors.text),
        )
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(Span::styled(format!(" {focus_icon} {title} "), title_style))
}

fn widget_title(config: &WidgetConfig) -> &str {
    if config.title.is_empty() {
        &config.widget_id
    } else {
        &config.title
    }
}

/// Loading and error placeholders. Returns true when one was drawn.
fn render_state(state: &LoadState, has_data: bool, area: Rect, buf: &mut Buffer, theme: &Theme) -> bool {
    match state {
        LoadState::Error(message) => {
            Paragraph::new(vec![
                Line::from(Span::styled(message.clone(), Style::default().fg(theme.colors.error))),
                Line::from(Span::styled("r: retry", Style::default().fg(theme.colors.hotkey))),
            ])
            .render(area, buf);
            true
        }
        LoadState::Loading | LoadState::Idle if !has_data => {
            Paragraph::new("Loading...")
                .style(Style::default().fg(theme.colors.loading))
                .render(area, buf);
            true
        }
        _ => false,
    }
}

// =============================================================================
// Table
// =============================================================================

/// Paginated table with sort indicators, a filter line and a page footer.
pub struct TablePanel<'a> {
    runtime: &'a ListRuntime,
    theme: &'a Theme,
    focused: bool,
    /// Index into the config's columns, hidden ones included
    cursor: usize,
    /// Quick-filter text being typed, if the input line is open
    editing: Option<&'a str>,
}

impl<'a> TablePanel<'a> {
    pub fn new(runtime: &'a ListRuntime, theme: &'a Theme) -> Self {
        Self {
            runtime,
            theme,
            focused: false,
            cursor: 0,
            editing: None,
        }
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    pub fn cursor(mut self, cursor: usize) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn editing(mut self, text: Option<&'a str>) -> Self {
        self.editing = text;
        self
    }

    fn cursor_key(&self) -> Option<&str> {
        self.runtime
            .config()
            .columns
            .get(self.cursor)
            .map(|c| c.key.as_str())
    }

    fn filter_line(&self) -> Line<'static> {
        let colors = &self.theme.colors;
        let mut spans = Vec::new();
        for definition in &self.runtime.config().filter_definitions {
            let current = self
                .runtime
                .server_filters()
                .get(&definition.field)
                .and_then(|v| definition.options.iter().find(|o| &o.value == v))
                .map_or("All", |o| o.label.as_str());
            spans.push(Span::styled(
                format!("{}: ", definition.label),
                Style::default().fg(colors.text_dim),
            ));
            spans.push(Span::styled(format!("{current}  "), Style::default().fg(colors.text)));
        }
        if self.runtime.supports_quick_filter() {
            let (text, style) = match self.editing {
                Some(text) => (format!("/{text}▏"), Style::default().fg(colors.hotkey)),
                None if self.runtime.quick_filter().is_empty() => {
                    ("/ filter".to_string(), Style::default().fg(colors.text_dim))
                }
                None => (
                    format!("/{}", self.runtime.quick_filter()),
                    Style::default().fg(colors.text),
                ),
            };
            spans.push(Span::styled(text, style));
        }
        Line::from(spans)
    }

    fn footer_line(&self) -> Line<'static> {
        let colors = &self.theme.colors;
        let runtime = self.runtime;
        let nav = |enabled: bool, label: &str| {
            let color = if enabled { colors.hotkey } else { colors.disabled };
            Span::styled(label.to_string(), Style::default().fg(color))
        };
        let mut spans = vec![
            nav(runtime.has_previous(), "[ prev"),
            Span::raw("  "),
            Span::styled(
                format!(
                    "Page {} of {} ({} records)",
                    runtime.page(),
                    runtime.total_pages(),
                    runtime.total_records()
                ),
                Style::default().fg(colors.text_dim),
            ),
            Span::raw("  "),
            nav(runtime.has_next(), "next ]"),
        ];
        if let Some(column) = runtime.config().columns.get(self.cursor) {
            let hidden = if runtime.is_column_visible(&column.key) { "" } else { " (hidden)" };
            spans.push(Span::styled(
                format!("   col: {}{hidden}", column.label),
                Style::default().fg(colors.text_dim),
            ));
        }
        Line::from(spans)
    }
}

impl Widget for TablePanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = panel_block(widget_title(self.runtime.config()), self.focused, self.theme);
        let inner = block.inner(area);
        block.render(area, buf);
        if inner.height < 3 {
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(1), Constraint::Length(1)])
            .split(inner);
        self.filter_line().render(chunks[0], buf);
        self.footer_line().render(chunks[2], buf);

        let has_data = self.runtime.envelope().is_some();
        if render_state(self.runtime.state(), has_data, chunks[1], buf, self.theme) {
            return;
        }

        let colors = &self.theme.colors;
        let columns = self.runtime.visible_columns();
        let cursor_key = if self.focused { self.cursor_key() } else { None };
        let header = Row::new(columns.iter().map(|c| {
            let label = match self.runtime.sort_indicator(&c.key) {
                Some(arrow) => format!("{} {arrow}", c.label),
                None => c.label.clone(),
            };
            let mut style = Style::default().fg(colors.header).add_modifier(Modifier::BOLD);
            if cursor_key == Some(c.key.as_str()) {
                style = style.add_modifier(Modifier::REVERSED);
            }
            Cell::from(label).style(style)
        }));

        let cells = self.runtime.display_cells();
        if cells.is_empty() {
            Paragraph::new("No rows")
                .style(Style::default().fg(colors.text_dim))
                .render(chunks[1], buf);
            return;
        }
        let rows = cells
            .into_iter()
            .map(|row| Row::new(row).style(Style::default().fg(colors.text)));
        let widths: Vec<Constraint> = columns
            .iter()
            .map(|_| Constraint::Ratio(1, columns.len().max(1) as u32))
            .collect();

        let table = Table::new(rows, widths).header(header).column_spacing(1);
        Widget::render(table, chunks[1], buf);
    }
}

// =============================================================================
// Bar chart
// =============================================================================

/// Horizontal bars colored by the highlight partition, with a legend.
pub struct BarChartPanel<'a> {
    runtime: &'a ChartRuntime,
    theme: &'a Theme,
    focused: bool,
}

impl<'a> BarChartPanel<'a> {
    pub fn new(runtime: &'a ChartRuntime, theme: &'a Theme) -> Self {
        Self {
            runtime,
            theme,
            focused: false,
        }
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }
}

impl Widget for BarChartPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = panel_block(widget_title(self.runtime.config()), self.focused, self.theme);
        let inner = block.inner(area);
        block.render(area, buf);

        let points = self.runtime.points();
        if render_state(self.runtime.state(), !points.is_empty(), inner, buf, self.theme) {
            return;
        }
        if points.is_empty() {
            Paragraph::new("No data")
                .style(Style::default().fg(self.theme.colors.text_dim))
                .render(inner, buf);
            return;
        }

        let partition = self.runtime.highlight();
        let legend_height = if partition.legend.is_empty() { 0 } else { 1 };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(legend_height)])
            .split(inner);

        let label_width = points
            .iter()
            .map(|p| p.label.chars().count())
            .max()
            .unwrap_or(0)
            .min(16) as u16;
        let max_value = points.iter().map(|p| p.value).fold(0.0_f64, f64::max);
        let bar_space = chunks[0].width.saturating_sub(label_width + 14);
        let focus = self.runtime.focus();

        let lines: Vec<Line> = points
            .iter()
            .zip(&partition.bars)
            .take(chunks[0].height as usize)
            .map(|(point, style)| {
                let len = if max_value > 0.0 {
                    ((point.value.max(0.0) / max_value) * f64::from(bar_space)).round() as usize
                } else {
                    0
                };
                let color = blend(&style.color, style.opacity, CANVAS);
                let label: String = point.label.chars().take(label_width as usize).collect();
                let label_style = if focus == Some(point.label.as_str()) {
                    Style::default().fg(color).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(self.theme.colors.text_dim)
                };
                Line::from(vec![
                    Span::styled(format!("{label:>width$} ", width = label_width as usize), label_style),
                    Span::styled("█".repeat(len), Style::default().fg(color)),
                    Span::styled(
                        format!(" {}", compact_number(point.value)),
                        Style::default().fg(self.theme.colors.text),
                    ),
                ])
            })
            .collect();
        Paragraph::new(lines).render(chunks[0], buf);

        if legend_height > 0 {
            let spans: Vec<Span> = partition
                .legend
                .iter()
                .flat_map(|entry| {
                    let color = blend(&entry.color, entry.opacity, CANVAS);
                    let mut name = Style::default().fg(self.theme.colors.text_dim);
                    if entry.highlighted {
                        name = name.fg(color).add_modifier(Modifier::BOLD);
                    }
                    [
                        Span::styled("■ ", Style::default().fg(color)),
                        Span::styled(format!("{}  ", entry.industry), name),
                    ]
                })
                .collect();
            Line::from(spans).render(chunks[1], buf);
        }
    }
}

/// Short axis and bar labels: 1.2K, 3.4M, 5.6B.
pub fn compact_number(value: f64) -> String {
    let abs = value.abs();
    let (scaled, suffix) = if abs >= 1e12 {
        (value / 1e12, "T")
    } else if abs >= 1e9 {
        (value / 1e9, "B")
    } else if abs >= 1e6 {
        (value / 1e6, "M")
    } else if abs >= 1e3 {
        (value / 1e3, "K")
    } else {
        (value, "")
    };
    let text = format!("{scaled:.1}");
    let text = text.strip_suffix(".0").unwrap_or(&text);
    format!("{text}{suffix}")
}

// =============================================================================
// Line chart
// =============================================================================

/// Plot rectangle of a line chart drawn into `area`: inside the border, above
/// the tick-label row.
pub fn line_plot_area(area: Rect) -> Rect {
    let inner = Block::default().borders(Borders::ALL).inner(area);
    Rect {
        height: inner.height.saturating_sub(1),
        ..inner
    }
}

/// Point index under a terminal column of the plot.
pub fn index_at(plot: Rect, len: usize, column: u16) -> usize {
    if len <= 1 || plot.width <= 1 {
        return 0;
    }
    let offset = column.saturating_sub(plot.x).min(plot.width - 1);
    let ratio = f64::from(offset) / f64::from(plot.width - 1);
    ((ratio * (len - 1) as f64).round() as usize).min(len - 1)
}

/// Terminal column of a point index.
pub fn column_of(plot: Rect, len: usize, index: usize) -> u16 {
    if len <= 1 || plot.width <= 1 {
        return plot.x;
    }
    let ratio = index.min(len - 1) as f64 / (len - 1) as f64;
    plot.x + (ratio * f64::from(plot.width - 1)).round() as u16
}

/// Line chart over the zoom window with thinned ticks and a drag band.
pub struct LineChartPanel<'a> {
    runtime: &'a ChartRuntime,
    theme: &'a Theme,
    focused: bool,
}

impl<'a> LineChartPanel<'a> {
    pub fn new(runtime: &'a ChartRuntime, theme: &'a Theme) -> Self {
        Self {
            runtime,
            theme,
            focused: false,
        }
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }
}

impl Widget for LineChartPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let zoom = self.runtime.zoom();
        let mut title = widget_title(self.runtime.config()).to_string();
        if zoom.is_zoomed() {
            title.push_str("  (z: reset zoom)");
        }
        let block = panel_block(&title, self.focused, self.theme);
        let inner = block.inner(area);
        block.render(area, buf);

        let visible = self.runtime.visible_points();
        if render_state(self.runtime.state(), !self.runtime.points().is_empty(), inner, buf, self.theme) {
            return;
        }
        if visible.is_empty() {
            Paragraph::new("No data")
                .style(Style::default().fg(self.theme.colors.text_dim))
                .render(inner, buf);
            return;
        }

        let Some(chart) = self.runtime.chart_config() else {
            return;
        };
        let plot = line_plot_area(area);
        let len = visible.len();

        let primary: Vec<(f64, f64)> = visible
            .iter()
            .enumerate()
            .map(|(i, p)| (i as f64, p.value))
            .collect();
        let secondary: Vec<Vec<(f64, f64)>> = (0..chart.secondary_series.len())
            .map(|s| {
                visible
                    .iter()
                    .enumerate()
                    .filter_map(|(i, p)| p.secondary.get(s).copied().flatten().map(|v| (i as f64, v)))
                    .collect()
            })
            .collect();

        let values = primary
            .iter()
            .chain(secondary.iter().flatten())
            .map(|(_, v)| *v);
        let (mut lo, mut hi) = values.fold((f64::MAX, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if (hi - lo).abs() < f64::EPSILON {
            lo -= 1.0;
            hi += 1.0;
        }

        // Band first so the plotted line draws over it.
        if let Some((from, to)) = zoom.selection_band() {
            let start = column_of(plot, len, from);
            let end = column_of(plot, len, to);
            for x in start..=end.min(plot.right().saturating_sub(1)) {
                for y in plot.top()..plot.bottom() {
                    buf[(x, y)].set_bg(self.theme.colors.selection);
                }
            }
        }

        let mut datasets = vec![
            Dataset::default()
                .name(chart.y_label.clone())
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(solid(&chart.color)))
                .data(&primary),
        ];
        for (series, data) in chart.secondary_series.iter().zip(&secondary) {
            datasets.push(
                Dataset::default()
                    .name(series.label.clone())
                    .marker(symbols::Marker::Braille)
                    .graph_type(GraphType::Line)
                    .style(Style::default().fg(solid(&series.color)))
                    .data(data),
            );
        }

        let max_x = (len.saturating_sub(1)).max(1) as f64;
        Chart::new(datasets)
            .x_axis(Axis::default().bounds([0.0, max_x]))
            .y_axis(Axis::default().bounds([lo, hi]))
            .render(plot, buf);

        // Y range in the corner, ticks on the bottom row.
        Span::styled(
            format!("{}–{}", compact_number(lo), compact_number(hi)),
            Style::default().fg(self.theme.colors.text_dim),
        )
        .render(Rect { height: 1, ..plot }, buf);

        let tick_row = Rect {
            y: plot.bottom(),
            height: 1,
            ..plot
        };
        if tick_row.bottom() > inner.bottom() {
            return;
        }
        let mut next_free = tick_row.x;
        for index in zoom.ticks() {
            let Some(point) = visible.get(index) else {
                continue;
            };
            let x = column_of(plot, len, index);
            if x < next_free {
                continue;
            }
            let width = (point.label.chars().count() as u16).min(tick_row.right().saturating_sub(x));
            buf.set_stringn(
                x,
                tick_row.y,
                &point.label,
                width as usize,
                Style::default().fg(self.theme.colors.text_dim),
            );
            next_free = x + width + 1;
        }
    }
}

// =============================================================================
// Header and toolbar
// =============================================================================

/// The view toolbar: selectable views, dirty marker and mutation affordances.
pub struct Toolbar<'a> {
    pub views: &'a [SavedView],
    pub username: &'a str,
    pub active_view_id: Option<&'a str>,
    pub active_view_name: &'a str,
    pub dirty: bool,
    pub can_save_new: bool,
    pub can_overwrite: bool,
    pub can_delete: bool,
    /// View name being typed, if the save prompt is open
    pub naming: Option<&'a str>,
    pub theme: &'a Theme,
}

impl Widget for Toolbar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let entry = |key: String, label: String, active: bool| {
            let style = if active {
                Style::default().fg(colors.header).add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
            } else {
                Style::default().fg(colors.text)
            };
            [
                Span::styled(key, Style::default().fg(colors.hotkey)),
                Span::styled(format!("{label}  "), style),
            ]
        };

        let mut views: Vec<Span> = entry("0 ".into(), "Default".into(), self.active_view_id.is_none())
            .into_iter()
            .collect();
        for (i, view) in self.views.iter().take(9).enumerate() {
            views.extend(entry(
                format!("{} ", i + 1),
                view.label_for(self.username),
                self.active_view_id == Some(view.view_id.as_str()),
            ));
        }

        let mut status = vec![
            Span::styled("View: ", Style::default().fg(colors.text_dim)),
            Span::styled(
                self.active_view_name.to_string(),
                Style::default().fg(colors.text).add_modifier(Modifier::BOLD),
            ),
        ];
        if self.dirty {
            status.push(Span::styled(" ● unsaved", Style::default().fg(colors.dirty)));
        }
        status.push(Span::raw("   "));
        let action = |enabled: bool, key: &str, label: &str| {
            let color = if enabled { colors.hotkey } else { colors.disabled };
            let text_color = if enabled { colors.text } else { colors.disabled };
            [
                Span::styled(format!("[{key}]"), Style::default().fg(color).add_modifier(Modifier::BOLD)),
                Span::styled(format!("{label} "), Style::default().fg(text_color)),
            ]
        };
        status.extend(action(self.can_save_new, "S", "save new"));
        status.extend(action(self.can_overwrite, "O", "overwrite"));
        status.extend(action(self.can_delete, "D", "delete"));

        let mut lines = vec![Line::from(views), Line::from(status)];
        if let Some(name) = self.naming {
            lines.push(Line::from(vec![
                Span::styled("New view name: ", Style::default().fg(colors.hotkey)),
                Span::styled(format!("{name}▏"), Style::default().fg(colors.text)),
                Span::styled("  (Enter to save, Esc to cancel)", Style::default().fg(colors.text_dim)),
            ]));
        }
        Paragraph::new(lines).render(area, buf);
    }
}
