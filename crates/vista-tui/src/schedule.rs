//! Email schedule form and schedule list overlays.
//!
//! [`ScheduleForm`] edits a [`ScheduleDraft`] one field at a time; it never
//! talks to the store. [`ScheduleList`] holds the entity's schedules as last
//! fetched. The app owns both and runs the requests.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};
use vista_views::schedule::{DAY_LABELS, MAX_DAY_OF_MONTH};
use vista_views::{
    DisplayZone, EmailLog, EmailSchedule, LogStatus, RecurrenceType, ScheduleDraft,
    format_schedule, format_time, hour_options,
};

use crate::theme::Theme;

/// Form rows, in Tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleField {
    Name,
    Recipients,
    Recurrence,
    Days,
    Time,
}

const FIELDS: [ScheduleField; 5] = [
    ScheduleField::Name,
    ScheduleField::Recipients,
    ScheduleField::Recurrence,
    ScheduleField::Days,
    ScheduleField::Time,
];

const RECURRENCES: [RecurrenceType; 3] = [
    RecurrenceType::Daily,
    RecurrenceType::Weekly,
    RecurrenceType::Monthly,
];

fn recurrence_label(kind: RecurrenceType) -> &'static str {
    match kind {
        RecurrenceType::Daily => "Daily",
        RecurrenceType::Weekly => "Weekly",
        RecurrenceType::Monthly => "Monthly",
    }
}

fn step_index(index: usize, len: usize, step: i32) -> usize {
    (index as i32 + step).rem_euclid(len as i32) as usize
}

/// A new schedule for one widget, being filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleForm {
    widget_id: String,
    widget_title: String,
    draft: ScheduleDraft,
    field: ScheduleField,
    error: Option<String>,
}

impl ScheduleForm {
    pub fn new(widget_id: impl Into<String>, widget_title: impl Into<String>) -> Self {
        Self {
            widget_id: widget_id.into(),
            widget_title: widget_title.into(),
            draft: ScheduleDraft::default(),
            field: ScheduleField::Name,
            error: None,
        }
    }

    pub fn widget_id(&self) -> &str {
        &self.widget_id
    }

    pub fn draft(&self) -> &ScheduleDraft {
        &self.draft
    }

    pub fn field(&self) -> ScheduleField {
        self.field
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// Move between rows; `step` is +1 or -1.
    pub fn move_field(&mut self, step: i32) {
        let index = FIELDS.iter().position(|f| *f == self.field).unwrap_or(0);
        self.field = FIELDS[step_index(index, FIELDS.len(), step)];
    }

    /// Typed character. Text rows take it as text; on the days row `1`-`7`
    /// toggle Monday through Sunday.
    pub fn type_char(&mut self, c: char) {
        self.error = None;
        match self.field {
            ScheduleField::Name => self.draft.name.push(c),
            ScheduleField::Recipients => self.draft.recipients.push(c),
            ScheduleField::Days if self.draft.recurrence_type != RecurrenceType::Monthly => {
                if let Some(day) = c.to_digit(10).filter(|d| (1..=7).contains(d)) {
                    self.draft.days.toggle(day as u8 - 1);
                }
            }
            _ => {}
        }
    }

    pub fn backspace(&mut self) {
        self.error = None;
        match self.field {
            ScheduleField::Name => {
                self.draft.name.pop();
            }
            ScheduleField::Recipients => {
                self.draft.recipients.pop();
            }
            _ => {}
        }
    }

    /// Left/right on a choice row.
    pub fn adjust(&mut self, step: i32, zone: &DisplayZone) {
        self.error = None;
        match self.field {
            ScheduleField::Recurrence => {
                let index = RECURRENCES
                    .iter()
                    .position(|r| *r == self.draft.recurrence_type)
                    .unwrap_or(1);
                self.draft.recurrence_type = RECURRENCES[step_index(index, RECURRENCES.len(), step)];
            }
            ScheduleField::Days if self.draft.recurrence_type == RecurrenceType::Monthly => {
                let day = self.draft.day_of_month as i32 + step;
                self.draft.day_of_month = day.clamp(1, MAX_DAY_OF_MONTH as i32) as u32;
            }
            ScheduleField::Time => {
                let options = hour_options(zone);
                let index = options
                    .iter()
                    .position(|o| o.value == self.draft.time_of_day)
                    .unwrap_or(0);
                self.draft.time_of_day = options[step_index(index, options.len(), step)].value;
            }
            _ => {}
        }
    }

    /// Summary of the current choice, or None while the draft is invalid.
    pub fn preview(&self, zone: &DisplayZone) -> Option<String> {
        let valid = self.draft.validate().ok()?;
        Some(format_schedule(&valid.recurrence, zone))
    }
}

/// The entity's schedules as last fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleList {
    schedules: Vec<EmailSchedule>,
    selected: usize,
    logs: Option<Vec<EmailLog>>,
    notice: Option<String>,
}

impl ScheduleList {
    pub fn new(schedules: Vec<EmailSchedule>) -> Self {
        Self {
            schedules,
            selected: 0,
            logs: None,
            notice: None,
        }
    }

    pub fn schedules(&self) -> &[EmailSchedule] {
        &self.schedules
    }

    pub fn selected(&self) -> Option<&EmailSchedule> {
        self.schedules.get(self.selected)
    }

    pub fn logs(&self) -> Option<&[EmailLog]> {
        self.logs.as_deref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    /// Move the selection; hides any open logs.
    pub fn move_selection(&mut self, step: i32) {
        if self.schedules.is_empty() {
            return;
        }
        self.selected = (self.selected as i32 + step).clamp(0, self.schedules.len() as i32 - 1) as usize;
        self.logs = None;
    }

    pub fn show_logs(&mut self, logs: Vec<EmailLog>) {
        self.logs = Some(logs);
    }

    /// Swap in a fresh list, keeping the selection in range.
    pub fn replace(&mut self, schedules: Vec<EmailSchedule>) {
        self.schedules = schedules;
        self.selected = self.selected.min(self.schedules.len().saturating_sub(1));
        self.logs = None;
    }
}

/// Centered box inside `area`, like a dialog.
pub fn overlay_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn overlay_block<'a>(title: String, theme: &Theme) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.colors.header))
        .title(Span::styled(
            title,
            Style::default().fg(theme.colors.header).add_modifier(Modifier::BOLD),
        ))
        .style(Style::default().bg(Color::Black))
}

/// Renders a [`ScheduleForm`].
pub struct ScheduleFormPanel<'a> {
    pub form: &'a ScheduleForm,
    pub zone: &'a DisplayZone,
    pub theme: &'a Theme,
}

impl ScheduleFormPanel<'_> {
    fn row(&self, field: ScheduleField, label: &str, value: Vec<Span<'static>>) -> Line<'static> {
        let colors = &self.theme.colors;
        let active = self.form.field == field;
        let marker = if active { "▸ " } else { "  " };
        let label_style = if active {
            Style::default().fg(colors.focus_highlight).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(colors.text_dim)
        };
        let mut spans = vec![
            Span::styled(marker.to_string(), Style::default().fg(colors.focus_highlight)),
            Span::styled(format!("{label:<12}"), label_style),
        ];
        spans.extend(value);
        Line::from(spans)
    }

    fn text_value(&self, text: &str, field: ScheduleField) -> Vec<Span<'static>> {
        let cursor = if self.form.field == field { "▏" } else { "" };
        vec![Span::styled(
            format!("{text}{cursor}"),
            Style::default().fg(self.theme.colors.text),
        )]
    }

    fn choice(&self, label: &str, chosen: bool) -> Span<'static> {
        let colors = &self.theme.colors;
        if chosen {
            Span::styled(
                format!("[{label}] "),
                Style::default().fg(colors.header).add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(format!(" {label}  "), Style::default().fg(colors.text_dim))
        }
    }
}

impl Widget for ScheduleFormPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let draft = &self.form.draft;
        Clear.render(area, buf);

        let mut lines = vec![
            self.row(ScheduleField::Name, "Name", self.text_value(&draft.name, ScheduleField::Name)),
            self.row(
                ScheduleField::Recipients,
                "Recipients",
                self.text_value(&draft.recipients, ScheduleField::Recipients),
            ),
            self.row(
                ScheduleField::Recurrence,
                "Recurrence",
                RECURRENCES
                    .iter()
                    .map(|r| self.choice(recurrence_label(*r), *r == draft.recurrence_type))
                    .collect(),
            ),
        ];
        lines.push(if draft.recurrence_type == RecurrenceType::Monthly {
            self.row(
                ScheduleField::Days,
                "Day",
                vec![Span::styled(
                    format!("◂ {} ▸", draft.day_of_month),
                    Style::default().fg(colors.text),
                )],
            )
        } else {
            self.row(
                ScheduleField::Days,
                "Days",
                DAY_LABELS
                    .iter()
                    .enumerate()
                    .map(|(i, label)| self.choice(label, draft.days.contains(i as u8)))
                    .collect(),
            )
        });
        lines.push(self.row(
            ScheduleField::Time,
            "Time",
            vec![Span::styled(
                format!("◂ {} ▸", format_time(draft.time_of_day, self.zone)),
                Style::default().fg(colors.text),
            )],
        ));
        lines.push(Line::from(""));

        if let Some(error) = &self.form.error {
            lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(colors.error))));
        } else if let Some(preview) = self.form.preview(self.zone) {
            lines.push(Line::from(Span::styled(
                format!("Sends {preview}"),
                Style::default().fg(colors.text_dim),
            )));
        } else {
            lines.push(Line::from(""));
        }
        lines.push(Line::from(Span::styled(
            "Tab field  ←→ change  1-7 days  Enter create  Esc cancel",
            Style::default().fg(colors.hotkey),
        )));

        Paragraph::new(lines)
            .block(overlay_block(format!(" Email: {} ", self.form.widget_title), self.theme))
            .wrap(Wrap { trim: false })
            .render(area, buf);
    }
}

/// Renders a [`ScheduleList`].
pub struct ScheduleListPanel<'a> {
    pub list: &'a ScheduleList,
    pub zone: &'a DisplayZone,
    pub theme: &'a Theme,
}

impl Widget for ScheduleListPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        Clear.render(area, buf);

        let mut lines = Vec::new();
        if self.list.schedules.is_empty() {
            lines.push(Line::from(Span::styled(
                "No email schedules yet.",
                Style::default().fg(colors.text_dim),
            )));
        }
        for (i, schedule) in self.list.schedules.iter().enumerate() {
            let selected = i == self.list.selected;
            let name_style = if selected {
                Style::default().fg(colors.header).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(colors.text)
            };
            lines.push(Line::from(vec![
                Span::styled(if selected { "▸ " } else { "  " }, Style::default().fg(colors.focus_highlight)),
                Span::styled(schedule.name.clone(), name_style),
                Span::styled(
                    format!("  {}", format_schedule(&schedule.recurrence, self.zone)),
                    Style::default().fg(colors.text_dim),
                ),
                Span::styled(
                    format!("  {} recipient(s)", schedule.recipients.len()),
                    Style::default().fg(colors.text_dim),
                ),
            ]));
        }

        if let Some(logs) = &self.list.logs {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled("Deliveries", Style::default().fg(colors.header))));
            if logs.is_empty() {
                lines.push(Line::from(Span::styled("  none yet", Style::default().fg(colors.text_dim))));
            }
            for log in logs.iter().rev() {
                let (status, color) = match log.status {
                    LogStatus::Sent => ("sent", colors.text),
                    LogStatus::Failed => ("failed", colors.error),
                };
                let mut text = format!("  {}  {status}", log.sent_at);
                if let Some(error) = &log.error {
                    text.push_str(&format!(": {error}"));
                }
                lines.push(Line::from(Span::styled(text, Style::default().fg(color))));
            }
        }

        lines.push(Line::from(""));
        if let Some(notice) = &self.list.notice {
            lines.push(Line::from(Span::styled(notice.clone(), Style::default().fg(colors.hotkey))));
        }
        lines.push(Line::from(Span::styled(
            "↑↓ select  n send now  l logs  D delete  Esc close",
            Style::default().fg(colors.hotkey),
        )));

        Paragraph::new(lines)
            .block(overlay_block(" Email Schedules ".to_string(), self.theme))
            .wrap(Wrap { trim: false })
            .render(area, buf);
    }
}

/// Status line after a send-now attempt.
pub fn delivery_notice(log: &EmailLog) -> String {
    match log.status {
        LogStatus::Sent => "Email sent successfully!".to_string(),
        LogStatus::Failed => format!(
            "Send failed: {}",
            log.error.as_deref().unwrap_or("Unknown error")
        ),
    }
}
