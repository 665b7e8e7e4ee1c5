//! Event handling for the Vista TUI.
//!
//! Maps key presses to page-level events. Mouse events go straight to the
//! app because they need the last drawn layout to mean anything.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// What a line of typed text is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Keys are commands
    Normal,
    /// Typing into the focused table's quick filter
    QuickFilter,
    /// Typing the name of a new view
    ViewName,
    /// Typing an entity search
    Search,
    /// Filling in the email schedule form
    ScheduleForm,
    /// Browsing the entity's email schedules
    ScheduleList,
}

/// Application-level events that can trigger state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Focus the next widget
    FocusNext,
    /// Focus the previous widget
    FocusPrev,
    /// Move the column cursor left
    ColumnLeft,
    /// Move the column cursor right
    ColumnRight,
    /// Sort the focused table by the cursor column
    Sort,
    /// Previous page
    PagePrev,
    /// Next page
    PageNext,
    /// Step the focused table to the next page size
    CyclePageSize,
    /// Show or hide the cursor column
    ToggleColumn,
    /// Start typing a quick filter
    BeginQuickFilter,
    /// Cycle the focused table's server filter
    CycleFilter,
    /// Refetch the focused widget
    Retry,
    /// Restore the focused chart's full range
    ResetZoom,
    /// Switch to the nth saved view (1-based)
    SelectView(usize),
    /// Switch back to the default view
    SelectDefault,
    /// Start naming a new view
    BeginSaveNew,
    /// Start an entity search
    BeginSearch,
    /// Overwrite the active view
    Overwrite,
    /// Delete the active view
    Delete,
    /// Open the schedule form for the focused widget
    BeginSchedule,
    /// Open the entity's schedule list
    OpenSchedules,
    /// Previous schedule in the list
    SelectUp,
    /// Next schedule in the list
    SelectDown,
    /// Deliver the selected schedule now
    SendNow,
    /// Show the selected schedule's delivery log
    ShowLogs,
    /// Delete the selected schedule
    DeleteSchedule,
    /// Text input character
    TextInput(char),
    /// Backspace in text input
    Backspace,
    /// Submit text input
    Submit,
    /// Cancel current operation
    Cancel,
    /// Request application quit
    Quit,
    /// Force quit (Ctrl+C)
    ForceQuit,
    /// No action needed
    None,
}

/// Input handler for converting key events to app events.
#[derive(Debug)]
pub struct InputHandler {
    mode: InputMode,
}

impl Default for InputHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl InputHandler {
    pub fn new() -> Self {
        Self {
            mode: InputMode::Normal,
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        self.mode = mode;
    }

    /// Handle a key event and return the corresponding app event.
    pub fn handle_key(&mut self, key: KeyEvent) -> AppEvent {
        // Ctrl+C always force quits
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return AppEvent::ForceQuit;
        }

        if key.code == KeyCode::Esc {
            self.mode = InputMode::Normal;
            return AppEvent::Cancel;
        }

        match self.mode {
            InputMode::Normal => self.handle_normal_mode(key),
            InputMode::QuickFilter | InputMode::ViewName | InputMode::Search => {
                self.handle_text_input(key)
            }
            InputMode::ScheduleForm => self.handle_form(key),
            InputMode::ScheduleList => self.handle_list(key),
        }
    }

    /// The form stays open on Enter; the app closes it once the schedule exists.
    fn handle_form(&mut self, key: KeyEvent) -> AppEvent {
        match key.code {
            KeyCode::Tab if key.modifiers.contains(KeyModifiers::SHIFT) => AppEvent::FocusPrev,
            KeyCode::Tab | KeyCode::Down => AppEvent::FocusNext,
            KeyCode::BackTab | KeyCode::Up => AppEvent::FocusPrev,
            KeyCode::Left => AppEvent::ColumnLeft,
            KeyCode::Right => AppEvent::ColumnRight,
            KeyCode::Enter => AppEvent::Submit,
            KeyCode::Backspace => AppEvent::Backspace,
            KeyCode::Char(c) => AppEvent::TextInput(c),
            _ => AppEvent::None,
        }
    }

    fn handle_list(&mut self, key: KeyEvent) -> AppEvent {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => AppEvent::SelectUp,
            KeyCode::Down | KeyCode::Char('j') => AppEvent::SelectDown,
            KeyCode::Char('n') => AppEvent::SendNow,
            KeyCode::Char('l') => AppEvent::ShowLogs,
            KeyCode::Char('D') => AppEvent::DeleteSchedule,
            KeyCode::Char('q') => {
                self.mode = InputMode::Normal;
                AppEvent::Cancel
            }
            _ => AppEvent::None,
        }
    }

    fn handle_text_input(&mut self, key: KeyEvent) -> AppEvent {
        match key.code {
            KeyCode::Enter => {
                self.mode = InputMode::Normal;
                AppEvent::Submit
            }
            KeyCode::Backspace => AppEvent::Backspace,
            KeyCode::Char(c) => AppEvent::TextInput(c),
            _ => AppEvent::None,
        }
    }

    fn handle_normal_mode(&mut self, key: KeyEvent) -> AppEvent {
        match key.code {
            KeyCode::Char('q') => AppEvent::Quit,

            KeyCode::Tab => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    AppEvent::FocusPrev
                } else {
                    AppEvent::FocusNext
                }
            }
            KeyCode::BackTab => AppEvent::FocusPrev,

            // Table
            KeyCode::Left => AppEvent::ColumnLeft,
            KeyCode::Right => AppEvent::ColumnRight,
            KeyCode::Char('s') => AppEvent::Sort,
            KeyCode::Char('[') => AppEvent::PagePrev,
            KeyCode::Char(']') => AppEvent::PageNext,
            KeyCode::Char('p') => AppEvent::CyclePageSize,
            KeyCode::Char('v') => AppEvent::ToggleColumn,
            KeyCode::Char('f') => AppEvent::CycleFilter,
            KeyCode::Char('/') => {
                self.mode = InputMode::QuickFilter;
                AppEvent::BeginQuickFilter
            }

            // Any widget
            KeyCode::Char('r') => AppEvent::Retry,
            KeyCode::Char('z') => AppEvent::ResetZoom,

            // Views
            KeyCode::Char('0') => AppEvent::SelectDefault,
            KeyCode::Char(c @ '1'..='9') => AppEvent::SelectView(c as usize - '0' as usize),
            KeyCode::Char('S') => {
                self.mode = InputMode::ViewName;
                AppEvent::BeginSaveNew
            }
            KeyCode::Char('O') => AppEvent::Overwrite,
            KeyCode::Char('g') => {
                self.mode = InputMode::Search;
                AppEvent::BeginSearch
            }
            KeyCode::Char('D') => AppEvent::Delete,

            // Schedules
            KeyCode::Char('e') => {
                self.mode = InputMode::ScheduleForm;
                AppEvent::BeginSchedule
            }
            KeyCode::Char('E') => {
                self.mode = InputMode::ScheduleList;
                AppEvent::OpenSchedules
            }

            _ => AppEvent::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_event(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn key_event_with_mods(code: KeyCode, mods: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, mods)
    }

    #[test]
    fn test_table_keys() {
        let mut handler = InputHandler::new();
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('s'))), AppEvent::Sort);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('['))), AppEvent::PagePrev);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char(']'))), AppEvent::PageNext);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('v'))), AppEvent::ToggleColumn);
        assert_eq!(handler.handle_key(key_event(KeyCode::Left)), AppEvent::ColumnLeft);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('f'))), AppEvent::CycleFilter);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('p'))), AppEvent::CyclePageSize);
    }

    #[test]
    fn test_view_keys() {
        let mut handler = InputHandler::new();
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('3'))), AppEvent::SelectView(3));
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('0'))), AppEvent::SelectDefault);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('O'))), AppEvent::Overwrite);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('D'))), AppEvent::Delete);
    }

    #[test]
    fn test_save_new_enters_text_mode() {
        let mut handler = InputHandler::new();
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('S'))), AppEvent::BeginSaveNew);
        assert_eq!(handler.mode(), InputMode::ViewName);

        // Command keys become text while naming.
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('q'))), AppEvent::TextInput('q'));
        assert_eq!(handler.handle_key(key_event(KeyCode::Backspace)), AppEvent::Backspace);
        assert_eq!(handler.handle_key(key_event(KeyCode::Enter)), AppEvent::Submit);
        assert_eq!(handler.mode(), InputMode::Normal);
    }

    #[test]
    fn test_escape_leaves_quick_filter() {
        let mut handler = InputHandler::new();
        handler.handle_key(key_event(KeyCode::Char('/')));
        assert_eq!(handler.mode(), InputMode::QuickFilter);
        assert_eq!(handler.handle_key(key_event(KeyCode::Esc)), AppEvent::Cancel);
        assert_eq!(handler.mode(), InputMode::Normal);
    }

    #[test]
    fn test_search_mode() {
        let mut handler = InputHandler::new();
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('g'))), AppEvent::BeginSearch);
        assert_eq!(handler.mode(), InputMode::Search);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('s'))), AppEvent::TextInput('s'));
    }

    #[test]
    fn test_schedule_form_keeps_mode_on_enter() {
        let mut handler = InputHandler::new();
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('e'))), AppEvent::BeginSchedule);
        assert_eq!(handler.mode(), InputMode::ScheduleForm);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('q'))), AppEvent::TextInput('q'));
        assert_eq!(handler.handle_key(key_event(KeyCode::Tab)), AppEvent::FocusNext);
        assert_eq!(handler.handle_key(key_event(KeyCode::Right)), AppEvent::ColumnRight);
        assert_eq!(handler.handle_key(key_event(KeyCode::Enter)), AppEvent::Submit);
        assert_eq!(handler.mode(), InputMode::ScheduleForm);
        assert_eq!(handler.handle_key(key_event(KeyCode::Esc)), AppEvent::Cancel);
        assert_eq!(handler.mode(), InputMode::Normal);
    }

    #[test]
    fn test_schedule_list_keys() {
        let mut handler = InputHandler::new();
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('E'))), AppEvent::OpenSchedules);
        assert_eq!(handler.mode(), InputMode::ScheduleList);
        assert_eq!(handler.handle_key(key_event(KeyCode::Down)), AppEvent::SelectDown);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('n'))), AppEvent::SendNow);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('l'))), AppEvent::ShowLogs);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('D'))), AppEvent::DeleteSchedule);
        assert_eq!(handler.handle_key(key_event(KeyCode::Char('q'))), AppEvent::Cancel);
        assert_eq!(handler.mode(), InputMode::Normal);
    }

    #[test]
    fn test_ctrl_c_force_quit() {
        let mut handler = InputHandler::new();
        assert_eq!(
            handler.handle_key(key_event_with_mods(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            AppEvent::ForceQuit
        );
        handler.set_mode(InputMode::ViewName);
        assert_eq!(
            handler.handle_key(key_event_with_mods(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            AppEvent::ForceQuit
        );
    }

    #[test]
    fn test_focus_cycling() {
        let mut handler = InputHandler::new();
        assert_eq!(handler.handle_key(key_event(KeyCode::Tab)), AppEvent::FocusNext);
        assert_eq!(
            handler.handle_key(key_event_with_mods(KeyCode::Tab, KeyModifiers::SHIFT)),
            AppEvent::FocusPrev
        );
        assert_eq!(handler.handle_key(key_event(KeyCode::BackTab)), AppEvent::FocusPrev);
    }
}
