//! Terminal UI for Vista.
//!
//! This crate provides the Ratatui-based entity page: an entity header, the
//! saved-view toolbar and one panel per widget.
//!
//! ## Features
//!
//! - Sortable, paginated tables with server filters and a quick filter
//! - Bar charts highlighted around the current entity, with an industry legend
//! - Line charts with drag-to-zoom
//! - Saved views: switch, save as new, overwrite, delete
//! - Entity search with debounced suggestions
//!
//! ## Hotkeys
//!
//! - `Tab` / `Shift+Tab` - Focus next/previous widget
//! - `←` `→` - Move the column cursor
//! - `s` - Sort by the cursor column
//! - `[` `]` - Previous/next page
//! - `p` - Cycle the page size (10, 20, 50)
//! - `v` - Show or hide the cursor column
//! - `/` - Quick filter
//! - `f` - Cycle the server filter
//! - `r` - Retry the focused widget
//! - `z` - Reset chart zoom (or double-click the chart)
//! - `0` - Default view, `1`-`9` saved views
//! - `S` - Save as new view, `O` overwrite, `D` delete
//! - `g` - Go to another entity
//! - `e` - Email the focused widget on a schedule, `E` list schedules
//! - `q` - Quit
//! - `Esc` - Cancel

pub mod app;
pub mod event;
pub mod schedule;
pub mod theme;
pub mod widget;

pub use app::{App, AppResult};
pub use event::{AppEvent, InputHandler, InputMode};
pub use theme::Theme;
