//! # vista-widget
//!
//! Widget configs and runtimes for Vista entity pages.
//!
//! This crate provides:
//! - [`WidgetConfig`] - Declarative widget description as delivered by the backend
//! - [`ListRuntime`] - Paginated, sortable, filterable table state machine
//! - [`ChartRuntime`] - Bar/line chart state with highlighting and zoom
//! - [`StateCapture`] / [`WidgetBoard`] - Override capture and the page's widget registry
//! - [`cascade`] - Merging stored overrides into widget configs
//! - [`WidgetDataSource`] - Seam for fetching widget rows
//!
//! ## Example
//!
//! ```
//! use vista_widget::{ColumnConfig, ListRuntime, StateCapture, WidgetConfig};
//!
//! let config = WidgetConfig::list("people", "/api/entities/stock/AAPL/people")
//!     .with_column(ColumnConfig::new("name", "Name"))
//!     .with_column(ColumnConfig::new("title", "Title"));
//!
//! let mut runtime = ListRuntime::new(config);
//! let _ticket = runtime.mount();
//! let transition = runtime.toggle_sort("name");
//! assert!(transition.dirty);
//!
//! let captured = runtime.capture_state();
//! assert_eq!(captured.sort_by.as_deref(), Some("name"));
//! ```

pub mod capture;
pub mod cascade;
pub mod chart;
pub mod fetch;
pub mod format;
pub mod highlight;
pub mod list;
pub mod model;
pub mod source;
pub mod zoom;

pub use capture::{StateCapture, WidgetBoard, WidgetHandle, WidgetRuntime};
pub use chart::{ChartPoint, ChartRuntime};
pub use fetch::{FetchTicket, LoadState, Transition};
pub use format::format_value;
pub use highlight::{HighlightPartition, LegendEntry};
pub use list::ListRuntime;
pub use model::{
    ChartConfig, ChartType, ColumnConfig, ColumnFormat, EntityCandidate, EntityDetail, EntityField,
    EntityResolution, FilterDefinition, FilterOption, PageEnvelope, Record, SecondarySeries,
    SortOrder, WidgetConfig, WidgetStateOverride, WidgetType,
};
pub use source::{PageQuery, StaticDataSource, WidgetDataSource};
pub use zoom::ZoomSelection;
