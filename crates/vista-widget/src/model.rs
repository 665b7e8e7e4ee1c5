//! Data contracts shared by widgets, views and schedules.
//!
//! These types mirror the backend's JSON field names so they can be decoded
//! straight from responses.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One data row as delivered by a widget endpoint.
pub type Record = serde_json::Map<String, Value>;

/// Which runtime renders a widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetType {
    /// Paginated, sortable table
    #[default]
    List,
    /// Bar or line chart
    Chart,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Wire value used in query parameters.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    /// Header indicator.
    pub fn indicator(&self) -> &'static str {
        match self {
            SortOrder::Asc => "▲",
            SortOrder::Desc => "▼",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display format tag for a column or header field.
///
/// Unknown tags decode as [`ColumnFormat::Text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnFormat {
    Currency,
    Percent,
    Number,
    #[default]
    Text,
}

impl From<String> for ColumnFormat {
    fn from(tag: String) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "currency" => ColumnFormat::Currency,
            "percent" => ColumnFormat::Percent,
            "number" => ColumnFormat::Number,
            _ => ColumnFormat::Text,
        }
    }
}

impl From<ColumnFormat> for String {
    fn from(format: ColumnFormat) -> Self {
        match format {
            ColumnFormat::Currency => "currency",
            ColumnFormat::Percent => "percent",
            ColumnFormat::Number => "number",
            ColumnFormat::Text => "text",
        }
        .to_string()
    }
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> u32 {
    10
}

fn default_chart_color() -> String {
    "#2a4a7f".to_string()
}

/// Column metadata for list widgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub format: ColumnFormat,
    #[serde(default = "default_true")]
    pub sortable: bool,
    /// Whether the column shows by default
    #[serde(default = "default_true")]
    pub visible: bool,
}

impl ColumnConfig {
    /// Sortable, visible text column.
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            format: ColumnFormat::Text,
            sortable: true,
            visible: true,
        }
    }

    pub fn with_format(mut self, format: ColumnFormat) -> Self {
        self.format = format;
        self
    }

    pub fn unsortable(mut self) -> Self {
        self.sortable = false;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

/// Chart rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    #[default]
    Bar,
    Line,
}

/// An extra series drawn alongside the primary one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondarySeries {
    pub key: String,
    #[serde(default = "default_chart_color")]
    pub color: String,
    #[serde(default)]
    pub label: String,
}

/// Chart configuration for chart widgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    #[serde(default)]
    pub chart_type: ChartType,
    pub x_key: String,
    pub y_key: String,
    #[serde(default)]
    pub x_label: String,
    #[serde(default)]
    pub y_label: String,
    #[serde(default = "default_chart_color")]
    pub color: String,
    #[serde(default)]
    pub secondary_series: Vec<SecondarySeries>,
}

impl ChartConfig {
    pub fn new(chart_type: ChartType, x_key: impl Into<String>, y_key: impl Into<String>) -> Self {
        Self {
            chart_type,
            x_key: x_key.into(),
            y_key: y_key.into(),
            x_label: String::new(),
            y_label: String::new(),
            color: default_chart_color(),
            secondary_series: Vec::new(),
        }
    }

    pub fn with_secondary(
        mut self,
        key: impl Into<String>,
        color: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        self.secondary_series.push(SecondarySeries {
            key: key.into(),
            color: color.into(),
            label: label.into(),
        });
        self
    }
}

/// One selectable value of a server-side filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOption {
    pub value: String,
    pub label: String,
}

/// A server-side filter with an enumerated option set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDefinition {
    pub field: String,
    pub label: String,
    #[serde(default)]
    pub options: Vec<FilterOption>,
}

impl FilterDefinition {
    /// The option after `current` in the cycle "All → opt1 → … → All".
    ///
    /// Returns an empty string for "All".
    pub fn next_value(&self, current: Option<&str>) -> String {
        let idx = current.and_then(|c| self.options.iter().position(|o| o.value == c));
        match idx {
            None => self.options.first().map(|o| o.value.clone()).unwrap_or_default(),
            Some(i) => self
                .options
                .get(i + 1)
                .map(|o| o.value.clone())
                .unwrap_or_default(),
        }
    }
}

/// Typed description of one widget and its initial runtime parameters.
///
/// The initial parameters are either the widget's defaults or, when a view is
/// active, that view's stored override already merged in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetConfig {
    pub widget_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub widget_type: WidgetType,
    pub endpoint: String,
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default)]
    pub chart_config: Option<ChartConfig>,
    #[serde(default)]
    pub filter_definitions: Vec<FilterDefinition>,
    #[serde(default)]
    pub client_filterable_columns: Vec<String>,
    #[serde(default)]
    pub initial_filters: BTreeMap<String, String>,
    #[serde(default)]
    pub initial_sort_by: Option<String>,
    #[serde(default)]
    pub initial_sort_order: Option<SortOrder>,
    /// Set when a view override changed the initial parameters
    #[serde(default)]
    pub has_overrides: bool,
}

impl WidgetConfig {
    /// A list widget with no columns yet.
    pub fn list(widget_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            widget_id: widget_id.into(),
            title: String::new(),
            widget_type: WidgetType::List,
            endpoint: endpoint.into(),
            columns: Vec::new(),
            default_page_size: default_page_size(),
            chart_config: None,
            filter_definitions: Vec::new(),
            client_filterable_columns: Vec::new(),
            initial_filters: BTreeMap::new(),
            initial_sort_by: None,
            initial_sort_order: None,
            has_overrides: false,
        }
    }

    /// A chart widget.
    pub fn chart(
        widget_id: impl Into<String>,
        endpoint: impl Into<String>,
        chart_config: ChartConfig,
    ) -> Self {
        Self {
            widget_type: WidgetType::Chart,
            chart_config: Some(chart_config),
            ..Self::list(widget_id, endpoint)
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_column(mut self, column: ColumnConfig) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.default_page_size = page_size;
        self
    }

    pub fn with_filter(mut self, filter: FilterDefinition) -> Self {
        self.filter_definitions.push(filter);
        self
    }

    pub fn with_client_filterable(mut self, keys: &[&str]) -> Self {
        self.client_filterable_columns = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_initial_sort(mut self, key: impl Into<String>, order: SortOrder) -> Self {
        self.initial_sort_by = Some(key.into());
        self.initial_sort_order = Some(order);
        self
    }

    pub fn with_initial_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.initial_filters.insert(field.into(), value.into());
        self
    }

    /// Look up a column by key.
    pub fn column(&self, key: &str) -> Option<&ColumnConfig> {
        self.columns.iter().find(|c| c.key == key)
    }

    /// Keys of the columns visible by default, in column order.
    pub fn default_visible_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.visible)
            .map(|c| c.key.clone())
            .collect()
    }
}

/// Portable snapshot of one widget's effective runtime parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WidgetStateOverride {
    pub widget_id: String,
    /// Only entries with non-empty values are meaningful
    #[serde(default)]
    pub server_filters: BTreeMap<String, String>,
    #[serde(default)]
    pub sort_by: Option<String>,
    /// Meaningful only when `sort_by` is set
    #[serde(default)]
    pub sort_order: Option<SortOrder>,
    /// `None` means "use the config defaults"
    #[serde(default)]
    pub visible_columns: Option<Vec<String>>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl WidgetStateOverride {
    /// An override that changes nothing.
    pub fn empty(widget_id: impl Into<String>) -> Self {
        Self {
            widget_id: widget_id.into(),
            ..Default::default()
        }
    }

    /// True when applying this override would leave a config untouched.
    pub fn is_empty(&self) -> bool {
        self.server_filters.values().all(|v| v.is_empty())
            && self.sort_by.is_none()
            && self.sort_order.is_none()
            && self.visible_columns.is_none()
            && self.page_size.is_none()
    }

    /// Server filters with empty values dropped.
    pub fn effective_filters(&self) -> BTreeMap<String, String> {
        self.server_filters
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Page of rows returned by a widget endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageEnvelope {
    #[serde(default)]
    pub data: Vec<Record>,
    #[serde(default = "one")]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub total_records: u64,
    #[serde(default = "one")]
    pub total_pages: u32,
    #[serde(default)]
    pub has_next: bool,
    #[serde(default)]
    pub has_previous: bool,
}

fn one() -> u32 {
    1
}

/// Labeled value shown in the entity header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityField {
    pub label: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub format: ColumnFormat,
}

/// Entity page payload: header fields plus merged widget configs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDetail {
    pub entity_type: String,
    pub entity_id: String,
    pub display_name: String,
    #[serde(default)]
    pub header_fields: Vec<EntityField>,
    #[serde(default)]
    pub widgets: Vec<WidgetConfig>,
    #[serde(default)]
    pub active_view_id: Option<String>,
    #[serde(default)]
    pub active_view_name: Option<String>,
}

/// A candidate returned by the entity search collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCandidate {
    pub entity_type: String,
    pub entity_id: String,
    pub display_name: String,
}

/// Result of an entity search.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityResolution {
    pub resolved: bool,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub candidates: Vec<EntityCandidate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_widget_config_decodes_with_defaults() {
        let config: WidgetConfig = serde_json::from_value(json!({
            "widget_id": "related_people",
            "title": "Related People",
            "endpoint": "/api/entities/stock/AAPL/people",
            "columns": [
                {"key": "name", "label": "Name"},
                {"key": "price", "label": "Price", "format": "currency", "sortable": false}
            ]
        }))
        .unwrap();

        assert_eq!(config.widget_type, WidgetType::List);
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.columns[0].format, ColumnFormat::Text);
        assert!(config.columns[0].visible);
        assert_eq!(config.columns[1].format, ColumnFormat::Currency);
        assert!(!config.columns[1].sortable);
        assert!(config.initial_sort_by.is_none());
    }

    #[test]
    fn test_unknown_format_tag_is_text() {
        let column: ColumnConfig =
            serde_json::from_value(json!({"key": "d", "label": "Date", "format": "date"})).unwrap();
        assert_eq!(column.format, ColumnFormat::Text);
    }

    #[test]
    fn test_chart_config_decodes() {
        let config: WidgetConfig = serde_json::from_value(json!({
            "widget_id": "price_history",
            "endpoint": "/api/entities/stock/AAPL/history",
            "widget_type": "chart",
            "chart_config": {
                "chart_type": "line",
                "x_key": "date",
                "y_key": "close",
                "secondary_series": [{"key": "eps", "color": "#38a169", "label": "EPS"}]
            }
        }))
        .unwrap();

        let chart = config.chart_config.unwrap();
        assert_eq!(chart.chart_type, ChartType::Line);
        assert_eq!(chart.color, "#2a4a7f");
        assert_eq!(chart.secondary_series[0].key, "eps");
    }

    #[test]
    fn test_override_serializes_nulls() {
        let value = serde_json::to_value(WidgetStateOverride::empty("w1")).unwrap();
        assert_eq!(value["sort_by"], Value::Null);
        assert_eq!(value["visible_columns"], Value::Null);
        assert_eq!(value["server_filters"], json!({}));
    }

    #[test]
    fn test_override_is_empty_ignores_blank_filters() {
        let mut ov = WidgetStateOverride::empty("w1");
        ov.server_filters.insert("type".into(), String::new());
        assert!(ov.is_empty());
        assert!(ov.effective_filters().is_empty());

        ov.server_filters.insert("sector".into(), "Tech".into());
        assert!(!ov.is_empty());
        assert_eq!(ov.effective_filters().len(), 1);
    }

    #[test]
    fn test_filter_definition_cycles_through_all() {
        let def = FilterDefinition {
            field: "type".into(),
            label: "Type".into(),
            options: vec![
                FilterOption { value: "executive".into(), label: "Executive".into() },
                FilterOption { value: "analyst".into(), label: "Analyst".into() },
            ],
        };
        assert_eq!(def.next_value(None), "executive");
        assert_eq!(def.next_value(Some("executive")), "analyst");
        assert_eq!(def.next_value(Some("analyst")), "");
    }

    #[test]
    fn test_default_visible_columns() {
        let config = WidgetConfig::list("w", "/e")
            .with_column(ColumnConfig::new("a", "A"))
            .with_column(ColumnConfig::new("b", "B").hidden())
            .with_column(ColumnConfig::new("c", "C"));
        assert_eq!(config.default_visible_columns(), vec!["a", "c"]);
    }
}
