//! Layering of widget parameters.
//!
//! Effective parameters resolve in order: server defaults, then the active
//! view's stored override, then live edits held by the runtimes. The backend
//! normally performs the first merge; [`apply_view`] reproduces it for
//! in-memory entity sources and for checking that a captured override
//! round-trips.

use std::collections::BTreeMap;

use crate::model::{WidgetConfig, WidgetStateOverride, WidgetType};

/// Merge one override into a config.
///
/// Optional fields are only touched when the override sets them. A list
/// widget's server filters are replaced wholesale, so a view that cleared a
/// default filter keeps it cleared. `has_overrides` is raised when filters or
/// sort change the initial state.
pub fn apply_override(config: &WidgetConfig, ov: &WidgetStateOverride) -> WidgetConfig {
    let mut merged = config.clone();

    if let Some(visible) = &ov.visible_columns {
        for column in &mut merged.columns {
            column.visible = visible.contains(&column.key);
        }
    }
    if let Some(page_size) = ov.page_size {
        merged.default_page_size = page_size;
    }
    if config.widget_type == WidgetType::List {
        let filters = ov.effective_filters();
        if filters != defaults_for(config).server_filters {
            merged.has_overrides = true;
        }
        merged.initial_filters = filters;
    }
    if let Some(sort_by) = &ov.sort_by {
        merged.initial_sort_by = Some(sort_by.clone());
        merged.has_overrides = true;
    }
    if let Some(order) = ov.sort_order {
        merged.initial_sort_order = Some(order);
        merged.has_overrides = true;
    }
    merged
}

/// Merge a view's overrides into every matching widget config.
///
/// Overrides for widget ids not present are ignored.
pub fn apply_view(configs: &[WidgetConfig], overrides: &[WidgetStateOverride]) -> Vec<WidgetConfig> {
    configs
        .iter()
        .map(|config| {
            match overrides.iter().find(|o| o.widget_id == config.widget_id) {
                Some(ov) => apply_override(config, ov),
                None => config.clone(),
            }
        })
        .collect()
}

/// The override a widget would capture straight after mounting.
///
/// Sort order is only carried when a sort key is set.
pub fn defaults_for(config: &WidgetConfig) -> WidgetStateOverride {
    let sort_by = config.initial_sort_by.clone().filter(|k| !k.is_empty());
    let sort_order = sort_by.as_ref().and(config.initial_sort_order);
    let server_filters: BTreeMap<String, String> = config
        .initial_filters
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    WidgetStateOverride {
        widget_id: config.widget_id.clone(),
        server_filters,
        sort_by,
        sort_order,
        visible_columns: None,
        page_size: Some(config.default_page_size),
    }
}
