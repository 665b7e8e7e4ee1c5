//! Frozen override sets for schedules.
//!
//! A snapshot is a plain copy: later edits to the widgets or to the view it
//! came from never reach a schedule that was already created.

use vista_core::{Result, VistaError};
use vista_widget::{StateCapture, WidgetBoard, WidgetConfig, WidgetStateOverride};

/// Builds the `widget_overrides` payload of a new schedule.
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// One entry: the named widget's live state.
    pub fn from_widget(board: &WidgetBoard, widget_id: &str) -> Result<Vec<WidgetStateOverride>> {
        let live = board.capture(widget_id)?;
        let config = board
            .get(widget_id)
            .map(|h| h.runtime().config())
            .ok_or_else(|| VistaError::UnknownWidget {
                widget_id: widget_id.to_string(),
            })?;
        Ok(vec![Self::with_fallback(config, Some(&live))])
    }

    /// Every widget on the page, from its live state.
    pub fn from_board(board: &WidgetBoard) -> Vec<WidgetStateOverride> {
        board
            .handles()
            .iter()
            .map(|handle| {
                let live = handle.capture_state();
                Self::with_fallback(handle.runtime().config(), Some(&live))
            })
            .collect()
    }

    /// Every widget in `configs`, from `reference` when it has an entry for
    /// the widget and from the config's initial values otherwise.
    pub fn from_reference(
        configs: &[WidgetConfig],
        reference: &[WidgetStateOverride],
    ) -> Vec<WidgetStateOverride> {
        configs
            .iter()
            .map(|config| {
                let entry = reference.iter().find(|o| o.widget_id == config.widget_id);
                Self::with_fallback(config, entry)
            })
            .collect()
    }

    /// Fill fields the captured state leaves unset from the config.
    ///
    /// Visible columns are never filled in; unset means the widget defaults.
    pub fn with_fallback(
        config: &WidgetConfig,
        live: Option<&WidgetStateOverride>,
    ) -> WidgetStateOverride {
        let server_filters = match live {
            Some(l) => l.effective_filters(),
            None => config
                .initial_filters
                .iter()
                .filter(|(_, v)| !v.is_empty())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        let sort_by = live
            .and_then(|l| l.sort_by.clone())
            .or_else(|| config.initial_sort_by.clone())
            .filter(|k| !k.is_empty());
        let sort_order = sort_by.as_ref().and(
            live.and_then(|l| l.sort_order)
                .or(config.initial_sort_order),
        );

        WidgetStateOverride {
            widget_id: config.widget_id.clone(),
            server_filters,
            sort_by,
            sort_order,
            visible_columns: live.and_then(|l| l.visible_columns.clone()),
            page_size: live
                .and_then(|l| l.page_size)
                .or(Some(config.default_page_size)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vista_widget::{ChartConfig, ChartType, ColumnConfig, SortOrder};

    fn configs() -> Vec<WidgetConfig> {
        vec![
            WidgetConfig::list("people", "/people")
                .with_column(ColumnConfig::new("name", "Name"))
                .with_column(ColumnConfig::new("comp", "Comp"))
                .with_initial_sort("name", SortOrder::Asc)
                .with_initial_filter("type", "analyst")
                .with_page_size(25),
            WidgetConfig::chart("peers", "/peers", ChartConfig::new(ChartType::Bar, "t", "v")),
        ]
    }

    #[test]
    fn test_reference_falls_back_to_defaults() {
        let reference = vec![WidgetStateOverride {
            sort_by: Some("comp".into()),
            sort_order: Some(SortOrder::Desc),
            ..WidgetStateOverride::empty("people")
        }];
        let snapshot = SnapshotBuilder::from_reference(&configs(), &reference);

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].sort_by.as_deref(), Some("comp"));
        assert_eq!(snapshot[0].sort_order, Some(SortOrder::Desc));
        // Reference entry exists, so its (empty) filters win.
        assert!(snapshot[0].server_filters.is_empty());
        assert_eq!(snapshot[0].page_size, Some(25));

        assert_eq!(snapshot[1].widget_id, "peers");
        assert_eq!(snapshot[1].page_size, Some(10));
        assert!(snapshot[1].sort_by.is_none());
    }

    #[test]
    fn test_missing_reference_uses_initial_values() {
        let snapshot = SnapshotBuilder::from_reference(&configs(), &[]);
        assert_eq!(snapshot[0].sort_by.as_deref(), Some("name"));
        assert_eq!(snapshot[0].sort_order, Some(SortOrder::Asc));
        assert_eq!(
            snapshot[0].server_filters.get("type").map(String::as_str),
            Some("analyst")
        );
        assert!(snapshot[0].visible_columns.is_none());
    }

    #[test]
    fn test_from_board_captures_live_edits() {
        let mut board = WidgetBoard::new();
        board.load(configs());
        let list = board
            .get_mut("people")
            .and_then(|h| h.runtime_mut().as_list_mut())
            .unwrap();
        list.toggle_sort("comp");
        list.toggle_column("name");

        let snapshot = SnapshotBuilder::from_board(&board);
        assert_eq!(snapshot[0].sort_by.as_deref(), Some("comp"));
        assert_eq!(snapshot[0].visible_columns, Some(vec!["comp".to_string()]));
        assert_eq!(snapshot[1].page_size, Some(10));
    }

    #[test]
    fn test_from_widget_is_single_entry() {
        let mut board = WidgetBoard::new();
        board.load(configs());
        let snapshot = SnapshotBuilder::from_widget(&board, "people").unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].page_size, Some(25));
        assert!(SnapshotBuilder::from_widget(&board, "ghost").is_err());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut board = WidgetBoard::new();
        board.load(configs());
        let snapshot = SnapshotBuilder::from_board(&board);

        board
            .get_mut("people")
            .and_then(|h| h.runtime_mut().as_list_mut())
            .unwrap()
            .toggle_sort("comp");
        assert_eq!(snapshot[0].sort_by.as_deref(), Some("name"));
    }
}
