//! Chart widget runtime.

use tracing::{debug, warn};
use vista_core::Result;

use crate::capture::StateCapture;
use crate::fetch::{FetchTicket, Generations, LoadState};
use crate::format::{as_number, plain_text};
use crate::highlight::{self, HighlightPartition};
use crate::model::{ChartConfig, ChartType, PageEnvelope, Record, WidgetConfig, WidgetStateOverride};
use crate::source::PageQuery;
use crate::zoom::ZoomSelection;

/// One plotted row.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    /// X-axis label
    pub label: String,
    /// Primary series value; non-numeric input reads as 0
    pub value: f64,
    /// One entry per configured secondary series; `None` when absent
    pub secondary: Vec<Option<f64>>,
    pub industry: Option<String>,
}

impl ChartPoint {
    /// Coerce a raw row under a chart config.
    pub fn from_row(row: &Record, chart: &ChartConfig) -> Self {
        let label = match row.get(&chart.x_key) {
            None => String::new(),
            Some(v) if v.is_null() => String::new(),
            Some(v) => plain_text(v),
        };
        let value = row.get(&chart.y_key).and_then(as_number).unwrap_or(0.0);
        let secondary = chart
            .secondary_series
            .iter()
            .map(|s| row.get(&s.key).and_then(as_number))
            .collect();
        let industry = row
            .get("industry")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Self {
            label,
            value,
            secondary,
            industry,
        }
    }
}

/// Turn rows into plotted points; bar charts are sorted descending.
pub fn build_series(rows: &[Record], chart: &ChartConfig) -> Vec<ChartPoint> {
    let mut points: Vec<ChartPoint> = rows.iter().map(|r| ChartPoint::from_row(r, chart)).collect();
    if chart.chart_type == ChartType::Bar {
        points.sort_by(|a, b| b.value.total_cmp(&a.value));
    }
    points
}

/// Runtime for one chart widget.
#[derive(Debug, Clone)]
pub struct ChartRuntime {
    config: WidgetConfig,
    state: LoadState,
    generations: Generations,
    points: Vec<ChartPoint>,
    zoom: ZoomSelection,
    focus: Option<String>,
}

impl ChartRuntime {
    pub fn new(config: WidgetConfig) -> Self {
        Self {
            config,
            state: LoadState::Idle,
            generations: Generations::default(),
            points: Vec::new(),
            zoom: ZoomSelection::default(),
            focus: None,
        }
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn chart_config(&self) -> Option<&ChartConfig> {
        self.config.chart_config.as_ref()
    }

    pub fn chart_type(&self) -> ChartType {
        self.chart_config().map(|c| c.chart_type).unwrap_or_default()
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

    /// Label of the bar to highlight, usually the page's entity id.
    pub fn set_focus(&mut self, focus: Option<String>) {
        self.focus = focus;
    }

    pub fn focus(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    /// Whole fetched series.
    pub fn points(&self) -> &[ChartPoint] {
        &self.points
    }

    /// Series inside the current zoom window.
    pub fn visible_points(&self) -> &[ChartPoint] {
        self.zoom.slice(&self.points)
    }

    pub fn zoom(&self) -> &ZoomSelection {
        &self.zoom
    }

    /// Zoom state for line charts; bar charts do not zoom.
    pub fn zoom_mut(&mut self) -> Option<&mut ZoomSelection> {
        (self.chart_type() == ChartType::Line).then_some(&mut self.zoom)
    }

    /// Bar colors and legend for the fetched series.
    pub fn highlight(&self) -> HighlightPartition {
        let default_color = self
            .chart_config()
            .map_or("#2a4a7f", |c| c.color.as_str());
        highlight::partition(&self.points, self.focus.as_deref(), default_color)
    }

    pub fn mount(&mut self) -> FetchTicket {
        self.issue()
    }

    pub fn retry(&mut self) -> FetchTicket {
        self.issue()
    }

    fn issue(&mut self) -> FetchTicket {
        let generation = self.generations.next();
        self.state = LoadState::Loading;
        debug!(widget_id = %self.config.widget_id, generation, "issuing chart fetch");
        FetchTicket {
            widget_id: self.config.widget_id.clone(),
            generation,
            query: PageQuery::unpaged(self.config.endpoint.clone()),
        }
    }

    /// Apply a fetch result. Returns false when the response is stale.
    pub fn apply_response(&mut self, generation: u64, result: Result<PageEnvelope>) -> bool {
        if !self.generations.is_current(generation) {
            warn!(
                widget_id = %self.config.widget_id,
                generation,
                "dropping stale chart response"
            );
            return false;
        }

        match result {
            Ok(envelope) => {
                self.points = match &self.config.chart_config {
                    Some(chart) => build_series(&envelope.data, chart),
                    None => Vec::new(),
                };
                self.zoom.set_len(self.points.len());
                self.state = LoadState::Loaded;
                debug!(
                    widget_id = %self.config.widget_id,
                    points = self.points.len(),
                    "chart series applied"
                );
            }
            Err(e) => {
                warn!(widget_id = %self.config.widget_id, error = %e, "chart fetch failed");
                self.state = LoadState::Error(e.friendly_message());
            }
        }
        true
    }
}

impl StateCapture for ChartRuntime {
    fn widget_id(&self) -> &str {
        &self.config.widget_id
    }

    /// Zoom is session-only.
    fn capture_state(&self) -> WidgetStateOverride {
        WidgetStateOverride::empty(self.config.widget_id.clone())
    }
}
