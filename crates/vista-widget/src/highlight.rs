//! Industry-aware bar coloring.
//!
//! When rows carry an `industry` and a focus label is given, the focused bar
//! and its industry peers are drawn in the highlight color and every other
//! industry gets a palette color. Otherwise bars use the configured color.

use crate::chart::ChartPoint;

pub const HIGHLIGHT_COLOR: &str = "#e86319";
pub const FOCUSED_OPACITY: f32 = 1.0;
pub const SAME_INDUSTRY_OPACITY: f32 = 0.55;
pub const OTHER_INDUSTRY_OPACITY: f32 = 0.45;
pub const DEFAULT_OPACITY: f32 = 0.8;

/// Colors handed out to non-focused industries, in order of first appearance.
pub const INDUSTRY_PALETTE: [&str; 10] = [
    "#3182ce", "#38a169", "#805ad5", "#d53f8c", "#dd6b20", "#319795", "#975a16", "#2b6cb0",
    "#e53e3e", "#718096",
];

/// Fill of one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct BarStyle {
    pub color: String,
    pub opacity: f32,
}

impl BarStyle {
    fn new(color: &str, opacity: f32) -> Self {
        Self {
            color: color.to_string(),
            opacity,
        }
    }
}

/// One legend row.
#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub industry: String,
    pub color: String,
    pub opacity: f32,
    /// The focused entity's industry
    pub highlighted: bool,
}

/// Per-bar styles (parallel to the input points) plus the legend.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HighlightPartition {
    pub bars: Vec<BarStyle>,
    pub legend: Vec<LegendEntry>,
}

/// Assign bar colors for `points` in their display order.
pub fn partition(points: &[ChartPoint], focus: Option<&str>, default_color: &str) -> HighlightPartition {
    let industry_of = |p: &ChartPoint| p.industry.clone().unwrap_or_default();
    let has_industry = points.iter().any(|p| !industry_of(p).is_empty());

    let focus = match focus {
        Some(f) if has_industry => f,
        _ => {
            let bars = points
                .iter()
                .map(|p| {
                    if focus.is_some_and(|f| f == p.label) {
                        BarStyle::new(HIGHLIGHT_COLOR, FOCUSED_OPACITY)
                    } else {
                        BarStyle::new(default_color, DEFAULT_OPACITY)
                    }
                })
                .collect();
            return HighlightPartition {
                bars,
                legend: Vec::new(),
            };
        }
    };

    let focused_industry = points
        .iter()
        .find(|p| p.label == focus)
        .map(industry_of)
        .unwrap_or_default();

    // First-appearance order. The focused industry and rows without one
    // take no palette slot.
    let mut assigned: Vec<(String, &str)> = Vec::new();
    let mut palette_idx = 0;
    for point in points {
        let industry = industry_of(point);
        if industry.is_empty() || assigned.iter().any(|(i, _)| *i == industry) {
            continue;
        }
        let color = if !focused_industry.is_empty() && industry == focused_industry {
            HIGHLIGHT_COLOR
        } else {
            let c = INDUSTRY_PALETTE[palette_idx % INDUSTRY_PALETTE.len()];
            palette_idx += 1;
            c
        };
        assigned.push((industry, color));
    }
    let color_of = |industry: &str| {
        assigned
            .iter()
            .find(|(i, _)| i == industry)
            .map_or(default_color, |(_, c)| *c)
    };

    let bars = points
        .iter()
        .map(|p| {
            let industry = industry_of(p);
            if p.label == focus {
                BarStyle::new(HIGHLIGHT_COLOR, FOCUSED_OPACITY)
            } else if !focused_industry.is_empty() && industry == focused_industry {
                BarStyle::new(HIGHLIGHT_COLOR, SAME_INDUSTRY_OPACITY)
            } else {
                BarStyle::new(color_of(&industry), OTHER_INDUSTRY_OPACITY)
            }
        })
        .collect();

    let legend = assigned
        .iter()
        .map(|(industry, color)| {
            let highlighted = *industry == focused_industry;
            LegendEntry {
                industry: industry.clone(),
                color: color.to_string(),
                opacity: if highlighted {
                    SAME_INDUSTRY_OPACITY
                } else {
                    OTHER_INDUSTRY_OPACITY
                },
                highlighted,
            }
        })
        .collect();

    HighlightPartition { bars, legend }
}
