//! Colors for the Vista TUI.
//!
//! Widget colors arrive from the backend as CSS hex strings with a separate
//! opacity. Terminals have no alpha channel, so translucent fills are blended
//! against the background up front.

use ratatui::style::Color;

/// Background the translucent chart fills are blended against.
pub const CANVAS: (u8, u8, u8) = (16, 16, 20);

/// Color palette for the page chrome.
#[derive(Debug, Clone)]
pub struct ThemeColors {
    /// Entity header and focused borders
    pub header: Color,
    /// Hotkey hints
    pub hotkey: Color,
    pub text: Color,
    /// Secondary text (footers, labels)
    pub text_dim: Color,
    /// Unfocused borders
    pub border_dim: Color,
    /// Focused widget border
    pub focus_highlight: Color,
    /// Unsaved-changes marker
    pub dirty: Color,
    /// Affordance that cannot be used right now
    pub disabled: Color,
    pub loading: Color,
    pub error: Color,
    /// Zoom selection band
    pub selection: Color,
}

/// Complete theme definition.
#[derive(Debug, Clone)]
pub struct Theme {
    pub colors: ThemeColors,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            colors: ThemeColors {
                header: Color::Cyan,
                hotkey: Color::Yellow,
                text: Color::White,
                text_dim: Color::Gray,
                border_dim: Color::DarkGray,
                focus_highlight: Color::LightCyan,
                dirty: Color::Rgb(232, 99, 25),
                disabled: Color::Rgb(80, 80, 80),
                loading: Color::Yellow,
                error: Color::Red,
                selection: Color::Rgb(60, 70, 110),
            },
        }
    }
}

/// Parse `#rrggbb` or `#rgb`.
pub fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.trim().strip_prefix('#').filter(|d| d.is_ascii())?;
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match digits.len() {
        6 => Some((
            channel(&digits[0..2])?,
            channel(&digits[2..4])?,
            channel(&digits[4..6])?,
        )),
        3 => {
            let expand = |i: usize| channel(&digits[i..=i]).map(|v| v * 17);
            Some((expand(0)?, expand(1)?, expand(2)?))
        }
        _ => None,
    }
}

/// Blend `hex` at `opacity` over `background`.
///
/// Unparseable colors fall back to plain gray.
pub fn blend(hex: &str, opacity: f32, background: (u8, u8, u8)) -> Color {
    let Some((r, g, b)) = parse_hex(hex) else {
        return Color::Gray;
    };
    let alpha = opacity.clamp(0.0, 1.0);
    let mix = |fg: u8, bg: u8| -> u8 {
        (f32::from(fg) * alpha + f32::from(bg) * (1.0 - alpha)).round() as u8
    };
    Color::Rgb(mix(r, background.0), mix(g, background.1), mix(b, background.2))
}

/// A hex color as-is.
pub fn solid(hex: &str) -> Color {
    blend(hex, 1.0, CANVAS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("#e86319"), Some((232, 99, 25)));
        assert_eq!(parse_hex("#fff"), Some((255, 255, 255)));
        assert_eq!(parse_hex("e86319"), None);
        assert_eq!(parse_hex("#zzzzzz"), None);
    }

    #[test]
    fn test_blend_extremes() {
        assert_eq!(blend("#e86319", 1.0, CANVAS), Color::Rgb(232, 99, 25));
        assert_eq!(blend("#e86319", 0.0, (0, 0, 0)), Color::Rgb(0, 0, 0));
        assert_eq!(blend("#ffffff", 0.5, (0, 0, 0)), Color::Rgb(128, 128, 128));
    }

    #[test]
    fn test_lower_opacity_is_darker_on_dark_canvas() {
        let Color::Rgb(same, ..) = blend("#e86319", 0.55, CANVAS) else {
            panic!("expected rgb");
        };
        let Color::Rgb(other, ..) = blend("#e86319", 0.45, CANVAS) else {
            panic!("expected rgb");
        };
        assert!(same > other);
    }

    #[test]
    fn test_bad_hex_falls_back() {
        assert_eq!(solid("not a color"), Color::Gray);
    }
}
