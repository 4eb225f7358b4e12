use serde::Serialize;
use serde_json::{json, Value};

use crate::MoodLevel;

/// Marker colors indexed by mood level minus one.
pub const MOOD_COLORS: [&str; 5] = ["#ff4444", "#ff8800", "#4488ff", "#88ff88", "#1b5e20"];
/// Marker glyphs indexed the same way as [`MOOD_COLORS`].
pub const MOOD_GLYPHS: [&str; 5] = ["😡", "😞", "😐", "🙂", "😃"];
/// Fill used by the heat layer for features whose level matches no entry.
pub const FALLBACK_COLOR: &str = "#888";

/// Visual appearance of a single marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarkerStyle {
    pub color: &'static str,
    pub glyph: &'static str,
    pub size_px: u32,
    pub kind: MarkerKind,
}

/// Whether a marker stands for an event or for the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Mood,
    User,
}

impl MarkerKind {
    /// CSS class the marker element carries.
    pub fn class_name(self) -> &'static str {
        match self {
            MarkerKind::Mood => "mood-marker",
            MarkerKind::User => "user-marker",
        }
    }
}

/// Style of the marker placed for an event of the given level.
pub fn mood_style(level: MoodLevel) -> MarkerStyle {
    MarkerStyle {
        color: MOOD_COLORS[level.index()],
        glyph: MOOD_GLYPHS[level.index()],
        size_px: 40,
        kind: MarkerKind::Mood,
    }
}

/// Style of the marker placed at the viewer's own position.
pub fn user_style() -> MarkerStyle {
    MarkerStyle {
        color: "#007AFF",
        glyph: "📍",
        size_px: 30,
        kind: MarkerKind::User,
    }
}

/// Paint parameters of the circle layer that renders the heatmap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatLayerStyle {
    /// `(zoom, radius_px)` stops interpolated linearly.
    pub radius_stops: [(f64, f64); 2],
    pub opacity: f64,
    pub blur: f64,
}

impl Default for HeatLayerStyle {
    fn default() -> Self {
        Self {
            radius_stops: [(10.0, 20.0), (14.0, 60.0)],
            opacity: 0.35,
            blur: 0.6,
        }
    }
}

impl HeatLayerStyle {
    /// Paint block in mapbox style-expression form. Both backends embed this
    /// exact value.
    pub fn paint(&self) -> Value {
        let [(z0, r0), (z1, r1)] = self.radius_stops;
        let mut color = vec![json!("match"), json!(["get", "mood"])];
        for level in MoodLevel::all() {
            color.push(json!(level.get()));
            color.push(json!(mood_style(level).color));
        }
        color.push(json!(FALLBACK_COLOR));

        json!({
            "circle-radius": ["interpolate", ["linear"], ["zoom"], z0, r0, z1, r1],
            "circle-color": color,
            "circle-opacity": self.opacity,
            "circle-blur": self.blur,
        })
    }
}
