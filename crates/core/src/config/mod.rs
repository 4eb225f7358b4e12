use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Coordinate, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub map: MapConfig,
}

impl AppConfig {
    /// Loads a configuration file. Fields the file leaves out keep their
    /// defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }
}

/// Configuration specific to the map bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub library_version: String,
    pub style_url: String,
    pub initial_zoom: f64,
    /// Camera center used until the application supplies its own.
    pub default_center: Coordinate,
    /// Camera used by the imperative `center_on` command.
    pub focus: CameraConfig,
    /// Camera transition issued after data or center changes.
    pub follow: CameraConfig,
    /// Token values that count as "no token configured".
    pub placeholder_tokens: Vec<String>,
    pub source_id: String,
    pub heat_layer_id: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            library_version: "2.15.0".to_string(),
            style_url: "mapbox://styles/mapbox/streets-v12".to_string(),
            initial_zoom: 12.0,
            default_center: Coordinate::new(76.899425, 43.239221),
            focus: CameraConfig {
                zoom: 12.0,
                duration_ms: 800,
            },
            follow: CameraConfig {
                zoom: 12.0,
                duration_ms: 1000,
            },
            placeholder_tokens: vec!["YOUR_MAPBOX_ACCESS_TOKEN".to_string()],
            source_id: "moods-source".to_string(),
            heat_layer_id: "moods-heat-circles".to_string(),
        }
    }
}

impl MapConfig {
    /// CDN location of the library script for `library_version`.
    pub fn script_url(&self) -> String {
        format!(
            "https://api.mapbox.com/mapbox-gl-js/v{}/mapbox-gl.js",
            self.library_version
        )
    }

    /// CDN location of the matching stylesheet.
    pub fn stylesheet_url(&self) -> String {
        format!(
            "https://api.mapbox.com/mapbox-gl-js/v{}/mapbox-gl.css",
            self.library_version
        )
    }

    /// Returns `true` when `token` can be handed to a mapping backend.
    pub fn token_is_usable(&self, token: &str) -> bool {
        let token = token.trim();
        !token.is_empty() && !self.placeholder_tokens.iter().any(|p| p == token)
    }
}

/// Zoom and animation length of one kind of camera transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub zoom: f64,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_and_blank_tokens_are_unusable() {
        let config = MapConfig::default();
        assert!(!config.token_is_usable(""));
        assert!(!config.token_is_usable("   "));
        assert!(!config.token_is_usable("YOUR_MAPBOX_ACCESS_TOKEN"));
        assert!(config.token_is_usable("pk.live"));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"map": {"library_version": "3.0.0"}}"#).unwrap();
        assert_eq!(config.map.library_version, "3.0.0");
        assert_eq!(config.map.focus.duration_ms, 800);
        assert!(config.map.script_url().contains("v3.0.0/mapbox-gl.js"));
    }
}
