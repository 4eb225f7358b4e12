use serde::{Deserialize, Serialize};

use crate::{MapError, Result};

/// Mood score in the closed range 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct MoodLevel(u8);

impl MoodLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Raw score, always within `MIN..=MAX`.
    pub fn get(self) -> u8 {
        self.0
    }

    /// Zero-based position in the style tables.
    pub(crate) fn index(self) -> usize {
        usize::from(self.0 - Self::MIN)
    }

    /// Every level from lowest to highest.
    pub fn all() -> impl Iterator<Item = MoodLevel> {
        (Self::MIN..=Self::MAX).map(MoodLevel)
    }
}

impl TryFrom<u8> for MoodLevel {
    type Error = MapError;

    fn try_from(value: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(MapError::InvalidInput("mood level must be between 1 and 5"))
        }
    }
}

impl From<MoodLevel> for u8 {
    fn from(level: MoodLevel) -> Self {
        level.0
    }
}

/// Geographic position in the canonical longitude-first order used by every
/// camera and geometry call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lng: f64,
    pub lat: f64,
}

impl Coordinate {
    /// Builds a coordinate from longitude first, then latitude.
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// `false` when either axis is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.lng.is_finite() && self.lat.is_finite()
    }

    /// `[lng, lat]`, the array form mapping libraries expect.
    pub fn to_array(self) -> [f64; 2] {
        [self.lng, self.lat]
    }
}

/// Latitude-first position as reported by geolocation services.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<GeoPosition> for Coordinate {
    fn from(position: GeoPosition) -> Self {
        Coordinate::new(position.longitude, position.latitude)
    }
}

/// One submitted mood pin. Field names on the wire follow the mood API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodEvent {
    #[serde(rename = "mood")]
    pub level: MoodLevel,
    #[serde(rename = "coords")]
    pub coordinate: Coordinate,
    #[serde(rename = "ip", default, skip_serializing_if = "Option::is_none")]
    pub origin_tag: Option<String>,
    #[serde(rename = "timestamp", default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<String>,
}

impl MoodEvent {
    /// Event without origin tag or timestamp.
    pub fn new(level: MoodLevel, coordinate: Coordinate) -> Self {
        Self {
            level,
            coordinate,
            origin_tag: None,
            recorded_at: None,
        }
    }
}

/// How events are drawn: one marker each, or a shared heat layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationMode {
    #[default]
    Markers,
    Heatmap,
}

impl VisualizationMode {
    /// Maps the host's heatmap toggle onto a mode.
    pub fn from_heatmap_flag(enabled: bool) -> Self {
        if enabled {
            Self::Heatmap
        } else {
            Self::Markers
        }
    }

    pub fn is_heatmap(self) -> bool {
        self == Self::Heatmap
    }
}

/// A single camera transition request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraCommand {
    pub target: Coordinate,
    pub zoom: f64,
    pub duration_ms: u64,
}

/// External state the surrounding application hands to the map on every
/// change.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapInputs {
    pub events: Vec<MoodEvent>,
    pub user_location: Option<Coordinate>,
    pub camera_center: Coordinate,
    pub access_token: String,
    pub mode: VisualizationMode,
}

impl Default for Coordinate {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl MapInputs {
    /// `true` when anything that feeds marker or heat geometry differs.
    pub(crate) fn data_differs(&self, other: &MapInputs) -> bool {
        self.events != other.events || self.user_location != other.user_location
    }
}

/// Properties carried by every heat feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureProperties {
    pub mood: MoodLevel,
}

/// GeoJSON geometry. Only points are ever produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    pub properties: FeatureProperties,
    pub geometry: Geometry,
}

impl From<&MoodEvent> for Feature {
    fn from(event: &MoodEvent) -> Self {
        Self {
            properties: FeatureProperties { mood: event.level },
            geometry: Geometry::Point {
                coordinates: event.coordinate.to_array(),
            },
        }
    }
}

/// GeoJSON payload of the heat source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// One point feature per event, in event order.
    pub fn from_events(events: &[MoodEvent]) -> Self {
        Self {
            features: events.iter().map(Feature::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_levels() {
        assert!(MoodLevel::try_from(0).is_err());
        assert!(MoodLevel::try_from(6).is_err());
        assert_eq!(MoodLevel::try_from(5).unwrap().get(), 5);
    }

    #[test]
    fn parses_api_wire_form() {
        let raw = r#"[{"mood": 4, "coords": {"lat": 55.7, "lng": 37.6}, "ip": "10.0.0.1"},
                      {"mood": 2, "coords": {"lat": 1.0, "lng": 2.0}}]"#;
        let events: Vec<MoodEvent> = serde_json::from_str(raw).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].level.get(), 4);
        assert_eq!(events[0].coordinate, Coordinate::new(37.6, 55.7));
        assert_eq!(events[0].origin_tag.as_deref(), Some("10.0.0.1"));
        assert!(events[1].recorded_at.is_none());
    }

    #[test]
    fn wire_level_out_of_range_is_rejected() {
        let raw = r#"{"mood": 9, "coords": {"lat": 0.0, "lng": 0.0}}"#;
        assert!(serde_json::from_str::<MoodEvent>(raw).is_err());
    }

    #[test]
    fn geo_position_swaps_to_lng_first() {
        let coordinate = Coordinate::from(GeoPosition {
            latitude: 10.0,
            longitude: 20.0,
        });
        assert_eq!(coordinate.to_array(), [20.0, 10.0]);
    }

    #[test]
    fn feature_collection_serializes_as_geojson() {
        let events = vec![MoodEvent::new(
            MoodLevel::try_from(3).unwrap(),
            Coordinate::new(1.5, -2.5),
        )];
        let value = serde_json::to_value(FeatureCollection::from_events(&events)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "properties": {"mood": 3},
                    "geometry": {"type": "Point", "coordinates": [1.5, -2.5]}
                }]
            })
        );
    }
}
