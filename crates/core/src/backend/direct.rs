use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::{
    style::{HeatLayerStyle, MarkerStyle},
    CameraCommand, Coordinate, FeatureCollection, MapConfig, MapError, Result,
};

use super::{EngineHandle, MarkerHandle};

/// Synchronous binding to a mapping library living in the same process.
pub trait MapEngine: Send {
    fn resource_loaded(&self, resource: &Resource) -> bool;
    fn load_resource(&mut self, resource: &Resource) -> Result<()>;
    fn create_map(&mut self, options: &MapOptions) -> Result<EngineHandle>;
    /// `false` until the map style finished loading.
    fn style_loaded(&self) -> bool;

    fn add_marker(&mut self, at: Coordinate, style: &MarkerStyle) -> MarkerHandle;
    fn remove_marker(&mut self, marker: MarkerHandle);

    fn has_source(&self, id: &str) -> bool;
    fn add_source(&mut self, id: &str, data: &FeatureCollection);
    fn set_source_data(&mut self, id: &str, data: &FeatureCollection);
    fn remove_source(&mut self, id: &str);

    fn has_layer(&self, id: &str) -> bool;
    fn add_layer(&mut self, layer: &CircleLayer);
    fn set_layer_visibility(&mut self, id: &str, visible: bool);
    /// Layers must be removed before the source they draw from.
    fn remove_layer(&mut self, id: &str);

    fn fly_to(&mut self, camera: &CameraCommand);
    /// Destroys the map instance and everything placed on it.
    fn remove(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Stylesheet,
    Script,
}

/// A page-level asset the mapping library needs before a map can be built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub id: String,
    pub url: String,
    pub kind: ResourceKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapOptions {
    pub access_token: String,
    pub style_url: String,
    pub center: Coordinate,
    pub zoom: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircleLayer {
    pub id: String,
    pub source: String,
    pub paint: Value,
}

/// Adapter over a [`MapEngine`] the controller can call into directly.
pub struct DirectBackend {
    engine: Box<dyn MapEngine>,
    config: MapConfig,
    heat_style: HeatLayerStyle,
    /// Set only for maps this adapter created and therefore has to remove.
    map: Option<EngineHandle>,
}

impl DirectBackend {
    /// Wraps `engine` without creating a map. Used as-is, the adapter drives
    /// a map built by someone else (such as the script inside a sandbox
    /// document) and teardown leaves that map alone.
    pub fn new(engine: Box<dyn MapEngine>, config: MapConfig) -> Self {
        Self {
            engine,
            config,
            heat_style: HeatLayerStyle::default(),
            map: None,
        }
    }

    /// Loads the library resources (once per page) and creates the map.
    pub fn initialize(
        &mut self,
        access_token: &str,
        center: Coordinate,
        zoom: f64,
    ) -> Result<EngineHandle> {
        if !self.config.token_is_usable(access_token) {
            return Err(MapError::init("access token is missing or a placeholder"));
        }
        if let Some(handle) = self.map {
            return Ok(handle);
        }

        for resource in self.resources() {
            if self.engine.resource_loaded(&resource) {
                continue;
            }
            self.engine.load_resource(&resource).map_err(|err| {
                MapError::init(format!("failed to load {}: {err}", resource.url))
            })?;
        }

        let options = MapOptions {
            access_token: access_token.trim().to_string(),
            style_url: self.config.style_url.clone(),
            center,
            zoom,
        };
        let handle = self.engine.create_map(&options)?;
        tracing::info!(map = handle.0, "direct map created");
        self.map = Some(handle);
        Ok(handle)
    }

    fn resources(&self) -> [Resource; 2] {
        [
            Resource {
                id: "mapbox-gl-css".to_string(),
                url: self.config.stylesheet_url(),
                kind: ResourceKind::Stylesheet,
            },
            Resource {
                id: "mapbox-gl-js".to_string(),
                url: self.config.script_url(),
                kind: ResourceKind::Script,
            },
        ]
    }

    /// `true` once the map style has loaded and layers can be added.
    pub fn is_ready(&self) -> bool {
        self.engine.style_loaded()
    }

    /// `true` when this adapter created the map and removes it on teardown.
    pub fn owns_map(&self) -> bool {
        self.map.is_some()
    }

    /// Places one marker and returns the handle needed to remove it.
    pub fn place_marker(&mut self, at: Coordinate, style: &MarkerStyle) -> MarkerHandle {
        self.engine.add_marker(at, style)
    }

    /// Removes a marker placed with [`DirectBackend::place_marker`].
    pub fn remove_marker(&mut self, marker: MarkerHandle) {
        self.engine.remove_marker(marker);
    }

    /// Creates the source on first use and replaces its data afterwards.
    pub fn upsert_geometry_source(&mut self, id: &str, features: &FeatureCollection) {
        if self.engine.has_source(id) {
            self.engine.set_source_data(id, features);
        } else {
            self.engine.add_source(id, features);
        }
    }

    /// Shows or hides a layer. Showing a layer that does not exist yet builds
    /// it as the heat circle layer over the configured source; hiding a
    /// missing layer does nothing.
    pub fn set_layer_visibility(&mut self, layer_id: &str, visible: bool) {
        if self.engine.has_layer(layer_id) {
            self.engine.set_layer_visibility(layer_id, visible);
        } else if visible {
            self.engine.add_layer(&CircleLayer {
                id: layer_id.to_string(),
                source: self.config.source_id.clone(),
                paint: self.heat_style.paint(),
            });
        }
    }

    pub fn has_layer(&self, layer_id: &str) -> bool {
        self.engine.has_layer(layer_id)
    }

    /// Removes the heat layer and its source if they exist.
    pub fn remove_heat_layer(&mut self) {
        if self.engine.has_layer(&self.config.heat_layer_id) {
            self.engine.remove_layer(&self.config.heat_layer_id);
        }
        if self.engine.has_source(&self.config.source_id) {
            self.engine.remove_source(&self.config.source_id);
        }
    }

    /// Starts a camera transition; a newer one supersedes it.
    pub fn fly_to(&mut self, camera: &CameraCommand) {
        self.engine.fly_to(camera);
    }

    /// Releases the map. Calling it again is a no-op.
    pub fn teardown(&mut self) {
        if let Some(handle) = self.map.take() {
            self.engine.remove();
            tracing::info!(map = handle.0, "direct map removed");
        }
    }
}

impl fmt::Debug for DirectBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectBackend")
            .field("map", &self.map)
            .finish()
    }
}
