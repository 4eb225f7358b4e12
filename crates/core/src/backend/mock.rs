//! In-memory engine, script host and platform for headless runs.
//!
//! Every mock is a cheap handle over shared state, so a test can keep one
//! clone for inspection while the controller owns the boxed other.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;

use crate::{
    host::{HostCapabilities, HostPlatform},
    style::MarkerStyle,
    CameraCommand, Coordinate, FeatureCollection, MapError, Result,
};

use super::{CircleLayer, EngineHandle, MapEngine, MapOptions, MarkerHandle, Resource, ScriptHost};

/// One call observed by a [`MockEngine`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EngineCall {
    LoadResource { url: String },
    CreateMap { token: String, center: Coordinate, zoom: f64 },
    AddMarker { marker: MarkerHandle, at: Coordinate, color: &'static str, glyph: &'static str },
    RemoveMarker { marker: MarkerHandle },
    AddSource { id: String, features: usize },
    SetSourceData { id: String, features: usize },
    RemoveSource { id: String },
    AddLayer { id: String },
    SetLayerVisibility { id: String, visible: bool },
    RemoveLayer { id: String },
    FlyTo { camera: CameraCommand },
    Remove,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedMarker {
    pub handle: MarkerHandle,
    pub at: Coordinate,
    pub style: MarkerStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerRecord {
    pub source: String,
    pub paint: Value,
    pub visible: bool,
}

#[derive(Debug, Default)]
struct EngineState {
    calls: Vec<EngineCall>,
    resources: BTreeSet<String>,
    map: Option<EngineHandle>,
    style_loaded: bool,
    defer_style: bool,
    fail_resources: bool,
    markers: BTreeMap<MarkerHandle, PlacedMarker>,
    sources: BTreeMap<String, FeatureCollection>,
    layers: BTreeMap<String, LayerRecord>,
    next_id: u64,
}

impl EngineState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Recording [`MapEngine`]. Resources survive map removal, the same way a
/// page keeps its script tags after a map is destroyed.
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    state: Arc<Mutex<EngineState>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps created from now on report their style as loading until
    /// [`MockEngine::finish_loading`] is called.
    pub fn defer_style_loading(&self) {
        self.lock().defer_style = true;
    }

    pub fn finish_loading(&self) {
        let mut state = self.lock();
        state.style_loaded = state.map.is_some();
    }

    /// Every resource load fails until [`MockEngine::resume_resource_loads`].
    pub fn fail_resource_loads(&self) {
        self.lock().fail_resources = true;
    }

    pub fn resume_resource_loads(&self) {
        self.lock().fail_resources = false;
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, predicate: impl Fn(&EngineCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| predicate(*call)).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn has_map(&self) -> bool {
        self.lock().map.is_some()
    }

    pub fn marker_count(&self) -> usize {
        self.lock().markers.len()
    }

    pub fn markers(&self) -> Vec<PlacedMarker> {
        self.lock().markers.values().cloned().collect()
    }

    pub fn source(&self, id: &str) -> Option<FeatureCollection> {
        self.lock().sources.get(id).cloned()
    }

    pub fn layer(&self, id: &str) -> Option<LayerRecord> {
        self.lock().layers.get(id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MapEngine for MockEngine {
    fn resource_loaded(&self, resource: &Resource) -> bool {
        self.lock().resources.contains(&resource.id)
    }

    fn load_resource(&mut self, resource: &Resource) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(EngineCall::LoadResource {
            url: resource.url.clone(),
        });
        if state.fail_resources {
            return Err(MapError::msg("network unavailable"));
        }
        state.resources.insert(resource.id.clone());
        Ok(())
    }

    fn create_map(&mut self, options: &MapOptions) -> Result<EngineHandle> {
        let mut state = self.lock();
        let handle = EngineHandle(state.next_id());
        state.map = Some(handle);
        state.style_loaded = !state.defer_style;
        state.calls.push(EngineCall::CreateMap {
            token: options.access_token.clone(),
            center: options.center,
            zoom: options.zoom,
        });
        Ok(handle)
    }

    fn style_loaded(&self) -> bool {
        self.lock().style_loaded
    }

    fn add_marker(&mut self, at: Coordinate, style: &MarkerStyle) -> MarkerHandle {
        let mut state = self.lock();
        let handle = MarkerHandle(state.next_id());
        state.markers.insert(
            handle,
            PlacedMarker {
                handle,
                at,
                style: *style,
            },
        );
        state.calls.push(EngineCall::AddMarker {
            marker: handle,
            at,
            color: style.color,
            glyph: style.glyph,
        });
        handle
    }

    fn remove_marker(&mut self, marker: MarkerHandle) {
        let mut state = self.lock();
        state.markers.remove(&marker);
        state.calls.push(EngineCall::RemoveMarker { marker });
    }

    fn has_source(&self, id: &str) -> bool {
        self.lock().sources.contains_key(id)
    }

    fn add_source(&mut self, id: &str, data: &FeatureCollection) {
        let mut state = self.lock();
        state.sources.insert(id.to_string(), data.clone());
        state.calls.push(EngineCall::AddSource {
            id: id.to_string(),
            features: data.len(),
        });
    }

    fn set_source_data(&mut self, id: &str, data: &FeatureCollection) {
        let mut state = self.lock();
        state.sources.insert(id.to_string(), data.clone());
        state.calls.push(EngineCall::SetSourceData {
            id: id.to_string(),
            features: data.len(),
        });
    }

    fn remove_source(&mut self, id: &str) {
        let mut state = self.lock();
        state.sources.remove(id);
        state.calls.push(EngineCall::RemoveSource { id: id.to_string() });
    }

    fn has_layer(&self, id: &str) -> bool {
        self.lock().layers.contains_key(id)
    }

    fn add_layer(&mut self, layer: &CircleLayer) {
        let mut state = self.lock();
        state.layers.insert(
            layer.id.clone(),
            LayerRecord {
                source: layer.source.clone(),
                paint: layer.paint.clone(),
                visible: true,
            },
        );
        state.calls.push(EngineCall::AddLayer {
            id: layer.id.clone(),
        });
    }

    fn set_layer_visibility(&mut self, id: &str, visible: bool) {
        let mut state = self.lock();
        if let Some(layer) = state.layers.get_mut(id) {
            layer.visible = visible;
        }
        state.calls.push(EngineCall::SetLayerVisibility {
            id: id.to_string(),
            visible,
        });
    }

    fn remove_layer(&mut self, id: &str) {
        let mut state = self.lock();
        state.layers.remove(id);
        state.calls.push(EngineCall::RemoveLayer { id: id.to_string() });
    }

    fn fly_to(&mut self, camera: &CameraCommand) {
        self.lock().calls.push(EngineCall::FlyTo { camera: *camera });
    }

    fn remove(&mut self) {
        let mut state = self.lock();
        state.map = None;
        state.style_loaded = false;
        state.markers.clear();
        state.sources.clear();
        state.layers.clear();
        state.calls.push(EngineCall::Remove);
    }
}

#[derive(Debug, Default)]
struct HostState {
    documents: Vec<String>,
    current: Option<String>,
    injected: Vec<String>,
    refuse: bool,
}

/// Recording [`ScriptHost`].
#[derive(Debug, Clone, Default)]
pub struct MockHost {
    state: Arc<Mutex<HostState>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse_injections(&self) {
        self.lock().refuse = true;
    }

    /// Every document ever loaded, oldest first.
    pub fn documents(&self) -> Vec<String> {
        self.lock().documents.clone()
    }

    pub fn current_document(&self) -> Option<String> {
        self.lock().current.clone()
    }

    /// Scripts the host accepted.
    pub fn injected(&self) -> Vec<String> {
        self.lock().injected.clone()
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ScriptHost for MockHost {
    fn load_document(&mut self, html: String) {
        let mut state = self.lock();
        state.documents.push(html.clone());
        state.current = Some(html);
    }

    fn inject(&mut self, script: &str) -> Result<()> {
        let mut state = self.lock();
        if state.refuse || state.current.is_none() {
            return Err(MapError::Injection("no page to run the script in".to_string()));
        }
        state.injected.push(script.to_string());
        Ok(())
    }

    fn unload(&mut self) {
        self.lock().current = None;
    }
}

/// [`HostPlatform`] that hands out clones of one engine and one host.
#[derive(Debug, Clone, Default)]
pub struct MockPlatform {
    capabilities: HostCapabilities,
    pub engine: MockEngine,
    pub host: MockHost,
}

impl MockPlatform {
    pub fn new(capabilities: HostCapabilities) -> Self {
        Self {
            capabilities,
            ..Self::default()
        }
    }

    pub fn direct() -> Self {
        Self::new(HostCapabilities {
            synchronous_engine: true,
            ..HostCapabilities::default()
        })
    }

    pub fn bridged() -> Self {
        Self::new(HostCapabilities {
            script_injection: true,
            sandboxed: true,
            ..HostCapabilities::default()
        })
    }

    pub fn hybrid() -> Self {
        Self::new(HostCapabilities {
            synchronous_engine: true,
            script_injection: true,
            sandboxed: true,
        })
    }
}

impl HostPlatform for MockPlatform {
    fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    fn direct_engine(&mut self) -> Option<Box<dyn MapEngine>> {
        if self.capabilities.synchronous_engine {
            Some(Box::new(self.engine.clone()))
        } else {
            None
        }
    }

    fn script_host(&mut self) -> Option<Box<dyn ScriptHost>> {
        if self.capabilities.script_injection {
            Some(Box::new(self.host.clone()))
        } else {
            None
        }
    }
}
