//! Map session lifecycle and reconciliation.
//!
//! [`MapSessionController`] owns the one live [`MapSession`]. Every pass
//! re-derives the visible markers or heat layer from the latest
//! [`MapInputs`] instead of applying deltas, so a superseded pass can only
//! leave the map briefly stale, never inconsistent.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::{
    backend::{
        camera_script, Backend, BridgedBackend, DirectBackend, DocumentContent, MarkerHandle,
        SandboxDocument,
    },
    command::CommandHandle,
    host::{self, BackendKind, HostPlatform},
    style, CameraCommand, FeatureCollection, MapConfig, MapError, MapInputs, Result,
    VisualizationMode,
};

/// Lifecycle of the heat layer within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerState {
    Absent,
    Visible,
    Hidden,
}

/// Snapshot of the session bookkeeping, for callers and tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub kind: BackendKind,
    /// `false` while the map is unavailable (no token, failed setup, inert
    /// host).
    pub active: bool,
    pub ready: bool,
    pub markers: usize,
    pub heat_layer: LayerState,
    pub documents_loaded: u64,
}

/// Slot shared between the controller and its command handles.
#[derive(Debug, Default)]
pub(crate) struct SessionSlot {
    pub(crate) session: Option<MapSession>,
}

pub(crate) fn lock_slot(slot: &Mutex<SessionSlot>) -> Result<MutexGuard<'_, SessionSlot>> {
    slot.lock()
        .map_err(|_| MapError::msg("map session has been poisoned"))
}

/// Session identity. A new key means teardown and a fresh session.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionKey {
    kind: BackendKind,
    token: String,
}

/// Handles and layer state placed on an engine by this session.
#[derive(Debug)]
struct Placed {
    markers: Vec<MarkerHandle>,
    heat_layer: LayerState,
}

impl Placed {
    fn new() -> Self {
        Self {
            markers: Vec::new(),
            heat_layer: LayerState::Absent,
        }
    }

    fn reconcile(
        &mut self,
        engine: &mut DirectBackend,
        prev: Option<&MapInputs>,
        next: &MapInputs,
        config: &MapConfig,
    ) {
        let data_changed = prev.map_or(true, |prev| prev.data_differs(next));
        let mode_changed = prev.map_or(true, |prev| prev.mode != next.mode);
        let center_changed = prev.map_or(true, |prev| prev.camera_center != next.camera_center);

        // Mode is applied against the current snapshot, after the data.
        if data_changed || mode_changed {
            match next.mode {
                VisualizationMode::Markers => {
                    self.hide_heat_layer(engine, config);
                    self.clear_markers(engine);
                    self.place_markers(engine, next);
                }
                VisualizationMode::Heatmap => {
                    self.clear_markers(engine);
                    let features = FeatureCollection::from_events(&next.events);
                    engine.upsert_geometry_source(&config.source_id, &features);
                    engine.set_layer_visibility(&config.heat_layer_id, true);
                    self.heat_layer = LayerState::Visible;
                }
            }
        }

        if data_changed || center_changed {
            engine.fly_to(&follow_camera(next, config));
        }
    }

    /// Takes back everything this session put on a map it does not own.
    fn release(&mut self, engine: &mut DirectBackend) {
        self.clear_markers(engine);
        if self.heat_layer != LayerState::Absent {
            engine.remove_heat_layer();
        }
        self.heat_layer = LayerState::Absent;
    }

    fn place_markers(&mut self, engine: &mut DirectBackend, inputs: &MapInputs) {
        for event in &inputs.events {
            let handle = engine.place_marker(event.coordinate, &style::mood_style(event.level));
            self.markers.push(handle);
        }
        if let Some(user) = inputs.user_location {
            self.markers
                .push(engine.place_marker(user, &style::user_style()));
        }
    }

    fn clear_markers(&mut self, engine: &mut DirectBackend) {
        for handle in self.markers.drain(..) {
            engine.remove_marker(handle);
        }
    }

    fn hide_heat_layer(&mut self, engine: &mut DirectBackend, config: &MapConfig) {
        if engine.has_layer(&config.heat_layer_id) {
            engine.set_layer_visibility(&config.heat_layer_id, false);
            self.heat_layer = LayerState::Hidden;
        }
    }
}

fn follow_camera(inputs: &MapInputs, config: &MapConfig) -> CameraCommand {
    CameraCommand {
        target: inputs.camera_center,
        zoom: config.follow.zoom,
        duration_ms: config.follow.duration_ms,
    }
}

/// The live backend plus everything this session placed on it.
#[derive(Debug)]
pub struct MapSession {
    backend: Backend,
    placed: Placed,
    /// Last snapshot rendered in place, or carried by the loaded document.
    applied: Option<MapInputs>,
    ready: bool,
}

impl MapSession {
    fn open(
        kind: BackendKind,
        platform: &mut dyn HostPlatform,
        inputs: &MapInputs,
        config: &MapConfig,
    ) -> Result<Self> {
        if !config.token_is_usable(&inputs.access_token) {
            return Err(MapError::init("access token is missing or a placeholder"));
        }

        match kind {
            BackendKind::Direct => {
                let engine = platform
                    .direct_engine()
                    .ok_or_else(|| MapError::init("host offers no map engine"))?;
                let mut direct = DirectBackend::new(engine, config.clone());
                direct.initialize(&inputs.access_token, inputs.camera_center, config.initial_zoom)?;
                let ready = direct.is_ready();
                Ok(Self {
                    backend: Backend::Direct(direct),
                    placed: Placed::new(),
                    applied: None,
                    ready,
                })
            }
            BackendKind::Bridged => {
                let script_host = platform
                    .script_host()
                    .ok_or_else(|| MapError::init("host offers no script host"))?;
                let engine = if platform.capabilities().is_hybrid() {
                    platform.direct_engine()
                } else {
                    None
                };
                let (mut bridged, content) = match engine {
                    Some(engine) => (
                        BridgedBackend::with_engine(
                            script_host,
                            DirectBackend::new(engine, config.clone()),
                        ),
                        DocumentContent::Shell,
                    ),
                    None => (BridgedBackend::new(script_host), DocumentContent::Full),
                };
                bridged.load(&SandboxDocument {
                    inputs,
                    config,
                    content,
                })?;
                let applied = (content == DocumentContent::Full).then(|| inputs.clone());
                Ok(Self {
                    backend: Backend::Bridged(bridged),
                    placed: Placed::new(),
                    applied,
                    ready: false,
                })
            }
            BackendKind::Inert => Err(MapError::init("no map backend available on this host")),
        }
    }

    /// `true` once the backend finished its asynchronous setup.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub(crate) fn backend_mut(&mut self) -> &mut Backend {
        &mut self.backend
    }

    fn mark_ready(&mut self, latest: &MapInputs, config: &MapConfig) {
        self.ready = true;
        self.reconcile(latest, config);
    }

    fn reconcile(&mut self, next: &MapInputs, config: &MapConfig) {
        if let Some(engine) = self.backend.engine_mut() {
            self.placed
                .reconcile(engine, self.applied.as_ref(), next, config);
            self.applied = Some(next.clone());
            return;
        }

        let Backend::Bridged(bridged) = &mut self.backend else {
            return;
        };
        let Some(prev) = self.applied.as_ref() else {
            return;
        };
        if prev == next {
            return;
        }

        if !prev.data_differs(next) && prev.mode == next.mode {
            bridged.inject(&camera_script(&follow_camera(next, config)));
        } else {
            let document = SandboxDocument {
                inputs: next,
                config,
                content: DocumentContent::Full,
            };
            if let Err(err) = bridged.load(&document) {
                tracing::warn!(%err, "failed to synthesize sandbox document");
                return;
            }
            self.ready = false;
        }
        self.applied = Some(next.clone());
    }

    fn close(&mut self) {
        // Removing an owned map drops its contents with it.
        if let Some(engine) = self.backend.engine_mut() {
            if !engine.owns_map() {
                self.placed.release(engine);
            }
        }
        self.backend.teardown();
        self.placed = Placed::new();
        self.applied = None;
        self.ready = false;
    }

    fn status(&self) -> SessionStatus {
        let documents_loaded = match &self.backend {
            Backend::Bridged(bridged) => bridged.documents_loaded(),
            _ => 0,
        };
        SessionStatus {
            kind: self.backend.kind(),
            active: true,
            ready: self.ready,
            markers: self.placed.markers.len(),
            heat_layer: self.placed.heat_layer,
            documents_loaded,
        }
    }
}

/// Keeps one map session in step with the externally supplied
/// [`MapInputs`].
pub struct MapSessionController {
    platform: Box<dyn HostPlatform>,
    kind: BackendKind,
    config: MapConfig,
    slot: Arc<Mutex<SessionSlot>>,
    key: Option<SessionKey>,
    latest: Option<MapInputs>,
}

impl MapSessionController {
    /// Detects the backend once and waits for the first [`update`].
    ///
    /// [`update`]: MapSessionController::update
    pub fn new(platform: Box<dyn HostPlatform>, config: MapConfig) -> Self {
        let kind = host::select(platform.capabilities());
        tracing::info!(?kind, "map backend selected");
        Self {
            platform,
            kind,
            config,
            slot: Arc::new(Mutex::new(SessionSlot::default())),
            key: None,
            latest: None,
        }
    }

    /// Backend detected for the current host.
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// Returns a handle for imperative camera commands.
    pub fn handle(&self) -> CommandHandle {
        CommandHandle::new(Arc::clone(&self.slot), self.config.focus)
    }

    /// Feeds new external state. Never fails: an unavailable map stays
    /// unavailable and the state is kept for later.
    pub fn update(&mut self, inputs: MapInputs) {
        let key = SessionKey {
            kind: self.kind,
            token: inputs.access_token.trim().to_string(),
        };
        self.latest = Some(inputs);

        if self.key.as_ref() != Some(&key) {
            self.rebuild(key);
        } else {
            self.reconcile_latest();
        }
    }

    /// Reports that the backend finished its asynchronous setup: the style
    /// loaded, or the sandbox document finished loading. Only the latest
    /// inputs are applied; intermediate ones are gone.
    pub fn notify_ready(&mut self) {
        let Some(latest) = self.latest.as_ref() else {
            return;
        };
        let slot = Arc::clone(&self.slot);
        let mut slot = match lock_slot(&slot) {
            Ok(slot) => slot,
            Err(err) => {
                tracing::warn!(%err, "dropping ready notification");
                return;
            }
        };
        match slot.session.as_mut() {
            Some(session) if !session.is_ready() => {
                session.mark_ready(latest, &self.config);
                tracing::debug!(ready = session.is_ready(), "map backend ready");
            }
            Some(_) => {}
            None => tracing::debug!("ready notification without a session"),
        }
    }

    /// Swaps the host platform. A different backend kind tears the session
    /// down and builds a new one from the latest inputs.
    pub fn replace_platform(&mut self, platform: Box<dyn HostPlatform>) {
        let kind = host::select(platform.capabilities());
        self.platform = platform;
        if kind == self.kind {
            return;
        }
        tracing::info!(from = ?self.kind, to = ?kind, "map backend changed");
        self.kind = kind;
        if let Some(token) = self.latest.as_ref().map(|l| l.access_token.trim().to_string()) {
            self.rebuild(SessionKey { kind, token });
        }
    }

    /// Current bookkeeping, or an inactive snapshot when no map is open.
    pub fn status(&self) -> SessionStatus {
        let inactive = SessionStatus {
            kind: self.kind,
            active: false,
            ready: false,
            markers: 0,
            heat_layer: LayerState::Absent,
            documents_loaded: 0,
        };
        match lock_slot(&self.slot) {
            Ok(slot) => slot
                .session
                .as_ref()
                .map(MapSession::status)
                .unwrap_or(inactive),
            Err(_) => inactive,
        }
    }

    /// Tears down the current session, if any.
    pub fn shutdown(&mut self) {
        self.key = None;
        if let Ok(mut slot) = lock_slot(&self.slot) {
            if let Some(mut session) = slot.session.take() {
                session.close();
                tracing::info!("map session closed");
            }
        }
    }

    fn rebuild(&mut self, key: SessionKey) {
        let slot = Arc::clone(&self.slot);
        let mut slot = match lock_slot(&slot) {
            Ok(slot) => slot,
            Err(err) => {
                tracing::warn!(%err, "cannot rebuild map session");
                return;
            }
        };
        if let Some(mut old) = slot.session.take() {
            old.close();
            tracing::info!("map session torn down");
        }
        self.key = Some(key);

        let Some(latest) = self.latest.as_ref() else {
            return;
        };
        match MapSession::open(self.kind, self.platform.as_mut(), latest, &self.config) {
            Ok(mut session) => {
                if session.is_ready() {
                    session.reconcile(latest, &self.config);
                }
                tracing::info!(kind = ?self.kind, ready = session.is_ready(), "map session created");
                slot.session = Some(session);
            }
            Err(err) => {
                tracing::warn!(%err, "map unavailable, continuing without it");
                // Anything but a missing token or backend is retried on the
                // next state change.
                if self.kind != BackendKind::Inert
                    && self.config.token_is_usable(&latest.access_token)
                {
                    self.key = None;
                }
            }
        }
    }

    fn reconcile_latest(&mut self) {
        let Some(latest) = self.latest.as_ref() else {
            return;
        };
        let slot = Arc::clone(&self.slot);
        let mut slot = match lock_slot(&slot) {
            Ok(slot) => slot,
            Err(err) => {
                tracing::warn!(%err, "skipping reconciliation");
                return;
            }
        };
        match slot.session.as_mut() {
            Some(session) if session.is_ready() => session.reconcile(latest, &self.config),
            Some(_) => tracing::debug!(
                reason = %MapError::ReconciliationSkipped,
                "state change coalesced until setup completes"
            ),
            None => tracing::debug!("map unavailable, state change kept for later"),
        }
    }
}

impl Drop for MapSessionController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for MapSessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapSessionController")
            .field("kind", &self.kind)
            .field("key", &self.key.as_ref().map(|k| k.kind))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{EngineCall, MockPlatform};
    use crate::{Coordinate, MoodEvent, MoodLevel};

    fn events(n: usize) -> Vec<MoodEvent> {
        (0..n)
            .map(|i| {
                let level = MoodLevel::try_from((i % 5) as u8 + 1).unwrap();
                MoodEvent::new(level, Coordinate::new(37.0 + i as f64 * 0.01, 55.0))
            })
            .collect()
    }

    fn inputs(events: Vec<MoodEvent>, mode: VisualizationMode) -> MapInputs {
        MapInputs {
            events,
            user_location: None,
            camera_center: Coordinate::new(37.6, 55.75),
            access_token: "pk.test".to_string(),
            mode,
        }
    }

    fn direct() -> (MapSessionController, MockPlatform) {
        let platform = MockPlatform::direct();
        let controller =
            MapSessionController::new(Box::new(platform.clone()), MapConfig::default());
        (controller, platform)
    }

    fn is_fly(call: &EngineCall) -> bool {
        matches!(call, EngineCall::FlyTo { .. })
    }

    #[test]
    fn markers_match_events_and_their_style() {
        let (mut controller, platform) = direct();
        let events = events(7);
        controller.update(inputs(events.clone(), VisualizationMode::Markers));

        let placed = platform.engine.markers();
        assert_eq!(placed.len(), 7);
        assert_eq!(controller.status().markers, 7);
        for marker in placed {
            let event = events
                .iter()
                .find(|e| e.coordinate == marker.at)
                .expect("marker sits on an event");
            assert_eq!(marker.style, style::mood_style(event.level));
        }
    }

    #[test]
    fn user_location_adds_one_distinct_marker() {
        let (mut controller, platform) = direct();
        let mut state = inputs(events(3), VisualizationMode::Markers);
        state.user_location = Some(Coordinate::new(37.5, 55.8));
        controller.update(state);

        let placed = platform.engine.markers();
        assert_eq!(placed.len(), 4);
        assert_eq!(
            placed.iter().filter(|m| m.style == style::user_style()).count(),
            1
        );
    }

    #[test]
    fn mode_round_trip_restores_markers_and_hides_layer() {
        let (mut controller, platform) = direct();
        let events = events(5);
        controller.update(inputs(events.clone(), VisualizationMode::Markers));
        controller.update(inputs(events.clone(), VisualizationMode::Heatmap));
        assert_eq!(platform.engine.marker_count(), 0);
        assert_eq!(controller.status().heat_layer, LayerState::Visible);

        controller.update(inputs(events, VisualizationMode::Markers));

        assert_eq!(platform.engine.marker_count(), 5);
        let layer = platform.engine.layer("moods-heat-circles").expect("layer kept");
        assert!(!layer.visible);
        assert_eq!(controller.status().heat_layer, LayerState::Hidden);
        assert_eq!(platform.engine.count(|c| matches!(c, EngineCall::CreateMap { .. })), 1);
        assert_eq!(platform.engine.count(|c| matches!(c, EngineCall::Remove)), 0);
        assert_eq!(platform.engine.count(|c| matches!(c, EngineCall::AddLayer { .. })), 1);
    }

    #[test]
    fn heatmap_source_holds_one_lng_lat_feature_per_event() {
        let (mut controller, platform) = direct();
        let events = vec![
            MoodEvent::new(MoodLevel::try_from(1).unwrap(), Coordinate { lat: 10.0, lng: 20.0 }),
            MoodEvent::new(MoodLevel::try_from(5).unwrap(), Coordinate { lat: 30.0, lng: 40.0 }),
        ];
        controller.update(inputs(events, VisualizationMode::Heatmap));

        let source = platform.engine.source("moods-source").expect("source exists");
        let value = serde_json::to_value(&source).unwrap();
        let features = value["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0]["properties"]["mood"], 1);
        assert_eq!(features[1]["properties"]["mood"], 5);
        assert_eq!(features[0]["geometry"]["coordinates"], serde_json::json!([20.0, 10.0]));
        assert_eq!(features[1]["geometry"]["coordinates"], serde_json::json!([40.0, 30.0]));
        assert_eq!(platform.engine.marker_count(), 0);
    }

    #[test]
    fn center_on_before_setup_is_dropped_not_replayed() {
        let (mut controller, platform) = direct();
        platform.engine.defer_style_loading();
        let handle = controller.handle();

        controller.update(inputs(events(2), VisualizationMode::Markers));
        handle.center_on(10.0, 20.0);
        assert_eq!(platform.engine.count(is_fly), 0);

        platform.engine.finish_loading();
        controller.notify_ready();

        let flights: Vec<_> = platform
            .engine
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                EngineCall::FlyTo { camera } => Some(camera),
                _ => None,
            })
            .collect();
        assert_eq!(flights.len(), 1);
        assert_eq!(flights[0].target, Coordinate::new(37.6, 55.75));

        handle.center_on(10.0, 20.0);
        let last = platform.engine.calls().pop().unwrap();
        assert_eq!(
            last,
            EngineCall::FlyTo {
                camera: CameraCommand {
                    target: Coordinate::new(10.0, 20.0),
                    zoom: 12.0,
                    duration_ms: 800,
                }
            }
        );
    }

    #[test]
    fn changes_during_setup_are_coalesced_into_the_latest() {
        let (mut controller, platform) = direct();
        platform.engine.defer_style_loading();

        controller.update(inputs(events(3), VisualizationMode::Markers));
        controller.update(inputs(events(5), VisualizationMode::Markers));
        controller.update(inputs(events(2), VisualizationMode::Heatmap));
        assert!(!controller.status().ready);

        platform.engine.finish_loading();
        controller.notify_ready();

        assert_eq!(platform.engine.count(|c| matches!(c, EngineCall::AddMarker { .. })), 0);
        assert_eq!(platform.engine.source("moods-source").unwrap().len(), 2);
        assert_eq!(platform.engine.count(is_fly), 1);
    }

    #[test]
    fn token_change_tears_down_once_and_starts_clean() {
        let (mut controller, platform) = direct();
        controller.update(inputs(events(3), VisualizationMode::Heatmap));

        let mut next = inputs(events(2), VisualizationMode::Markers);
        next.access_token = "pk.rotated".to_string();
        controller.update(next);

        assert_eq!(platform.engine.count(|c| matches!(c, EngineCall::Remove)), 1);
        assert_eq!(platform.engine.count(|c| matches!(c, EngineCall::CreateMap { .. })), 2);
        assert_eq!(platform.engine.marker_count(), 2);
        assert!(platform.engine.layer("moods-heat-circles").is_none());
        let status = controller.status();
        assert_eq!(status.markers, 2);
        assert_eq!(status.heat_layer, LayerState::Absent);
    }

    #[test]
    fn hybrid_token_change_leaves_nothing_behind() {
        let platform = MockPlatform::hybrid();
        let mut controller =
            MapSessionController::new(Box::new(platform.clone()), MapConfig::default());
        let mut state = inputs(events(3), VisualizationMode::Heatmap);
        state.access_token = "pk.a".to_string();
        controller.update(state.clone());
        controller.notify_ready();
        state.mode = VisualizationMode::Markers;
        controller.update(state);
        assert_eq!(platform.engine.marker_count(), 3);

        let mut next = inputs(events(2), VisualizationMode::Markers);
        next.access_token = "pk.b".to_string();
        controller.update(next);
        controller.notify_ready();

        assert_eq!(platform.engine.marker_count(), 2);
        assert!(platform.engine.layer("moods-heat-circles").is_none());
        assert!(platform.engine.source("moods-source").is_none());
        let status = controller.status();
        assert_eq!(status.markers, 2);
        assert_eq!(status.heat_layer, LayerState::Absent);
        assert_eq!(platform.engine.count(|c| matches!(c, EngineCall::Remove)), 0);
    }

    #[test]
    fn failed_setup_is_retried_on_the_next_change() {
        let (mut controller, platform) = direct();
        platform.engine.fail_resource_loads();
        controller.update(inputs(events(2), VisualizationMode::Markers));
        assert!(!controller.status().active);

        platform.engine.resume_resource_loads();
        controller.update(inputs(events(3), VisualizationMode::Markers));

        assert_eq!(platform.engine.count(|c| matches!(c, EngineCall::CreateMap { .. })), 1);
        assert_eq!(platform.engine.marker_count(), 3);
        assert!(controller.status().active);
    }

    #[test]
    fn placeholder_token_keeps_the_map_inert_until_a_real_one_arrives() {
        let (mut controller, platform) = direct();
        let handle = controller.handle();
        let mut state = inputs(events(3), VisualizationMode::Markers);
        state.access_token = "YOUR_MAPBOX_ACCESS_TOKEN".to_string();
        controller.update(state.clone());
        state.events = events(4);
        controller.update(state.clone());
        handle.center_on(1.0, 2.0);

        assert!(platform.engine.calls().is_empty());
        assert!(!controller.status().active);

        state.access_token = String::new();
        controller.update(state.clone());
        assert!(platform.engine.calls().is_empty());

        state.access_token = "pk.real".to_string();
        controller.update(state);
        assert_eq!(platform.engine.count(|c| matches!(c, EngineCall::CreateMap { .. })), 1);
        assert_eq!(platform.engine.marker_count(), 4);
    }

    #[test]
    fn data_and_mode_change_in_one_pass_shows_latest_data() {
        let (mut controller, platform) = direct();
        controller.update(inputs(events(3), VisualizationMode::Markers));
        controller.update(inputs(events(4), VisualizationMode::Heatmap));

        assert_eq!(platform.engine.marker_count(), 0);
        assert_eq!(platform.engine.source("moods-source").unwrap().len(), 4);
    }

    #[test]
    fn center_change_only_moves_the_camera() {
        let (mut controller, platform) = direct();
        let mut state = inputs(events(3), VisualizationMode::Markers);
        controller.update(state.clone());
        platform.engine.clear_calls();

        state.camera_center = Coordinate::new(30.3, 59.9);
        controller.update(state);

        let calls = platform.engine.calls();
        assert_eq!(calls.len(), 1);
        assert!(is_fly(&calls[0]));
    }

    #[test]
    fn resource_failure_degrades_without_panicking() {
        let (mut controller, platform) = direct();
        platform.engine.fail_resource_loads();
        controller.update(inputs(events(2), VisualizationMode::Markers));
        controller.handle().center_on(1.0, 1.0);
        controller.notify_ready();

        assert!(!controller.status().active);
        assert_eq!(platform.engine.count(|c| matches!(c, EngineCall::CreateMap { .. })), 0);
    }

    #[test]
    fn inert_hosts_accept_everything_silently() {
        let platform = MockPlatform::new(Default::default());
        let mut controller =
            MapSessionController::new(Box::new(platform), MapConfig::default());
        controller.update(inputs(events(2), VisualizationMode::Heatmap));
        controller.handle().center_on(1.0, 2.0);
        controller.notify_ready();

        let status = controller.status();
        assert_eq!(status.kind, BackendKind::Inert);
        assert!(!status.active);
    }

    #[test]
    fn dropping_the_controller_releases_the_map() {
        let (mut controller, platform) = direct();
        controller.update(inputs(events(1), VisualizationMode::Markers));
        drop(controller);
        assert_eq!(platform.engine.count(|c| matches!(c, EngineCall::Remove)), 1);
        assert!(!platform.engine.has_map());
    }

    fn bridged() -> (MapSessionController, MockPlatform) {
        let platform = MockPlatform::bridged();
        let controller =
            MapSessionController::new(Box::new(platform.clone()), MapConfig::default());
        (controller, platform)
    }

    #[test]
    fn bridged_commands_wait_for_the_document() {
        let (mut controller, platform) = bridged();
        let handle = controller.handle();
        controller.update(inputs(events(2), VisualizationMode::Markers));
        assert_eq!(platform.host.documents().len(), 1);

        handle.center_on(10.0, 20.0);
        controller.notify_ready();
        assert!(platform.host.injected().is_empty());

        handle.center_on(10.0, 20.0);
        assert_eq!(
            platform.host.injected(),
            vec!["window.flyTo && window.flyTo(10, 20, 12, 800); true;".to_string()]
        );
    }

    #[test]
    fn bridged_data_changes_reload_the_document() {
        let (mut controller, platform) = bridged();
        let mut state = inputs(events(2), VisualizationMode::Markers);
        controller.update(state.clone());
        controller.notify_ready();

        state.camera_center = Coordinate::new(30.3, 59.9);
        controller.update(state.clone());
        assert_eq!(platform.host.documents().len(), 1);
        assert_eq!(
            platform.host.injected(),
            vec!["window.flyTo && window.flyTo(30.3, 59.9, 12, 1000); true;".to_string()]
        );

        state.mode = VisualizationMode::Heatmap;
        controller.update(state);
        assert_eq!(platform.host.documents().len(), 2);
        assert!(!controller.status().ready);
        assert!(platform
            .host
            .current_document()
            .unwrap()
            .contains("\"heatmap\":true"));
    }

    #[test]
    fn bridged_setup_applies_only_the_latest_inputs() {
        let (mut controller, platform) = bridged();
        controller.update(inputs(events(2), VisualizationMode::Markers));
        controller.update(inputs(events(3), VisualizationMode::Markers));
        controller.update(inputs(events(4), VisualizationMode::Markers));
        assert_eq!(platform.host.documents().len(), 1);

        controller.notify_ready();

        assert_eq!(platform.host.documents().len(), 2);
        assert_eq!(controller.status().documents_loaded, 2);
        let current = platform.host.current_document().unwrap();
        assert_eq!(current.matches("\"mood\":").count(), 4);
    }

    #[test]
    fn hybrid_hosts_reconcile_in_place() {
        let platform = MockPlatform::hybrid();
        let mut controller =
            MapSessionController::new(Box::new(platform.clone()), MapConfig::default());
        let events = events(3);
        controller.update(inputs(events.clone(), VisualizationMode::Markers));
        assert!(platform
            .host
            .current_document()
            .unwrap()
            .contains("\"render_content\":false"));

        controller.notify_ready();
        assert_eq!(platform.engine.marker_count(), 3);

        controller.update(inputs(events, VisualizationMode::Heatmap));
        assert_eq!(platform.host.documents().len(), 1);
        assert_eq!(platform.engine.marker_count(), 0);
        assert_eq!(platform.engine.source("moods-source").unwrap().len(), 3);

        controller.handle().center_on(1.0, 2.0);
        assert_eq!(platform.host.injected().len(), 1);
        assert_eq!(platform.engine.count(|c| matches!(c, EngineCall::CreateMap { .. })), 0);
    }

    #[test]
    fn backend_kind_change_rebuilds_the_session() {
        let (mut controller, platform) = direct();
        controller.update(inputs(events(2), VisualizationMode::Markers));

        let sandbox = MockPlatform::bridged();
        controller.replace_platform(Box::new(sandbox.clone()));

        assert_eq!(controller.kind(), BackendKind::Bridged);
        assert_eq!(platform.engine.count(|c| matches!(c, EngineCall::Remove)), 1);
        assert_eq!(sandbox.host.documents().len(), 1);
    }
}
