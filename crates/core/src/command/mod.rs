use std::sync::{Arc, Mutex};

use crate::{
    config::CameraConfig,
    session::{lock_slot, SessionSlot},
    CameraCommand, Coordinate,
};

/// Shared handle for imperative camera commands. Cloned handles all route
/// to whichever backend the controller currently runs.
#[derive(Clone)]
pub struct CommandHandle {
    slot: Arc<Mutex<SessionSlot>>,
    focus: CameraConfig,
}

impl CommandHandle {
    pub(crate) fn new(slot: Arc<Mutex<SessionSlot>>, focus: CameraConfig) -> Self {
        Self { slot, focus }
    }

    /// Flies the camera to `(lng, lat)`.
    ///
    /// Before the backend finished setting up this does nothing: the command
    /// is neither queued nor retried.
    pub fn center_on(&self, lng: f64, lat: f64) {
        let target = Coordinate::new(lng, lat);
        if !target.is_finite() {
            tracing::debug!(lng, lat, "ignoring non-finite camera target");
            return;
        }
        let camera = CameraCommand {
            target,
            zoom: self.focus.zoom,
            duration_ms: self.focus.duration_ms,
        };

        let mut slot = match lock_slot(&self.slot) {
            Ok(slot) => slot,
            Err(err) => {
                tracing::warn!(%err, "dropping camera command");
                return;
            }
        };
        match slot.session.as_mut() {
            Some(session) if session.is_ready() => session.backend_mut().fly(&camera),
            _ => tracing::debug!(lng, lat, "map not ready, camera command dropped"),
        }
    }
}

impl std::fmt::Debug for CommandHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandle").finish()
    }
}
