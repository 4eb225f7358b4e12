//! Rendering backends. The set is closed: a session runs on exactly one
//! [`Backend`] variant, chosen once by [`crate::host::select`].

mod bridged;
mod direct;
mod document;
pub mod mock;

use serde::{Deserialize, Serialize};

use crate::{host::BackendKind, CameraCommand};

pub use bridged::{camera_script, BridgedBackend, ScriptHost};
pub use direct::{CircleLayer, DirectBackend, MapEngine, MapOptions, Resource, ResourceKind};
pub use document::{DocumentContent, SandboxDocument};

/// Opaque id of a map instance created by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EngineHandle(pub u64);

/// Opaque id of a marker placed on an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarkerHandle(pub u64);

/// The backend a session runs on.
#[derive(Debug)]
pub enum Backend {
    Direct(DirectBackend),
    Bridged(BridgedBackend),
    Inert,
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Direct(_) => BackendKind::Direct,
            Backend::Bridged(_) => BackendKind::Bridged,
            Backend::Inert => BackendKind::Inert,
        }
    }

    /// Engine that accepts in-place marker and layer updates, if any. A
    /// bridged backend only has one when the host exposed its sandbox engine.
    pub fn engine_mut(&mut self) -> Option<&mut DirectBackend> {
        match self {
            Backend::Direct(direct) => Some(direct),
            Backend::Bridged(bridged) => bridged.attached_mut(),
            Backend::Inert => None,
        }
    }

    /// Starts a camera transition. Superseded transitions are not cancelled
    /// explicitly; the newer one simply wins.
    pub fn fly(&mut self, camera: &CameraCommand) {
        match self {
            Backend::Direct(direct) => direct.fly_to(camera),
            Backend::Bridged(bridged) => bridged.inject(&camera_script(camera)),
            Backend::Inert => {}
        }
    }

    /// Releases whatever the backend holds. Safe to call more than once.
    pub fn teardown(&mut self) {
        match self {
            Backend::Direct(direct) => direct.teardown(),
            Backend::Bridged(bridged) => bridged.teardown(),
            Backend::Inert => {}
        }
    }
}
