//! Core library for the Mood Map rendering bridge.
//!
//! The crate keeps a live map in step with a list of mood events while
//! running on one of two structurally different backends: a mapping engine
//! the controller calls into synchronously, or a sandboxed document that can
//! only be reached by injecting scripts with no reply. Each module owns one
//! piece of that pipeline (style lookup, backend selection, the two adapters,
//! session reconciliation and the imperative camera handle).

pub mod backend;
pub mod command;
pub mod config;
pub mod error;
pub mod host;
pub mod model;
pub mod session;
pub mod style;

pub use backend::{Backend, BridgedBackend, DirectBackend, MapEngine, ScriptHost};
pub use command::CommandHandle;
pub use config::{AppConfig, CameraConfig, MapConfig};
pub use error::{MapError, Result};
pub use host::{BackendKind, HostCapabilities, HostPlatform};
pub use model::{
    CameraCommand, Coordinate, Feature, FeatureCollection, GeoPosition, MapInputs, MoodEvent,
    MoodLevel, VisualizationMode,
};
pub use session::{LayerState, MapSession, MapSessionController, SessionStatus};
pub use style::{HeatLayerStyle, MarkerStyle};
