use serde::{Deserialize, Serialize};

use crate::backend::{MapEngine, ScriptHost};

/// Which rendering backend a session runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Synchronous calls into a mapping-library instance.
    Direct,
    /// A sandboxed document reachable only through forward script injection.
    Bridged,
    /// Nothing usable was found. Every map operation is a no-op.
    Inert,
}

/// What the host environment offers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCapabilities {
    /// A mapping library can be called synchronously from the controller.
    pub synchronous_engine: bool,
    /// An isolated script host that accepts documents and injected snippets.
    pub script_injection: bool,
    /// The map must live inside the isolated host even when an engine is
    /// reachable.
    pub sandboxed: bool,
}

impl HostCapabilities {
    /// A bridged host whose in-sandbox engine the controller can still reach.
    pub fn is_hybrid(&self) -> bool {
        self.sandboxed && self.script_injection && self.synchronous_engine
    }
}

/// Picks the backend for a session. Called once when a controller is
/// created and never re-evaluated while that host stays in place.
pub fn select(capabilities: HostCapabilities) -> BackendKind {
    if capabilities.sandboxed && capabilities.script_injection {
        BackendKind::Bridged
    } else if capabilities.synchronous_engine {
        BackendKind::Direct
    } else if capabilities.script_injection {
        BackendKind::Bridged
    } else {
        BackendKind::Inert
    }
}

/// The environment the map is mounted into. Hands out fresh engines and
/// script hosts whenever a session is (re)created.
pub trait HostPlatform: Send {
    fn capabilities(&self) -> HostCapabilities;

    fn direct_engine(&mut self) -> Option<Box<dyn MapEngine>>;

    fn script_host(&mut self) -> Option<Box<dyn ScriptHost>>;
}
