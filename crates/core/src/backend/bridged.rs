use std::fmt;

use crate::{CameraCommand, Result};

use super::{DirectBackend, SandboxDocument};

/// An isolated execution host. Commands travel one way: there is no return
/// value and no callback from the sandbox.
pub trait ScriptHost: Send {
    /// Replaces whatever page the host is running with `html`.
    fn load_document(&mut self, html: String);

    /// Asks the host to run `script` in the current page. `Ok` only means
    /// the request was handed over, not that it ran.
    fn inject(&mut self, script: &str) -> Result<()>;

    /// Drops the current page.
    fn unload(&mut self);
}

/// Snippet that calls the sandbox's fly-to entry point with the full
/// camera, so the sandbox animates exactly like an in-process engine.
pub fn camera_script(camera: &CameraCommand) -> String {
    format!(
        "window.flyTo && window.flyTo({}, {}, {}, {}); true;",
        camera.target.lng, camera.target.lat, camera.zoom, camera.duration_ms
    )
}

/// Adapter over a [`ScriptHost`]. State reaches the sandbox only by loading
/// a freshly synthesized document; afterwards the only channel is
/// fire-and-forget injection.
pub struct BridgedBackend {
    host: Box<dyn ScriptHost>,
    /// Engine of the sandboxed map when the host exposes it.
    attached: Option<DirectBackend>,
    documents_loaded: u64,
}

impl BridgedBackend {
    /// Adapter that can only reach the sandbox through documents and scripts.
    pub fn new(host: Box<dyn ScriptHost>) -> Self {
        Self {
            host,
            attached: None,
            documents_loaded: 0,
        }
    }

    /// Adapter for a host that also exposes the engine running in its
    /// sandbox.
    pub fn with_engine(host: Box<dyn ScriptHost>, engine: DirectBackend) -> Self {
        Self {
            attached: Some(engine),
            ..Self::new(host)
        }
    }

    pub fn is_hybrid(&self) -> bool {
        self.attached.is_some()
    }

    pub(crate) fn attached_mut(&mut self) -> Option<&mut DirectBackend> {
        self.attached.as_mut()
    }

    /// Synthesizes `document` and replaces the running page with it.
    pub fn load(&mut self, document: &SandboxDocument<'_>) -> Result<()> {
        let html = document.render()?;
        self.documents_loaded += 1;
        tracing::debug!(
            bytes = html.len(),
            generation = self.documents_loaded,
            "loading sandbox document"
        );
        self.host.load_document(html);
        Ok(())
    }

    /// Fire-and-forget. Refusals are logged and dropped.
    pub fn inject(&mut self, script: &str) {
        if let Err(err) = self.host.inject(script) {
            tracing::debug!(%err, "sandbox injection dropped");
        }
    }

    /// Number of documents loaded since the adapter was created.
    pub fn documents_loaded(&self) -> u64 {
        self.documents_loaded
    }

    /// Releases the attached engine, if any, and drops the page.
    pub fn teardown(&mut self) {
        if let Some(engine) = self.attached.as_mut() {
            engine.teardown();
        }
        self.host.unload();
    }
}

impl fmt::Debug for BridgedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgedBackend")
            .field("hybrid", &self.is_hybrid())
            .field("documents_loaded", &self.documents_loaded)
            .finish()
    }
}
