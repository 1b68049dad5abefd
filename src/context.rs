//! The application context handed to the starter and the resolvers.

use std::sync::Arc;

use crate::config::MvcSettings;
use crate::registry::ComponentRegistry;
use crate::session::{MemorySessionStore, SessionMiddleware, SessionStore};

/// Registry, settings and session store of one application.
///
/// Mutable while components are registered; the starter freezes it behind
/// an `Arc` once routes are built.
pub struct ApplicationContext {
    registry: ComponentRegistry,
    settings: MvcSettings,
    session_store: Arc<dyn SessionStore>,
}

impl ApplicationContext {
    pub fn new(settings: MvcSettings) -> Self {
        let ttl = chrono::Duration::seconds(settings.session.ttl_secs);
        Self {
            registry: ComponentRegistry::new(),
            settings,
            session_store: Arc::new(MemorySessionStore::new(ttl)),
        }
    }

    pub fn with_session_store(mut self, store: impl SessionStore) -> Self {
        self.session_store = Arc::new(store);
        self
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    pub fn settings(&self) -> &MvcSettings {
        &self.settings
    }

    pub fn session_store(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.session_store)
    }

    /// The internal session middleware, if sessions are enabled.
    pub fn session_middleware(&self) -> Option<SessionMiddleware> {
        self.settings.session.enabled.then(|| {
            SessionMiddleware::new(self.session_store(), self.settings.session.cookie_name.clone())
        })
    }
}

impl Default for ApplicationContext {
    fn default() -> Self {
        Self::new(MvcSettings::default())
    }
}
