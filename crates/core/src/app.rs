//! Application context and per-request scopes.
//!
//! [`App`] is built once by the host and owns the shared collaborators.
//! Each host request opens a [`RequestScope`], which owns the diff cache for
//! that request and hands out the fork and merge services.

use std::sync::Arc;

use tracing::{debug, info, info_span, Span};
use uuid::Uuid;

use crate::cache::RequestCache;
use crate::config::AppConfig;
use crate::db::Database;
use crate::errors::CoreError;
use crate::fork::{ForkField, ForkFields, ForkManager};
use crate::identity::{IdentityProvider, MappedIdentity};
use crate::merge::{MergeOrchestrator, MergeResult, PublishPipeline};
use crate::store::DocumentStore;

/// Shared state for the forking system.
pub struct App {
    config: AppConfig,
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    fields: ForkFields,
}

impl App {
    /// Build from explicit collaborators. The configuration is validated.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let fields = ForkFields::new(config.forking.fields.clone());
        info!(
            post_types = ?config.forking.post_types,
            fields = ?config.forking.fields,
            "forking enabled"
        );
        Ok(Self {
            config,
            store,
            identity,
            fields,
        })
    }

    /// Build from configuration alone: opens the SQLite store and loads the
    /// identity mapping file.
    pub fn open(config: AppConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let store = Database::open(&config.store)?;
        let identity = MappedIdentity::from_config(&config.identity)?;
        Self::new(config, Arc::new(store), Arc::new(identity))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    /// Register a callback adjusting which fields new forks copy.
    pub fn register_fork_fields<F>(&mut self, filter: F)
    where
        F: Fn(&mut Vec<ForkField>) + Send + Sync + 'static,
    {
        self.fields.register(filter);
    }

    /// Start a request scope with an empty diff cache.
    pub fn begin_request(&self) -> RequestScope<'_> {
        let id = Uuid::new_v4();
        let span = info_span!("request", request_id = %id);
        span.in_scope(|| debug!("request scope opened"));
        RequestScope {
            app: self,
            id,
            span,
            cache: RequestCache::new(),
        }
    }
}

/// Services bound to one host request. Dropping the scope tears down its
/// cache.
pub struct RequestScope<'a> {
    app: &'a App,
    id: Uuid,
    span: Span,
    cache: RequestCache<MergeResult>,
}

impl<'a> RequestScope<'a> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Tracing span carrying this request's id.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn orchestrator(&self) -> MergeOrchestrator<'_> {
        MergeOrchestrator::new(self.app.store.as_ref(), &self.cache, &self.app.config.merge)
    }

    pub fn pipeline(&self) -> PublishPipeline<'_> {
        PublishPipeline::new(self.app.store.as_ref(), self.orchestrator())
    }

    pub fn forks(&self) -> ForkManager<'_> {
        ForkManager::new(
            self.app.store.as_ref(),
            self.app.identity.as_ref(),
            &self.app.config.forking,
            &self.app.fields,
        )
    }

    /// Number of live cache entries.
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// End the request.
    pub fn finish(self) {}
}

impl Drop for RequestScope<'_> {
    fn drop(&mut self) {
        let _enter = self.span.enter();
        self.cache.clear();
        debug!("request scope closed");
    }
}
