//! AdapterManager: resolve, build, start, stop, and edit adapters

use super::error::AdapterError;
use crate::config::Settings;
use crate::format::FormatRegistry;
use crate::model::{AdapterDescription, AdapterId, ConfigurationError, GuessSchema, RawEvent};
use crate::pipeline::{AdapterPipeline, Transport};
use crate::protocol::{Protocol, ProtocolDescriptor, ProtocolError, ProtocolRegistry};
use crate::runtime::{AdapterRuntime, RuntimeStatus, SchedulerState, StatsSnapshot};
use crate::storage::AdapterStore;
use chrono::Utc;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

const DEFAULT_SAMPLE_SIZE: usize = 20;
const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(2);

/// The aggregate root over running adapters.
///
/// Descriptions live in an `AdapterStore` passed per call; the manager owns
/// only what is running. Lifecycle calls on the same id are serialised by a
/// per-id lock; different ids never contend.
pub struct AdapterManager {
    protocols: ProtocolRegistry,
    formats: FormatRegistry,
    transport: Arc<dyn Transport>,
    sample_size: usize,
    stop_grace: Duration,
    running: DashMap<AdapterId, AdapterRuntime>,
    locks: DashMap<AdapterId, Arc<Mutex<()>>>,
}

fn validate_id(id: &str) -> Result<AdapterId, AdapterError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(AdapterError::InvalidId(id.to_string()));
    }
    Ok(AdapterId::from(trimmed))
}

impl AdapterManager {
    pub fn new(
        protocols: ProtocolRegistry,
        formats: FormatRegistry,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            protocols,
            formats,
            transport,
            sample_size: DEFAULT_SAMPLE_SIZE,
            stop_grace: DEFAULT_STOP_GRACE,
            running: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    /// Built-in protocols and formats, tuned by `settings`.
    pub fn from_settings(settings: &Settings, transport: Arc<dyn Transport>) -> Result<Self, ProtocolError> {
        let protocols = ProtocolRegistry::with_defaults(&settings.http)?;
        Ok(Self::new(protocols, FormatRegistry::with_defaults(), transport)
            .with_sample_size(settings.sample_size)
            .with_stop_grace(settings.stop_grace()))
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size.max(1);
        self
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    fn lock_for(&self, id: &AdapterId) -> Arc<Mutex<()>> {
        self.locks.entry(id.clone()).or_default().clone()
    }

    /// Run `op` holding the id's lock. The lock entry is dropped afterwards
    /// when nothing runs under the id and nobody else holds or awaits it.
    async fn with_lock<T, F>(&self, id: &AdapterId, op: F) -> Result<T, AdapterError>
    where
        F: Future<Output = Result<T, AdapterError>>,
    {
        let lock = self.lock_for(id);
        let result = {
            let _guard = lock.lock().await;
            op.await
        };
        drop(lock);
        if !self.running.contains_key(id) {
            self.locks.remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
        }
        result
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.len()
    }

    /// Drop the runtime of a stream adapter whose task has ended.
    fn reap(&self, id: &AdapterId) {
        if self.running.remove_if(id, |_, rt| rt.is_finished()).is_some() {
            info!(adapter_id = %id, "reaped finished adapter");
        }
    }

    fn reap_all(&self) {
        self.running.retain(|id, rt| {
            let alive = !rt.is_finished();
            if !alive {
                info!(adapter_id = %id, "reaped finished adapter");
            }
            alive
        });
    }

    /// Build the protocol an adapter describes and check its declared kind.
    fn instantiate(&self, description: &AdapterDescription) -> Result<Arc<dyn Protocol>, ConfigurationError> {
        let parser = self.formats.parser(&description.parser)?;
        let format = self.formats.format(&description.format)?;
        let protocol = self.protocols.instantiate(&description.protocol, parser, format)?;

        let actual = protocol.mode().kind();
        if actual != description.kind {
            return Err(ConfigurationError::KindMismatch {
                protocol: description.protocol.id.clone(),
                declared: description.kind.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(protocol)
    }

    fn build(&self, description: &AdapterDescription) -> Result<(Arc<dyn Protocol>, AdapterPipeline), ConfigurationError> {
        let protocol = self.instantiate(description)?;
        let pipeline = AdapterPipeline::for_adapter(description, self.transport.clone())?;
        Ok((protocol, pipeline))
    }

    /// Caller must hold the id's lock.
    fn start_locked(&self, description: AdapterDescription) -> Result<Uuid, AdapterError> {
        let (protocol, pipeline) = self.build(&description)?;
        let id = description.id.clone();
        let runtime = AdapterRuntime::start(description, protocol, pipeline);
        let run_id = runtime.run_id();
        self.running.insert(id, runtime);
        Ok(run_id)
    }

    /// Caller must hold the id's lock. Returns whether it was running.
    async fn stop_locked(&self, id: &AdapterId) -> bool {
        self.reap(id);
        match self.running.remove(id) {
            Some((_, runtime)) => {
                runtime.stop(self.stop_grace).await;
                true
            }
            None => false,
        }
    }

    // === Queries ===

    /// Every stored description. An absent or failing store is an error;
    /// an empty collection is not.
    pub fn get_all_adapters(&self, store: &dyn AdapterStore) -> Result<Vec<AdapterDescription>, AdapterError> {
        match store.get_all_adapters() {
            Ok(Some(adapters)) => Ok(adapters),
            Ok(None) => Err(AdapterError::StoreUnavailable(
                "adapter collection is absent".to_string(),
            )),
            Err(e) => Err(AdapterError::StoreUnavailable(e.to_string())),
        }
    }

    pub fn get_adapter(&self, id: &str, store: &dyn AdapterStore) -> Result<AdapterDescription, AdapterError> {
        let id = validate_id(id)?;
        self.get_all_adapters(store)?
            .into_iter()
            .find(|d| d.id == id)
            .ok_or(AdapterError::NotFound(id))
    }

    pub fn declared_protocols(&self) -> Vec<ProtocolDescriptor> {
        self.protocols.declared_models()
    }

    pub fn is_running(&self, id: &str) -> bool {
        match validate_id(id) {
            Ok(id) => {
                self.reap(&id);
                self.running.contains_key(&id)
            }
            Err(_) => false,
        }
    }

    pub fn running_adapters(&self) -> Vec<RuntimeStatus> {
        self.reap_all();
        let mut statuses: Vec<RuntimeStatus> = self.running.iter().map(|rt| rt.status()).collect();
        statuses.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        statuses
    }

    /// Counters of the current run.
    pub fn stats(&self, id: &str) -> Result<StatsSnapshot, AdapterError> {
        let id = validate_id(id)?;
        self.reap(&id);
        self.running
            .get(&id)
            .map(|rt| rt.stats())
            .ok_or(AdapterError::NotRunning(id))
    }

    /// `Idle` for adapters that are not running.
    pub fn state(&self, id: &str) -> Result<SchedulerState, AdapterError> {
        let id = validate_id(id)?;
        self.reap(&id);
        Ok(self
            .running
            .get(&id)
            .map(|rt| rt.state())
            .unwrap_or(SchedulerState::Idle))
    }

    // === Lifecycle ===

    pub async fn start_adapter(&self, id: &str, store: &dyn AdapterStore) -> Result<Uuid, AdapterError> {
        let id = validate_id(id)?;
        self.with_lock(&id, async {
            self.reap(&id);
            if self.running.contains_key(&id) {
                return Err(AdapterError::AlreadyRunning(id.clone()));
            }
            let description = self.get_adapter(id.as_str(), store)?;
            self.start_locked(description)
        })
        .await
    }

    pub async fn stop_adapter(&self, id: &str) -> Result<(), AdapterError> {
        let id = validate_id(id)?;
        self.with_lock(&id, async {
            if self.stop_locked(&id).await {
                Ok(())
            } else {
                Err(AdapterError::NotRunning(id.clone()))
            }
        })
        .await
    }

    /// Stop everything that is running. Returns how many were stopped.
    pub async fn stop_all(&self) -> usize {
        let ids: Vec<AdapterId> = self.running.iter().map(|rt| rt.key().clone()).collect();
        let mut stopped = 0;
        for id in ids {
            match self.stop_adapter(id.as_str()).await {
                Ok(()) => stopped += 1,
                Err(e) => debug!(adapter_id = %id, error = %e, "skipped during stop_all"),
            }
        }
        stopped
    }

    // === Editing ===

    /// Validate that a description builds, then persist it.
    ///
    /// A blank id is replaced with a generated one; any other id is trimmed.
    pub async fn add_adapter(
        &self,
        mut description: AdapterDescription,
        store: &dyn AdapterStore,
    ) -> Result<AdapterId, AdapterError> {
        description.id = if description.id.is_blank() {
            AdapterId::new()
        } else {
            validate_id(description.id.as_str())?
        };
        let id = description.id.clone();
        self.with_lock(&id, async {
            if self.get_all_adapters(store)?.iter().any(|d| d.id == id) {
                return Err(AdapterError::AlreadyExists(id.clone()));
            }
            self.build(&description)?;
            if description.created_at.is_none() {
                description.created_at = Some(Utc::now());
            }
            store.save_adapter(&description)?;
            info!(adapter_id = %id, "adapter added");
            Ok::<_, AdapterError>(id.clone())
        })
        .await
    }

    /// Persist a new description, restarting the adapter if it was running.
    ///
    /// A failed save leaves the current run untouched.
    pub async fn update_adapter(
        &self,
        mut description: AdapterDescription,
        store: &dyn AdapterStore,
    ) -> Result<(), AdapterError> {
        let id = validate_id(description.id.as_str())?;
        description.id = id.clone();
        self.with_lock(&id, async {
            self.get_adapter(id.as_str(), store)?;
            self.build(&description)?;
            store.save_adapter(&description)?;

            let was_running = self.stop_locked(&id).await;
            info!(adapter_id = %id, restart = was_running, "adapter updated");
            if was_running {
                self.start_locked(description)?;
            }
            Ok::<_, AdapterError>(())
        })
        .await
    }

    /// Stop if running, then remove from the store.
    pub async fn delete_adapter(&self, id: &str, store: &dyn AdapterStore) -> Result<(), AdapterError> {
        let id = validate_id(id)?;
        self.with_lock(&id, async {
            self.stop_locked(&id).await;
            if !store.delete_adapter(&id)? {
                return Err(AdapterError::NotFound(id.clone()));
            }
            info!(adapter_id = %id, "adapter deleted");
            Ok::<_, AdapterError>(())
        })
        .await
    }

    // === Sampling ===

    /// Sample the described source and guess its schema.
    pub async fn guess_schema(&self, description: &AdapterDescription) -> Result<GuessSchema, AdapterError> {
        let protocol = self.instantiate(description)?;
        Ok(protocol.get_guess_schema(self.sample_size).await?)
    }

    /// Up to `n` events from the source with the adapter's rules applied.
    pub async fn preview(&self, description: &AdapterDescription, n: usize) -> Result<Vec<RawEvent>, AdapterError> {
        let (protocol, pipeline) = self.build(description)?;
        let events = protocol.get_n_elements(n).await?;
        let mut previewed = Vec::with_capacity(events.len());
        for event in events {
            match pipeline.transform(event) {
                Ok(Some(event)) => previewed.push(event),
                Ok(None) => {}
                Err(e) => warn!(adapter_id = %description.id, error = %e, "preview event failed transform"),
            }
        }
        Ok(previewed)
    }
}
