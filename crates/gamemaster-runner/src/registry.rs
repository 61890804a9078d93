//! The registry owns every operated game.
//!
//! All structural changes (attach, detach, teardown) happen under a single
//! lock, so at any point in time a game has at most one operator and every
//! operator in the map is active. Operators themselves run unsynchronized
//! once started.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::Duration;

use gamemaster_chain::{AuthContext, ChainClient, ResourceId};
use gamemaster_protocol::{ECHO_PREFIX, ResourceStatus};
use tokio::sync::{Mutex, watch};
use tracing::{error, info, warn};

use crate::error::RegistryError;
use crate::worker::{Worker, WorkerError};

/// Read-only state shared by the registry and all of its operators
pub struct OperatorContext {
    /// Real chain client, or the simulated one in debug mode
    pub client: Arc<dyn ChainClient>,
    /// Absent in debug mode
    pub auth: Option<AuthContext>,
    /// Wait between two ticks of an operator
    pub tick_interval: Duration,
}

struct RegistryState {
    operated: HashMap<ResourceId, Worker>,
    dead: bool,
}

pub struct Registry {
    state: Mutex<RegistryState>,
    context: Arc<OperatorContext>,
    cancel_timeout: Option<Duration>,
    /// Flipped to true when the registry stops accepting requests
    closed_tx: watch::Sender<bool>,
}

impl Registry {
    pub fn new(context: OperatorContext, cancel_timeout: Option<Duration>) -> Self {
        let (closed_tx, _) = watch::channel(false);
        Self {
            state: Mutex::new(RegistryState {
                operated: HashMap::new(),
                dead: false,
            }),
            context: Arc::new(context),
            cancel_timeout,
            closed_tx,
        }
    }

    /// Receiver that flips to `true` once the registry is closed
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.closed_tx.subscribe()
    }

    /// Start operating the game at `resource_id`.
    ///
    /// Returns once the operator task is spawned.
    pub async fn attach(&self, resource_id: ResourceId) -> Result<(), RegistryError> {
        let mut state = self.state.lock().await;
        if state.dead {
            return Err(RegistryError::ShuttingDown);
        }

        match state.operated.entry(resource_id) {
            Entry::Occupied(entry) => {
                warn!(target: "registry", "{} already operated", entry.key());
                Err(RegistryError::AlreadyOperated(entry.key().clone()))
            }
            Entry::Vacant(slot) => {
                let mut worker = Worker::new(slot.key().clone(), self.context.clone());
                if let Err(e) = worker.start() {
                    error!(target: "registry", "inconsistent state: {}", e);
                    panic!("inconsistent state in Registry::attach: {e}");
                }
                let worker = slot.insert(worker);
                info!(target: "registry", "{} connected successfully", worker.resource_id());
                Ok(())
            }
        }
    }

    /// Stop operating the game at `resource_id`.
    ///
    /// Blocks until the operator has acknowledged the stop. Without a cancel
    /// timeout this can wait as long as a stuck chain call does.
    pub async fn detach(&self, resource_id: &ResourceId) -> Result<(), RegistryError> {
        let mut state = self.state.lock().await;
        if state.dead {
            return Err(RegistryError::ShuttingDown);
        }

        let Some(worker) = state.operated.get_mut(resource_id) else {
            return Err(RegistryError::NotOperated(resource_id.clone()));
        };
        let result = stop_worker(worker, self.cancel_timeout).await;
        state.operated.remove(resource_id);

        if result.is_ok() {
            info!(target: "registry", "{} disconnected successfully", resource_id);
        }
        result
    }

    /// Liveness check; touches no shared state
    pub fn echo(&self, message: &str) -> Result<String, RegistryError> {
        if message.is_empty() {
            return Err(RegistryError::EmptyMessage);
        }
        Ok(format!("{ECHO_PREFIX}{message}"))
    }

    /// Statistics of every operated game, sorted by id
    pub async fn list(&self) -> Result<Vec<ResourceStatus>, RegistryError> {
        let state = self.state.lock().await;
        if state.dead {
            return Err(RegistryError::ShuttingDown);
        }

        let mut resources: Vec<ResourceStatus> = state
            .operated
            .values()
            .map(|worker| worker.stats().snapshot(worker.resource_id()))
            .collect();
        resources.sort_by(|a, b| a.resource_id.cmp(&b.resource_id));
        Ok(resources)
    }

    /// Stop every operator, mark the registry dead and close listeners.
    ///
    /// Later calls do nothing.
    pub async fn teardown(&self) {
        let mut state = self.state.lock().await;
        if state.dead {
            return;
        }

        let mut operated: Vec<(ResourceId, Worker)> = state.operated.drain().collect();
        operated.sort_by(|a, b| a.0.cmp(&b.0));
        for (resource_id, mut worker) in operated {
            if let Err(e) = stop_worker(&mut worker, self.cancel_timeout).await {
                warn!(target: "registry", "{} did not stop cleanly: {}", resource_id, e);
            }
        }
        info!(target: "registry", "all game operators stopped");

        state.dead = true;
        self.closed_tx.send_replace(true);
        info!(target: "registry", "dead");
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.operated.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn is_operated(&self, resource_id: &ResourceId) -> bool {
        self.state.lock().await.operated.contains_key(resource_id)
    }

    pub async fn is_dead(&self) -> bool {
        self.state.lock().await.dead
    }
}

/// Stop one operator, translating worker errors for the caller.
///
/// Finding an inactive operator in the map is a broken invariant and panics.
async fn stop_worker(worker: &mut Worker, timeout: Option<Duration>) -> Result<(), RegistryError> {
    match worker.stop(timeout).await {
        Ok(()) => Ok(()),
        Err(WorkerError::TimedOut(resource_id, limit)) => {
            warn!(
                target: "registry",
                "{} did not acknowledge stop within {:?}, operator aborted",
                resource_id, limit
            );
            Err(RegistryError::CancelTimedOut(resource_id))
        }
        Err(WorkerError::LoopExited(resource_id)) => {
            // Nothing left running; the game is released either way
            error!(target: "registry", "operator loop for {} had already exited", resource_id);
            Ok(())
        }
        Err(e @ (WorkerError::NotActive(_) | WorkerError::AlreadyStarted(_))) => {
            error!(target: "registry", "inconsistent state: {}", e);
            panic!("inconsistent state in Registry::detach: {e}");
        }
    }
}
