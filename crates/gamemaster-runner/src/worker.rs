//! Per-game operator.
//!
//! A `Worker` owns one game and runs a task that keeps pushing it through
//! commit -> reveal -> payout -> commit. The task stops only when the
//! registry hands it a `Command::Stop`, and the registry waits for the
//! acknowledgment before it forgets the worker.
//!
//! Known liveness risk: the stop command is only looked at between ticks.
//! A tick stuck inside a chain call holds up `Worker::stop` for as long as
//! that call takes, unless the registry was given a cancel timeout.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gamemaster_chain::{GameState, ResourceId, TickError, Transition, TxReceipt};
use gamemaster_protocol::ResourceStatus;
use thiserror::Error;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::registry::OperatorContext;

/// Commands accepted by a running operator loop
#[derive(Debug)]
pub(crate) enum Command {
    /// Quit the game. The loop answers on `ack` right before it exits.
    Stop { ack: oneshot::Sender<()> },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkerError {
    #[error("operator for {0} already started")]
    AlreadyStarted(ResourceId),

    #[error("operator for {0} already stopped")]
    NotActive(ResourceId),

    #[error("operator loop for {0} exited without acknowledging stop")]
    LoopExited(ResourceId),

    #[error("operator loop for {0} did not acknowledge stop within {1:?}")]
    TimedOut(ResourceId, Duration),
}

/// Counters written by the operator loop and read by `Registry::list`
#[derive(Debug, Default)]
pub struct WorkerStats {
    ticks: AtomicU64,
    forced: AtomicU64,
    failures: AtomicU64,
    last_state: Mutex<Option<GameState>>,
}

impl WorkerStats {
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn forced(&self) -> u64 {
        self.forced.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn last_state(&self) -> Option<GameState> {
        *self
            .last_state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn observe(&self, state: GameState) {
        *self
            .last_state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(state);
    }

    pub fn snapshot(&self, resource_id: &ResourceId) -> ResourceStatus {
        ResourceStatus {
            resource_id: resource_id.to_string(),
            ticks: self.ticks(),
            forced: self.forced(),
            failures: self.failures(),
            last_state: self.last_state().map(|state| state.to_string()),
        }
    }
}

/// One operated game
pub struct Worker {
    resource_id: ResourceId,
    active: bool,
    command_tx: mpsc::Sender<Command>,
    command_rx: Option<mpsc::Receiver<Command>>,
    task: Option<JoinHandle<()>>,
    stats: Arc<WorkerStats>,
    context: Arc<OperatorContext>,
}

impl Worker {
    pub fn new(resource_id: ResourceId, context: Arc<OperatorContext>) -> Self {
        // Single slot: at most one stop command is ever in flight
        let (command_tx, command_rx) = mpsc::channel(1);
        Self {
            resource_id,
            active: false,
            command_tx,
            command_rx: Some(command_rx),
            task: None,
            stats: Arc::new(WorkerStats::default()),
            context,
        }
    }

    pub fn resource_id(&self) -> &ResourceId {
        &self.resource_id
    }

    /// True while the operator loop runs and has not processed a stop
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn stats(&self) -> &Arc<WorkerStats> {
        &self.stats
    }

    /// Spawn the operator loop. Returns as soon as the task is spawned; the
    /// first tick may not have run yet.
    pub fn start(&mut self) -> Result<(), WorkerError> {
        let command_rx = match (self.active, self.command_rx.take()) {
            (false, Some(rx)) => rx,
            (_, rx) => {
                self.command_rx = rx;
                warn!(target: "worker", "Operator {}: game already operated", self.resource_id);
                return Err(WorkerError::AlreadyStarted(self.resource_id.clone()));
            }
        };

        let operator = OperatorLoop {
            resource_id: self.resource_id.clone(),
            context: self.context.clone(),
            stats: self.stats.clone(),
        };
        self.task = Some(tokio::spawn(operator.run(command_rx)));
        self.active = true;
        Ok(())
    }

    /// Hand a stop command to the loop and wait until it is acknowledged.
    ///
    /// With `timeout` unset this waits as long as the current tick takes.
    /// When the timeout elapses the task is aborted instead.
    pub async fn stop(&mut self, timeout: Option<Duration>) -> Result<(), WorkerError> {
        if !self.active {
            warn!(target: "worker", "Operator {}: game already stopped", self.resource_id);
            return Err(WorkerError::NotActive(self.resource_id.clone()));
        }
        self.active = false;

        let (ack_tx, ack_rx) = oneshot::channel();
        let command_tx = &self.command_tx;
        let handshake = async move {
            command_tx
                .send(Command::Stop { ack: ack_tx })
                .await
                .map_err(|_| ())?;
            ack_rx.await.map_err(|_| ())
        };

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, handshake).await {
                Ok(result) => result.map_err(|_| WorkerError::LoopExited(self.resource_id.clone())),
                Err(_) => Err(WorkerError::TimedOut(self.resource_id.clone(), limit)),
            },
            None => handshake
                .await
                .map_err(|_| WorkerError::LoopExited(self.resource_id.clone())),
        };

        if let Some(task) = self.task.take() {
            if matches!(outcome, Err(WorkerError::TimedOut(..))) {
                task.abort();
            }
            if let Err(e) = task.await
                && e.is_panic()
            {
                error!(target: "worker", "Operator {}: loop panicked: {}", self.resource_id, e);
            }
        }

        outcome
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Don't wait for the loop to notice the closed command channel
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Result of a tick that reached the chain
#[derive(Debug)]
enum TickOutcome {
    Forced {
        state: GameState,
        transition: Transition,
        receipt: TxReceipt,
    },
    Idle(GameState),
}

/// State moved into the spawned task
struct OperatorLoop {
    resource_id: ResourceId,
    context: Arc<OperatorContext>,
    stats: Arc<WorkerStats>,
}

impl OperatorLoop {
    async fn run(self, mut commands: mpsc::Receiver<Command>) {
        info!(target: "worker", "Operator {}: playing the game", self.resource_id);

        loop {
            match commands.try_recv() {
                Ok(command) => {
                    self.handle(command);
                    return;
                }
                Err(TryRecvError::Disconnected) => {
                    info!(target: "worker", "Operator {}: registry gone, quitting the game", self.resource_id);
                    return;
                }
                Err(TryRecvError::Empty) => self.tick().await,
            }

            // The wait between ticks is cut short by an incoming command
            tokio::select! {
                _ = tokio::time::sleep(self.context.tick_interval) => {}
                command = commands.recv() => match command {
                    Some(command) => {
                        self.handle(command);
                        return;
                    }
                    None => {
                        info!(target: "worker", "Operator {}: registry gone, quitting the game", self.resource_id);
                        return;
                    }
                },
            }
        }
    }

    fn handle(&self, command: Command) {
        match command {
            Command::Stop { ack } => {
                info!(target: "worker", "Operator {}: quitting the game", self.resource_id);
                // The stopper may have timed out and gone away; nothing to do then
                let _ = ack.send(());
            }
        }
    }

    async fn tick(&self) {
        self.stats.ticks.fetch_add(1, Ordering::SeqCst);

        match self.operate().await {
            Ok(TickOutcome::Forced {
                state,
                transition,
                receipt,
            }) => {
                self.stats.forced.fetch_add(1, Ordering::SeqCst);
                info!(
                    target: "worker",
                    "Operator {}: state {}, {} SUCCESS {}",
                    self.resource_id, state, transition.method(), receipt.hash
                );
            }
            Ok(TickOutcome::Idle(state)) => {
                warn!(
                    target: "worker",
                    "Operator {}: unknown operation state {}, nothing to do",
                    self.resource_id, state
                );
            }
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::SeqCst);
                error!(target: "worker", "Operator {}: {}", self.resource_id, e);
            }
        }
    }

    /// Read the game state and force the transition that moves it on
    async fn operate(&self) -> Result<TickOutcome, TickError> {
        let connection = self.context.client.connect().await?;
        let game = connection.bind(&self.resource_id).await?;

        let state = game.game_state().await?;
        self.stats.observe(state);
        debug!(target: "worker", "Operator {}: game state {}", self.resource_id, state);

        let Some(transition) = state.next_transition() else {
            return Ok(TickOutcome::Idle(state));
        };

        let receipt = game.force(self.context.auth.as_ref(), transition).await?;
        Ok(TickOutcome::Forced {
            state,
            transition,
            receipt,
        })
    }
}
