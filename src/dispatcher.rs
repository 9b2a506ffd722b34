//! Remote command dispatcher
//!
//! Commands are validated against the current vehicle state, queued, and
//! executed one at a time by a single worker task in submission order. Each
//! execution sleeps a simulated delay, samples success, and applies the
//! command's transition under the vehicle lock.
//!
//! Lock order: dispatch state, then vehicle.

mod transitions;

use crate::command::{CommandKind, RemoteCommand};
use crate::config::CommandsConfig;
use crate::error::{LandauError, Result};
use crate::logging::{StructuredLogger, get_logger};
use crate::persistence::CommandStore;
use crate::queue::CommandQueue;
use crate::safety;
use crate::vehicle::VehicleHandle;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Error message recorded for a sampled failure
pub const SIMULATED_FAILURE: &str = "Simulated failure";

/// Message recorded for commands found pending at startup
const INTERRUPTED: &str = "Interrupted before completion";

/// Commands keyed by id, in submission order
#[derive(Debug, Default)]
struct CommandHistory {
    order: Vec<Uuid>,
    entries: HashMap<Uuid, RemoteCommand>,
}

impl CommandHistory {
    fn insert(&mut self, command: RemoteCommand) {
        if self.entries.insert(command.id, command.clone()).is_none() {
            self.order.push(command.id);
        }
    }

    fn get(&self, id: &Uuid) -> Option<&RemoteCommand> {
        self.entries.get(id)
    }

    fn get_mut(&mut self, id: &Uuid) -> Option<&mut RemoteCommand> {
        self.entries.get_mut(id)
    }

    fn all(&self) -> Vec<RemoteCommand> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).cloned())
            .collect()
    }
}

#[derive(Default)]
struct DispatchState {
    queue: CommandQueue,
    worker_running: bool,
    history: CommandHistory,
    waiters: HashMap<Uuid, oneshot::Sender<RemoteCommand>>,
}

struct DispatcherInner {
    vehicle: VehicleHandle,
    settings: CommandsConfig,
    store: Arc<dyn CommandStore>,
    state: Mutex<DispatchState>,
    rng: Mutex<StdRng>,
    persist_lock: Mutex<()>,
    logger: StructuredLogger,
}

/// Handle to a submitted command
#[derive(Debug)]
pub struct CommandHandle {
    id: Uuid,
    rx: oneshot::Receiver<RemoteCommand>,
}

impl CommandHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the command to reach a terminal status. A command cancelled
    /// while queued resolves to a conflict error.
    pub async fn wait(self) -> Result<RemoteCommand> {
        self.rx
            .await
            .map_err(|_| LandauError::conflict(format!("Command {} was cancelled", self.id)))
    }
}

/// FIFO, single-flight remote command executor
#[derive(Clone)]
pub struct CommandDispatcher {
    inner: Arc<DispatcherInner>,
}

impl CommandDispatcher {
    /// Create a dispatcher and load the command history from the store.
    /// Commands left pending by a previous run are marked failed, except
    /// those that were cancelled.
    pub fn new(
        vehicle: VehicleHandle,
        settings: CommandsConfig,
        store: Arc<dyn CommandStore>,
    ) -> Result<Self> {
        let logger = get_logger("dispatcher");
        let settings = sanitize(settings);

        let mut history = CommandHistory::default();
        let mut interrupted = 0usize;
        for mut command in store.load_commands()? {
            if !command.is_terminal() && !command.cancelled {
                command.mark_failed(INTERRUPTED, 0)?;
                interrupted += 1;
            }
            history.insert(command);
        }
        if interrupted > 0 {
            logger.warn(&format!(
                "Marked {} pending commands from a previous run as failed",
                interrupted
            ));
        }

        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let dispatcher = Self {
            inner: Arc::new(DispatcherInner {
                vehicle,
                settings,
                store,
                state: Mutex::new(DispatchState {
                    history,
                    ..Default::default()
                }),
                rng: Mutex::new(rng),
                persist_lock: Mutex::new(()),
                logger,
            }),
        };
        if interrupted > 0 {
            dispatcher.inner.persist();
        }
        Ok(dispatcher)
    }

    /// Validate and queue a command. Must be called from within a Tokio
    /// runtime; the worker task is spawned on demand.
    pub fn send(&self, kind: CommandKind) -> Result<CommandHandle> {
        self.inner
            .vehicle
            .read(|v| safety::validate_command(v, &kind))
            .inspect_err(|reason| {
                self.inner.logger.info(&format!(
                    "Rejected {} command: {}",
                    kind.command_type(),
                    reason
                ))
            })?;

        let command = RemoteCommand::new(kind);
        let id = command.id;
        let (tx, rx) = oneshot::channel();

        let spawn_worker = {
            let mut st = self.inner.state.lock();
            st.history.insert(command.clone());
            st.waiters.insert(id, tx);
            st.queue.enqueue(command.clone());
            !std::mem::replace(&mut st.worker_running, true)
        };

        self.inner.logger.info(&format!(
            "Queued {} command {}",
            command.command_type(),
            id
        ));
        self.inner.persist();

        if spawn_worker {
            tokio::spawn(run_worker(self.inner.clone()));
        }

        Ok(CommandHandle { id, rx })
    }

    pub fn get_status(&self, id: Uuid) -> Result<RemoteCommand> {
        self.inner
            .state
            .lock()
            .history
            .get(&id)
            .cloned()
            .ok_or_else(|| LandauError::not_found(format!("Command not found: {}", id)))
    }

    /// Cancel a queued command. It stays in the history as `Pending` and
    /// its waiter resolves to a conflict. The executing command cannot be
    /// cancelled.
    pub fn cancel(&self, id: Uuid) -> bool {
        let removed = {
            let mut guard = self.inner.state.lock();
            let st = &mut *guard;
            if st.queue.remove_by_id(id) {
                if let Some(entry) = st.history.get_mut(&id)
                    && let Err(e) = entry.mark_cancelled()
                {
                    self.inner.logger.error(&format!(
                        "Could not mark command {} cancelled: {}",
                        id, e
                    ));
                }
                st.waiters.remove(&id);
                true
            } else {
                false
            }
        };
        if removed {
            self.inner
                .logger
                .info(&format!("Cancelled queued command {}", id));
            self.inner.persist();
        }
        removed
    }

    /// Mark a queued or executing command as timed out. A queued command is
    /// dropped from the queue; an executing command's result is discarded.
    pub fn timeout(&self, id: Uuid, timeout_ms: u64) -> Result<RemoteCommand> {
        let (command, waiter) = {
            let mut guard = self.inner.state.lock();
            let st = &mut *guard;
            let entry = st
                .history
                .get_mut(&id)
                .ok_or_else(|| LandauError::not_found(format!("Command not found: {}", id)))?;
            entry.mark_timeout(timeout_ms)?;
            st.queue.remove_by_id(id);
            (entry.clone(), st.waiters.remove(&id))
        };

        self.inner.logger.warn(&format!(
            "Command {} timed out after {}ms",
            id, timeout_ms
        ));
        self.inner.persist();
        if let Some(tx) = waiter {
            let _ = tx.send(command.clone());
        }
        Ok(command)
    }

    /// All known commands, oldest first
    pub fn history(&self) -> Vec<RemoteCommand> {
        self.inner.state.lock().history.all()
    }

    /// Commands waiting behind the executing one
    pub fn pending(&self) -> Vec<RemoteCommand> {
        self.inner.state.lock().queue.pending()
    }

    pub fn executing(&self) -> Option<RemoteCommand> {
        self.inner.state.lock().queue.executing().cloned()
    }
}

fn sanitize(mut settings: CommandsConfig) -> CommandsConfig {
    settings.success_rate = if settings.success_rate.is_nan() {
        0.0
    } else {
        settings.success_rate.clamp(0.0, 1.0)
    };
    if settings.min_delay_ms > settings.max_delay_ms {
        settings.max_delay_ms = settings.min_delay_ms;
    }
    settings
}

impl DispatcherInner {
    fn sample_outcome(&self) -> (u64, bool) {
        let mut rng = self.rng.lock();
        let delay_ms = rng.gen_range(self.settings.min_delay_ms..=self.settings.max_delay_ms);
        let succeed = rng.gen_bool(self.settings.success_rate);
        (delay_ms, succeed)
    }

    /// Record the outcome of an executed command
    fn complete(&self, command: &RemoteCommand, delay_ms: u64, succeed: bool) {
        let finished = {
            let mut guard = self.state.lock();
            let st = &mut *guard;
            st.queue.set_executing(None);

            match st.history.get_mut(&command.id) {
                Some(entry) if !entry.is_terminal() => {
                    let marked = if succeed {
                        let applied = self.vehicle.update(|v| {
                            transitions::apply(v, &entry.kind, delay_ms).map_err(LandauError::from)
                        });
                        match applied {
                            Ok(()) => entry.mark_success(delay_ms),
                            Err(LandauError::InvalidCommand { reason }) => {
                                entry.mark_failed(reason.to_string(), delay_ms)
                            }
                            Err(e) => entry.mark_failed(e.to_string(), delay_ms),
                        }
                    } else {
                        entry.mark_failed(SIMULATED_FAILURE, delay_ms)
                    };
                    if let Err(e) = marked {
                        self.logger.error(&format!(
                            "Could not record outcome of command {}: {}",
                            command.id, e
                        ));
                    }
                    Some((entry.clone(), st.waiters.remove(&command.id)))
                }
                _ => None,
            }
        };

        let Some((finished, waiter)) = finished else {
            self.logger.debug(&format!(
                "Discarding result of command {} (already finished)",
                command.id
            ));
            return;
        };

        self.logger.info(&format!(
            "{} command {} finished: {:?} in {}ms",
            finished.command_type(),
            finished.id,
            finished.status,
            delay_ms
        ));
        self.persist();
        if let Some(tx) = waiter {
            let _ = tx.send(finished);
        }
    }

    /// Write the full history. Serialized so an older snapshot never
    /// overwrites a newer one.
    fn persist(&self) {
        let _guard = self.persist_lock.lock();
        let snapshot = self.state.lock().history.all();
        if let Err(e) = self.store.save_commands(&snapshot) {
            self.logger
                .error(&format!("Failed to persist command history: {}", e));
        }
    }
}

/// Drain the queue one command at a time, then exit
async fn run_worker(inner: Arc<DispatcherInner>) {
    loop {
        let next = {
            let mut st = inner.state.lock();
            match st.queue.dequeue() {
                Some(command) => {
                    st.queue.set_executing(Some(command.clone()));
                    command
                }
                None => {
                    st.worker_running = false;
                    return;
                }
            }
        };

        let (delay_ms, succeed) = inner.sample_outcome();
        inner.logger.debug(&format!(
            "Executing {} command {} ({}ms)",
            next.command_type(),
            next.id,
            delay_ms
        ));
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        inner.complete(&next, delay_ms, succeed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandStatus;
    use crate::persistence::MemoryStore;
    use crate::vehicle::{LockStatus, VehicleState};

    fn reliable() -> CommandsConfig {
        CommandsConfig {
            success_rate: 1.0,
            min_delay_ms: 1000,
            max_delay_ms: 1000,
            seed: Some(42),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_command_is_not_queued() {
        let vehicle = VehicleHandle::new(VehicleState::new(50.0));
        let dispatcher =
            CommandDispatcher::new(vehicle, reliable(), Arc::new(MemoryStore::new())).unwrap();
        let err = dispatcher.send(CommandKind::Lock).unwrap_err();
        assert!(matches!(err, LandauError::InvalidCommand { .. }));
        assert!(dispatcher.history().is_empty());
        assert!(dispatcher.pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unlock_succeeds_after_delay() {
        let vehicle = VehicleHandle::new(VehicleState::new(50.0));
        let dispatcher =
            CommandDispatcher::new(vehicle.clone(), reliable(), Arc::new(MemoryStore::new()))
                .unwrap();
        let handle = dispatcher.send(CommandKind::Unlock).unwrap();
        assert_eq!(
            dispatcher.get_status(handle.id()).unwrap().status,
            CommandStatus::Pending
        );
        let done = handle.wait().await.unwrap();
        assert_eq!(done.status, CommandStatus::Success);
        assert_eq!(done.response_time_ms, Some(1000));
        assert_eq!(vehicle.snapshot().lock_status, LockStatus::Unlocked);
    }

    #[tokio::test(start_paused = true)]
    async fn sampled_failure_leaves_state_alone() {
        let vehicle = VehicleHandle::new(VehicleState::new(50.0));
        let settings = CommandsConfig {
            success_rate: 0.0,
            ..reliable()
        };
        let dispatcher =
            CommandDispatcher::new(vehicle.clone(), settings, Arc::new(MemoryStore::new()))
                .unwrap();
        let done = dispatcher
            .send(CommandKind::Unlock)
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(done.status, CommandStatus::Failed);
        assert_eq!(done.error_message.as_deref(), Some(SIMULATED_FAILURE));
        assert_eq!(vehicle.snapshot().lock_status, LockStatus::Locked);
    }

    #[tokio::test]
    async fn cancelled_commands_survive_restart_as_pending() {
        let store = Arc::new(MemoryStore::new());
        let mut cancelled = RemoteCommand::new(CommandKind::HonkFlash);
        cancelled.mark_cancelled().unwrap();
        store.save_commands(&[cancelled.clone()]).unwrap();

        let vehicle = VehicleHandle::new(VehicleState::new(50.0));
        let dispatcher = CommandDispatcher::new(vehicle, reliable(), store).unwrap();
        let loaded = dispatcher.get_status(cancelled.id).unwrap();
        assert_eq!(loaded.status, CommandStatus::Pending);
        assert!(loaded.cancelled);
    }

    #[tokio::test]
    async fn pending_commands_from_store_are_marked_failed() {
        let store = Arc::new(MemoryStore::new());
        let stale = RemoteCommand::new(CommandKind::HonkFlash);
        store.save_commands(&[stale.clone()]).unwrap();
        let vehicle = VehicleHandle::new(VehicleState::new(50.0));
        let dispatcher = CommandDispatcher::new(vehicle, reliable(), store.clone()).unwrap();
        let loaded = dispatcher.get_status(stale.id).unwrap();
        assert_eq!(loaded.status, CommandStatus::Failed);
        assert_eq!(store.load_commands().unwrap()[0].status, CommandStatus::Failed);
    }
}
