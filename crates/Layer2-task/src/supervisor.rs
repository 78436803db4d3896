//! Supervisor - process lifecycle for configured tasks
//!
//! Owns the runtime table: one record per task id holding the latest task
//! snapshot, the live process handle while running, and the scrollback
//! buffer. Records persist across stop/restart cycles so the scrollback
//! survives; pruning them belongs to the configuration layer.
//!
//! Every boundary operation reports its outcome as a boolean or a plain
//! value and emits [`TaskEvent`]s; failures never propagate as panics or
//! errors past this type.

use crate::kill::force_kill_tree;
use crate::pty::{spawn_task_pty, PtySpawn, TerminalSize};
use crate::registry::TaskRegistry;
use crate::scrollback::{ScrollbackBuffer, DEFAULT_SCROLLBACK_BYTES};
use deck_foundation::{EventHub, TaskConfig, TaskEvent, TaskId, DEFAULT_EVENT_CAPACITY};
use portable_pty::{ChildKiller, ExitStatus, MasterPty};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, Mutex, RwLock};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Window granted to the cooperative interrupt before escalation
const INTERRUPT_WINDOW: Duration = Duration::from_millis(1500);

/// Window granted to the forced kill before reporting failure
const KILL_WINDOW: Duration = Duration::from_millis(1000);

/// How long an exited task's already-buffered output may keep arriving
const EXIT_DRAIN_GRACE: Duration = Duration::from_millis(100);

// ============================================================================
// Configuration
// ============================================================================

/// Supervisor tuning knobs
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Terminal geometry for spawned tasks
    pub terminal_size: TerminalSize,

    /// Scrollback cap per task, bytes
    pub scrollback_bytes: usize,

    /// Wait after the interrupt character before the forced kill
    pub interrupt_window: Duration,

    /// Wait after the forced kill before reporting the task still running
    pub kill_window: Duration,

    /// Capacity of the outward event channel
    pub event_capacity: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            terminal_size: TerminalSize::default(),
            scrollback_bytes: DEFAULT_SCROLLBACK_BYTES,
            interrupt_window: INTERRUPT_WINDOW,
            kill_window: KILL_WINDOW,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl SupervisorConfig {
    pub fn with_terminal_size(mut self, size: TerminalSize) -> Self {
        self.terminal_size = size;
        self
    }

    pub fn with_scrollback_bytes(mut self, bytes: usize) -> Self {
        self.scrollback_bytes = bytes;
        self
    }

    pub fn with_stop_windows(mut self, interrupt: Duration, kill: Duration) -> Self {
        self.interrupt_window = interrupt;
        self.kill_window = kill;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

// ============================================================================
// Runtime record
// ============================================================================

/// Live process handles, present only while the task runs
struct ProcessHandle {
    pid: Option<u32>,
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    /// Flipped once by the collector when this spawn fully wound down
    exited_tx: watch::Sender<bool>,
}

/// Persistent per-task state; survives stop/restart cycles
struct TaskRuntime {
    /// Latest known task snapshot, refreshed on each start
    task: TaskConfig,
    /// Authoritative liveness flag
    running: bool,
    process: Option<ProcessHandle>,
    scrollback: ScrollbackBuffer,
}

impl TaskRuntime {
    fn new(task: TaskConfig, scrollback_bytes: usize) -> Self {
        Self {
            task,
            running: false,
            process: None,
            scrollback: ScrollbackBuffer::new(scrollback_bytes),
        }
    }
}

// ============================================================================
// Supervisor
// ============================================================================

/// Process supervisor for configured tasks.
///
/// One instance per process, constructed with an injected registry; there
/// is no global state, so several supervisors can coexist in tests.
pub struct Supervisor {
    registry: Arc<dyn TaskRegistry>,
    runtimes: Arc<RwLock<HashMap<TaskId, Arc<Mutex<TaskRuntime>>>>>,
    events: EventHub,
    config: SupervisorConfig,
}

impl Supervisor {
    /// Create a supervisor with default configuration
    pub fn new(registry: Arc<dyn TaskRegistry>) -> Self {
        Self::with_config(registry, SupervisorConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(registry: Arc<dyn TaskRegistry>, config: SupervisorConfig) -> Self {
        Self {
            registry,
            runtimes: Arc::new(RwLock::new(HashMap::new())),
            events: EventHub::new(config.event_capacity),
            config,
        }
    }

    /// The hub this supervisor emits into
    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Attach an event subscriber
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Lifecycle operations
    // ------------------------------------------------------------------

    /// Start a task by id.
    ///
    /// Returns false when the id is unknown, the configured command is
    /// blank, or the spawn fails; true when the task is running afterwards,
    /// including the case where it already was.
    pub async fn start_task(&self, id: &TaskId) -> bool {
        let Some(resolved) = self.registry.resolve(id) else {
            warn!("Cannot start unknown task {}", id);
            return false;
        };
        if resolved.task.command.trim().is_empty() {
            warn!("Task {} has a blank command", id);
            return false;
        }

        let runtime = self.ensure_runtime(&resolved.task).await;
        let mut rec = runtime.lock().await;
        // Snapshot refresh happens even when the process keeps running, so a
        // task renamed in the registry is picked up on the next start call
        rec.task = resolved.task.clone();
        if rec.running {
            debug!("Task {} is already running", id);
            return true;
        }

        match spawn_task_pty(&resolved.task, &resolved.cwd, self.config.terminal_size) {
            Ok(spawn) => {
                let PtySpawn {
                    pid,
                    master,
                    writer,
                    killer,
                    output,
                    wait,
                } = spawn;
                let (exited_tx, _exited_rx) = watch::channel(false);
                rec.running = true;
                rec.process = Some(ProcessHandle {
                    pid,
                    master,
                    writer,
                    killer,
                    exited_tx,
                });
                info!(
                    "Started task {} ({} {:?}) pid {:?} in {}",
                    id,
                    resolved.task.command,
                    resolved.task.args,
                    pid,
                    resolved.cwd.display()
                );
                self.events.emit(TaskEvent::Status {
                    task_id: id.clone(),
                    running: true,
                });

                let task_id = id.clone();
                let runtime = Arc::clone(&runtime);
                let events = self.events.clone();
                tokio::spawn(Self::collect_output(task_id, runtime, events, output, wait));
                true
            }
            Err(err) => {
                let chunk = format!(
                    "\r\n[taskdeck] Failed to start task {:?}: {}\r\n",
                    rec.task.name, err
                );
                warn!("Failed to start task {}: {}", id, err);
                rec.scrollback.push(&chunk);
                self.events.emit(TaskEvent::Data {
                    task_id: id.clone(),
                    chunk,
                });
                self.events.emit(TaskEvent::Status {
                    task_id: id.clone(),
                    running: false,
                });
                false
            }
        }
    }

    /// Stop a task: cooperative interrupt first, forced tree kill second.
    ///
    /// Returns true when the task is not running afterwards. Safe to call
    /// concurrently for the same id; every caller waits on the same spawn.
    pub async fn stop_task(&self, id: &TaskId) -> bool {
        let Some(runtime) = self.runtime(id).await else {
            return true;
        };

        // Phase 1: 0x03 through the line discipline, then wait
        let mut exited_rx = {
            let mut rec = runtime.lock().await;
            if !rec.running {
                return true;
            }
            match rec.process.as_mut() {
                Some(handle) => {
                    let interrupt = handle
                        .writer
                        .write_all(&[0x03])
                        .and_then(|_| handle.writer.flush());
                    if let Err(e) = interrupt {
                        warn!("Failed to send interrupt to task {}: {}", id, e);
                    }
                    handle.exited_tx.subscribe()
                }
                None => return true,
            }
        };

        debug!(
            "Interrupt sent to task {}, waiting {:?} for exit",
            id, self.config.interrupt_window
        );
        if wait_for_exit(&mut exited_rx, self.config.interrupt_window).await {
            info!("Task {} stopped on interrupt", id);
            return true;
        }

        // Phase 2: the interrupt went unanswered
        warn!("Task {} ignored the interrupt, killing its process tree", id);
        {
            let mut rec = runtime.lock().await;
            if let Some(handle) = rec.process.as_mut() {
                #[cfg(unix)]
                let pgid = handle
                    .master
                    .process_group_leader()
                    .or_else(|| handle.pid.map(|p| p as i32));
                #[cfg(not(unix))]
                let pgid = None;

                if let Err(e) = force_kill_tree(pgid, handle.killer.as_mut()) {
                    warn!("Failed to kill task {}: {}", id, e);
                }
            }
        }

        if wait_for_exit(&mut exited_rx, self.config.kill_window).await {
            return true;
        }

        let rec = runtime.lock().await;
        if rec.running {
            warn!("Task {} is still running after the forced kill", id);
        }
        !rec.running
    }

    /// Stop then start; start is attempted even when the stop reported
    /// failure, mirroring how a stuck task is most often recovered
    pub async fn restart_task(&self, id: &TaskId) -> bool {
        self.stop_task(id).await;
        self.start_task(id).await
    }

    /// Forward raw input to a running task's pty
    pub async fn input_task(&self, id: &TaskId, data: &str) -> bool {
        let Some(runtime) = self.runtime(id).await else {
            return false;
        };
        let mut rec = runtime.lock().await;
        if !rec.running {
            return false;
        }
        match rec.process.as_mut() {
            Some(handle) => {
                let write = handle
                    .writer
                    .write_all(data.as_bytes())
                    .and_then(|_| handle.writer.flush());
                match write {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Failed to write input to task {}: {}", id, e);
                        false
                    }
                }
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Scrollback operations
    // ------------------------------------------------------------------

    /// Current scrollback contents; empty when the task has no record
    pub async fn get_task_buffer(&self, id: &TaskId) -> String {
        match self.runtime(id).await {
            Some(runtime) => runtime.lock().await.scrollback.contents().to_string(),
            None => String::new(),
        }
    }

    /// Reset a task's scrollback.
    ///
    /// A task never started gets an empty not-running record, so the next
    /// buffer read returns cleanly; only an unresolvable id is refused.
    pub async fn clear_task_buffer(&self, id: &TaskId) -> bool {
        if let Some(runtime) = self.runtime(id).await {
            runtime.lock().await.scrollback.clear();
            return true;
        }
        let Some(resolved) = self.registry.resolve(id) else {
            return false;
        };
        self.ensure_runtime(&resolved.task).await;
        true
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Ids of every task currently running
    pub async fn list_running_task_ids(&self) -> Vec<TaskId> {
        let runtimes = self.runtimes.read().await;
        let mut ids = Vec::new();
        for (id, runtime) in runtimes.iter() {
            if runtime.lock().await.running {
                ids.push(id.clone());
            }
        }
        ids
    }

    /// OS pid of a task's process, while it runs
    pub async fn get_task_pid(&self, id: &TaskId) -> Option<u32> {
        let runtime = self.runtime(id).await?;
        let rec = runtime.lock().await;
        rec.process.as_ref().and_then(|handle| handle.pid)
    }

    pub async fn is_task_running(&self, id: &TaskId) -> bool {
        match self.runtime(id).await {
            Some(runtime) => runtime.lock().await.running,
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Sweeps
    // ------------------------------------------------------------------

    /// Start every task flagged for auto-start; returns the started ids
    pub async fn start_auto_tasks(&self) -> Vec<TaskId> {
        let mut started = Vec::new();
        for id in self.registry.auto_start_ids() {
            if self.start_task(&id).await {
                started.push(id);
            }
        }
        if !started.is_empty() {
            info!("Auto-started {} task(s)", started.len());
        }
        started
    }

    /// Run the stop protocol for every running task, concurrently
    pub async fn stop_all(&self) {
        let ids = self.list_running_task_ids().await;
        if ids.is_empty() {
            return;
        }
        info!("Stopping {} running task(s)", ids.len());
        futures::future::join_all(ids.iter().map(|id| self.stop_task(id))).await;
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn runtime(&self, id: &TaskId) -> Option<Arc<Mutex<TaskRuntime>>> {
        self.runtimes.read().await.get(id).cloned()
    }

    async fn ensure_runtime(&self, task: &TaskConfig) -> Arc<Mutex<TaskRuntime>> {
        let mut runtimes = self.runtimes.write().await;
        let runtime = runtimes.entry(task.id.clone()).or_insert_with(|| {
            Arc::new(Mutex::new(TaskRuntime::new(
                task.clone(),
                self.config.scrollback_bytes,
            )))
        });
        Arc::clone(runtime)
    }

    /// Per-spawn collector: relays output, then settles the exit.
    ///
    /// Data events for a spawn always precede its not-running status and
    /// exit events; once the child is known dead, already-buffered output
    /// gets a short drain window and anything later is dropped.
    async fn collect_output(
        task_id: TaskId,
        runtime: Arc<Mutex<TaskRuntime>>,
        events: EventHub,
        mut output: mpsc::Receiver<Vec<u8>>,
        mut wait: JoinHandle<std::io::Result<ExitStatus>>,
    ) {
        let mut status: Option<ExitStatus> = None;
        let exited_first = loop {
            tokio::select! {
                maybe = output.recv() => match maybe {
                    Some(bytes) => Self::relay_chunk(&task_id, &runtime, &events, &bytes).await,
                    None => break false,
                },
                res = &mut wait => {
                    status = settle_wait(&task_id, res);
                    break true;
                }
            }
        };

        if exited_first {
            let drain = async {
                while let Some(bytes) = output.recv().await {
                    Self::relay_chunk(&task_id, &runtime, &events, &bytes).await;
                }
            };
            let _ = timeout(EXIT_DRAIN_GRACE, drain).await;
        } else {
            status = settle_wait(&task_id, wait.await);
        }

        let exit_code = status.as_ref().map(|s| s.exit_code() as i32).unwrap_or(-1);
        let signal = status
            .as_ref()
            .and_then(|s| s.signal())
            .map(|s| s.to_string());

        {
            let mut rec = runtime.lock().await;
            rec.running = false;
            if let Some(handle) = rec.process.take() {
                handle.exited_tx.send_replace(true);
            }
        }

        match &signal {
            Some(sig) => info!("Task {} terminated by {}", task_id, sig),
            None => info!("Task {} exited with code {}", task_id, exit_code),
        }
        events.emit(TaskEvent::Status {
            task_id: task_id.clone(),
            running: false,
        });
        events.emit(TaskEvent::Exit {
            task_id,
            exit_code,
            signal,
        });
    }

    async fn relay_chunk(
        task_id: &TaskId,
        runtime: &Arc<Mutex<TaskRuntime>>,
        events: &EventHub,
        bytes: &[u8],
    ) {
        let chunk = String::from_utf8_lossy(bytes).into_owned();
        runtime.lock().await.scrollback.push(&chunk);
        events.emit(TaskEvent::Data {
            task_id: task_id.clone(),
            chunk,
        });
    }
}

/// True once the spawn observed by `rx` has fully wound down
async fn wait_for_exit(rx: &mut watch::Receiver<bool>, window: Duration) -> bool {
    match timeout(window, rx.wait_for(|exited| *exited)).await {
        Ok(Ok(_)) => true,
        // sender dropped: the record was already finalized
        Ok(Err(_)) => true,
        Err(_) => false,
    }
}

fn settle_wait(
    task_id: &TaskId,
    res: Result<std::io::Result<ExitStatus>, JoinError>,
) -> Option<ExitStatus> {
    match res {
        Ok(Ok(status)) => Some(status),
        Ok(Err(e)) => {
            warn!("Wait for task {} failed: {}", task_id, e);
            None
        }
        Err(e) => {
            warn!("Wait handle for task {} did not complete: {}", task_id, e);
            None
        }
    }
}
