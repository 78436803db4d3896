//! Resource usage sampling for running tasks
//!
//! A background loop that polls cpu and memory for every running task on a
//! fixed cadence and emits [`TaskEvent::Stats`] into the supervisor's hub.
//! A task that cannot be sampled reports zeroes rather than being skipped,
//! and a task that stops gets one zeroed reading immediately so consumers
//! never display stale figures.

use crate::supervisor::Supervisor;
use deck_foundation::{EventHub, TaskEvent, TaskId};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, System};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Cadence of the periodic sweep
const DEFAULT_USAGE_INTERVAL: Duration = Duration::from_secs(1);

/// Periodic cpu/memory sampler bound to one supervisor
pub struct UsageSampler {
    supervisor: Arc<Supervisor>,
    interval: Duration,
}

impl UsageSampler {
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self {
            supervisor,
            interval: DEFAULT_USAGE_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run the sampler until the supervisor's event hub goes away
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let events = self.supervisor.events().clone();
        let mut status_rx = self.supervisor.subscribe();
        // cpu_usage needs deltas between refreshes, so the System persists
        let mut system = System::new();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        debug!("Usage sampler running every {:?}", self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sample_all(&mut system, &events).await;
                }
                event = status_rx.recv() => match event {
                    Ok(TaskEvent::Status { task_id, running: false }) => {
                        events.emit(TaskEvent::zeroed_stats(task_id));
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Usage sampler fell behind by {} events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        debug!("Usage sampler stopped");
    }

    async fn sample_all(&self, system: &mut System, events: &EventHub) {
        for id in self.supervisor.list_running_task_ids().await {
            let event = match self.supervisor.get_task_pid(&id).await {
                Some(pid) => sample_process(system, &id, pid),
                None => TaskEvent::zeroed_stats(id),
            };
            events.emit(event);
        }
    }
}

fn sample_process(system: &mut System, id: &TaskId, pid: u32) -> TaskEvent {
    let pid = Pid::from_u32(pid);
    let refreshed = system
        .refresh_process_specifics(pid, ProcessRefreshKind::new().with_cpu().with_memory());
    if !refreshed {
        return TaskEvent::zeroed_stats(id.clone());
    }
    match system.process(pid) {
        Some(process) => TaskEvent::Stats {
            task_id: id.clone(),
            cpu: process.cpu_usage() as f64,
            memory_mb: process.memory() as f64 / 1024.0 / 1024.0,
        },
        None => TaskEvent::zeroed_stats(id.clone()),
    }
}
