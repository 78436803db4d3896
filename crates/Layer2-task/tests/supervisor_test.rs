//! Supervisor integration tests - real child processes on a pty
//!
//! `cargo test -p deck-task --test supervisor_test -- --nocapture`

#![cfg(unix)]

use anyhow::{anyhow, Result};
use deck_task::{
    ConfigRegistry, ProjectConfig, Supervisor, SupervisorConfig, TaskConfig, TaskEvent, TaskId,
    UsageSampler, WorkspaceConfig,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};

fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// A task running `sh -c <script>` out of /tmp
fn sh(id: &str, name: &str, script: &str) -> TaskConfig {
    TaskConfig::new(id, name, "sh").with_args(["-c", script])
}

fn supervisor_for(tasks: Vec<TaskConfig>) -> Arc<Supervisor> {
    supervisor_with_config(tasks, SupervisorConfig::default())
}

fn supervisor_with_config(tasks: Vec<TaskConfig>, config: SupervisorConfig) -> Arc<Supervisor> {
    let workspace = WorkspaceConfig::new([
        ProjectConfig::new("proj-int", "Integration", "/tmp").with_tasks(tasks)
    ]);
    Arc::new(Supervisor::with_config(
        Arc::new(ConfigRegistry::new(workspace)),
        config,
    ))
}

/// Next event matching `pred`, skipping others
async fn wait_event<F>(
    rx: &mut broadcast::Receiver<TaskEvent>,
    secs: u64,
    what: &str,
    pred: F,
) -> Result<TaskEvent>
where
    F: Fn(&TaskEvent) -> bool,
{
    let recv_loop = async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return Ok(event),
                Ok(_) => continue,
                Err(e) => return Err(anyhow!("event stream ended waiting for {}: {}", what, e)),
            }
        }
    };
    timeout(Duration::from_secs(secs), recv_loop)
        .await
        .map_err(|_| anyhow!("timed out after {}s waiting for {}", secs, what))?
}

/// Every event up to and including the first one matching `pred`
async fn collect_until<F>(
    rx: &mut broadcast::Receiver<TaskEvent>,
    secs: u64,
    what: &str,
    pred: F,
) -> Result<Vec<TaskEvent>>
where
    F: Fn(&TaskEvent) -> bool,
{
    let mut seen = Vec::new();
    let recv_loop = async {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let done = pred(&event);
                    seen.push(event);
                    if done {
                        return Ok(());
                    }
                }
                Err(e) => {
                    return Err(anyhow!("event stream ended waiting for {}: {}", what, e));
                }
            }
        }
    };
    timeout(Duration::from_secs(secs), recv_loop)
        .await
        .map_err(|_| anyhow!("timed out after {}s waiting for {}", secs, what))??;
    Ok(seen)
}

#[tokio::test]
async fn test_start_captures_output_and_exit() -> Result<()> {
    init_tracing();
    let sup = supervisor_for(vec![
        TaskConfig::new("task-hello", "Hello", "printf").with_args(["hello-deck"]),
    ]);
    let id = TaskId::from("task-hello");
    let mut rx = sup.subscribe();

    assert!(sup.start_task(&id).await, "start should succeed");

    let events = collect_until(&mut rx, 10, "exit event", |e| {
        matches!(e, TaskEvent::Exit { .. })
    })
    .await?;
    println!("Events: {:?}", events);

    assert!(
        matches!(events.first(), Some(TaskEvent::Status { running: true, .. })),
        "first event should announce the task as running"
    );
    match events.last() {
        Some(TaskEvent::Exit { exit_code, signal, .. }) => {
            assert_eq!(*exit_code, 0, "printf should exit cleanly");
            assert!(signal.is_none(), "clean exit carries no signal");
        }
        other => panic!("expected an exit event last, got {:?}", other),
    }

    // No output may trail the not-running status
    let stopped_at = events
        .iter()
        .position(|e| matches!(e, TaskEvent::Status { running: false, .. }))
        .ok_or_else(|| anyhow!("no not-running status before exit"))?;
    assert!(
        events[stopped_at..]
            .iter()
            .all(|e| !matches!(e, TaskEvent::Data { .. })),
        "output arrived after the not-running status"
    );

    assert!(sup.get_task_buffer(&id).await.contains("hello-deck"));
    assert!(!sup.is_task_running(&id).await);
    Ok(())
}

#[tokio::test]
async fn test_start_is_idempotent_while_running() -> Result<()> {
    init_tracing();
    let sup = supervisor_for(vec![sh("task-sleep", "Sleeper", "sleep 5")]);
    let id = TaskId::from("task-sleep");

    assert!(sup.start_task(&id).await);
    let pid = sup.get_task_pid(&id).await;
    assert!(pid.is_some(), "a running task has a pid");

    assert!(sup.start_task(&id).await, "second start reports running");
    assert_eq!(sup.get_task_pid(&id).await, pid, "no second process spawned");
    assert_eq!(sup.list_running_task_ids().await, vec![id.clone()]);

    sup.stop_all().await;
    assert!(sup.list_running_task_ids().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_stop_without_running_process_reports_stopped() {
    init_tracing();
    let sup = supervisor_for(vec![sh("task-idle", "Idle", "sleep 5")]);
    let started = Instant::now();

    assert!(sup.stop_task(&TaskId::from("task-idle")).await);
    assert!(
        started.elapsed() < Duration::from_millis(500),
        "stopping an idle task should not wait out any window"
    );
}

#[tokio::test]
async fn test_stop_interrupts_foreground_group() -> Result<()> {
    init_tracing();
    let sup = supervisor_for(vec![sh("task-long", "Long sleep", "sleep 30")]);
    let id = TaskId::from("task-long");
    let mut rx = sup.subscribe();

    assert!(sup.start_task(&id).await);
    sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    assert!(sup.stop_task(&id).await, "stop should report stopped");
    println!("Stopped in {:?}", started.elapsed());
    assert!(
        started.elapsed() < Duration::from_secs(3),
        "a sleeping shell should die well before the windows run out"
    );

    let events = collect_until(&mut rx, 5, "exit event", |e| {
        matches!(e, TaskEvent::Exit { .. })
    })
    .await?;
    let not_running = events
        .iter()
        .filter(|e| matches!(e, TaskEvent::Status { running: false, .. }))
        .count();
    assert_eq!(not_running, 1, "one spawn winds down exactly once");
    assert!(!sup.is_task_running(&id).await);
    Ok(())
}

#[tokio::test]
async fn test_stop_escalates_to_tree_kill() -> Result<()> {
    init_tracing();
    let sup = supervisor_for(vec![sh(
        "task-stubborn",
        "Stubborn",
        "trap '' INT TERM; sleep 30",
    )]);
    let id = TaskId::from("task-stubborn");

    assert!(sup.start_task(&id).await);
    // Give the shell time to install its traps
    sleep(Duration::from_millis(300)).await;

    let started = Instant::now();
    assert!(sup.stop_task(&id).await, "the kill phase should settle it");
    let elapsed = started.elapsed();
    println!("Escalated stop took {:?}", elapsed);

    assert!(
        elapsed >= Duration::from_millis(1400),
        "the interrupt window should have been waited out first"
    );
    assert!(elapsed < Duration::from_secs(4), "kill should land promptly");
    assert!(!sup.is_task_running(&id).await);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_stops_both_succeed() -> Result<()> {
    init_tracing();
    let sup = supervisor_for(vec![sh("task-shared", "Shared", "sleep 30")]);
    let id = TaskId::from("task-shared");

    assert!(sup.start_task(&id).await);
    sleep(Duration::from_millis(200)).await;

    let (a, b) = tokio::join!(sup.stop_task(&id), sup.stop_task(&id));
    assert!(a && b, "every caller sees the task stopped");
    assert!(!sup.is_task_running(&id).await);
    Ok(())
}

#[tokio::test]
async fn test_restart_replaces_the_process() -> Result<()> {
    init_tracing();
    let sup = supervisor_for(vec![sh("task-cycle", "Cycle", "sleep 30")]);
    let id = TaskId::from("task-cycle");

    assert!(sup.start_task(&id).await);
    let first_pid = sup.get_task_pid(&id).await;
    assert!(first_pid.is_some());
    sleep(Duration::from_millis(200)).await;

    assert!(sup.restart_task(&id).await, "restart should land running");
    let second_pid = sup.get_task_pid(&id).await;
    assert!(second_pid.is_some());
    assert_ne!(first_pid, second_pid, "restart spawns a fresh process");

    sup.stop_task(&id).await;
    Ok(())
}

#[tokio::test]
async fn test_input_reaches_the_pty() -> Result<()> {
    init_tracing();
    let sup = supervisor_for(vec![TaskConfig::new("task-cat", "Cat", "cat")]);
    let id = TaskId::from("task-cat");

    assert!(sup.start_task(&id).await);
    sleep(Duration::from_millis(200)).await;
    assert!(sup.input_task(&id, "ping\r").await, "input should be accepted");

    let echoed = timeout(Duration::from_secs(5), async {
        loop {
            if sup.get_task_buffer(&id).await.contains("ping") {
                return;
            }
            sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    assert!(echoed.is_ok(), "input should echo back through the pty");

    assert!(sup.stop_task(&id).await);
    assert!(
        !sup.input_task(&id, "pong\r").await,
        "input to a stopped task is refused"
    );
    Ok(())
}

#[tokio::test]
async fn test_spawn_failure_emits_diagnostic() -> Result<()> {
    init_tracing();
    let sup = supervisor_for(vec![TaskConfig::new(
        "task-broken",
        "Broken tool",
        "definitely-not-a-real-binary-xyz",
    )]);
    let id = TaskId::from("task-broken");
    let mut rx = sup.subscribe();

    assert!(!sup.start_task(&id).await, "a failed spawn reports false");

    let data = wait_event(&mut rx, 5, "diagnostic chunk", |e| {
        matches!(e, TaskEvent::Data { .. })
    })
    .await?;
    match data {
        TaskEvent::Data { chunk, .. } => {
            assert!(chunk.contains("Failed to start task"), "chunk: {}", chunk);
            assert!(chunk.contains("Broken tool"));
        }
        _ => unreachable!(),
    }
    wait_event(&mut rx, 5, "not-running status", |e| {
        matches!(e, TaskEvent::Status { running: false, .. })
    })
    .await?;

    let buffer = sup.get_task_buffer(&id).await;
    assert!(buffer.contains("[taskdeck] Failed to start task"), "buffer: {}", buffer);
    assert!(!sup.is_task_running(&id).await);
    Ok(())
}

#[tokio::test]
async fn test_clear_buffer_resets_scrollback() -> Result<()> {
    init_tracing();
    let sup = supervisor_for(vec![sh("task-noise", "Noise", "printf 'noisy-output'")]);
    let id = TaskId::from("task-noise");
    let mut rx = sup.subscribe();

    assert!(sup.start_task(&id).await);
    wait_event(&mut rx, 10, "exit event", |e| matches!(e, TaskEvent::Exit { .. })).await?;
    assert!(!sup.get_task_buffer(&id).await.is_empty());

    assert!(sup.clear_task_buffer(&id).await);
    assert_eq!(sup.get_task_buffer(&id).await, "");
    Ok(())
}

#[tokio::test]
async fn test_scrollback_stays_bounded() -> Result<()> {
    init_tracing();
    let script = "i=0; while [ \"$i\" -lt 200 ]; do \
                  echo line-$i-0123456789012345678901234567890123456789; \
                  i=$((i+1)); done";
    let sup = supervisor_with_config(
        vec![sh("task-flood", "Flood", script)],
        SupervisorConfig::default().with_scrollback_bytes(2048),
    );
    let id = TaskId::from("task-flood");
    let mut rx = sup.subscribe();

    assert!(sup.start_task(&id).await);
    wait_event(&mut rx, 15, "exit event", |e| matches!(e, TaskEvent::Exit { .. })).await?;

    let buffer = sup.get_task_buffer(&id).await;
    println!("Final buffer holds {} bytes", buffer.len());
    assert!(buffer.len() <= 2048, "scrollback exceeded its cap");
    assert!(
        buffer.contains("line-199"),
        "the newest output should survive eviction"
    );
    Ok(())
}

#[tokio::test]
async fn test_auto_start_and_stop_all_sweeps() -> Result<()> {
    init_tracing();
    let workspace = WorkspaceConfig::new([ProjectConfig::new("proj-auto", "Auto", "/tmp")
        .with_auto_start(true)
        .with_tasks([
            sh("task-auto", "Auto sleeper", "sleep 30").with_auto_start(true),
            sh("task-manual", "Manual", "sleep 30"),
        ])]);
    let sup = Arc::new(Supervisor::new(Arc::new(ConfigRegistry::new(workspace))));

    let started = sup.start_auto_tasks().await;
    assert_eq!(started, vec![TaskId::from("task-auto")]);
    assert!(sup.is_task_running(&TaskId::from("task-auto")).await);
    assert!(!sup.is_task_running(&TaskId::from("task-manual")).await);

    sup.stop_all().await;
    assert!(sup.list_running_task_ids().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_sampler_reports_usage_then_zeroes() -> Result<()> {
    init_tracing();
    let sup = supervisor_for(vec![sh("task-measured", "Measured", "sleep 10")]);
    let id = TaskId::from("task-measured");
    let mut rx = sup.subscribe();

    assert!(sup.start_task(&id).await);
    let sampler = UsageSampler::new(Arc::clone(&sup)).with_interval(Duration::from_millis(200));
    let handle = sampler.spawn();

    let live = wait_event(&mut rx, 5, "a live usage reading", |e| {
        matches!(e, TaskEvent::Stats { memory_mb, .. } if *memory_mb > 0.0)
    })
    .await?;
    println!("Live reading: {:?}", live);

    assert!(sup.stop_task(&id).await);
    let zeroed = wait_event(&mut rx, 5, "a zeroed usage reading", |e| {
        matches!(e, TaskEvent::Stats { cpu, memory_mb, .. } if *cpu == 0.0 && *memory_mb == 0.0)
    })
    .await?;
    println!("Zeroed reading: {:?}", zeroed);

    handle.abort();
    Ok(())
}
