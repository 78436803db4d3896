//! PTY plumbing - pseudo-terminal spawning for supervised tasks
//!
//! Opens a pty pair, spawns the task command on the slave side with the
//! forced terminal environment, and wires the master side into a blocking
//! reader thread feeding an output channel. Interactive semantics (line
//! discipline, control characters such as Ctrl-C) come for free from the
//! pty; nothing here interprets the byte stream.

use deck_foundation::{Error, Result, TaskConfig};
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, ExitStatus, MasterPty, PtySize};
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Terminal type advertised to spawned processes
const TERM: &str = "xterm-256color";

/// Read size for the pty master
const READ_BUFFER_SIZE: usize = 8192;

/// Depth of the raw output channel between reader thread and collector
const OUTPUT_CHANNEL_CAPACITY: usize = 128;

/// Terminal geometry for spawned tasks
#[derive(Debug, Clone, Copy)]
pub struct TerminalSize {
    pub rows: u16,
    pub cols: u16,
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { rows: 30, cols: 120 }
    }
}

/// Everything a successful spawn hands back to the supervisor.
///
/// The handle parts (`master`, `writer`, `killer`, `pid`) live in the
/// runtime record while the process runs; `output` and `wait` are consumed
/// by the per-spawn collector.
pub struct PtySpawn {
    /// OS process id of the direct child
    pub pid: Option<u32>,
    /// Master side of the pty; kept open for the process lifetime
    pub master: Box<dyn MasterPty + Send>,
    /// Write half feeding the process through the line discipline
    pub writer: Box<dyn Write + Send>,
    /// Kill handle usable while the wait runs elsewhere
    pub killer: Box<dyn ChildKiller + Send + Sync>,
    /// Raw output chunks in arrival order; closes when the reader is done
    pub output: mpsc::Receiver<Vec<u8>>,
    /// Resolves once with the process exit status
    pub wait: JoinHandle<std::io::Result<ExitStatus>>,
}

/// Spawn a task command attached to a fresh pty.
///
/// The child inherits the parent environment plus `TERM`, runs in `cwd`,
/// and becomes the session leader of the new pty, which is what lets a
/// later group signal take down its descendants too.
pub fn spawn_task_pty(task: &TaskConfig, cwd: &Path, size: TerminalSize) -> Result<PtySpawn> {
    let pty_system = native_pty_system();

    let pair = pty_system
        .openpty(PtySize {
            rows: size.rows,
            cols: size.cols,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| Error::Pty(format!("Failed to open PTY: {}", e)))?;

    let mut cmd = CommandBuilder::new(&task.command);
    cmd.args(&task.args);
    cmd.cwd(cwd);
    cmd.env("TERM", TERM);

    let child = pair
        .slave
        .spawn_command(cmd)
        .map_err(|e| Error::Task(format!("Failed to spawn {:?}: {}", task.command, e)))?;

    // The slave side belongs to the child now; keeping it open here would
    // stop the master from ever reporting end-of-output.
    drop(pair.slave);

    let reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| Error::Pty(format!("Failed to clone PTY reader: {}", e)))?;
    let writer = pair
        .master
        .take_writer()
        .map_err(|e| Error::Pty(format!("Failed to take PTY writer: {}", e)))?;

    let pid = child.process_id();
    let killer = child.clone_killer();

    let (tx, output) = mpsc::channel::<Vec<u8>>(OUTPUT_CHANNEL_CAPACITY);
    tokio::task::spawn_blocking(move || pump_output(reader, tx));

    let wait = tokio::task::spawn_blocking(move || {
        let mut child = child;
        child.wait()
    });

    Ok(PtySpawn {
        pid,
        master: pair.master,
        writer,
        killer,
        output,
        wait,
    })
}

/// Blocking read loop on the pty master.
///
/// Ends on end-of-output (plain EOF on some platforms, EIO on Linux once
/// the last slave handle closes) or when the receiving side goes away.
fn pump_output(mut reader: Box<dyn Read + Send>, tx: mpsc::Sender<Vec<u8>>) {
    let mut buf = [0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.blocking_send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(e) => {
                debug!("PTY reader closed: {}", e);
                break;
            }
        }
    }
}
