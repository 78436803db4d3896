//! Process-tree termination
//!
//! The forced half of the stop protocol. On unix the whole process group is
//! signalled, so descendants of the task (package-manager wrappers, watcher
//! children) die with the leader; elsewhere, and as a fallback, the direct
//! child is killed through the pty library.

use deck_foundation::{Error, Result};
use portable_pty::ChildKiller;
use tracing::warn;

/// Forcibly terminate a spawned process and its descendants.
///
/// `pgid` is the pty's foreground process group when known. SIGKILL is used
/// rather than a catchable signal: escalation only happens after the
/// cooperative interrupt went unanswered.
pub fn force_kill_tree(pgid: Option<i32>, killer: &mut dyn ChildKiller) -> Result<()> {
    #[cfg(unix)]
    if let Some(pgid) = pgid {
        let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            // group already gone
            return Ok(());
        }
        warn!("Failed to signal process group {}: {}", pgid, err);
    }

    #[cfg(not(unix))]
    let _ = pgid;

    killer
        .kill()
        .map_err(|e| Error::Task(format!("Failed to kill process: {}", e)))
}
