//! Ownership of a pipeline's child processes.
//!
//! All stages of one run share a fresh process group when possible, so a
//! cancelled or failed run can be torn down with a single `killpg`. Children
//! are also `kill_on_drop`, which covers platforms without process groups.

use std::io;
use std::process::ExitStatus;

use log::warn;
use tokio::process::{Child, Command};

/// Kill the whole process group (best-effort; a vanished group is fine).
#[cfg(unix)]
fn kill_group(pgid: u32) -> io::Result<()> {
    let result = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
    if result == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) -> io::Result<()> {
    Ok(())
}

/// Children of one run. Dropping an armed set kills everything in it.
pub(crate) struct StageSet {
    children: Vec<Child>,
    group: Option<u32>,
    use_group: bool,
    armed: bool,
}

impl StageSet {
    pub(crate) fn new(use_group: bool) -> Self {
        Self {
            children: Vec::new(),
            group: None,
            use_group: use_group && cfg!(unix),
            armed: true,
        }
    }

    /// Prepare `cmd` to join this run's process group.
    pub(crate) fn configure(&self, cmd: &mut Command) {
        cmd.kill_on_drop(true);
        #[cfg(unix)]
        if self.use_group {
            // 0 makes the first child the group leader.
            cmd.process_group(self.group.map_or(0, |pgid| pgid as i32));
        }
    }

    pub(crate) fn push(&mut self, child: Child) {
        if self.use_group && self.group.is_none() {
            self.group = child.id();
        }
        self.children.push(child);
    }

    /// Wait for every child in pipeline order.
    pub(crate) async fn wait_all(&mut self) -> io::Result<Vec<ExitStatus>> {
        let mut statuses = Vec::with_capacity(self.children.len());
        for child in &mut self.children {
            statuses.push(child.wait().await?);
        }
        self.armed = false;
        Ok(statuses)
    }

    /// Kill and reap everything started so far.
    pub(crate) async fn abort(&mut self) {
        self.kill();
        for child in &mut self.children {
            let _ = child.wait().await;
        }
        self.armed = false;
    }

    fn kill(&mut self) {
        if let Some(pgid) = self.group
            && let Err(err) = kill_group(pgid)
        {
            warn!("failed to kill process group {pgid}: {err}");
        }
        for child in &mut self.children {
            if let Err(err) = child.start_kill()
                && err.kind() != io::ErrorKind::InvalidInput
            {
                warn!("failed to kill child {:?}: {err}", child.id());
            }
        }
    }
}

impl Drop for StageSet {
    fn drop(&mut self) {
        if self.armed && !self.children.is_empty() {
            self.kill();
        }
    }
}
