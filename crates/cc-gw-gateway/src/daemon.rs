use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};

/// `~/.cc-gw/gateway.pid` — the single source of truth for whether a
/// background instance is running. No corpus precedent exists for
/// daemonizing a Rust service; the detached-spawn mechanics here are
/// adapted from `skynet_gateway::update::restart_service`'s
/// null-stdio `Command::spawn`, generalized from "relaunch after
/// update" to "launch in the background and record the pid".
pub fn pid_file_path() -> PathBuf {
    cc_gw_core::home_dir().join("gateway.pid")
}

fn read_pid() -> Option<u32> {
    let contents = std::fs::read_to_string(pid_file_path()).ok()?;
    contents.trim().parse().ok()
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    // signal 0: no-op, only checks whether the pid exists and is
    // signalable by this user.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    false
}

/// `None` if no pid file, or its pid is no longer alive (and the stale
/// file is removed); `Some(pid)` if a live instance owns it.
pub fn running_pid() -> Option<u32> {
    let pid = read_pid()?;
    if process_alive(pid) {
        Some(pid)
    } else {
        let _ = std::fs::remove_file(pid_file_path());
        None
    }
}

fn write_pid(pid: u32) -> Result<()> {
    let path = pid_file_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, pid.to_string())?;
    Ok(())
}

/// Spawn `self --foreground [--port N]` detached from the controlling
/// terminal, with stdio redirected to /dev/null, and record its pid.
/// Returns once the child is spawned; it does not wait for the server
/// inside it to finish binding.
pub fn spawn_background(port: Option<u16>) -> Result<u32> {
    if let Some(pid) = running_pid() {
        bail!("gateway already running (pid {pid})");
    }

    let exe = std::env::current_exe().context("cannot determine current executable path")?;
    let mut cmd = Command::new(exe);
    cmd.arg("start").arg("--foreground");
    if let Some(port) = port {
        cmd.arg("--port").arg(port.to_string());
    }
    cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());

    let child = cmd.spawn().context("failed to spawn background gateway process")?;
    let pid = child.id();
    write_pid(pid)?;
    Ok(pid)
}

/// Send `SIGTERM` to the running instance and remove the pid file.
pub fn stop() -> Result<u32> {
    let Some(pid) = running_pid() else {
        bail!("gateway is not running");
    };

    #[cfg(unix)]
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }

    let _ = std::fs::remove_file(pid_file_path());
    Ok(pid)
}

/// Process the pid file records, for `status`.
pub fn status() -> Option<u32> {
    running_pid()
}
