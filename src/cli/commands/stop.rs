//! `autopilot stop` — send SIGTERM to the running supervisor, escalating to
//! SIGKILL after 5s (spec §6).

use std::time::Duration;

use anyhow::{bail, Result};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::domain::models::config::Config;
use crate::supervisor::PidLock;

const ESCALATION_GRACE: Duration = Duration::from_secs(5);

pub async fn handle_stop(config: &Config) -> Result<i32> {
    let Some(pid) = PidLock::read_pid(config.pid_lock_path())? else {
        println!("no pid lock found; nothing to stop");
        return Ok(0);
    };
    let target = Pid::from_raw(pid as i32);

    if signal::kill(target, Signal::SIGTERM).is_err() {
        println!("process {pid} is not running; nothing to stop");
        return Ok(0);
    }

    let deadline = tokio::time::Instant::now() + ESCALATION_GRACE;
    while tokio::time::Instant::now() < deadline {
        if signal::kill(target, None).is_err() {
            println!("supervisor (pid {pid}) stopped");
            return Ok(0);
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    if signal::kill(target, Signal::SIGKILL).is_err() {
        println!("supervisor (pid {pid}) stopped");
        return Ok(0);
    }

    if signal::kill(target, None).is_ok() {
        bail!("supervisor (pid {pid}) did not stop after SIGKILL");
    }
    println!("supervisor (pid {pid}) force-stopped");
    Ok(0)
}
