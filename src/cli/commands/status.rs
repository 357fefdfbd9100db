//! `autopilot status` — read the current heartbeat and PID lock (spec §6).

use anyhow::Result;
use chrono::Utc;

use crate::domain::models::config::Config;
use crate::supervisor::HeartbeatWriter;

pub async fn handle_status(config: &Config) -> Result<i32> {
    let state_root = std::path::Path::new(&config.state_root);
    let heartbeat = HeartbeatWriter::new(state_root);
    let timeout = chrono::Duration::milliseconds(config.heartbeat_timeout_ms as i64);

    let alive = heartbeat.is_alive(Utc::now(), timeout).await?;
    if alive {
        println!("running");
        Ok(0)
    } else {
        println!("not running");
        Ok(1)
    }
}
