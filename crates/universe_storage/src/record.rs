use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use universe_api::{ServerId, ServerProcess};

/// "This server instance is alive."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: ServerId,
    pub name: String,
    pub address: String,
    pub port: u16,
    /// Unix timestamp in milliseconds.
    pub started_at: u64,
    pub pid: u32,
}

impl ServerRecord {
    /// Builds the record for the server running in `process`.
    pub fn for_process(id: ServerId, name: impl Into<String>, process: &ServerProcess) -> Self {
        Self {
            id,
            name: name.into(),
            address: process.address().to_string(),
            port: process.port(),
            started_at: unix_millis(process.started_at()),
            pid: std::process::id(),
        }
    }
}

fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
