use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of the watchdog, served by `GET /status`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub chilled: bool,
    pub detection_lock_held: bool,
    pub last_heartbeat: DateTime<Utc>,
    pub seconds_since_heartbeat: f64,
    pub dead: bool,
}
