use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reply to `/heartbeat`, `/chill` and `/unchill`.
#[derive(Serialize, Debug, PartialEq)]
pub struct GateReply {
    pub status: &'static str,
    pub chilled: bool,
}

impl GateReply {
    /// A heartbeat is always recorded; `chilled` tells whether detection is
    /// still suspended afterwards.
    pub fn heartbeat(chilled: bool) -> Self {
        Self {
            status: "ok",
            chilled,
        }
    }

    /// `applied` is false when a death episode held the gate.
    pub fn new(applied: bool, chilled: bool) -> Self {
        Self {
            status: if applied { "ok" } else { "ignored" },
            chilled,
        }
    }
}

/// Body posted to the webhook receiver when the heartbeat is lost.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct HeartbeatLost {
    pub realm: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub last_heartbeat: DateTime<Utc>,
}
