pub mod message;
pub mod status;

pub use message::{GateReply, HeartbeatLost};
pub use status::StatusSnapshot;
