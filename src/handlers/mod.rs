pub mod detector;
pub mod http;

pub use detector::{poll_once, start_detection_task};
pub use http::routes;
