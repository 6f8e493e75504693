mod handler;
mod model;

pub use handler::{check_usage, reset};
pub use model::{CheckResponse, DebugInfo, ResetResponse};
