mod handler;
mod model;

pub use handler::{MAX_PROMPT_CHARS, optimize};
pub use model::{OptimizeRequest, OptimizeResponse};
