pub mod prompt;
pub mod usage;
