mod client_ip;
mod error_handler;

pub use client_ip::resolve_client;
pub use error_handler::log_errors;
