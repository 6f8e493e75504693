use std::sync::Arc;

use ai::PromptGenerator;
use cache::PromptCache;
use config::Config;
use usage::UsageLimitService;

pub mod ai;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod events;
pub mod ip;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod usage;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub usage: Arc<UsageLimitService>,
    pub prompt_cache: Arc<PromptCache>,
    pub generator: Arc<dyn PromptGenerator>,
}
