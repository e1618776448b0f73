pub mod api;
pub mod auth;
pub mod command;
pub mod config;
pub mod deployment;
pub mod error;
pub mod filter;
pub mod forbidden;
pub mod locks;
pub mod logging;
pub mod payload;
pub mod pipeline;
pub mod publish;
pub mod rate_limit;
pub mod resolver;
pub mod settings;
pub mod strategy;

use std::sync::Arc;
use tokio::sync::Mutex;

use auth::Authenticator;
use command::CommandRunner;
use rate_limit::RateLimiter;
use settings::Settings;
use strategy::StrategyExecutor;

pub struct AppState {
    pub settings: Settings,
    pub authenticator: Authenticator,
    pub rate_limiter: Mutex<RateLimiter>,
    pub executor: StrategyExecutor,
}

impl AppState {
    pub fn new(settings: Settings, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            authenticator: Authenticator::new(
                settings.required_user_agent.clone(),
                settings.event_header.clone(),
            ),
            rate_limiter: Mutex::new(RateLimiter::new(
                settings.rate_limit_max,
                settings.rate_limit_window,
            )),
            executor: StrategyExecutor::new(runner),
            settings,
        }
    }
}

pub type SharedState = Arc<AppState>;
