pub mod cache;
pub mod completion;
pub mod config;
pub mod error;
pub mod formatter;
pub mod handlers;
pub mod health;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod quota;
pub mod rate_limit;
pub mod similarity;
pub mod social;
pub mod state;
pub mod throttle;
pub mod worker;

pub use error::BotError;
pub use state::AppState;
