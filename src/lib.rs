pub mod api;
pub mod composer;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod mail;
pub mod models;
pub mod payload;
pub mod resolver;
pub mod state;
pub mod templates;

pub use config::Config;
pub use dispatch::Dispatcher;
pub use error::{AppError, Result};
pub use state::AppState;
