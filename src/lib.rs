//! chainchat library root.

pub mod chain;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod oracle;
pub mod providers;
pub mod store;
pub mod web;

pub use cli::Commands;
pub use config::{load_settings, Settings};
pub use core::{handle_chat, Action, Intent, Interpreter, Resolver};
pub use error::{Error, Result, ServiceError};
pub use web::{create_app_router, run_server, AppState};
