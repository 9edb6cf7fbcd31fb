//! Web server module (Axum + API).

pub mod api;
pub mod error;
pub mod router;
pub mod server;
pub mod state;

pub use router::create_app_router;
pub use server::run_server;
pub use state::AppState;
