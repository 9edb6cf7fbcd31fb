//! Route definitions for the web server.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::api;
use super::AppState;

/// Largest request body accepted by any route.
const BODY_LIMIT: usize = 1024 * 1024;

/// Chain-facing routes.
fn chain_routes() -> Router<AppState> {
    Router::new()
        .route("/get-count", get(api::get_count))
        .route("/get-balance", post(api::get_balance))
        .route("/api/balance/:address", get(api::balance_by_path))
        .route("/prepare-transfer", post(api::prepare_transfer))
        .route("/check-transaction", post(api::check_transaction))
        .route("/network-info", get(api::network_info))
}

/// Datastore routes.
fn record_routes() -> Router<AppState> {
    Router::new()
        // Users
        .route("/users", get(api::list_users).post(api::create_user))
        .route("/users/:id", get(api::get_user))
        .route("/users/wallet/:wallet", get(api::get_user_by_wallet))
        .route("/users/wallet/:wallet/contacts", get(api::get_user_contacts))

        // Contacts
        .route("/contacts", get(api::list_contacts).post(api::create_contact))

        // Transactions
        .route(
            "/transacciones",
            get(api::list_transactions).post(api::create_transaction),
        )
        .route("/transacciones/wallet/:wallet", get(api::list_wallet_transactions))

        // Bookmarked wallets
        .route(
            "/contact-wallets",
            get(api::list_contact_wallets).post(api::create_contact_wallet),
        )
        .route("/contact-wallets/:wallet", get(api::list_owner_contact_wallets))
}

fn oracle_routes() -> Router<AppState> {
    Router::new()
        .route("/pyth/price/:symbol", get(api::pyth::get_price))
        .route("/pyth/prices", get(api::pyth::get_prices))
        .route("/pyth/supported", get(api::pyth::supported))
        .route("/pyth/portfolio", post(api::pyth::portfolio))
}

/// Create the full app router.
pub fn create_app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(api::index))
        .route("/health", get(health_check))
        .route("/chat", post(api::chat))
        .merge(chain_routes())
        .merge(record_routes())
        .merge(oracle_routes())
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
