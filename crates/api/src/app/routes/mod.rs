use axum::{Router, routing::get};

pub mod clusters;
pub mod inventory;
pub mod plans;
pub mod relief;
pub mod system;

/// Router for all relief endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/inventory", inventory::router())
        .nest("/relief", relief::router())
        .nest("/plans", plans::router())
        .nest("/clusters", clusters::router())
}
