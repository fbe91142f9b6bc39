pub mod inventory;

use axum::Router;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// All inventory routes, mounted at `/inventory`.
pub fn inventory_routes() -> Router<AppState> {
    inventory::inventory_router()
}
