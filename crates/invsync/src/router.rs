//! HTTP router configuration

use std::sync::Arc;

use axum::{
    Json, Router,
    routing::{get, post},
};
use utoipa::OpenApi;

use invsync_api::{
    CommandResponse, CommandStatus, ConfigSummary, Domain, DomainStatus, HealthResponse,
    InventoryDump,
};

use crate::api::{ApiError, inventory, system};
use crate::state::AppState;

/// OpenAPI document of the admin API
#[derive(OpenApi)]
#[openapi(
    paths(system::health, inventory::dump, inventory::execute_command),
    components(schemas(
        ApiError,
        CommandResponse,
        CommandStatus,
        ConfigSummary,
        Domain,
        DomainStatus,
        HealthResponse,
        InventoryDump
    )),
    tags(
        (name = "system", description = "Daemon health"),
        (name = "inventory", description = "Inventory diagnostics and commands")
    )
)]
pub struct ApiDoc;

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // System endpoints
        .route("/health", get(system::health))
        .route("/api-docs/openapi.json", get(openapi))
        // Inventory
        .route("/api/v1/inventory/dump", get(inventory::dump))
        .route(
            "/api/v1/inventory/commands/{name}",
            post(inventory::execute_command),
        )
        // State
        .with_state(state)
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/v1/inventory/dump",
            "/api/v1/inventory/commands/{name}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[tokio::test]
    async fn test_router_builds() {
        let state = crate::test_support::disabled_state().await;
        let _router = create_router(state);
    }
}
