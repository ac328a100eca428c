use async_trait::async_trait;
use axum::Router;
use utoipa::openapi::OpenApi;

/// Context provided to modules during initialization
pub struct InitCtx<'a> {
    pub settings: &'a crate::settings::Settings,
}

/// Unit of functionality mounted into the server
#[async_trait]
pub trait Module: Sync + Send {
    /// Unique name for this module
    fn name(&self) -> &'static str;

    /// Initialize the module with the provided context
    /// Called during application startup before the server binds
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Return the Axum router for this module's routes
    /// Routes are merged at the server root, so paths are absolute
    fn routes(&self) -> Router {
        Router::new()
    }

    /// Return the OpenAPI document fragment for this module
    /// Will be merged with other modules' documents
    fn openapi(&self) -> Option<OpenApi> {
        None
    }

    /// Start background work for this module
    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Stop the module and release its resources
    /// Called after the server has shut down
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
