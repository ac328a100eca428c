pub mod models;
pub mod routes;
pub mod service;
pub mod store;
pub mod uploads;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{routing::get, Router};
use bookserver_http::error::ErrorBody;
use bookserver_kernel::{InitCtx, Module};
use utoipa::OpenApi;

use service::CatalogService;

#[derive(OpenApi)]
#[openapi(
    paths(routes::ready, routes::list_books, routes::create_book, routes::serve_upload),
    components(schemas(
        models::Book,
        models::BookCreated,
        models::CreateBookForm,
        ErrorBody
    )),
    tags((name = "books", description = "Book catalog and cover images"))
)]
struct BooksApi;

/// Catalog module: book listing, creation, and uploaded image serving
pub struct BooksModule {
    catalog: Arc<CatalogService>,
}

impl BooksModule {
    pub fn new(catalog: Arc<CatalogService>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            uploads = %self.catalog.uploads().root().display(),
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(routes::ready))
            .route("/books", get(routes::list_books).post(routes::create_book))
            .route(
                &format!("{}/{{filename}}", uploads::UPLOADS_ROUTE),
                get(routes::serve_upload),
            )
            .with_state(self.catalog.clone())
    }

    fn openapi(&self) -> Option<utoipa::openapi::OpenApi> {
        Some(BooksApi::openapi())
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create a new instance of the books module
pub fn create_module(catalog: Arc<CatalogService>) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(catalog))
}
