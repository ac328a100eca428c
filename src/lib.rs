//! Book catalog server.
//!
//! Accepts book submissions with an optional cover image, persists them to
//! MongoDB, and lists them back. Uploaded images are kept on disk and served
//! under `/uploads`.

pub mod modules;

use std::sync::Arc;

use anyhow::Context;
use bookserver_kernel::settings::Settings;

pub use modules::books::{
    models::Book,
    service::CatalogService,
    store::{BookStore, MemoryBookStore, MongoBookStore},
    uploads::UploadStore,
};

/// Open the storage backend and the upload directory described by `settings`.
pub async fn build_catalog(settings: &Settings) -> anyhow::Result<Arc<CatalogService>> {
    let store = modules::books::store::open(&settings.database)
        .await
        .context("failed to open book store")?;
    let uploads = UploadStore::open(&settings.uploads.dir)
        .await
        .with_context(|| {
            format!(
                "failed to prepare upload directory {}",
                settings.uploads.dir.display()
            )
        })?;

    Ok(Arc::new(CatalogService::new(store, uploads)))
}
