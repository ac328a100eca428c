pub mod books;

use std::sync::Arc;

use bookserver_kernel::ModuleRegistry;

use books::service::CatalogService;

/// Register all application modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, catalog: Arc<CatalogService>) {
    registry.register(books::create_module(catalog));
}
