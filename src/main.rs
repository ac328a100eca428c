use anyhow::Context;
use bookserver::modules;
use bookserver_kernel::{settings::Settings, InitCtx, ModuleRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load bookserver settings")?;
    bookserver_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        backend = ?settings.database.backend,
        "bookserver bootstrap starting"
    );

    // Without a storage backend nothing is served; report it and exit quietly.
    let catalog = match bookserver::build_catalog(&settings).await {
        Ok(catalog) => catalog,
        Err(err) => {
            tracing::error!(
                error = %format!("{err:#}"),
                "storage unavailable; not serving requests"
            );
            return Ok(());
        }
    };

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, catalog);

    let ctx = InitCtx {
        settings: &settings,
    };
    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;

    let served = bookserver_http::start_server(&registry, &settings).await;

    registry.stop_all().await?;
    served
}
