mod assets;
mod config;
mod error;
mod relay;
mod settings;
mod upstream;
mod web;

#[cfg(test)]
mod testing;

use actix_cors::Cors;
use actix_web::{web::Data, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use log::{error, info};
use std::sync::Arc;

use assets::AssetStore;
use config::ConfigStore;
use relay::ChatRelay;
use settings::ServerSettings;
use upstream::HttpUpstream;
use web::routes;

// App state structure
struct AppState {
    relay: ChatRelay,
    config: Arc<ConfigStore>,
    assets: AssetStore,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting chat relay");
    let settings = ServerSettings::from_env();

    let config = match ConfigStore::load(&settings.config_path).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to load settings: {}", e);
            std::process::exit(1);
        }
    };

    // One HTTP client for all requests; each request snapshots the settings
    let upstream = HttpUpstream::new(settings.upstream_timeout)?;

    let app_state = Data::new(AppState {
        relay: ChatRelay::new(Arc::new(upstream)),
        config,
        assets: AssetStore::new(settings.ui_dir(), settings.themes_dir()),
    });
    let static_files = routes::configure_static(&settings);

    let addr = (settings.host.clone(), settings.port);
    info!("Server running on http://{}:{}", addr.0, addr.1);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(Cors::permissive())
            .configure(routes::configure)
            .configure(static_files.clone())
    })
    .bind(&addr)
    .with_context(|| format!("failed to bind {}:{}", addr.0, addr.1))?
    .run()
    .await
    .context("server error")?;

    Ok(())
}
