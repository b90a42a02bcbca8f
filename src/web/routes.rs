use std::path::PathBuf;

use actix_files as fs;
use actix_web::web;
use log::warn;

use crate::settings::ServerSettings;
use crate::web::handlers;

/// Upper bound for an uploaded custom stylesheet.
pub const CUSTOM_CSS_LIMIT: usize = 16 * 1024 * 1024;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/chat", web::post().to(handlers::chat))
            .route("/chat/stream", web::post().to(handlers::chat_stream))
            .route("/config", web::get().to(handlers::get_config))
            .route("/config", web::post().to(handlers::update_config))
            .route("/themes", web::get().to(handlers::get_themes))
            .service(
                web::resource("/custom-css")
                    .app_data(web::PayloadConfig::new(CUSTOM_CSS_LIMIT))
                    .route(web::get().to(handlers::get_custom_css))
                    .route(web::post().to(handlers::update_custom_css)),
            ),
    )
    .route("/health", web::get().to(handlers::health_check));
}

/// Static file mounts. Directories are checked once, up front; the UI goes
/// last since it is served from `/`.
pub fn configure_static(settings: &ServerSettings) -> impl Fn(&mut web::ServiceConfig) + Clone {
    let backgrounds = Some(settings.backgrounds_dir()).filter(|dir| dir.is_dir());
    let themes = existing_dir(settings.themes_dir());
    let ui = existing_dir(settings.ui_dir());

    move |cfg: &mut web::ServiceConfig| {
        if let Some(dir) = &backgrounds {
            cfg.service(fs::Files::new("/backgrounds", dir));
        }
        if let Some(dir) = &themes {
            cfg.service(fs::Files::new("/themes", dir));
        }
        if let Some(dir) = &ui {
            cfg.service(fs::Files::new("/", dir).index_file("index.html"));
        }
    }
}

fn existing_dir(path: PathBuf) -> Option<PathBuf> {
    if path.is_dir() {
        Some(path)
    } else {
        warn!("Static directory {} not found, not serving it", path.display());
        None
    }
}
