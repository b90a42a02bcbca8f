use std::convert::Infallible;

use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpResponse, Responder};
use futures::StreamExt;
use log::{debug, error, info};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::ConfigProvider;
use crate::error::StoreError;
use crate::relay::to_sse_frame;
use crate::web::models::{ChatRequest, ChatResponse, UpdateResponse};
use crate::AppState;

// Health check endpoint
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

// Chat API endpoint, whole answer at once
pub async fn chat(data: web::Data<AppState>, req: web::Json<ChatRequest>) -> impl Responder {
    let request_id = Uuid::new_v4();
    info!("Chat request {} ({} characters)", request_id, req.message.len());
    debug!("[{}] message: {}", request_id, req.message);

    // Snapshot the settings; later updates do not affect this request
    let settings = data.config.current();

    match data.relay.complete(request_id, &req.message, settings).await {
        Ok(response) => HttpResponse::Ok().json(ChatResponse { response }),
        Err(e) => {
            error!("Chat request {} failed: {}", request_id, e);
            let status = StatusCode::from_u16(e.status()).unwrap_or(StatusCode::BAD_GATEWAY);
            HttpResponse::build(status).json(json!({ "error": e.to_string() }))
        }
    }
}

// Chat API endpoint, answer relayed as server-sent events
pub async fn chat_stream(data: web::Data<AppState>, req: web::Json<ChatRequest>) -> HttpResponse {
    let request_id = Uuid::new_v4();
    info!("Streaming chat request {} ({} characters)", request_id, req.message.len());
    debug!("[{}] message: {}", request_id, req.message);

    let settings = data.config.current();
    let frames = data
        .relay
        .stream(request_id, req.into_inner().message, settings)
        .map(|event| Ok::<_, Infallible>(to_sse_frame(&event)));

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(frames)
}

pub async fn get_config(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.config.snapshot())
}

pub async fn update_config(data: web::Data<AppState>, body: web::Json<Value>) -> impl Responder {
    match data.config.update(body.into_inner()).await {
        Ok(()) => HttpResponse::Ok().json(UpdateResponse::ok("Configuration updated")),
        Err(e) => store_error("update configuration", e),
    }
}

pub async fn get_custom_css(data: web::Data<AppState>) -> impl Responder {
    match data.assets.custom_css().await {
        Ok(css) => HttpResponse::Ok().json(css),
        Err(e) => store_error("read custom CSS", e),
    }
}

pub async fn update_custom_css(data: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    match data.assets.set_custom_css(body.to_vec()).await {
        Ok(()) => HttpResponse::Ok().json(UpdateResponse::ok("Custom CSS updated")),
        Err(e) => store_error("update custom CSS", e),
    }
}

pub async fn get_themes(data: web::Data<AppState>) -> impl Responder {
    match data.assets.themes().await {
        Ok(themes) => HttpResponse::Ok().json(themes),
        Err(e) => store_error("list themes", e),
    }
}

fn store_error(action: &str, e: StoreError) -> HttpResponse {
    error!("Failed to {}: {}", action, e);
    let mut response = if e.is_bad_input() {
        HttpResponse::BadRequest()
    } else {
        HttpResponse::InternalServerError()
    };
    response.json(json!({ "error": e.to_string() }))
}
