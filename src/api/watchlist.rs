use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;

use crate::state::AppState;

#[derive(Deserialize)]
pub struct WatchRequest {
    pub name: String,
}

pub async fn list_watch(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "state": data.watchlist.state(),
        "names": data.watchlist.names()
    }))
}

pub async fn add_watch(data: web::Data<AppState>, req: web::Json<WatchRequest>) -> impl Responder {
    if req.name.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "status": "error",
            "message": "Process name must not be empty"
        }));
    }

    let added = data.watchlist.add(&req.name);
    log::info!("Watchlist add '{}' (new: {})", req.name, added);
    HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "added": added,
        "names": data.watchlist.names()
    }))
}

pub async fn remove_watch(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let name = path.into_inner();
    if data.watchlist.remove(&name) {
        HttpResponse::Ok().json(serde_json::json!({
            "status": "success",
            "message": format!("'{}' removed from watchlist", name)
        }))
    } else {
        HttpResponse::NotFound().json(serde_json::json!({
            "status": "error",
            "message": format!("'{}' is not on the watchlist", name)
        }))
    }
}
