use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;

use crate::api::error_response;
use crate::models::RespawnPolicy;
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct SubscribeRequest {
    pub executable_path: Option<String>,
    #[serde(flatten)]
    pub policy: RespawnPolicy,
}

pub async fn list_respawn(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "members": data.registry.members(),
        "advisory": data.preferences.advisory_respawn_pids()
    }))
}

pub async fn subscribe_respawn(
    data: web::Data<AppState>,
    path: web::Path<u32>,
    req: Option<web::Json<SubscribeRequest>>,
) -> impl Responder {
    let pid = path.into_inner();
    let req = req.map(|r| r.into_inner()).unwrap_or_default();
    
    match data.subscribe_respawn(pid, req.executable_path, req.policy).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "status": "success",
            "message": format!("Auto-respawn started for PID {}", pid)
        })),
        Err(e) => error_response(&e),
    }
}

pub async fn unsubscribe_respawn(data: web::Data<AppState>, path: web::Path<u32>) -> impl Responder {
    let pid = path.into_inner();
    match data.unsubscribe_respawn(pid).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "status": "success",
            "message": format!("Stopped auto-respawn for PID {}", pid)
        })),
        Err(e) => error_response(&e),
    }
}
