use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;

use crate::api::error_response;
use crate::models::ProcessLimits;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct KillRequest {
    #[serde(default = "default_kill_children")]
    pub kill_children: bool,
    pub timeout_secs: Option<u64>,
}

fn default_kill_children() -> bool {
    true
}

#[derive(Deserialize, Default)]
pub struct RestartRequest {
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Deserialize)]
pub struct PriorityRequest {
    pub priority: i32,
}

pub async fn list_processes(data: web::Data<AppState>) -> impl Responder {
    let snapshot = data.snapshot();
    let list: Vec<_> = snapshot.iter().collect();
    HttpResponse::Ok().json(serde_json::json!({
        "taken_at_ms": snapshot.taken_at_ms,
        "processes": list
    }))
}

pub async fn get_process(data: web::Data<AppState>, path: web::Path<u32>) -> impl Responder {
    match data.process_info(path.into_inner()) {
        Ok(entry) => HttpResponse::Ok().json(entry),
        Err(e) => error_response(&e),
    }
}

pub async fn get_history(data: web::Data<AppState>, path: web::Path<u32>) -> impl Responder {
    let pid = path.into_inner();
    HttpResponse::Ok().json(serde_json::json!({
        "pid": pid,
        "samples": data.history(pid)
    }))
}

pub async fn kill_process(
    data: web::Data<AppState>,
    path: web::Path<u32>,
    req: Option<web::Json<KillRequest>>,
) -> impl Responder {
    let pid = path.into_inner();
    let (kill_children, timeout_secs) = req
        .map(|r| (r.kill_children, r.timeout_secs))
        .unwrap_or((true, None));

    match data.kill_process(pid, kill_children, timeout_secs).await {
        Ok(outcome) => HttpResponse::Ok().json(serde_json::json!({
            "status": "success",
            "pid": pid,
            "outcome": outcome
        })),
        Err(e) => error_response(&e),
    }
}

pub async fn restart_process(
    data: web::Data<AppState>,
    path: web::Path<u32>,
    req: Option<web::Json<RestartRequest>>,
) -> impl Responder {
    let pid = path.into_inner();
    let args = req.map(|r| r.into_inner().args).unwrap_or_default();

    match data.kill_and_restart(pid, args).await {
        Ok(new_pid) => HttpResponse::Ok().json(serde_json::json!({
            "status": "success",
            "pid": pid,
            "new_pid": new_pid
        })),
        Err(e) => error_response(&e),
    }
}

pub async fn set_priority(
    data: web::Data<AppState>,
    path: web::Path<u32>,
    req: web::Json<PriorityRequest>,
) -> impl Responder {
    let pid = path.into_inner();
    match data.set_priority(pid, req.priority).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "status": "success",
            "message": format!("Set PID {} nice level to {}", pid, req.priority)
        })),
        Err(e) => error_response(&e),
    }
}

pub async fn set_limits(
    data: web::Data<AppState>,
    path: web::Path<u32>,
    req: web::Json<ProcessLimits>,
) -> impl Responder {
    let pid = path.into_inner();
    match data.set_limits(pid, req.into_inner()).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "status": "success",
            "message": format!("Applied limits to PID {}", pid)
        })),
        Err(e) => error_response(&e),
    }
}
