pub mod batch;
pub mod metrics;
pub mod processes;
pub mod respawn;
pub mod session;
pub mod watchlist;

pub use batch::run_batch;
pub use metrics::get_metrics;
pub use processes::{get_history, get_process, kill_process, list_processes, restart_process, set_limits, set_priority};
pub use respawn::{list_respawn, subscribe_respawn, unsubscribe_respawn};
pub use session::{get_logs, get_notifications, get_preferences, put_preferences};
pub use watchlist::{add_watch, list_watch, remove_watch};

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};

use crate::models::{GatewayError, SupervisorError};

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy"
    }))
}

fn status_for(error: &SupervisorError) -> StatusCode {
    match error {
        SupervisorError::NoTargets
        | SupervisorError::InvalidPriority(_)
        | SupervisorError::InvalidLimits
        | SupervisorError::InvalidTimeout(_) => StatusCode::BAD_REQUEST,
        SupervisorError::NotFound(_) | SupervisorError::InvalidTarget(_) => StatusCode::NOT_FOUND,
        SupervisorError::Gateway(e) => match e {
            GatewayError::NotFound(_) | GatewayError::InvalidTarget(_) => StatusCode::NOT_FOUND,
            GatewayError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::SpawnFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
        },
    }
}

pub(crate) fn error_response(error: &SupervisorError) -> HttpResponse {
    HttpResponse::build(status_for(error)).json(serde_json::json!({
        "status": "error",
        "kind": error.kind(),
        "message": error.to_string()
    }))
}

/// 注册所有路由
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/processes", web::get().to(list_processes))
        .route("/api/processes/{pid}", web::get().to(get_process))
        .route("/api/processes/{pid}/history", web::get().to(get_history))
        .route("/api/processes/{pid}/kill", web::post().to(kill_process))
        .route("/api/processes/{pid}/restart", web::post().to(restart_process))
        .route("/api/processes/{pid}/priority", web::post().to(set_priority))
        .route("/api/processes/{pid}/limits", web::post().to(set_limits))
        .route("/api/watchlist", web::get().to(list_watch))
        .route("/api/watchlist", web::post().to(add_watch))
        .route("/api/watchlist/{name}", web::delete().to(remove_watch))
        .route("/api/respawn", web::get().to(list_respawn))
        .route("/api/respawn/{pid}", web::post().to(subscribe_respawn))
        .route("/api/respawn/{pid}", web::delete().to(unsubscribe_respawn))
        .route("/api/batch", web::post().to(run_batch))
        .route("/api/logs", web::get().to(get_logs))
        .route("/api/notifications", web::get().to(get_notifications))
        .route("/api/preferences", web::get().to(get_preferences))
        .route("/api/preferences", web::put().to(put_preferences))
        .route("/metrics", web::get().to(get_metrics))
        .route("/health", web::get().to(health));
}
