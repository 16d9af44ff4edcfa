use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;

use crate::api::error_response;
use crate::models::BatchAction;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub pids: Vec<u32>,
    pub action: BatchAction,
}

pub async fn run_batch(data: web::Data<AppState>, req: web::Json<BatchRequest>) -> impl Responder {
    let req = req.into_inner();
    match data.run_batch(req.pids, req.action).await {
        Ok(result) => HttpResponse::Ok().json(serde_json::json!({
            "status": "success",
            "message": result.summary(),
            "result": result
        })),
        Err(e) => error_response(&e),
    }
}
