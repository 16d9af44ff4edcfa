use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;

use crate::services::preferences::ChartColumns;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct PreferencesRequest {
    pub theme: String,
    #[serde(default)]
    pub chart_columns: ChartColumns,
}

pub async fn get_logs(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.logs.recent())
}

pub async fn get_notifications(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.notifications.active())
}

pub async fn get_preferences(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.preferences.get())
}

pub async fn put_preferences(
    data: web::Data<AppState>,
    req: web::Json<PreferencesRequest>,
) -> impl Responder {
    let req = req.into_inner();
    match data.preferences.update(req.theme, req.chart_columns) {
        Ok(preferences) => HttpResponse::Ok().json(preferences),
        Err(e) => {
            log::error!("Failed to save preferences: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "status": "error",
                "message": e.to_string()
            }))
        }
    }
}
