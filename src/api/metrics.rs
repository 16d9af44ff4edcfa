use actix_web::{web, HttpResponse, Responder};

use crate::metrics::METRICS;
use crate::state::AppState;

pub async fn get_metrics(data: web::Data<AppState>) -> impl Responder {
    // 刷新不随事件更新的 gauge
    METRICS.snapshot_processes.set(data.snapshot().len() as i64);
    METRICS.history_series.set(data.history.len() as i64);
    METRICS.watchlist_names.set(data.watchlist.names().len() as i64);
    METRICS.respawn_subscriptions.set(data.registry.members().len() as i64);

    match METRICS.render() {
        Ok(metrics_text) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(metrics_text),
        Err(e) => {
            log::error!("Failed to render metrics: {}", e);
            HttpResponse::InternalServerError().body("Failed to render metrics")
        }
    }
}
