use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use std::sync::Arc;

use crate::metrics;
use crate::risk_gate::RiskGate;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn prometheus_metrics() -> impl Responder {
    match metrics::render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

pub async fn risk_snapshot(gate: web::Data<Arc<RiskGate>>) -> impl Responder {
    HttpResponse::Ok().json(gate.snapshot())
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health_check)))
        .service(web::resource("/metrics").route(web::get().to(prometheus_metrics)))
        .service(web::resource("/risk").route(web::get().to(risk_snapshot)));
}
