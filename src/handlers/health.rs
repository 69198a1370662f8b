//! Health check and ping endpoint handlers.

use crate::{
    config::environment,
    models::{HealthResponse, PingResponse},
    services::PixMetrics,
};
use actix_web::{Error, HttpRequest, Result, web};
use chrono::Utc;
use paperclip::actix::api_v2_operation;

const SERVICE_NAME: &str = "pix-gateway";

fn format_uptime(secs: u64) -> String {
    format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Health check endpoint
///
/// Reports service status, uptime, and the active environment. Intended for
/// load balancers and monitoring probes.
#[api_v2_operation(
    summary = "Health Check Endpoint",
    description = "Returns service status, uptime, and the active environment.",
    tags("Health"),
    responses(
        (status = 200, description = "Successful response", body = HealthResponse)
    )
)]
pub async fn health(req: HttpRequest) -> Result<web::Json<HealthResponse>, Error> {
    let uptime = req
        .app_data::<web::Data<PixMetrics>>()
        .map(|m| m.uptime_seconds())
        .unwrap_or(0);

    Ok(web::Json(HealthResponse {
        service: SERVICE_NAME.to_string(),
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        uptime,
        uptime_formatted: format_uptime(uptime),
        ambiente: environment::active().as_str().to_string(),
    }))
}

/// Ping endpoint
#[api_v2_operation(
    summary = "Ping Endpoint",
    description = "Returns pong with the current uptime.",
    tags("Health"),
    responses(
        (status = 200, description = "Successful response", body = PingResponse)
    )
)]
pub async fn ping(req: HttpRequest) -> Result<web::Json<PingResponse>, Error> {
    let uptime = req
        .app_data::<web::Data<PixMetrics>>()
        .map(|m| m.uptime_seconds())
        .unwrap_or(0);

    Ok(web::Json(PingResponse {
        message: "pong".to_string(),
        service: SERVICE_NAME.to_string(),
        timestamp: Utc::now().to_rfc3339(),
        uptime,
    }))
}
