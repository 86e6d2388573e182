//! Prometheus exposition for the engine's collectors.

use actix_web::HttpResponse;
use engagement_core::EngineMetrics;
use prometheus::{Encoder, TextEncoder};

/// Register engine collectors with the process-wide default registry.
pub fn register() -> Result<(), prometheus::Error> {
    EngineMetrics::register(prometheus::default_registry())
}

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
