mod detections;
mod health;
mod metrics;
mod video_feed;

use crate::server::SharedState;
use axum::{routing::get, Router};

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health::healthcheck))
        .route("/video_feed", get(video_feed::video_feed))
        .route("/detections", get(detections::current_detections))
        .route("/metrics", get(metrics::metrics_handler))
}
