use crate::{server::SharedState, snapshot::AnnotationSnapshot};
use axum::{extract::State, response::Json};
use std::sync::Arc;

pub async fn current_detections(State(state): State<SharedState>) -> Json<Arc<AnnotationSnapshot>> {
    state.metrics.record_request("detections");
    let snapshot = state.feed.snapshots.borrow().clone();
    Json(snapshot)
}
