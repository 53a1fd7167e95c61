use crate::server::SharedState;
use axum::{extract::State, response::Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct Status {
    status: &'static str,
    streaming: bool,
    last_tick: u64,
}

pub async fn healthcheck(State(state): State<SharedState>) -> Json<Status> {
    let streaming = state.feed.frames.borrow().is_some();
    let last_tick = state.feed.snapshots.borrow().tick;
    Json(Status {
        status: "Available",
        streaming,
        last_tick,
    })
}
