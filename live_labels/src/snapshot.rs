use crate::detection::Detection;
use serde::Serialize;
use std::sync::Arc;

/// Detections resolved at one sampling tick.
///
/// Never mutated after construction; the live loop swaps in a new snapshot at
/// the next tick and redraws this one on every frame until then.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotationSnapshot {
    pub tick: u64,
    pub frame_index: u64,
    pub detections: Arc<[Detection]>,
}

impl Default for AnnotationSnapshot {
    fn default() -> Self {
        Self::new(0, 0, Vec::new())
    }
}

impl AnnotationSnapshot {
    pub fn new(tick: u64, frame_index: u64, detections: Vec<Detection>) -> Self {
        Self {
            tick,
            frame_index,
            detections: detections.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn summary(&self) -> String {
        self.detections
            .iter()
            .map(|detection| detection.label.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
