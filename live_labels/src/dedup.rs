use crate::detection::{Detection, PixelBox};

pub const DEFAULT_IOU_THRESHOLD: f64 = 0.5;

fn intersection(box1: &PixelBox, box2: &PixelBox) -> i64 {
    let width = (box1.right().min(box2.right()) - (box1.x.max(box2.x) as i64)).max(0);
    let height = (box1.bottom().min(box2.bottom()) - (box1.y.max(box2.y) as i64)).max(0);
    width * height
}

fn union(box1: &PixelBox, box2: &PixelBox) -> i64 {
    box1.area() + box2.area() - intersection(box1, box2)
}

/// Intersection over union of two boxes, `0.0` when the union is empty.
pub fn iou(box1: &PixelBox, box2: &PixelBox) -> f64 {
    let union = union(box1, box2);
    if union == 0 {
        return 0.0;
    }
    intersection(box1, box2) as f64 / union as f64
}

/// Greedy overlap suppression across all labels.
///
/// Candidates are visited by descending confidence (ties keep input order) and
/// dropped when they overlap an already kept box by more than `iou_threshold`.
/// Survivors come back in the order they were kept.
pub fn deduplicate(mut candidates: Vec<Detection>, iou_threshold: f64) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let duplicate = kept
            .iter()
            .any(|accepted| iou(&candidate.bbox, &accepted.bbox) > iou_threshold);
        if duplicate {
            tracing::trace!(label = %candidate.label, "suppressed overlapping detection");
            continue;
        }
        kept.push(candidate);
    }
    kept
}
