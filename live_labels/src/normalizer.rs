use crate::color::color_for;
use crate::detection::{DetectedLabel, Detection, FrameGeometry, NormalizedBox, PixelBox};

fn to_pixels(fraction: f64, working_dim: i32, scale: f64) -> i32 {
    // `as` truncates toward zero, matching the reference output.
    (fraction * working_dim as f64 * scale) as i32
}

fn remap(bbox: &NormalizedBox, geometry: &FrameGeometry) -> PixelBox {
    let (scale_x, scale_y) = (geometry.scale_x(), geometry.scale_y());
    PixelBox {
        x: to_pixels(bbox.left, geometry.working_width, scale_x),
        y: to_pixels(bbox.top, geometry.working_height, scale_y),
        width: to_pixels(bbox.width, geometry.working_width, scale_x),
        height: to_pixels(bbox.height, geometry.working_height, scale_y),
    }
}

pub fn format_label(name: &str, confidence: f64) -> String {
    format!("{}: {:.2}%", name, confidence)
}

/// Turns a detection response into display-frame detections.
///
/// Every instance with a bounding box becomes one [`Detection`]; instances
/// without one are skipped.
pub fn normalize(labels: &[DetectedLabel], geometry: &FrameGeometry) -> Vec<Detection> {
    labels
        .iter()
        .flat_map(|label| {
            let color = color_for(&label.name);
            let text = format_label(&label.name, label.confidence);
            label
                .instances
                .iter()
                .filter_map(|instance| instance.bounding_box.as_ref())
                .map(move |bbox| Detection {
                    name: label.name.clone(),
                    confidence: label.confidence,
                    label: text.clone(),
                    bbox: remap(bbox, geometry),
                    color,
                })
        })
        .collect()
}
