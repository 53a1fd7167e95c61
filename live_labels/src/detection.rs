use serde::Serialize;

/// Box as returned by the detection service, in fractions of the working frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelInstance {
    pub bounding_box: Option<NormalizedBox>,
}

/// One class reported by the detection service for a processed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedLabel {
    pub name: String,
    pub confidence: f64,
    pub instances: Vec<LabelInstance>,
}

/// Axis-aligned rectangle in display-frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixelBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub name: String,
    pub confidence: f64,
    pub label: String,
    pub bbox: PixelBox,
    pub color: Rgb,
}

/// Dimensions of the captured frame and of the downscaled copy sent for detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub original_width: i32,
    pub original_height: i32,
    pub working_width: i32,
    pub working_height: i32,
}

impl FrameGeometry {
    /// Working size is the original scaled by `factor`, rounded, and never below one pixel.
    pub fn for_downscale(original_width: i32, original_height: i32, factor: f64) -> Self {
        let scale = |dim: i32| ((dim as f64 * factor).round() as i32).max(1);
        Self {
            original_width,
            original_height,
            working_width: scale(original_width),
            working_height: scale(original_height),
        }
    }

    pub fn scale_x(&self) -> f64 {
        self.original_width as f64 / self.working_width as f64
    }

    pub fn scale_y(&self) -> f64 {
        self.original_height as f64 / self.working_height as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_for_downscale() {
        let geometry = FrameGeometry::for_downscale(1200, 800, 0.6);

        assert_eq!(geometry.working_width, 720);
        assert_eq!(geometry.working_height, 480);
        assert!((geometry.scale_x() - 5.0 / 3.0).abs() < 1e-12);
        assert!((geometry.scale_y() - 5.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_geometry_never_collapses_to_zero() {
        let geometry = FrameGeometry::for_downscale(1, 1, 0.1);

        assert_eq!(geometry.working_width, 1);
        assert_eq!(geometry.working_height, 1);
    }

    #[test]
    fn test_pixel_box_edges() {
        let bbox = PixelBox::new(10, 20, 30, 40);

        assert_eq!(bbox.area(), 1200);
        assert_eq!(bbox.right(), 40);
        assert_eq!(bbox.bottom(), 60);
    }
}
