use crate::detection::{Detection, Rgb};
use opencv::{
    core::{Mat, Point, Rect, Scalar, Vector},
    imgcodecs, imgproc,
};
use thiserror::Error;

const BOX_THICKNESS: i32 = 2;
const TEXT_SCALE: f64 = 0.6;
const TEXT_THICKNESS: i32 = 2;
const TEXT_OFFSET_Y: i32 = 10;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Failed to encode frame: {0}")]
    EncodeFrameFailed(opencv::Error),
    #[error("OpenCV error: {0}")]
    OpenCvError(opencv::Error),
}

impl From<opencv::Error> for OverlayError {
    fn from(err: opencv::Error) -> Self {
        OverlayError::OpenCvError(err)
    }
}

// OpenCV frames are BGR.
fn to_scalar(color: Rgb) -> Scalar {
    Scalar::new(color.blue as f64, color.green as f64, color.red as f64, 0.0)
}

pub fn annotate(frame: &mut Mat, detections: &[Detection]) -> Result<(), OverlayError> {
    for detection in detections {
        let bbox = detection.bbox;
        let color = to_scalar(detection.color);

        imgproc::rectangle(
            frame,
            Rect::new(bbox.x, bbox.y, bbox.width, bbox.height),
            color,
            BOX_THICKNESS,
            imgproc::LINE_8,
            0,
        )?;

        imgproc::put_text(
            frame,
            &detection.label,
            Point::new(bbox.x, bbox.y.saturating_sub(TEXT_OFFSET_Y)),
            imgproc::FONT_HERSHEY_SIMPLEX,
            TEXT_SCALE,
            color,
            TEXT_THICKNESS,
            imgproc::LINE_AA,
            false,
        )?;
    }
    Ok(())
}

pub fn encode_jpg(frame: &Mat) -> Result<Vec<u8>, OverlayError> {
    let mut buf = Vector::<u8>::new();
    imgcodecs::imencode(".jpg", frame, &mut buf, &Vector::new())
        .map_err(OverlayError::EncodeFrameFailed)?;
    Ok(buf.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::color_for;
    use crate::detection::PixelBox;
    use opencv::core::{Vec3b, CV_8UC3};
    use opencv::prelude::*;

    #[test]
    fn test_annotate_draws_box_in_label_color() {
        let mut frame =
            Mat::new_rows_cols_with_default(200, 200, CV_8UC3, Scalar::all(0.0)).unwrap();
        let color = color_for("Dog");
        let detections = vec![Detection {
            name: "Dog".to_string(),
            confidence: 95.0,
            label: "Dog: 95.00%".to_string(),
            bbox: PixelBox::new(50, 60, 80, 70),
            color,
        }];

        annotate(&mut frame, &detections).unwrap();

        // Bottom edge of the rectangle, clear of the label text above the box.
        let pixel = frame.at_2d::<Vec3b>(129, 90).unwrap();
        assert_eq!(pixel[0], color.blue);
        assert_eq!(pixel[1], color.green);
        assert_eq!(pixel[2], color.red);

        let untouched = frame.at_2d::<Vec3b>(100, 90).unwrap();
        assert_eq!(untouched[0], 0);
    }

    #[test]
    fn test_annotate_tolerates_saturated_boxes() {
        let mut frame =
            Mat::new_rows_cols_with_default(100, 100, CV_8UC3, Scalar::all(0.0)).unwrap();
        let detections = vec![Detection {
            name: "Glitch".to_string(),
            confidence: 70.0,
            label: "Glitch: 70.00%".to_string(),
            bbox: PixelBox::new(10, i32::MIN, 40, 40),
            color: color_for("Glitch"),
        }];

        assert!(annotate(&mut frame, &detections).is_ok());
    }

    #[test]
    fn test_encode_jpg() {
        let frame = Mat::new_rows_cols_with_default(16, 16, CV_8UC3, Scalar::all(255.0)).unwrap();

        let bytes = encode_jpg(&frame).unwrap();

        assert_eq!(&bytes[..2], &[0xff, 0xd8]);
    }
}
