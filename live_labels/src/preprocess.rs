use crate::detection::FrameGeometry;
use opencv::{
    core::{Mat, Size, Vector},
    imgcodecs, imgproc,
    prelude::*,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Cannot preprocess an empty frame")]
    EmptyFrame,
    #[error("Downscale factor must be finite and positive, got {0}")]
    InvalidFactor(f64),
    #[error("Failed to resize frame: {0}")]
    ResizeFailed(opencv::Error),
    #[error("Failed to encode frame: {0}")]
    EncodeFrameFailed(opencv::Error),
    #[error("Encoder rejected the working frame")]
    EncoderRejected,
}

/// Downscaled frame ready to be sent for detection.
#[derive(Debug)]
pub struct PreparedFrame {
    pub image_data: Vec<u8>,
    pub geometry: FrameGeometry,
}

pub fn preprocess(frame: &Mat, downscale_factor: f64) -> Result<PreparedFrame, PreprocessError> {
    if !downscale_factor.is_finite() || downscale_factor <= 0.0 {
        return Err(PreprocessError::InvalidFactor(downscale_factor));
    }
    if frame.empty() {
        return Err(PreprocessError::EmptyFrame);
    }

    let geometry = FrameGeometry::for_downscale(frame.cols(), frame.rows(), downscale_factor);

    let mut resized = Mat::default();
    imgproc::resize(
        frame,
        &mut resized,
        Size::new(geometry.working_width, geometry.working_height),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )
    .map_err(PreprocessError::ResizeFailed)?;

    let mut buf = Vector::<u8>::new();
    let encoded = imgcodecs::imencode(".png", &resized, &mut buf, &Vector::new())
        .map_err(PreprocessError::EncodeFrameFailed)?;
    if !encoded {
        return Err(PreprocessError::EncoderRejected);
    }

    Ok(PreparedFrame {
        image_data: buf.into(),
        geometry,
    })
}
