use crate::config::CameraConfig;
use opencv::{core::Mat, prelude::*, videoio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera {0}: {1}")]
    OpenCameraFailed(i32, opencv::Error),
    #[error("Camera {0} is not available")]
    NotOpened(i32),
    #[error("Failed to read frame: {0}")]
    ReadFrameFailed(opencv::Error),
}

pub struct Camera {
    capture: videoio::VideoCapture,
}

impl Camera {
    pub fn open(config: &CameraConfig) -> Result<Self, CameraError> {
        let capture = videoio::VideoCapture::new(config.device_index, videoio::CAP_ANY)
            .map_err(|e| CameraError::OpenCameraFailed(config.device_index, e))?;
        let opened = capture
            .is_opened()
            .map_err(|e| CameraError::OpenCameraFailed(config.device_index, e))?;
        if !opened {
            return Err(CameraError::NotOpened(config.device_index));
        }
        tracing::info!("Opened camera {}", config.device_index);
        Ok(Self { capture })
    }

    /// Next frame, or `None` once the source stops producing frames.
    pub fn read_frame(&mut self) -> Result<Option<Mat>, CameraError> {
        let mut frame = Mat::default();
        let grabbed = self
            .capture
            .read(&mut frame)
            .map_err(CameraError::ReadFrameFailed)?;
        if !grabbed || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }
}
