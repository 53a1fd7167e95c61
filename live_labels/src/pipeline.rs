use crate::config::Config;
use crate::dedup::deduplicate;
use crate::detection::{DetectedLabel, Detection, FrameGeometry};
use crate::detector::{DetectionRequest, DetectorError, LabelDetector};
use crate::normalizer::normalize;
use crate::preprocess::{preprocess, PreparedFrame, PreprocessError};
use opencv::core::Mat;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Preprocess error: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("Detector error: {0}")]
    Detector(#[from] DetectorError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub downscale_factor: f64,
    pub max_labels: u32,
    pub min_confidence: f64,
    pub iou_threshold: f64,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            downscale_factor: config.camera.downscale_factor,
            max_labels: config.detection_service.max_labels,
            min_confidence: config.detection_service.min_confidence,
            iou_threshold: config.annotation.iou_threshold,
        }
    }
}

/// Turns a captured frame into the deduplicated annotations to draw on it.
pub struct AnnotationPipeline<D: LabelDetector> {
    detector: Arc<D>,
    settings: PipelineSettings,
}

impl<D: LabelDetector> AnnotationPipeline<D> {
    pub fn new(detector: Arc<D>, settings: PipelineSettings) -> Self {
        Self { detector, settings }
    }

    /// Downscales and encodes `frame` for the detector.
    pub fn prepare(&self, frame: &Mat) -> Result<PreparedFrame, PipelineError> {
        Ok(preprocess(frame, self.settings.downscale_factor)?)
    }

    #[instrument(skip(self, prepared), fields(image_bytes = prepared.image_data.len()))]
    pub async fn annotate(&self, prepared: PreparedFrame) -> Result<Vec<Detection>, PipelineError> {
        let labels = self
            .detector
            .detect_labels(DetectionRequest {
                image_data: prepared.image_data,
                max_labels: self.settings.max_labels,
                min_confidence: self.settings.min_confidence,
            })
            .await?;

        Ok(self.consolidate(&labels, &prepared.geometry))
    }

    /// Pure part of the pipeline: confidence floor, remap, then overlap suppression.
    pub fn consolidate(
        &self,
        labels: &[DetectedLabel],
        geometry: &FrameGeometry,
    ) -> Vec<Detection> {
        let accepted: Vec<DetectedLabel> = labels
            .iter()
            .filter(|label| {
                label.confidence >= self.settings.min_confidence || label.confidence.is_nan()
            })
            .cloned()
            .collect();

        let candidates = normalize(&accepted, geometry);
        let candidate_count = candidates.len();
        let kept = deduplicate(candidates, self.settings.iou_threshold);
        tracing::debug!(
            labels = labels.len(),
            candidates = candidate_count,
            kept = kept.len(),
            "Consolidated detections"
        );
        kept
    }
}
