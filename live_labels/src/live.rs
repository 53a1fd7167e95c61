use crate::camera::{Camera, CameraError};
use crate::config::CameraConfig;
use crate::detector::LabelDetector;
use crate::overlay;
use crate::pipeline::{AnnotationPipeline, PipelineError};
use crate::preprocess::PreparedFrame;
use crate::snapshot::AnnotationSnapshot;
use crate::telemetry::Metrics;
use bytes::Bytes;
use opencv::core::Mat;
use std::sync::Arc;
use thiserror::Error;
use tokio::{
    sync::{broadcast, watch},
    time::{interval, Duration, Instant, MissedTickBehavior},
};

#[derive(Error, Debug)]
pub enum LiveError {
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),
}

/// Anything the live loop can pull frames from.
pub trait FrameSource: Send + 'static {
    fn read_frame(&mut self) -> Result<Option<Mat>, CameraError>;
}

impl FrameSource for Camera {
    fn read_frame(&mut self) -> Result<Option<Mat>, CameraError> {
        Camera::read_frame(self)
    }
}

/// Receiving ends of what the live loop publishes.
#[derive(Clone)]
pub struct LiveFeed {
    pub frames: watch::Receiver<Option<Bytes>>,
    pub snapshots: watch::Receiver<Arc<AnnotationSnapshot>>,
}

/// Runs one detection round and turns its outcome into the next snapshot.
struct Sampler<D: LabelDetector> {
    pipeline: AnnotationPipeline<D>,
    metrics: Arc<Metrics>,
}

/// A frame that went through preprocessing, timed from before the resize.
struct PendingSample {
    started: Instant,
    prepared: Result<PreparedFrame, PipelineError>,
}

impl<D: LabelDetector> Sampler<D> {
    fn prepare(&self, frame: &Mat) -> PendingSample {
        let started = Instant::now();
        PendingSample {
            started,
            prepared: self.pipeline.prepare(frame),
        }
    }

    async fn sample(
        &self,
        pending: PendingSample,
        tick: u64,
        frame_index: u64,
    ) -> Option<Arc<AnnotationSnapshot>> {
        let PendingSample { started, prepared } = pending;
        let result = match prepared {
            Ok(prepared) => self.pipeline.annotate(prepared).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(detections) => {
                let snapshot = AnnotationSnapshot::new(tick, frame_index, detections);
                self.metrics.record_detection(
                    started.elapsed().as_millis() as u64,
                    snapshot.detections.len(),
                );
                if !snapshot.is_empty() {
                    tracing::info!("Detected: {}", snapshot.summary());
                }
                Some(Arc::new(snapshot))
            }
            Err(e) => {
                tracing::error!("Detection round {} failed: {:?}", tick, e);
                self.metrics.record_detection_failure();
                None
            }
        }
    }
}

/// Capture, sample and render loop.
///
/// Every frame is drawn with the current snapshot. Every
/// `sampling_interval_frames`-th frame also goes through the annotation
/// pipeline first; a successful round replaces the snapshot, a failed one is
/// logged and the previous snapshot stays on screen.
pub struct LiveAnnotator<S: FrameSource, D: LabelDetector> {
    source: S,
    sampler: Sampler<D>,
    sampling_interval_frames: u64,
    frame_delay: Duration,
    frames_tx: watch::Sender<Option<Bytes>>,
    snapshots_tx: watch::Sender<Arc<AnnotationSnapshot>>,
}

impl<S: FrameSource, D: LabelDetector> LiveAnnotator<S, D> {
    pub fn new(
        source: S,
        pipeline: AnnotationPipeline<D>,
        camera_config: &CameraConfig,
        metrics: Arc<Metrics>,
    ) -> (Self, LiveFeed) {
        let (frames_tx, frames) = watch::channel(None);
        let (snapshots_tx, snapshots) = watch::channel(Arc::new(AnnotationSnapshot::default()));

        let annotator = Self {
            source,
            sampler: Sampler { pipeline, metrics },
            sampling_interval_frames: camera_config.sampling_interval_frames.max(1),
            frame_delay: Duration::from_millis(camera_config.get_stream_delay_ms().max(1)),
            frames_tx,
            snapshots_tx,
        };
        (annotator, LiveFeed { frames, snapshots })
    }

    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<(), LiveError> {
        let mut frame_count: u64 = 0;
        let mut tick: u64 = 0;
        let mut snapshot = Arc::new(AnnotationSnapshot::default());
        let mut pacer = interval(self.frame_delay);
        pacer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            "Starting live annotation, sampling every {} frames",
            self.sampling_interval_frames
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::info!("Live loop received shutdown signal");
                    break;
                }
                _ = pacer.tick() => {},
            }

            let Some(mut frame) = self.source.read_frame()? else {
                tracing::info!("Video source stopped producing frames");
                break;
            };
            frame_count += 1;

            if frame_count % self.sampling_interval_frames == 0 {
                tick += 1;
                let pending = self.sampler.prepare(&frame);
                if let Some(next) = self.sampler.sample(pending, tick, frame_count).await {
                    snapshot = next;
                    self.snapshots_tx.send_replace(snapshot.clone());
                }
            }

            if let Err(e) = self.render(&mut frame, &snapshot) {
                tracing::error!("Failed to render frame {}: {:?}", frame_count, e);
            }
        }

        tracing::info!("Live loop stopped after {} frames", frame_count);
        Ok(())
    }

    fn render(
        &self,
        frame: &mut Mat,
        snapshot: &AnnotationSnapshot,
    ) -> Result<(), overlay::OverlayError> {
        overlay::annotate(frame, &snapshot.detections)?;
        let jpg = overlay::encode_jpg(frame)?;
        self.frames_tx.send_replace(Some(Bytes::from(jpg)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{DetectedLabel, LabelInstance, NormalizedBox};
    use crate::detector::{DetectionRequest, DetectorError};
    use crate::pipeline::PipelineSettings;
    use opencv::core::{Scalar, CV_8UC3};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tonic::{async_trait, Status};

    struct SyntheticSource {
        remaining: usize,
    }

    impl FrameSource for SyntheticSource {
        fn read_frame(&mut self) -> Result<Option<Mat>, CameraError> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            let frame = Mat::new_rows_cols_with_default(120, 160, CV_8UC3, Scalar::all(30.0))
                .map_err(CameraError::ReadFrameFailed)?;
            Ok(Some(frame))
        }
    }

    struct CountingDetector {
        calls: AtomicUsize,
        fail_after: usize,
    }

    #[async_trait]
    impl LabelDetector for CountingDetector {
        async fn detect_labels(
            &self,
            _request: DetectionRequest,
        ) -> Result<Vec<DetectedLabel>, DetectorError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call >= self.fail_after {
                return Err(DetectorError::GrpcRequestFailed(Status::unavailable(
                    "service down",
                )));
            }
            Ok(vec![DetectedLabel {
                name: "Dog".to_string(),
                confidence: 90.0 + call as f64,
                instances: vec![LabelInstance {
                    bounding_box: Some(NormalizedBox {
                        left: 0.25,
                        top: 0.25,
                        width: 0.5,
                        height: 0.5,
                    }),
                }],
            }])
        }
    }

    fn camera_config(sampling_interval_frames: u64) -> CameraConfig {
        CameraConfig {
            device_index: 0,
            stream_fps: 1000,
            sampling_interval_frames,
            downscale_factor: 0.5,
        }
    }

    fn annotator(
        frames: usize,
        sampling_interval_frames: u64,
        detector: Arc<CountingDetector>,
    ) -> (LiveAnnotator<SyntheticSource, CountingDetector>, LiveFeed) {
        let pipeline = AnnotationPipeline::new(
            detector,
            PipelineSettings {
                downscale_factor: 0.5,
                max_labels: 20,
                min_confidence: 60.0,
                iou_threshold: 0.5,
            },
        );
        LiveAnnotator::new(
            SyntheticSource { remaining: frames },
            pipeline,
            &camera_config(sampling_interval_frames),
            Arc::new(Metrics::new().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_samples_every_nth_frame() {
        let detector = Arc::new(CountingDetector {
            calls: AtomicUsize::new(0),
            fail_after: usize::MAX,
        });
        let (annotator, feed) = annotator(5, 2, detector.clone());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        annotator.run(shutdown_rx).await.unwrap();
        drop(shutdown_tx);

        assert_eq!(detector.calls.load(Ordering::SeqCst), 2);
        let snapshot = feed.snapshots.borrow().clone();
        assert_eq!(snapshot.tick, 2);
        assert_eq!(snapshot.frame_index, 4);
        assert_eq!(snapshot.detections.len(), 1);
        assert_eq!(snapshot.detections[0].label, "Dog: 91.00%");
        assert_eq!(snapshot.detections[0].bbox.x, 40);
        assert_eq!(snapshot.detections[0].bbox.width, 80);

        let frame = feed.frames.borrow().clone().unwrap();
        assert_eq!(&frame[..2], &[0xff, 0xd8]);
    }

    #[tokio::test]
    async fn test_failed_round_keeps_previous_snapshot() {
        let detector = Arc::new(CountingDetector {
            calls: AtomicUsize::new(0),
            fail_after: 1,
        });
        let (annotator, feed) = annotator(6, 2, detector.clone());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        annotator.run(shutdown_rx).await.unwrap();
        drop(shutdown_tx);

        assert_eq!(detector.calls.load(Ordering::SeqCst), 3);
        let snapshot = feed.snapshots.borrow().clone();
        assert_eq!(snapshot.tick, 1);
        assert_eq!(snapshot.detections[0].label, "Dog: 90.00%");
    }

    #[tokio::test]
    async fn test_detection_duration_includes_preprocessing() {
        let detector = Arc::new(CountingDetector {
            calls: AtomicUsize::new(0),
            fail_after: usize::MAX,
        });
        let metrics = Arc::new(Metrics::new().unwrap());
        let sampler = Sampler {
            pipeline: AnnotationPipeline::new(
                detector,
                PipelineSettings {
                    downscale_factor: 0.5,
                    max_labels: 20,
                    min_confidence: 60.0,
                    iou_threshold: 0.5,
                },
            ),
            metrics: metrics.clone(),
        };
        let frame =
            Mat::new_rows_cols_with_default(120, 160, CV_8UC3, Scalar::all(30.0)).unwrap();

        let pending = sampler.prepare(&frame);
        std::thread::sleep(std::time::Duration::from_millis(50));
        let snapshot = sampler.sample(pending, 1, 1).await.unwrap();
        assert_eq!(snapshot.detections.len(), 1);

        let families = metrics.registry.gather();
        let duration = families
            .iter()
            .find(|family| family.get_name().starts_with("detection_duration_ms"))
            .unwrap();
        let histogram = duration.get_metric()[0].get_histogram();
        assert_eq!(histogram.get_sample_count(), 1);
        assert!(histogram.get_sample_sum() >= 50.0);
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let detector = Arc::new(CountingDetector {
            calls: AtomicUsize::new(0),
            fail_after: usize::MAX,
        });
        let (annotator, feed) = annotator(usize::MAX, 1_000, detector.clone());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        shutdown_tx.send(()).unwrap();

        annotator.run(shutdown_rx).await.unwrap();

        assert_eq!(detector.calls.load(Ordering::SeqCst), 0);
        assert_eq!(feed.snapshots.borrow().tick, 0);
    }
}
