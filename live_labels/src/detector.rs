use crate::config::DetectionServiceConfig;
use crate::detection::{DetectedLabel, LabelInstance, NormalizedBox};
use label_proto::{label_service_client::LabelServiceClient, DetectLabelsRequest};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::{
    sync::Mutex,
    time::{sleep, timeout, Duration},
};
use tonic::{async_trait, transport::Channel, Request, Status};
use tracing::instrument;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Maximum connection retries exceeded.")]
    MaxRetriesExceeded,
    #[error("gRPC request failed: {0}")]
    GrpcRequestFailed(#[from] Status),
    #[error("Detection request timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone)]
pub struct DetectionRequest {
    pub image_data: Vec<u8>,
    pub max_labels: u32,
    pub min_confidence: f64,
}

/// Remote service that labels objects in an encoded image.
#[async_trait]
pub trait LabelDetector: Send + Sync + 'static {
    async fn detect_labels(
        &self,
        request: DetectionRequest,
    ) -> Result<Vec<DetectedLabel>, DetectorError>;
}

impl From<label_proto::BoundingBox> for NormalizedBox {
    fn from(bbox: label_proto::BoundingBox) -> Self {
        NormalizedBox {
            left: bbox.left,
            top: bbox.top,
            width: bbox.width,
            height: bbox.height,
        }
    }
}

impl From<label_proto::Label> for DetectedLabel {
    fn from(label: label_proto::Label) -> Self {
        DetectedLabel {
            name: label.name,
            confidence: label.confidence,
            instances: label
                .instances
                .into_iter()
                .map(|instance| LabelInstance {
                    bounding_box: instance.bounding_box.map(NormalizedBox::from),
                })
                .collect(),
        }
    }
}

pub struct GrpcLabelDetector {
    client: Mutex<LabelServiceClient<Channel>>,
    request_timeout: Duration,
}

impl GrpcLabelDetector {
    pub async fn connect(config: &DetectionServiceConfig) -> Result<Self, DetectorError> {
        let client = Self::get_client(config.get_address()).await?;
        Ok(Self {
            client: Mutex::new(client),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        })
    }

    async fn get_client(address: String) -> Result<LabelServiceClient<Channel>, DetectorError> {
        let mut retry_delay = Duration::from_millis(50);
        let max_retry_delay = Duration::from_secs(1);
        let max_retries = 10;
        let mut retry_count = 0;

        while retry_count < max_retries {
            match timeout(
                Duration::from_secs(1),
                LabelServiceClient::connect(address.clone()),
            )
            .await
            {
                Ok(Ok(client)) => return Ok(client),
                Ok(Err(e)) => {
                    tracing::error!("Failed to connect to gRPC server: {:?}", e);
                }
                Err(_) => {
                    tracing::error!("Connection timeout");
                }
            }

            retry_count += 1;
            let jitter = rand::random::<f32>() * 0.2 + 0.9;
            sleep(retry_delay.mul_f32(jitter)).await;
            retry_delay = (retry_delay * 2).min(max_retry_delay);
        }

        Err(DetectorError::MaxRetriesExceeded)
    }
}

#[async_trait]
impl LabelDetector for GrpcLabelDetector {
    #[instrument(skip(self, request), fields(image_bytes = request.image_data.len()))]
    async fn detect_labels(
        &self,
        request: DetectionRequest,
    ) -> Result<Vec<DetectedLabel>, DetectorError> {
        let mut client = self.client.lock().await;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;

        let request = Request::new(DetectLabelsRequest {
            image_data: request.image_data,
            timestamp,
            max_labels: request.max_labels,
            min_confidence: request.min_confidence,
        });

        let response = timeout(self.request_timeout, client.detect_labels(request))
            .await
            .map_err(|_| DetectorError::Timeout(self.request_timeout))??;
        let labels = response.into_inner().labels;
        tracing::debug!("Received {} labels", labels.len());

        Ok(labels.into_iter().map(DetectedLabel::from).collect())
    }
}
