use crate::camera::Camera;
use crate::config::Config;
use crate::detector::GrpcLabelDetector;
use crate::live::LiveAnnotator;
use crate::pipeline::{AnnotationPipeline, PipelineSettings};
use crate::server::{HttpServer, SharedState};
use crate::telemetry::Metrics;

use std::{error::Error, sync::Arc};
use tokio::{signal, sync::broadcast};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let camera = match Camera::open(&config.camera) {
        Ok(cam) => cam,
        Err(e) => {
            tracing::error!("Failed to initialize camera: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let detector = match GrpcLabelDetector::connect(&config.detection_service).await {
        Ok(detector) => Arc::new(detector),
        Err(e) => {
            tracing::error!("Failed to connect to detection service: {:?}", e);
            return Err(Box::new(e));
        }
    };

    let metrics = Arc::new(Metrics::new()?);
    let pipeline = AnnotationPipeline::new(detector, PipelineSettings::from(&config));
    let (annotator, feed) = LiveAnnotator::new(camera, pipeline, &config.camera, metrics.clone());

    let server = HttpServer::new(SharedState { feed, metrics }, &config.server).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_handle = server.run(shutdown_tx.subscribe());
    let live_handle = tokio::spawn(annotator.run(shutdown_tx.subscribe()));

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    match live_handle.await {
        Ok(Err(e)) => tracing::error!("Live loop failed: {:?}", e),
        Err(e) => tracing::error!("Live loop panicked: {:?}", e),
        Ok(Ok(())) => {}
    }
    let _ = server_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {:?}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {:?}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
