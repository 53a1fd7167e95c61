use crate::{config::ServerConfig, live::LiveFeed, routes::api_routes, telemetry::Metrics};
use axum::Router;
use axum_otel_metrics::HttpMetricsLayerBuilder;
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, sync::broadcast::Receiver, task::JoinHandle};

#[derive(Clone)]
pub struct SharedState {
    pub feed: LiveFeed,
    pub metrics: Arc<Metrics>,
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(state: SharedState, config: &ServerConfig) -> anyhow::Result<Self> {
        let addr = config.get_address();

        let metrics_layer = HttpMetricsLayerBuilder::new().build();

        let router = Router::new()
            .merge(api_routes())
            .with_state(state)
            .layer(metrics_layer);

        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn run(self, mut shutdown_rx: Receiver<()>) -> JoinHandle<anyhow::Result<()>> {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!("Starting app on {}", addr);
        }

        let listener = self.listener;
        let router = self.router;
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown_rx.recv().await.ok();
                })
                .await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::color_for;
    use crate::detection::{Detection, PixelBox};
    use crate::snapshot::AnnotationSnapshot;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpStream,
        sync::{broadcast, watch},
    };

    async fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_routes() -> anyhow::Result<()> {
        let (_frames_tx, frames) = watch::channel(None);
        let snapshot = AnnotationSnapshot::new(
            7,
            420,
            vec![Detection {
                name: "Dog".to_string(),
                confidence: 95.0,
                label: "Dog: 95.00%".to_string(),
                bbox: PixelBox::new(0, 0, 100, 100),
                color: color_for("Dog"),
            }],
        );
        let (_snapshots_tx, snapshots) = watch::channel(Arc::new(snapshot));
        let state = SharedState {
            feed: LiveFeed { frames, snapshots },
            metrics: Arc::new(Metrics::new()?),
        };
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };

        let server = HttpServer::new(state, &config).await?;
        let addr = server.local_addr()?;
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = server.run(shutdown_rx);

        let health = get(addr, "/health").await;
        assert!(health.starts_with("HTTP/1.1 200"));
        assert!(health.contains(r#"{"status":"Available","streaming":false,"last_tick":7}"#));

        let detections = get(addr, "/detections").await;
        assert!(detections.starts_with("HTTP/1.1 200"));
        assert!(detections.contains(r#""tick":7"#));
        assert!(detections.contains(r#""label":"Dog: 95.00%""#));

        let metrics = get(addr, "/metrics").await;
        assert!(metrics.contains("requests_total"));

        shutdown_tx.send(())?;
        handle.await??;

        Ok(())
    }
}
