use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use thiserror::Error;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::instrument;

const FRAME_BOUNDARY: &str = "frame";
pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

#[derive(Error, Debug)]
pub enum VideoStreamError {
    #[error("Http builder error: {0}")]
    HttpBuilderError(String),
}

#[derive(Clone)]
pub struct VideoStream {
    frames: watch::Receiver<Option<Bytes>>,
}

fn multipart_chunk(frame: &[u8]) -> Bytes {
    let part_header = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        FRAME_BOUNDARY,
        frame.len()
    );
    let mut body = part_header.into_bytes();
    body.extend_from_slice(frame);
    body.extend_from_slice(b"\r\n");
    Bytes::from(body)
}

impl VideoStream {
    pub fn new(frames: watch::Receiver<Option<Bytes>>) -> Self {
        Self { frames }
    }

    /// Multipart JPEG parts, one per frame published by the live loop.
    ///
    /// Slow clients skip frames rather than queue them. The stream ends when
    /// the live loop drops its sender.
    #[instrument(skip(self))]
    pub fn generate_stream(self) -> impl Stream<Item = Result<Bytes, Infallible>> {
        WatchStream::new(self.frames).filter_map(|frame| async move {
            frame.map(|jpg| Ok::<_, Infallible>(multipart_chunk(&jpg)))
        })
    }
}
