mod camera;
mod live;
mod overlay;
mod routes;
mod server;
mod stream;
mod telemetry;

pub mod app;
pub mod color;
pub mod config;
pub mod dedup;
pub mod detection;
pub mod detector;
pub mod normalizer;
pub mod pipeline;
pub mod preprocess;
pub mod snapshot;

pub use app::start_app;
