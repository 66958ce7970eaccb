// Library exports for integration tests and embedding.

// ===== Request-processing pipeline =====
pub mod dynamic;
pub mod executor;
pub mod jsonpath;
pub mod limiter;
pub mod pipeline;
pub mod shaper;

// ===== Value model and codecs =====
pub mod codec;
pub mod model;

// ===== Edges: config, transport, cache, server =====
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod server;

pub use config::Gopen;
pub use error::{ErrorKind, GatewayError};
pub use server::GatewayServer;
