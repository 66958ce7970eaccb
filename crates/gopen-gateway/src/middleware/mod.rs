//! The middleware chain run around the endpoint orchestrator.
//!
//! Dynamic endpoints: timeout → panic-recovery → log → cors → limiter →
//! cache → orchestrator. Static endpoints skip cors and cache. The
//! stages are driven in that fixed order by the server handler.

pub mod cache;
pub mod cors;
pub mod log;
pub mod recovery;
pub mod timeout;
pub mod trace;

pub use cache::CacheMiddleware;
pub use log::RequestLog;
