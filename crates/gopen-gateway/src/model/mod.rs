//! Request/response value model.
//!
//! Every type here is immutable: mutators return a new instance, so the
//! values are safe to share across tasks without locks.

mod body;
mod header;
mod history;
mod path;
mod query;
mod request;
mod response;

pub use body::{Body, ContentEncoding, ContentType};
pub use header::{
    Header, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, X_FORWARDED_FOR, X_GOPEN_CACHE,
    X_GOPEN_CACHE_TTL, X_GOPEN_COMPLETE, X_GOPEN_SUCCESS, X_TRACE_ID,
};
pub use history::{History, HistoryEntry};
pub use path::UrlPath;
pub use query::Query;
pub use request::HttpRequest;
pub use response::{BackendRequest, BackendResponse, HttpResponse};
