//! Body shaping: the transformation stages applied to backend responses
//! and the final composed response.
//!
//! Every stage takes and returns a `Body` plus a list of errors; errors
//! accumulate instead of aborting, so the pipeline always produces a
//! best-effort response.

mod aggregate;
mod case;
mod content;
mod mapping;
mod modifier;
mod omit;
mod project;

pub use aggregate::{aggregate_bodies, aggregate_bodies_into_slice, aggregate_headers};
pub use case::to_case;
pub use content::{modify_content_encoding, modify_content_type};
pub use mapping::map_fields;
pub use modifier::{apply_request_modifiers, apply_response_modifiers};
pub use omit::omit_empty;
pub use project::project;
