//! Content codecs: JSON/XML/text conversion and body compression.

pub mod compress;
pub mod convert;
