//! Buffered message body.
//!
//! The raw bytes always reflect the declared content encoding (compressed
//! when gzip/deflate); structured accessors decompress transparently.

use crate::codec::compress;
use crate::error::GatewayError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    Json,
    Xml,
    Text,
    FormData,
    #[default]
    Unknown,
}

impl ContentType {
    /// Parses a `Content-Type` header value, ignoring parameters.
    pub fn parse(header_value: &str) -> Self {
        let mime = header_value
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "application/json" | "text/json" => Self::Json,
            "application/xml" | "text/xml" => Self::Xml,
            "text/plain" => Self::Text,
            "multipart/form-data" | "application/x-www-form-urlencoded" => Self::FormData,
            _ => Self::Unknown,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Xml => "application/xml",
            Self::Text => "text/plain",
            Self::FormData => "multipart/form-data",
            Self::Unknown => "application/octet-stream",
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    #[default]
    Identity,
    Gzip,
    Deflate,
}

impl ContentEncoding {
    pub fn parse(header_value: &str) -> Self {
        match header_value.trim().to_ascii_lowercase().as_str() {
            "gzip" => Self::Gzip,
            "deflate" => Self::Deflate,
            _ => Self::Identity,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    content_type: ContentType,
    content_encoding: ContentEncoding,
    bytes: Bytes,
}

impl Body {
    /// Builds a body from header values and raw (possibly compressed)
    /// bytes. Empty bytes yield `None`.
    pub fn from_headers(
        content_type: Option<&str>,
        content_encoding: Option<&str>,
        bytes: Bytes,
    ) -> Option<Self> {
        if bytes.is_empty() {
            return None;
        }
        Some(Self {
            content_type: content_type.map(ContentType::parse).unwrap_or_default(),
            content_encoding: content_encoding.map(ContentEncoding::parse).unwrap_or_default(),
            bytes,
        })
    }

    pub fn new(content_type: ContentType, content_encoding: ContentEncoding, bytes: Bytes) -> Self {
        Self {
            content_type,
            content_encoding,
            bytes,
        }
    }

    pub fn json(value: &Value) -> Self {
        Self {
            content_type: ContentType::Json,
            content_encoding: ContentEncoding::Identity,
            bytes: Bytes::from(serde_json::to_vec(value).unwrap_or_default()),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: ContentType::Text,
            content_encoding: ContentEncoding::Identity,
            bytes: Bytes::from(text.into()),
        }
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn content_encoding(&self) -> ContentEncoding {
        self.content_encoding
    }

    /// Bytes exactly as declared by the content encoding.
    pub fn raw_bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Length in the current encoding; what `Content-Length` reports.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decompressed bytes, regardless of the declared encoding.
    pub fn decoded_bytes(&self) -> Result<Bytes, GatewayError> {
        match self.content_encoding {
            ContentEncoding::Identity => Ok(self.bytes.clone()),
            ContentEncoding::Gzip => compress::decompress_gzip(&self.bytes),
            ContentEncoding::Deflate => compress::decompress_deflate(&self.bytes),
        }
    }

    /// Decompressed text form.
    pub fn to_text(&self) -> Result<String, GatewayError> {
        let bytes = self.decoded_bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Structured form for shaping and the dynamic-value resolver: JSON
    /// bodies parse to their document, everything else to a string.
    pub fn to_json(&self) -> Result<Value, GatewayError> {
        let bytes = self.decoded_bytes()?;
        if self.content_type.is_json() {
            serde_json::from_slice(&bytes).map_err(|e| {
                GatewayError::content_conversion(format!("Failed to parse JSON body: {e}"))
            })
        } else {
            Ok(Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        }
    }

    /// A new body with the same type/encoding and replaced structured
    /// content, re-encoded to honor the declared encoding.
    pub fn with_json(&self, value: &Value) -> Result<Self, GatewayError> {
        let plain = Bytes::from(serde_json::to_vec(value).unwrap_or_default());
        let bytes = match self.content_encoding {
            ContentEncoding::Identity => plain,
            ContentEncoding::Gzip => compress::compress_gzip(&plain)?,
            ContentEncoding::Deflate => compress::compress_deflate(&plain)?,
        };
        Ok(Self {
            content_type: self.content_type,
            content_encoding: self.content_encoding,
            bytes,
        })
    }

    /// A new body re-encoded with the target content encoding.
    pub fn with_encoding(&self, target: ContentEncoding) -> Result<Self, GatewayError> {
        if self.content_encoding == target {
            return Ok(self.clone());
        }
        let plain = self.decoded_bytes()?;
        let bytes = match target {
            ContentEncoding::Identity => plain,
            ContentEncoding::Gzip => compress::compress_gzip(&plain)?,
            ContentEncoding::Deflate => compress::compress_deflate(&plain)?,
        };
        Ok(Self {
            content_type: self.content_type,
            content_encoding: target,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_type_parse() {
        assert_eq!(ContentType::parse("application/json; charset=utf-8"), ContentType::Json);
        assert_eq!(ContentType::parse("text/xml"), ContentType::Xml);
        assert_eq!(ContentType::parse("text/plain"), ContentType::Text);
        assert_eq!(ContentType::parse("multipart/form-data; boundary=x"), ContentType::FormData);
        assert_eq!(ContentType::parse("image/png"), ContentType::Unknown);
    }

    #[test]
    fn test_empty_bytes_yield_no_body() {
        assert!(Body::from_headers(Some("application/json"), None, Bytes::new()).is_none());
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let body = Body::json(&json!({"a": 1, "b": "x"}));
        for target in [ContentEncoding::Identity, ContentEncoding::Gzip, ContentEncoding::Deflate] {
            let encoded = body.with_encoding(target).unwrap();
            assert_eq!(encoded.content_encoding(), target);
            let decoded = encoded.with_encoding(ContentEncoding::Identity).unwrap();
            assert_eq!(decoded.raw_bytes(), body.raw_bytes());
        }
    }

    #[test]
    fn test_len_reflects_current_encoding() {
        let text: String = "repetitive ".repeat(100);
        let body = Body::text(text.clone());
        let gzipped = body.with_encoding(ContentEncoding::Gzip).unwrap();
        assert_eq!(body.len(), text.len());
        assert!(gzipped.len() < body.len());
        assert_eq!(gzipped.to_text().unwrap(), text);
    }

    #[test]
    fn test_to_json_transparently_decompresses() {
        let body = Body::json(&json!({"userId": "u-7"}))
            .with_encoding(ContentEncoding::Gzip)
            .unwrap();
        assert_eq!(body.to_json().unwrap(), json!({"userId": "u-7"}));
    }

    #[test]
    fn test_non_json_to_json_is_string() {
        let body = Body::text("hello");
        assert_eq!(body.to_json().unwrap(), json!("hello"));
    }
}
