//! Content-type and content-encoding transformation, via the codec.

use crate::codec::convert;
use crate::error::GatewayError;
use crate::model::{Body, ContentEncoding, ContentType};
use bytes::Bytes;

/// Converts the body to the target content type. When the target equals
/// the source, the source is unknown, or no target is configured, the
/// body is returned unchanged without error. Conversion always yields an
/// identity-encoded body.
pub fn modify_content_type(
    body: &Body,
    target: Option<ContentType>,
) -> Result<Body, GatewayError> {
    let Some(target) = target else {
        return Ok(body.clone());
    };
    if body.content_type().is_unknown() || body.content_type() == target {
        return Ok(body.clone());
    }

    let raw = body.decoded_bytes()?;
    let (content_type, bytes) = match target {
        ContentType::Text => {
            let quoted = serde_json::to_string(&String::from_utf8_lossy(&raw).into_owned())
                .map_err(|e| GatewayError::content_conversion(e.to_string()))?;
            (ContentType::Text, Bytes::from(quoted))
        }
        ContentType::Json => {
            let converted = if body.content_type() == ContentType::Xml {
                convert::xml_to_json(&raw)?
            } else {
                convert::text_to_json(&raw)?
            };
            (ContentType::Json, converted)
        }
        ContentType::Xml => {
            let converted = if body.content_type() == ContentType::Json {
                convert::json_to_xml(&raw)?
            } else {
                convert::text_to_xml(&raw)?
            };
            (ContentType::Xml, converted)
        }
        ContentType::FormData | ContentType::Unknown => return Ok(body.clone()),
    };

    Ok(Body::new(content_type, ContentEncoding::Identity, bytes))
}

/// Re-encodes the body with the target encoding. No target preserves the
/// current encoding (gzip/deflate stay, everything else is identity).
pub fn modify_content_encoding(
    body: &Body,
    target: Option<ContentEncoding>,
) -> Result<Body, GatewayError> {
    let target = target.unwrap_or_else(|| body.content_encoding());
    body.with_encoding(target)
}
