//! Bidirectional content conversion: JSON ⇄ XML ⇄ plain text.
//!
//! XML documents are rooted at `<root>`. Repeated sibling elements map to
//! JSON arrays; element text maps to JSON strings. Field order is
//! preserved within a single conversion direction.

use crate::error::GatewayError;
use bytes::Bytes;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::{Map, Value};
use std::fmt::Display;

fn conversion_err(e: impl Display) -> GatewayError {
    GatewayError::content_conversion(e.to_string())
}

pub fn json_to_xml(bytes: &[u8]) -> Result<Bytes, GatewayError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| GatewayError::content_conversion(format!("Invalid JSON: {e}")))?;
    let mut writer = Writer::new(Vec::new());
    match &value {
        Value::Array(items) => {
            writer
                .write_event(Event::Start(BytesStart::new("root")))
                .map_err(conversion_err)?;
            for item in items {
                write_element(&mut writer, "element", item)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new("root")))
                .map_err(conversion_err)?;
        }
        other => write_element(&mut writer, "root", other)?,
    }
    Ok(Bytes::from(writer.into_inner()))
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    value: &Value,
) -> Result<(), GatewayError> {
    match value {
        Value::Object(map) => {
            writer
                .write_event(Event::Start(BytesStart::new(name)))
                .map_err(conversion_err)?;
            for (key, child) in map {
                write_element(writer, key, child)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new(name)))
                .map_err(conversion_err)
        }
        Value::Array(items) => {
            for item in items {
                write_element(writer, name, item)?;
            }
            Ok(())
        }
        Value::Null => writer
            .write_event(Event::Empty(BytesStart::new(name)))
            .map_err(conversion_err),
        other => {
            let text = match other {
                Value::String(s) => s.clone(),
                _ => other.to_string(),
            };
            writer
                .write_event(Event::Start(BytesStart::new(name)))
                .map_err(conversion_err)?;
            writer
                .write_event(Event::Text(BytesText::new(&text)))
                .map_err(conversion_err)?;
            writer
                .write_event(Event::End(BytesEnd::new(name)))
                .map_err(conversion_err)
        }
    }
}

pub fn xml_to_json(bytes: &[u8]) -> Result<Bytes, GatewayError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut document = Map::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(conversion_err)? {
            Event::Start(start) => {
                let name = element_name(&start);
                let child = parse_element(&mut reader)?;
                insert_child(&mut document, name, child);
            }
            Event::Empty(start) => {
                let name = element_name(&start);
                insert_child(&mut document, name, Value::Null);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    serde_json::to_vec(&Value::Object(document))
        .map(Bytes::from)
        .map_err(conversion_err)
}

fn parse_element(reader: &mut Reader<&[u8]>) -> Result<Value, GatewayError> {
    let mut buf = Vec::new();
    let mut children = Map::new();
    let mut text = String::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(conversion_err)? {
            Event::Start(start) => {
                let name = element_name(&start);
                let child = parse_element(reader)?;
                insert_child(&mut children, name, child);
            }
            Event::Empty(start) => {
                let name = element_name(&start);
                insert_child(&mut children, name, Value::Null);
            }
            Event::Text(t) => {
                text.push_str(&t.unescape().map_err(conversion_err)?);
            }
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    if children.is_empty() {
        Ok(Value::String(text))
    } else {
        Ok(Value::Object(children))
    }
}

/// Repeated sibling elements collapse into an array under their shared
/// name.
fn insert_child(map: &mut Map<String, Value>, name: String, child: Value) {
    match map.get_mut(&name) {
        Some(Value::Array(items)) => items.push(child),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, child]);
        }
        None => {
            map.insert(name, child);
        }
    }
}

fn element_name(start: &BytesStart) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

/// Wraps plain text as `{"text": <literal>}`.
pub fn text_to_json(bytes: &[u8]) -> Result<Bytes, GatewayError> {
    let text = String::from_utf8_lossy(bytes).into_owned();
    serde_json::to_vec(&serde_json::json!({ "text": text }))
        .map(Bytes::from)
        .map_err(conversion_err)
}

/// Wraps plain text as `<root>…</root>`.
pub fn text_to_xml(bytes: &[u8]) -> Result<Bytes, GatewayError> {
    let mut writer = Writer::new(Vec::new());
    let text = String::from_utf8_lossy(bytes).into_owned();
    writer
        .write_event(Event::Start(BytesStart::new("root")))
        .map_err(conversion_err)?;
    writer
        .write_event(Event::Text(BytesText::new(&text)))
        .map_err(conversion_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("root")))
        .map_err(conversion_err)?;
    Ok(Bytes::from(writer.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_to_xml_object() {
        let xml = json_to_xml(br#"{"id":42,"name":"a"}"#).unwrap();
        assert_eq!(xml, "<root><id>42</id><name>a</name></root>");
    }

    #[test]
    fn test_json_to_xml_nested_and_arrays() {
        let xml = json_to_xml(br#"{"items":[1,2],"meta":{"ok":true}}"#).unwrap();
        assert_eq!(
            xml,
            "<root><items>1</items><items>2</items><meta><ok>true</ok></meta></root>"
        );
    }

    #[test]
    fn test_xml_to_json_repeated_elements_become_array() {
        let json_bytes = xml_to_json(b"<root><x>1</x><x>2</x><y>a</y></root>").unwrap();
        let value: Value = serde_json::from_slice(&json_bytes).unwrap();
        assert_eq!(value, json!({"root": {"x": ["1", "2"], "y": "a"}}));
    }

    #[test]
    fn test_xml_to_json_text_element() {
        let json_bytes = xml_to_json(b"<root>hello</root>").unwrap();
        let value: Value = serde_json::from_slice(&json_bytes).unwrap();
        assert_eq!(value, json!({"root": "hello"}));
    }

    #[test]
    fn test_text_wrappers() {
        let json_bytes = text_to_json(b"some text").unwrap();
        let value: Value = serde_json::from_slice(&json_bytes).unwrap();
        assert_eq!(value, json!({"text": "some text"}));

        assert_eq!(text_to_xml(b"some text").unwrap(), "<root>some text</root>");
    }

    #[test]
    fn test_json_field_order_preserved() {
        let xml = json_to_xml(br#"{"z":1,"a":2,"m":3}"#).unwrap();
        assert_eq!(xml, "<root><z>1</z><a>2</a><m>3</m></root>");
    }
}
