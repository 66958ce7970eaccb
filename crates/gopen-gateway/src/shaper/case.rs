//! JSON key nomenclature (case style) conversion.

use crate::config::Nomenclature;
use crate::error::GatewayError;
use crate::model::Body;
use heck::{ToKebabCase, ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};
use serde_json::Value;

/// Renames every key in a JSON body to the target case style,
/// recursively. Idempotent; non-JSON bodies pass through unchanged.
pub fn to_case(body: &Body, nomenclature: Nomenclature) -> (Body, Vec<GatewayError>) {
    if !body.content_type().is_json() {
        return (body.clone(), Vec::new());
    }
    let document = match body.to_json() {
        Ok(document) => document,
        Err(err) => return (body.clone(), vec![err]),
    };
    let renamed = rename(document, nomenclature);
    match body.with_json(&renamed) {
        Ok(new_body) => (new_body, Vec::new()),
        Err(err) => (body.clone(), vec![err]),
    }
}

fn convert_key(key: &str, nomenclature: Nomenclature) -> String {
    match nomenclature {
        Nomenclature::Camel => key.to_lower_camel_case(),
        Nomenclature::Snake => key.to_snake_case(),
        Nomenclature::Pascal => key.to_upper_camel_case(),
        Nomenclature::Kebab => key.to_kebab_case(),
    }
}

fn rename(value: Value, nomenclature: Nomenclature) -> Value {
    match value {
        Value::Object(map) => {
            let renamed = map
                .into_iter()
                .map(|(k, v)| (convert_key(&k, nomenclature), rename(v, nomenclature)))
                .collect();
            Value::Object(renamed)
        }
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| rename(v, nomenclature)).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shaped(document: Value, nomenclature: Nomenclature) -> Value {
        let (body, errors) = to_case(&Body::json(&document), nomenclature);
        assert!(errors.is_empty());
        body.to_json().unwrap()
    }

    #[test]
    fn test_snake_case_recursive() {
        let result = shaped(
            json!({"userId": 1, "homeAddress": {"zipCode": "x"}, "items": [{"itemId": 2}]}),
            Nomenclature::Snake,
        );
        assert_eq!(
            result,
            json!({"user_id": 1, "home_address": {"zip_code": "x"}, "items": [{"item_id": 2}]})
        );
    }

    #[test]
    fn test_all_styles() {
        let document = json!({"user_id": 1});
        assert_eq!(shaped(document.clone(), Nomenclature::Camel), json!({"userId": 1}));
        assert_eq!(shaped(document.clone(), Nomenclature::Pascal), json!({"UserId": 1}));
        assert_eq!(shaped(document.clone(), Nomenclature::Kebab), json!({"user-id": 1}));
    }

    #[test]
    fn test_idempotent() {
        let document = json!({"userId": 1, "nested": {"someKey": [1, 2]}});
        let once = shaped(document, Nomenclature::Camel);
        let twice = shaped(once.clone(), Nomenclature::Camel);
        assert_eq!(once, twice);
    }
}
