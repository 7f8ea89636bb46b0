//! Response envelope and list normalization
//!
//! Every endpoint answers with `{ statusCode, success, message, data }`.
//! List endpoints are inconsistent about `data`: sometimes a bare array,
//! sometimes `{ results, pages }`, sometimes `{ results, totalPages }`.
//! `normalize_page` turns all of those into one `Page<T>`.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The uniform response wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        default,
        rename = "responseMessage",
        skip_serializing_if = "Option::is_none"
    )]
    pub response_message: Option<String>,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Message, or `fallback` when the server sent none.
    ///
    /// `message` wins over the older `responseMessage` when both are set.
    pub fn message_or(&self, fallback: &str) -> String {
        [&self.message, &self.response_message]
            .into_iter()
            .filter_map(|m| m.as_deref().map(str::trim))
            .find(|m| !m.is_empty())
            .unwrap_or(fallback)
            .to_string()
    }
}

impl Envelope<Value> {
    /// Re-decode `data` into a concrete type
    pub fn decode<T: DeserializeOwned>(self) -> Result<Envelope<T>, serde_json::Error> {
        let data = match self.data {
            Some(Value::Null) | None => None,
            Some(value) => Some(serde_json::from_value(value)?),
        };
        Ok(Envelope {
            status_code: self.status_code,
            success: self.success,
            message: self.message,
            response_message: self.response_message,
            data,
        })
    }
}

/// Canonical paginated list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub current_page: u32,
    pub pages: u32,
    pub total_items: u64,
}

impl<T> Page<T> {
    pub fn empty(current_page: u32) -> Self {
        Self {
            results: Vec::new(),
            current_page,
            pages: 1,
            total_items: 0,
        }
    }
}

/// Normalize a list payload into a `Page`.
///
/// `requested_page` is used when the payload does not say which page it is.
pub fn normalize_page<T: DeserializeOwned>(
    data: Option<Value>,
    requested_page: u32,
) -> Result<Page<T>, serde_json::Error> {
    let requested_page = requested_page.max(1);

    match data {
        None | Some(Value::Null) => Ok(Page::empty(requested_page)),
        Some(Value::Array(items)) => {
            let total_items = items.len() as u64;
            Ok(Page {
                results: serde_json::from_value(Value::Array(items))?,
                current_page: requested_page,
                pages: 1,
                total_items,
            })
        }
        Some(Value::Object(mut map)) => {
            let results: Vec<T> = match map.remove("results") {
                Some(Value::Null) | None => Vec::new(),
                Some(value) => serde_json::from_value(value)?,
            };
            let pages = ["pages", "totalPages"]
                .iter()
                .find_map(|k| map.get(*k).and_then(as_count))
                .unwrap_or(1)
                .max(1);
            let current_page = map
                .get("currentPage")
                .and_then(as_count)
                .unwrap_or(requested_page)
                .max(1);
            let total_items = map
                .get("totalItems")
                .and_then(Value::as_u64)
                .unwrap_or(results.len() as u64);

            Ok(Page {
                results,
                current_page,
                pages,
                total_items,
            })
        }
        Some(other) => Err(serde_json::Error::custom(format!(
            "expected a list payload, got {other}"
        ))),
    }
}

fn as_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        name: String,
    }

    #[test]
    fn test_envelope_parsing() {
        let env: Envelope<Value> = serde_json::from_value(json!({
            "statusCode": 200,
            "success": true,
            "message": "ok",
            "data": {"token": "abc"}
        }))
        .unwrap();
        assert!(env.success);
        assert_eq!(env.status_code, Some(200));
        assert_eq!(env.data.unwrap()["token"], "abc");
    }

    #[test]
    fn test_envelope_legacy_message_and_missing_fields() {
        let env: Envelope<Value> =
            serde_json::from_value(json!({"responseMessage": "Login failed"})).unwrap();
        assert!(!env.success);
        assert_eq!(env.message_or("x"), "Login failed");
        assert!(env.data.is_none());

        let env: Envelope<Value> = serde_json::from_value(json!({"message": " "})).unwrap();
        assert_eq!(env.message_or("fallback"), "fallback");
    }

    #[test]
    fn test_envelope_with_both_message_fields() {
        let env: Envelope<Value> = serde_json::from_value(json!({
            "success": true,
            "message": "ok",
            "responseMessage": "legacy",
            "data": []
        }))
        .unwrap();
        assert!(env.success);
        assert_eq!(env.message_or("x"), "ok");
        assert_eq!(env.data, Some(json!([])));

        let env: Envelope<Value> =
            serde_json::from_value(json!({"message": "", "responseMessage": "Saved"})).unwrap();
        assert_eq!(env.message_or("x"), "Saved");
    }

    #[test]
    fn test_generic_envelope_without_data() {
        // Item has no Default impl; a missing `data` still decodes as None
        let env: Envelope<Item> = serde_json::from_value(json!({"success": true})).unwrap();
        assert!(env.data.is_none());
    }

    #[test]
    fn test_decode_data() {
        let env: Envelope<Value> =
            serde_json::from_value(json!({"success": true, "data": {"name": "cap"}})).unwrap();
        let typed: Envelope<Item> = env.decode().unwrap();
        assert_eq!(typed.data.unwrap().name, "cap");
    }

    #[test]
    fn test_normalize_bare_array() {
        let page: Page<Item> =
            normalize_page(Some(json!([{"name": "a"}, {"name": "b"}])), 3).unwrap();
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.current_page, 3);
        assert_eq!(page.pages, 1);
        assert_eq!(page.total_items, 2);
    }

    #[test]
    fn test_normalize_results_object() {
        let page: Page<Item> = normalize_page(
            Some(json!({
                "results": [{"name": "a"}],
                "currentPage": 2,
                "pages": 5,
                "totalItems": 81
            })),
            1,
        )
        .unwrap();
        assert_eq!(page.current_page, 2);
        assert_eq!(page.pages, 5);
        assert_eq!(page.total_items, 81);
    }

    #[test]
    fn test_normalize_total_pages_alias() {
        let page: Page<Item> =
            normalize_page(Some(json!({"results": [], "totalPages": "4"})), 2).unwrap();
        assert_eq!(page.pages, 4);
        assert_eq!(page.current_page, 2);
        assert!(page.results.is_empty());
    }

    #[test]
    fn test_normalize_degenerate_payloads() {
        let page: Page<Item> = normalize_page(None, 0).unwrap();
        assert_eq!(page.current_page, 1);
        assert_eq!(page.pages, 1);

        let page: Page<Item> = normalize_page(Some(json!({"pages": 0})), 1).unwrap();
        assert_eq!(page.pages, 1);

        assert!(normalize_page::<Item>(Some(json!("nope")), 1).is_err());
    }
}
