//! Customer records

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{expect_record, ListController, Searchable};
use crate::http::ApiClient;

pub const LIST_PATH: &str = "/user/fetch-users";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Customer {
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !name.is_empty() {
            name
        } else {
            self.username.clone().unwrap_or_else(|| self.email.clone())
        }
    }
}

impl Searchable for Customer {
    fn search_fields(&self) -> Vec<&str> {
        [
            Some(self.email.as_str()),
            self.username.as_deref(),
            self.first_name.as_deref(),
            self.last_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// How to look a single customer up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerLookup {
    Id(String),
    Email(String),
    Username(String),
}

impl CustomerLookup {
    fn query(&self) -> (&'static str, String) {
        match self {
            Self::Id(v) => ("_id", v.clone()),
            Self::Email(v) => ("email", v.clone()),
            Self::Username(v) => ("username", v.clone()),
        }
    }
}

pub struct CustomerController {
    list: ListController<Customer>,
}

impl CustomerController {
    pub fn new(client: Arc<ApiClient>, limit: u32) -> Self {
        Self {
            list: ListController::new(client, LIST_PATH, "customers", limit),
        }
    }

    pub fn list(&self) -> &ListController<Customer> {
        &self.list
    }

    /// Fetch one customer by id, email or username
    pub async fn find(&self, lookup: &CustomerLookup) -> crate::Result<Customer> {
        let envelope = self
            .list
            .client()
            .get::<Value>("/user/fetch-user", &[lookup.query()])
            .await?;
        expect_record(envelope, "Customer not found")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_support::Harness;
    use serde_json::json;

    #[tokio::test]
    async fn test_find_by_each_key() {
        let h = Harness::new();
        let user = json!({"success": true, "data": {
            "_id": "u1", "email": "sarah@example.com", "username": "sarah",
            "firstName": "Sarah", "lastName": "Smith", "role": "customer"
        }});
        for _ in 0..3 {
            h.transport.push_json(200, user.clone());
        }

        let customers = CustomerController::new(h.client.clone(), 20);
        for (lookup, key, value) in [
            (CustomerLookup::Id("u1".into()), "_id", "u1"),
            (CustomerLookup::Email("sarah@example.com".into()), "email", "sarah@example.com"),
            (CustomerLookup::Username("sarah".into()), "username", "sarah"),
        ] {
            let customer = customers.find(&lookup).await.unwrap();
            assert_eq!(customer.display_name(), "Sarah Smith");
            let req = h.transport.last_request().unwrap();
            assert!(req.url.ends_with("/user/fetch-user"));
            assert_eq!(req.query_value(key), Some(value));
        }
    }

    #[tokio::test]
    async fn test_list_search() {
        let h = Harness::new();
        h.transport.push_json(
            200,
            json!({"success": true, "data": {"results": [
                {"_id": "u1", "email": "john@example.com", "firstName": "John"},
                {"_id": "u2", "email": "emily@example.com", "username": "emily_b"}
            ], "totalPages": 1}}),
        );

        let customers = CustomerController::new(h.client.clone(), 20);
        customers.list().on_attach().await;
        let view = customers.list().view();
        assert_eq!(view.visible("EMILY").len(), 1);
        assert_eq!(view.visible("example.com").len(), 2);
        assert_eq!(view.items[1].display_name(), "emily_b");
    }
}
