//! Payment transactions

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{lenient, ListController, Searchable};
use crate::http::ApiClient;

pub const LIST_PATH: &str = "/transaction/fetch-transactions";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub amount: f64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_order_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Searchable for Transaction {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.email.as_str(), self.reference.as_str()]
    }
}

pub struct TransactionController {
    list: ListController<Transaction>,
}

impl TransactionController {
    pub fn new(client: Arc<ApiClient>, limit: u32) -> Self {
        Self {
            list: ListController::new(client, LIST_PATH, "transactions", limit),
        }
    }

    pub fn list(&self) -> &ListController<Transaction> {
        &self.list
    }

    /// Restrict the list to one customer's transactions
    pub fn filter_by_email(&self, email: Option<&str>) {
        let query = email
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(|e| vec![("email", e.to_string())])
            .unwrap_or_default();
        self.list.set_extra_query(query);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_support::Harness;
    use serde_json::json;

    fn payload() -> serde_json::Value {
        json!({"success": true, "data": {"results": [
            {"_id": "t1", "email": "john@example.com", "amount": 50.0, "status": "success",
             "reference": "REF-001", "currency": "USD"},
            {"_id": "t2", "email": "mike@example.com", "amount": 10.99, "status": "failed",
             "reference": "REF-777", "currency": "USD", "trackingId": "TRK-1"},
            {"_id": "t3", "email": "ada@example.com", "amount": "1,000", "status": "pending",
             "reference": "REF-900", "currency": "NGN"},
            {"_id": "t4", "email": "kim@example.com", "amount": "75.25", "status": "success",
             "reference": "REF-901", "currency": "NGN"}
        ], "totalPages": 3}})
    }

    #[tokio::test]
    async fn test_email_filter_and_pages() {
        let h = Harness::new();
        h.transport.push_json(200, payload());
        h.transport.push_json(200, payload());

        let transactions = TransactionController::new(h.client.clone(), 20);
        transactions.filter_by_email(Some("john@example.com"));
        transactions.list().on_attach().await;

        let req = h.transport.last_request().unwrap();
        assert_eq!(req.query_value("email"), Some("john@example.com"));
        let view = transactions.list().view();
        assert_eq!(view.pager.total(), 3);
        assert_eq!(view.items[1].tracking_id.as_deref(), Some("TRK-1"));
        // Amounts sent as text decode; unparseable ones fall back to zero
        assert_eq!(view.items[2].amount, 0.0);
        assert_eq!(view.items[3].amount, 75.25);

        transactions.filter_by_email(Some("  "));
        transactions.list().load(2).await;
        assert_eq!(h.transport.last_request().unwrap().query_value("email"), None);
    }

    #[tokio::test]
    async fn test_search_by_email_or_reference() {
        let h = Harness::new();
        h.transport.push_json(200, payload());

        let transactions = TransactionController::new(h.client.clone(), 20);
        transactions.list().on_attach().await;
        let view = transactions.list().view();
        assert_eq!(view.visible("ref-777")[0].id, "t2");
        assert_eq!(view.visible("john")[0].id, "t1");
        assert!(view.visible("success").is_empty());
    }
}
