//! Product catalog

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{expect_record, lenient, ListController, Searchable};
use crate::http::ApiClient;

pub const LIST_PATH: &str = "/product/fetch-products";

/// A product as returned by the catalog endpoints.
///
/// Only the fields the admin screens use are typed; everything else is
/// kept in `extra` so nothing is lost when a record is echoed back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, alias = "name")]
    pub product_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_category: Option<Value>,
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub product_price: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub stock: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Product {
    /// Category label whether the API sent a name or a populated record
    pub fn category_label(&self) -> Option<&str> {
        match self.product_category.as_ref()? {
            Value::String(s) => Some(s),
            Value::Object(o) => o.get("categoryName").and_then(Value::as_str),
            _ => None,
        }
    }
}

impl Searchable for Product {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.product_name.as_str(), self.id.as_str()];
        fields.extend(self.category_label());
        fields
    }
}

pub struct ProductController {
    list: ListController<Product>,
}

impl ProductController {
    pub fn new(client: Arc<ApiClient>, limit: u32) -> Self {
        Self {
            list: ListController::new(client, LIST_PATH, "products", limit),
        }
    }

    pub fn list(&self) -> &ListController<Product> {
        &self.list
    }

    /// Fetch a single product
    pub async fn get(&self, product_id: &str) -> crate::Result<Product> {
        let envelope = self
            .list
            .client()
            .get::<Value>(
                "/product/fetch-a-product",
                &[("productId", product_id.to_string())],
            )
            .await?;
        expect_record(envelope, "Product not found")
    }

    /// Create a product from a JSON body (the form shape is owned by the API)
    pub async fn create(&self, body: &Value) -> crate::Result<Option<Value>> {
        self.list.begin();
        let result = self
            .list
            .client()
            .post::<Value, _>("/product/create-product", body)
            .await;
        self.list.settle(result, "Failed to create product").await
    }

    pub async fn update(&self, product_id: &str, body: &Value) -> crate::Result<Option<Value>> {
        self.list.begin();
        let result = self
            .list
            .client()
            .put::<Value, _>(
                "/product/update-a-product",
                &[("productId", product_id.to_string())],
                body,
            )
            .await;
        self.list.settle(result, "Failed to update product").await
    }

    pub async fn delete(&self, product_id: &str) -> crate::Result<Option<Value>> {
        self.list.begin();
        let result = self
            .list
            .client()
            .delete::<Value>(
                "/product/delete-a-product",
                &[("productId", product_id.to_string())],
            )
            .await;
        self.list.settle(result, "Failed to delete product").await
    }

    /// Remove every product in the catalog
    pub async fn delete_all(&self) -> crate::Result<Option<Value>> {
        self.list.begin();
        let result = self
            .list
            .client()
            .delete::<Value>("/product/delete-all-products", &[])
            .await;
        tracing::warn!(ok = result.is_ok(), "delete-all-products issued");
        self.list.settle(result, "Failed to delete products").await
    }
}
