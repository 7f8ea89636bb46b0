//! Category management

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ListController, Searchable};
use crate::http::ApiClient;
use crate::upload::{ImageFile, ImageUploader};
use crate::AdminError;

pub const LIST_PATH: &str = "/category/fetch-categories";
pub const NAME_REQUIRED: &str = "Category name is required";
pub const SAVE_FAILED: &str = "Error saving category";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: String,
    pub category_name: String,
    #[serde(default)]
    pub category_description: String,
    #[serde(default)]
    pub category_image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Searchable for Category {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.category_name.as_str()]
    }
}

/// Body of create and update calls
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPayload {
    pub category_name: String,
    pub category_description: String,
    pub category_image: String,
}

/// The category form: text fields plus an optional image to upload
#[derive(Debug, Clone, Default)]
pub struct CategoryDraft {
    pub name: String,
    pub description: String,
    /// Existing image URL, kept when no new file is attached
    pub image_url: String,
    pub image_file: Option<ImageFile>,
}

impl CategoryDraft {
    /// Prefill the form from an existing category
    pub fn from_category(category: &Category) -> Self {
        Self {
            name: category.category_name.clone(),
            description: category.category_description.clone(),
            image_url: category.category_image.clone(),
            image_file: None,
        }
    }
}

pub struct CategoryController {
    list: ListController<Category>,
    uploader: Arc<ImageUploader>,
}

impl CategoryController {
    pub fn new(client: Arc<ApiClient>, uploader: Arc<ImageUploader>, limit: u32) -> Self {
        Self {
            list: ListController::new(client, LIST_PATH, "categories", limit),
            uploader,
        }
    }

    pub fn list(&self) -> &ListController<Category> {
        &self.list
    }

    pub async fn create(&self, payload: &CategoryPayload) -> crate::Result<Option<Value>> {
        self.list.begin();
        let result = self
            .list
            .client()
            .post::<Value, _>("/category/create-category", payload)
            .await;
        self.list.settle(result, "Failed to create category").await
    }

    pub async fn update(
        &self,
        id: &str,
        payload: &CategoryPayload,
    ) -> crate::Result<Option<Value>> {
        self.list.begin();
        let result = self
            .list
            .client()
            .put::<Value, _>(
                "/category/update-a-category",
                &[("categoryId", id.to_string())],
                payload,
            )
            .await;
        self.list.settle(result, "Failed to update category").await
    }

    pub async fn delete(&self, id: &str) -> crate::Result<Option<Value>> {
        self.list.begin();
        let result = self
            .list
            .client()
            .delete::<Value>("/category/delete-category", &[("categoryId", id.to_string())])
            .await;
        self.list.settle(result, "Failed to delete category").await
    }

    /// Submit the form: create, or update `editing` when set.
    ///
    /// An attached image is uploaded first and its URL replaces
    /// `image_url`. The upload and the save are independent calls; a
    /// failed save leaves the uploaded image behind.
    pub async fn submit(
        &self,
        draft: CategoryDraft,
        editing: Option<&str>,
    ) -> crate::Result<Option<Value>> {
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            self.list.fail(NAME_REQUIRED);
            return Err(AdminError::Validation(NAME_REQUIRED.to_string()));
        }

        self.list.begin();
        let mut image_url = draft.image_url;
        if let Some(file) = draft.image_file {
            image_url = match self.uploader.upload(file).await {
                Ok(url) => url,
                Err(err) => {
                    tracing::warn!(error = %err, "category image upload failed");
                    self.list.fail(SAVE_FAILED);
                    return Err(err.into());
                }
            };
        }

        let payload = CategoryPayload {
            category_name: name,
            category_description: draft.description,
            category_image: image_url,
        };

        match editing {
            Some(id) => self.update(id, &payload).await,
            None => self.create(&payload).await,
        }
    }
}
