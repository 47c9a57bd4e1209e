//! Category label lookup and creation with hierarchy support
use crate::client::GmailClient;
use crate::error::{Result, TriageError};
use crate::models::Category;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolves category labels to Gmail label ids, creating them on demand
pub struct LabelManager {
    client: Arc<dyn GmailClient>,
    label_prefix: String,
    label_cache: HashMap<String, String>, // lowercase name -> id
    created_labels: Vec<String>,
    labels_loaded: bool,
}

impl LabelManager {
    pub fn new(client: Arc<dyn GmailClient>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            label_prefix: prefix.into(),
            label_cache: HashMap::new(),
            created_labels: Vec::new(),
            labels_loaded: false,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.label_prefix
    }

    /// Loads all existing labels from Gmail into the cache
    ///
    /// Cache keys are stored lowercase; Gmail label names are case-insensitive.
    pub async fn load_existing_labels(&mut self) -> Result<usize> {
        let labels = self.client.list_labels().await?;
        let count = labels.len();

        for label in labels {
            self.label_cache.insert(label.name.to_lowercase(), label.id);
        }
        self.labels_loaded = true;

        info!("Loaded {} existing labels into cache", count);
        Ok(count)
    }

    /// Case-insensitive cache lookup helper
    pub fn cached_label_id(&self, name: &str) -> Option<&str> {
        self.label_cache.get(&name.to_lowercase()).map(String::as_str)
    }

    fn cache_insert(&mut self, name: &str, id: String) {
        self.label_cache.insert(name.to_lowercase(), id);
    }

    /// Full label name for a category, e.g. `Auto/Important`
    pub fn category_label_name(&self, category: Category) -> String {
        category.label_name(&self.label_prefix)
    }

    /// Label id for a category, creating the label when missing
    pub async fn label_for_category(&mut self, category: Category) -> Result<String> {
        let name = self.category_label_name(category);
        self.get_or_create_label(&name).await
    }

    /// Gets label ID by its full name, creating it (and its parents) if necessary
    pub async fn get_or_create_label(&mut self, full_name: &str) -> Result<String> {
        let full_name = full_name.trim().trim_matches('/');
        if full_name.is_empty() {
            return Err(TriageError::LabelError(
                "Label name cannot be empty".to_string(),
            ));
        }

        if let Some(id) = self.cached_label_id(full_name) {
            debug!("Label '{}' already exists in cache", full_name);
            return Ok(id.to_string());
        }

        // The cache was never filled; list once before creating anything
        if !self.labels_loaded {
            match self.load_existing_labels().await {
                Ok(_) => {
                    if let Some(id) = self.cached_label_id(full_name) {
                        return Ok(id.to_string());
                    }
                }
                Err(e) => warn!("Could not refresh label cache: {}", e),
            }
        }

        if full_name.contains('/') {
            self.ensure_parent_labels(full_name).await?;
        }

        info!("Creating label: {}", full_name);
        let label_id = self.create(full_name).await?;

        info!("Successfully created label '{}' with ID: {}", full_name, label_id);
        Ok(label_id)
    }

    /// Ensures all parent labels exist in the hierarchy
    ///
    /// For `Auto/Important` this creates `Auto` first when it is missing.
    async fn ensure_parent_labels(&mut self, label_name: &str) -> Result<()> {
        let parts: Vec<&str> = label_name.split('/').collect();

        // Skip the last part, which is the label itself
        for i in 1..parts.len() {
            let parent_path = parts[..i].join("/");

            if self.cached_label_id(&parent_path).is_none() {
                debug!("Creating parent label: {}", parent_path);
                self.create(&parent_path).await?;
            }
        }

        Ok(())
    }

    async fn create(&mut self, name: &str) -> Result<String> {
        let label_id = self.client.create_label(name).await.map_err(|e| {
            TriageError::LabelError(format!("Failed to create label '{}': {}", name, e))
        })?;

        self.cache_insert(name, label_id.clone());
        self.created_labels.push(name.to_string());
        Ok(label_id)
    }

    /// Names of the labels created by this manager
    pub fn created_labels(&self) -> &[String] {
        &self.created_labels
    }
}
