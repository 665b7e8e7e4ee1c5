//! Saved views and the persistence seams the controller talks to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vista_core::Result;
use vista_widget::{EntityDetail, EntityResolution, WidgetStateOverride};

/// A named, persisted set of widget overrides for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedView {
    pub view_id: String,
    pub name: String,
    pub owner: String,
    pub entity_type: String,
    pub entity_id: String,
    #[serde(default)]
    pub widget_overrides: Vec<WidgetStateOverride>,
    #[serde(default)]
    pub is_shared: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl SavedView {
    pub fn is_owned_by(&self, username: &str) -> bool {
        self.owner == username
    }

    /// Selector label; other people's views carry the owner's name.
    pub fn label_for(&self, username: &str) -> String {
        if self.is_owned_by(username) {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.owner)
        }
    }
}

/// Body of a create-view request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedViewCreate {
    pub name: String,
    pub entity_type: String,
    pub entity_id: String,
    #[serde(default)]
    pub widget_overrides: Vec<WidgetStateOverride>,
    #[serde(default)]
    pub is_shared: bool,
}

/// Body of an update-view request; unset fields are left alone.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SavedViewUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_overrides: Option<Vec<WidgetStateOverride>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_shared: Option<bool>,
}

impl SavedViewUpdate {
    /// Replace the stored overrides wholesale.
    pub fn overrides(widget_overrides: Vec<WidgetStateOverride>) -> Self {
        Self {
            widget_overrides: Some(widget_overrides),
            ..Default::default()
        }
    }
}

/// Entity lookups.
#[async_trait]
pub trait EntitySource: Send + Sync {
    /// Entity header and widget configs, merged with `view_id`'s overrides when given.
    async fn entity_detail(
        &self,
        entity_type: &str,
        entity_id: &str,
        view_id: Option<&str>,
    ) -> Result<EntityDetail>;

    /// Free-text entity search.
    async fn resolve(&self, query: &str) -> Result<EntityResolution>;
}

/// Saved-view persistence.
#[async_trait]
pub trait ViewStore: Send + Sync {
    async fn list_views(&self, entity_type: &str, entity_id: &str) -> Result<Vec<SavedView>>;

    async fn create_view(&self, body: &SavedViewCreate) -> Result<SavedView>;

    async fn update_view(&self, view_id: &str, body: &SavedViewUpdate) -> Result<SavedView>;

    async fn delete_view(&self, view_id: &str) -> Result<()>;
}
