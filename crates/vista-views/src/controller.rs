//! View resolution for one entity page.
//!
//! The [`ViewController`] owns the page's [`WidgetBoard`], the list of saved
//! views, the active view and the dirty flag. Selecting a view re-fetches the
//! entity detail with that view id so widget configs arrive already merged;
//! live edits then happen inside the runtimes until they are saved.

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, info, warn};
use vista_core::{Result, VistaError};
use vista_widget::{
    EntityDetail, FetchTicket, PageEnvelope, Transition, WidgetBoard, WidgetDataSource,
};

use crate::view::{EntitySource, SavedView, SavedViewCreate, SavedViewUpdate, ViewStore};

/// Active view, dirty flag and save/overwrite/delete for one entity.
pub struct ViewController {
    entity_type: String,
    entity_id: String,
    username: String,
    entities: Arc<dyn EntitySource>,
    views: Arc<dyn ViewStore>,
    detail: Option<EntityDetail>,
    board: WidgetBoard,
    saved_views: Vec<SavedView>,
    active_view_id: Option<String>,
    dirty: bool,
}

impl ViewController {
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        username: impl Into<String>,
        entities: Arc<dyn EntitySource>,
        views: Arc<dyn ViewStore>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            username: username.into(),
            entities,
            views,
            detail: None,
            board: WidgetBoard::new(),
            saved_views: Vec::new(),
            active_view_id: None,
            dirty: false,
        }
    }

    /// Start on a saved view instead of Default.
    pub fn with_initial_view(mut self, view_id: Option<String>) -> Self {
        self.active_view_id = view_id;
        self
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn detail(&self) -> Option<&EntityDetail> {
        self.detail.as_ref()
    }

    pub fn board(&self) -> &WidgetBoard {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut WidgetBoard {
        &mut self.board
    }

    pub fn saved_views(&self) -> &[SavedView] {
        &self.saved_views
    }

    pub fn active_view_id(&self) -> Option<&str> {
        self.active_view_id.as_deref()
    }

    pub fn active_view(&self) -> Option<&SavedView> {
        let id = self.active_view_id.as_deref()?;
        self.saved_views.iter().find(|v| v.view_id == id)
    }

    /// Name of the active view, or "Default View".
    pub fn active_view_name(&self) -> String {
        self.active_view()
            .map(|v| v.name.clone())
            .or_else(|| self.detail.as_ref().and_then(|d| d.active_view_name.clone()))
            .unwrap_or_else(|| "Default View".to_string())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn owns_active_view(&self) -> bool {
        self.active_view()
            .is_some_and(|v| v.is_owned_by(&self.username))
    }

    /// Overwrite is offered for unsaved edits on a view the user owns.
    pub fn can_overwrite(&self) -> bool {
        self.dirty && self.owns_active_view()
    }

    /// Save-as-new is offered whenever there are unsaved edits.
    pub fn can_save_new(&self) -> bool {
        self.dirty
    }

    pub fn can_delete(&self) -> bool {
        self.owns_active_view()
    }

    /// Note an interaction's effect on the dirty flag.
    pub fn record(&mut self, transition: &Transition) {
        if transition.dirty && !self.dirty {
            debug!(entity_id = %self.entity_id, "page has unsaved edits");
            self.dirty = true;
        }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Fetch the entity and its views, then mount every widget.
    pub async fn load(&mut self) -> Result<Vec<FetchTicket>> {
        let view_id = self.active_view_id.clone();
        let tickets = self.fetch_detail(view_id.as_deref()).await?;
        self.refresh_views().await;
        Ok(tickets)
    }

    /// Switch to a saved view, or back to Default with `None`.
    ///
    /// On failure the current page is left as it was.
    pub async fn select_view(&mut self, view_id: Option<&str>) -> Result<Vec<FetchTicket>> {
        info!(entity_id = %self.entity_id, view_id = ?view_id, "selecting view");
        self.fetch_detail(view_id).await
    }

    /// Move the page to another entity on its Default view.
    ///
    /// On failure the current entity stays loaded.
    pub async fn switch_entity(
        &mut self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<FetchTicket>> {
        let detail = self.entities.entity_detail(entity_type, entity_id, None).await?;
        info!(entity_type, entity_id, "switching entity");

        self.entity_type = entity_type.to_string();
        self.entity_id = entity_id.to_string();
        self.saved_views.clear();
        let tickets = self.apply_detail(detail, None);
        self.refresh_views().await;
        Ok(tickets)
    }

    /// The entity collaborator, for searches that outlive a borrow.
    pub fn entity_source(&self) -> Arc<dyn EntitySource> {
        Arc::clone(&self.entities)
    }

    async fn fetch_detail(&mut self, view_id: Option<&str>) -> Result<Vec<FetchTicket>> {
        let detail = self
            .entities
            .entity_detail(&self.entity_type, &self.entity_id, view_id)
            .await?;
        Ok(self.apply_detail(detail, view_id))
    }

    fn apply_detail(&mut self, detail: EntityDetail, view_id: Option<&str>) -> Vec<FetchTicket> {
        self.active_view_id = detail
            .active_view_id
            .clone()
            .or_else(|| view_id.map(str::to_string));
        let tickets = self.board.load(detail.widgets.clone());
        self.detail = Some(detail);
        self.dirty = false;
        debug!(
            entity_id = %self.entity_id,
            widgets = tickets.len(),
            view_id = ?self.active_view_id,
            "entity detail applied"
        );
        tickets
    }

    /// Reload the saved-view list. Failures keep the previous list.
    pub async fn refresh_views(&mut self) {
        match self
            .views
            .list_views(&self.entity_type, &self.entity_id)
            .await
        {
            Ok(views) => self.saved_views = views,
            Err(e) => warn!(entity_id = %self.entity_id, error = %e, "failed to list views"),
        }
    }

    /// Run tickets against a data source and apply every result.
    pub async fn fetch_all(&mut self, source: &dyn WidgetDataSource, tickets: Vec<FetchTicket>) {
        let results = join_all(tickets.iter().map(|t| source.fetch_page(&t.query))).await;
        for (ticket, result) in tickets.iter().zip(results) {
            self.apply_response(ticket, result);
        }
    }

    /// Hand a fetch result to its widget. Returns false when it was dropped.
    pub fn apply_response(&mut self, ticket: &FetchTicket, result: Result<PageEnvelope>) -> bool {
        self.board
            .apply_response(&ticket.widget_id, ticket.generation, result)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Save the current widget state as a new view and activate it.
    pub async fn save_as_new(&mut self, name: &str, is_shared: bool) -> Result<SavedView> {
        let name = name.trim();
        if name.is_empty() {
            return Err(VistaError::validation("name", "View name is required."));
        }

        let body = SavedViewCreate {
            name: name.to_string(),
            entity_type: self.entity_type.clone(),
            entity_id: self.entity_id.clone(),
            widget_overrides: self.board.capture_all(),
            is_shared,
        };
        let view = self.views.create_view(&body).await?;
        info!(view_id = %view.view_id, name = %view.name, "view saved");

        self.refresh_views().await;
        if !self.saved_views.iter().any(|v| v.view_id == view.view_id) {
            self.saved_views.push(view.clone());
        }
        self.active_view_id = Some(view.view_id.clone());
        if let Some(detail) = &mut self.detail {
            detail.active_view_id = Some(view.view_id.clone());
            detail.active_view_name = Some(view.name.clone());
        }
        self.dirty = false;
        Ok(view)
    }

    /// The active view if the current user may change it.
    fn owned_active_view(&self) -> Result<&SavedView> {
        let id = self.active_view_id.as_deref().ok_or(VistaError::NoActiveView)?;
        let view = self
            .saved_views
            .iter()
            .find(|v| v.view_id == id)
            .ok_or_else(|| VistaError::not_found(format!("view {id}")))?;
        if !view.is_owned_by(&self.username) {
            return Err(VistaError::NotOwner {
                view_id: view.view_id.clone(),
                owner: view.owner.clone(),
            });
        }
        Ok(view)
    }

    /// Replace the active view's overrides with the current widget state.
    ///
    /// Refused without a request unless a view is active and owned by the
    /// current user; refusals and server rejections keep the dirty flag.
    /// Once the update is stored the page is clean even if the reload that
    /// follows fails: the board already shows what was saved, and the reload
    /// failure comes back as [`VistaError::Reload`].
    pub async fn overwrite(&mut self) -> Result<Vec<FetchTicket>> {
        let view_id = match self.owned_active_view() {
            Ok(view) => view.view_id.clone(),
            Err(e) => {
                warn!(entity_id = %self.entity_id, error = %e, "overwrite refused");
                return Err(e);
            }
        };

        let body = SavedViewUpdate::overrides(self.board.capture_all());
        let updated = self.views.update_view(&view_id, &body).await?;
        info!(view_id = %updated.view_id, "view overwritten");

        if let Some(slot) = self.saved_views.iter_mut().find(|v| v.view_id == view_id) {
            *slot = updated;
        }
        self.dirty = false;
        self.fetch_detail(Some(&view_id)).await.map_err(|e| {
            warn!(view_id = %view_id, error = %e, "reload after overwrite failed");
            VistaError::reload("View updated", e)
        })
    }

    /// Delete the active view and fall back to Default.
    ///
    /// The Default configs are fetched before the delete is sent, so a
    /// failure at either step leaves the page on the view it was showing.
    pub async fn delete(&mut self) -> Result<Vec<FetchTicket>> {
        let view_id = self.owned_active_view()?.view_id.clone();
        let default = self
            .entities
            .entity_detail(&self.entity_type, &self.entity_id, None)
            .await?;
        self.views.delete_view(&view_id).await?;
        info!(view_id = %view_id, "view deleted");

        self.saved_views.retain(|v| v.view_id != view_id);
        let tickets = self.apply_detail(default, None);
        self.refresh_views().await;
        Ok(tickets)
    }
}
