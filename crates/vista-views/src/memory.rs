//! In-memory implementations of the persistence seams.
//!
//! They follow the backend's rules (ownership checks, server-side override
//! merge, next-run computation) so the controller can run offline and tests
//! can count the requests it sends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;
use vista_core::{Result, VistaError};
use vista_widget::cascade::apply_view;
use vista_widget::{EntityCandidate, EntityDetail, EntityResolution};

use crate::recurrence::initial_run_after;
use crate::schedule::{
    EmailLog, EmailSchedule, EmailScheduleCreate, EmailScheduleUpdate, LogStatus, ScheduleStatus,
    ScheduleStore,
};
use crate::view::{EntitySource, SavedView, SavedViewCreate, SavedViewUpdate, ViewStore};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| VistaError::internal("in-memory store lock poisoned"))
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

// =============================================================================
// Views
// =============================================================================

/// Saved views held in memory, acting on behalf of one user.
#[derive(Debug)]
pub struct InMemoryViewStore {
    username: String,
    views: Mutex<Vec<SavedView>>,
    mutations: AtomicUsize,
    reject_mutations: AtomicBool,
}

impl InMemoryViewStore {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            views: Mutex::new(Vec::new()),
            mutations: AtomicUsize::new(0),
            reject_mutations: AtomicBool::new(false),
        }
    }

    /// Seed a view as if another session had saved it.
    pub fn insert(&self, view: SavedView) {
        if let Ok(mut views) = self.views.lock() {
            views.push(view);
        }
    }

    pub fn get(&self, view_id: &str) -> Option<SavedView> {
        self.views
            .lock()
            .ok()
            .and_then(|views| views.iter().find(|v| v.view_id == view_id).cloned())
    }

    /// A view the store's user may open: their own or a shared one.
    fn visible(&self, view_id: &str) -> Option<SavedView> {
        self.get(view_id)
            .filter(|v| v.owner == self.username || v.is_shared)
    }

    /// Create, update and delete calls received so far.
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Make every following mutation fail as a server rejection.
    pub fn reject_mutations(&self, reject: bool) {
        self.reject_mutations.store(reject, Ordering::SeqCst);
    }

    fn begin_mutation(&self) -> Result<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        if self.reject_mutations.load(Ordering::SeqCst) {
            return Err(VistaError::Forbidden {
                message: "view changes are disabled".into(),
            });
        }
        Ok(())
    }

    fn check_owner(&self, view: &SavedView) -> Result<()> {
        if view.owner != self.username {
            return Err(VistaError::Forbidden {
                message: format!("view {} belongs to {}", view.view_id, view.owner),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ViewStore for InMemoryViewStore {
    async fn list_views(&self, entity_type: &str, entity_id: &str) -> Result<Vec<SavedView>> {
        let views = lock(&self.views)?;
        Ok(views
            .iter()
            .filter(|v| v.entity_type == entity_type && v.entity_id == entity_id)
            .filter(|v| v.owner == self.username || v.is_shared)
            .cloned()
            .collect())
    }

    async fn create_view(&self, body: &SavedViewCreate) -> Result<SavedView> {
        self.begin_mutation()?;
        let stamp = now();
        let view = SavedView {
            view_id: Uuid::new_v4().to_string(),
            name: body.name.clone(),
            owner: self.username.clone(),
            entity_type: body.entity_type.clone(),
            entity_id: body.entity_id.clone(),
            widget_overrides: body.widget_overrides.clone(),
            is_shared: body.is_shared,
            created_at: stamp.clone(),
            updated_at: stamp,
        };
        lock(&self.views)?.push(view.clone());
        debug!(view_id = %view.view_id, "in-memory view created");
        Ok(view)
    }

    async fn update_view(&self, view_id: &str, body: &SavedViewUpdate) -> Result<SavedView> {
        self.begin_mutation()?;
        let mut views = lock(&self.views)?;
        let view = views
            .iter_mut()
            .find(|v| v.view_id == view_id)
            .ok_or_else(|| VistaError::not_found(format!("view {view_id}")))?;
        self.check_owner(view)?;

        if let Some(name) = &body.name {
            view.name = name.clone();
        }
        if let Some(overrides) = &body.widget_overrides {
            view.widget_overrides = overrides.clone();
        }
        if let Some(shared) = body.is_shared {
            view.is_shared = shared;
        }
        view.updated_at = now();
        Ok(view.clone())
    }

    async fn delete_view(&self, view_id: &str) -> Result<()> {
        self.begin_mutation()?;
        let mut views = lock(&self.views)?;
        let idx = views
            .iter()
            .position(|v| v.view_id == view_id)
            .ok_or_else(|| VistaError::not_found(format!("view {view_id}")))?;
        self.check_owner(&views[idx])?;
        views.remove(idx);
        Ok(())
    }
}

// =============================================================================
// Entities
// =============================================================================

/// Entity details held in memory; merges views from a shared view store.
#[derive(Debug)]
pub struct InMemoryEntitySource {
    entities: HashMap<(String, String), EntityDetail>,
    views: Option<Arc<InMemoryViewStore>>,
}

impl InMemoryEntitySource {
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            views: None,
        }
    }

    /// Resolve `view_id` against this store when fetching details.
    pub fn with_views(mut self, views: Arc<InMemoryViewStore>) -> Self {
        self.views = Some(views);
        self
    }

    pub fn with_entity(mut self, detail: EntityDetail) -> Self {
        self.entities.insert(
            (detail.entity_type.clone(), detail.entity_id.clone()),
            detail,
        );
        self
    }
}

impl Default for InMemoryEntitySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntitySource for InMemoryEntitySource {
    async fn entity_detail(
        &self,
        entity_type: &str,
        entity_id: &str,
        view_id: Option<&str>,
    ) -> Result<EntityDetail> {
        let mut detail = self
            .entities
            .get(&(entity_type.to_string(), entity_id.to_string()))
            .cloned()
            .ok_or_else(|| VistaError::not_found(format!("{entity_type} {entity_id}")))?;

        let Some(view_id) = view_id else {
            return Ok(detail);
        };
        let view = self
            .views
            .as_ref()
            .and_then(|store| store.visible(view_id))
            .ok_or_else(|| VistaError::not_found(format!("view {view_id}")))?;
        if view.entity_type != entity_type || view.entity_id != entity_id {
            return Err(VistaError::not_found(format!(
                "view {view_id} does not belong to this entity"
            )));
        }

        detail.widgets = apply_view(&detail.widgets, &view.widget_overrides);
        detail.active_view_id = Some(view.view_id);
        detail.active_view_name = Some(view.name);
        Ok(detail)
    }

    async fn resolve(&self, query: &str) -> Result<EntityResolution> {
        let needle = query.trim().to_lowercase();
        let mut candidates: Vec<EntityCandidate> = self
            .entities
            .values()
            .filter(|d| {
                !needle.is_empty()
                    && (d.entity_id.to_lowercase().contains(&needle)
                        || d.display_name.to_lowercase().contains(&needle))
            })
            .map(|d| EntityCandidate {
                entity_type: d.entity_type.clone(),
                entity_id: d.entity_id.clone(),
                display_name: d.display_name.clone(),
            })
            .collect();
        candidates.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));

        let exact = candidates
            .iter()
            .find(|c| c.entity_id.to_lowercase() == needle)
            .cloned();
        Ok(match exact {
            Some(hit) => EntityResolution {
                resolved: true,
                entity_type: Some(hit.entity_type),
                entity_id: Some(hit.entity_id),
                display_name: Some(hit.display_name),
                message: None,
                candidates,
            },
            None => EntityResolution {
                resolved: false,
                message: Some(if candidates.is_empty() {
                    format!("No entity matches '{}'", query.trim())
                } else {
                    "Multiple matches".to_string()
                }),
                candidates,
                ..Default::default()
            },
        })
    }
}

// =============================================================================
// Schedules
// =============================================================================

/// Schedules and delivery logs held in memory.
#[derive(Debug)]
pub struct InMemoryScheduleStore {
    username: String,
    schedules: Mutex<Vec<EmailSchedule>>,
    logs: Mutex<Vec<EmailLog>>,
    requests: AtomicUsize,
}

impl InMemoryScheduleStore {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            schedules: Mutex::new(Vec::new()),
            logs: Mutex::new(Vec::new()),
            requests: AtomicUsize::new(0),
        }
    }

    /// Calls received so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    /// Other users' schedules look missing.
    fn owned(&self, schedule_id: &str) -> Result<EmailSchedule> {
        lock(&self.schedules)?
            .iter()
            .find(|s| s.schedule_id == schedule_id && s.owner == self.username)
            .cloned()
            .ok_or_else(|| VistaError::not_found(format!("schedule {schedule_id}")))
    }

    fn record_delivery(&self, schedule: &EmailSchedule) -> Result<EmailLog> {
        let log = EmailLog {
            log_id: Uuid::new_v4().to_string(),
            schedule_id: schedule.schedule_id.clone(),
            sent_at: now(),
            status: LogStatus::Sent,
            error: None,
            recipients: schedule.recipients.clone(),
        };
        lock(&self.logs)?.push(log.clone());
        Ok(log)
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn create_schedule(&self, body: &EmailScheduleCreate) -> Result<EmailSchedule> {
        self.count();
        if body.recipients.is_empty() {
            return Err(VistaError::validation("recipients", "at least one recipient is required"));
        }
        let stamp = Utc::now();
        let schedule = EmailSchedule {
            schedule_id: Uuid::new_v4().to_string(),
            owner: self.username.clone(),
            name: body.name.clone(),
            entity_type: body.entity_type.clone(),
            entity_id: body.entity_id.clone(),
            widget_ids: body.widget_ids.clone(),
            recipients: body.recipients.clone(),
            recurrence: body.recurrence.clone(),
            widget_overrides: body.widget_overrides.clone(),
            status: ScheduleStatus::Active,
            next_run_at: initial_run_after(stamp, &body.recurrence).to_rfc3339(),
            last_run_at: String::new(),
            retry_count: 0,
            created_at: stamp.to_rfc3339(),
            updated_at: stamp.to_rfc3339(),
        };
        lock(&self.schedules)?.push(schedule.clone());
        // New schedules go out once immediately.
        self.record_delivery(&schedule)?;
        Ok(schedule)
    }

    async fn list_schedules(
        &self,
        entity_type: Option<&str>,
        entity_id: Option<&str>,
    ) -> Result<Vec<EmailSchedule>> {
        self.count();
        let schedules = lock(&self.schedules)?;
        Ok(schedules
            .iter()
            .filter(|s| s.owner == self.username)
            .filter(|s| entity_type.is_none_or(|t| s.entity_type == t))
            .filter(|s| entity_id.is_none_or(|id| s.entity_id == id))
            .cloned()
            .collect())
    }

    async fn get_schedule(&self, schedule_id: &str) -> Result<EmailSchedule> {
        self.count();
        self.owned(schedule_id)
    }

    async fn update_schedule(
        &self,
        schedule_id: &str,
        body: &EmailScheduleUpdate,
    ) -> Result<EmailSchedule> {
        self.count();
        let mut schedules = lock(&self.schedules)?;
        let schedule = schedules
            .iter_mut()
            .find(|s| s.schedule_id == schedule_id && s.owner == self.username)
            .ok_or_else(|| VistaError::not_found(format!("schedule {schedule_id}")))?;

        let before = schedule.recurrence.clone();
        if let Some(name) = &body.name {
            schedule.name = name.clone();
        }
        if let Some(recipients) = &body.recipients {
            schedule.recipients = recipients.clone();
        }
        if let Some(kind) = body.recurrence_type {
            schedule.recurrence.recurrence_type = kind;
        }
        if let Some(days) = &body.days_of_week {
            schedule.recurrence.days_of_week = days.clone();
        }
        if body.day_of_month.is_some() {
            schedule.recurrence.day_of_month = body.day_of_month;
        }
        if let Some(time) = body.time_of_day {
            schedule.recurrence.time_of_day = time;
        }
        if let Some(status) = body.status {
            schedule.status = status;
        }
        if let Some(overrides) = &body.widget_overrides {
            schedule.widget_overrides = overrides.clone();
        }
        if schedule.recurrence != before {
            schedule.next_run_at = initial_run_after(Utc::now(), &schedule.recurrence).to_rfc3339();
        }
        schedule.updated_at = now();
        Ok(schedule.clone())
    }

    async fn delete_schedule(&self, schedule_id: &str) -> Result<()> {
        self.count();
        let mut schedules = lock(&self.schedules)?;
        let before = schedules.len();
        schedules.retain(|s| s.schedule_id != schedule_id || s.owner != self.username);
        if schedules.len() == before {
            return Err(VistaError::not_found(format!("schedule {schedule_id}")));
        }
        Ok(())
    }

    async fn schedule_logs(&self, schedule_id: &str) -> Result<Vec<EmailLog>> {
        self.count();
        self.owned(schedule_id)?;
        Ok(lock(&self.logs)?
            .iter()
            .filter(|l| l.schedule_id == schedule_id)
            .cloned()
            .collect())
    }

    async fn send_now(&self, schedule_id: &str) -> Result<EmailLog> {
        self.count();
        let schedule = self.owned(schedule_id)?;
        self.record_delivery(&schedule)
    }
}
