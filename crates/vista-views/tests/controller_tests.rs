//! View controller and schedule flows against the in-memory stores.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::json;
use vista_core::{Result, VistaError};
use vista_views::schedule::ScheduleStore;
use vista_views::view::{EntitySource, ViewStore};
use vista_views::{
    DisplayZone, InMemoryEntitySource, InMemoryScheduleStore, InMemoryViewStore, SavedView,
    ScheduleDraft, SnapshotBuilder, ViewController, format_schedule,
};
use vista_widget::{
    ChartConfig, ChartType, ColumnConfig, ColumnFormat, EntityDetail, EntityResolution, Record,
    SortOrder, StaticDataSource, WidgetConfig, WidgetStateOverride,
};

fn people() -> Vec<Record> {
    (1..=30)
        .map(|i| {
            json!({
                "name": format!("Person {i:02}"),
                "type": if i % 3 == 0 { "analyst" } else { "executive" },
                "comp": i * 1000,
            })
            .as_object()
            .cloned()
            .unwrap()
        })
        .collect()
}

fn detail() -> EntityDetail {
    EntityDetail {
        entity_type: "stock".into(),
        entity_id: "AAPL".into(),
        display_name: "Apple Inc.".into(),
        header_fields: Vec::new(),
        widgets: vec![
            WidgetConfig::list("people", "/people")
                .with_column(ColumnConfig::new("name", "Name"))
                .with_column(ColumnConfig::new("type", "Type"))
                .with_column(ColumnConfig::new("comp", "Comp").with_format(ColumnFormat::Currency))
                .with_page_size(10),
            WidgetConfig::chart(
                "peers",
                "/peers",
                ChartConfig::new(ChartType::Bar, "ticker", "market_cap"),
            ),
        ],
        active_view_id: None,
        active_view_name: None,
    }
}

fn foreign_view(view_id: &str, owner: &str, shared: bool) -> SavedView {
    SavedView {
        view_id: view_id.into(),
        name: "Comp ranking".into(),
        owner: owner.into(),
        entity_type: "stock".into(),
        entity_id: "AAPL".into(),
        widget_overrides: vec![WidgetStateOverride {
            sort_by: Some("comp".into()),
            sort_order: Some(SortOrder::Desc),
            ..WidgetStateOverride::empty("people")
        }],
        is_shared: shared,
        created_at: String::new(),
        updated_at: String::new(),
    }
}

struct Fixture {
    views: Arc<InMemoryViewStore>,
    controller: ViewController,
    data: StaticDataSource,
}

fn fixture() -> Fixture {
    let views = Arc::new(InMemoryViewStore::new("alice"));
    views.insert(foreign_view("bob-shared", "bob", true));
    views.insert(foreign_view("bob-private", "bob", false));
    let entities = Arc::new(
        InMemoryEntitySource::new()
            .with_views(views.clone())
            .with_entity(detail()),
    );
    let controller = ViewController::new("stock", "AAPL", "alice", entities, views.clone());
    let data = StaticDataSource::new()
        .with_rows("/people", people())
        .with_rows("/peers", Vec::new());
    Fixture {
        views,
        controller,
        data,
    }
}

/// Entity source whose detail requests can be made to fail mid-test.
struct UnreliableEntities {
    inner: InMemoryEntitySource,
    down: AtomicBool,
}

#[async_trait]
impl EntitySource for UnreliableEntities {
    async fn entity_detail(
        &self,
        entity_type: &str,
        entity_id: &str,
        view_id: Option<&str>,
    ) -> Result<EntityDetail> {
        if self.down.load(Ordering::SeqCst) {
            return Err(VistaError::fetch("/api/entities/stock/AAPL", "connection reset"));
        }
        self.inner.entity_detail(entity_type, entity_id, view_id).await
    }

    async fn resolve(&self, query: &str) -> Result<EntityResolution> {
        self.inner.resolve(query).await
    }
}

fn unreliable_fixture() -> (Arc<InMemoryViewStore>, Arc<UnreliableEntities>, ViewController) {
    let views = Arc::new(InMemoryViewStore::new("alice"));
    let entities = Arc::new(UnreliableEntities {
        inner: InMemoryEntitySource::new()
            .with_views(views.clone())
            .with_entity(detail()),
        down: AtomicBool::new(false),
    });
    let controller =
        ViewController::new("stock", "AAPL", "alice", entities.clone(), views.clone());
    (views, entities, controller)
}

fn sort_people(controller: &mut ViewController) {
    let transition = controller
        .board_mut()
        .get_mut("people")
        .and_then(|h| h.runtime_mut().as_list_mut())
        .unwrap()
        .toggle_sort("name");
    controller.record(&transition);
}

fn people_sort(controller: &ViewController) -> Option<(String, SortOrder)> {
    controller
        .board()
        .get("people")
        .and_then(|h| h.runtime().as_list())
        .and_then(|l| l.sort().map(|(k, o)| (k.to_string(), o)))
}

#[tokio::test]
async fn test_load_starts_on_default_view() {
    let mut f = fixture();
    let tickets = f.controller.load().await.unwrap();
    assert_eq!(tickets.len(), 2);
    f.controller.fetch_all(&f.data, tickets).await;

    assert_eq!(f.controller.active_view_id(), None);
    assert_eq!(f.controller.active_view_name(), "Default View");
    assert!(!f.controller.is_dirty());
    // Alice sees bob's shared view but not his private one.
    let ids: Vec<&str> = f.controller.saved_views().iter().map(|v| v.view_id.as_str()).collect();
    assert_eq!(ids, vec!["bob-shared"]);

    let list = f.controller.board().get("people").unwrap().runtime().as_list().unwrap();
    assert_eq!(list.total_records(), 30);
    assert_eq!(list.display_rows().len(), 10);
}

#[tokio::test]
async fn test_edits_mark_dirty_and_offer_save_new_only() {
    let mut f = fixture();
    f.controller.load().await.unwrap();
    sort_people(&mut f.controller);

    assert!(f.controller.is_dirty());
    assert!(f.controller.can_save_new());
    assert!(!f.controller.can_overwrite());
    assert!(!f.controller.can_delete());
}

#[tokio::test]
async fn test_save_as_new_requires_name() {
    let mut f = fixture();
    f.controller.load().await.unwrap();
    sort_people(&mut f.controller);

    let err = f.controller.save_as_new("   ", false).await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(err.friendly_message(), "View name is required.");
    assert_eq!(f.views.mutation_count(), 0);
    assert!(f.controller.is_dirty());
}

#[tokio::test]
async fn test_save_as_new_activates_view() {
    let mut f = fixture();
    f.controller.load().await.unwrap();
    sort_people(&mut f.controller);

    let view = f.controller.save_as_new(" By name ", true).await.unwrap();
    assert_eq!(view.name, "By name");
    assert_eq!(view.owner, "alice");
    assert_eq!(f.controller.active_view_id(), Some(view.view_id.as_str()));
    assert_eq!(f.controller.active_view_name(), "By name");
    assert!(!f.controller.is_dirty());
    assert!(f.controller.can_delete());

    // Re-selecting it merges the stored sort back into the configs.
    f.controller.select_view(None).await.unwrap();
    assert_eq!(people_sort(&f.controller), None);
    f.controller.select_view(Some(&view.view_id)).await.unwrap();
    assert_eq!(people_sort(&f.controller), Some(("name".to_string(), SortOrder::Asc)));
}

#[tokio::test]
async fn test_overwrite_foreign_view_is_blocked() {
    let mut f = fixture();
    f.controller.load().await.unwrap();
    f.controller.select_view(Some("bob-shared")).await.unwrap();
    assert_eq!(f.controller.active_view_name(), "Comp ranking");
    assert_eq!(people_sort(&f.controller), Some(("comp".to_string(), SortOrder::Desc)));

    sort_people(&mut f.controller);
    assert!(!f.controller.can_overwrite());
    assert!(!f.controller.can_delete());

    let err = f.controller.overwrite().await.unwrap_err();
    assert!(matches!(err, VistaError::NotOwner { ref owner, .. } if owner == "bob"));
    assert_eq!(f.views.mutation_count(), 0);
    assert!(f.controller.is_dirty());

    assert!(f.controller.delete().await.is_err());
    assert_eq!(f.views.mutation_count(), 0);
}

#[tokio::test]
async fn test_overwrite_without_active_view() {
    let mut f = fixture();
    f.controller.load().await.unwrap();
    sort_people(&mut f.controller);

    let err = f.controller.overwrite().await.unwrap_err();
    assert!(matches!(err, VistaError::NoActiveView));
    assert_eq!(f.views.mutation_count(), 0);
}

#[tokio::test]
async fn test_overwrite_owned_view() {
    let mut f = fixture();
    f.controller.load().await.unwrap();
    sort_people(&mut f.controller);
    let view = f.controller.save_as_new("Mine", false).await.unwrap();

    // Second click flips the order to descending.
    sort_people(&mut f.controller);
    assert!(f.controller.can_overwrite());
    f.controller.overwrite().await.unwrap();

    assert!(!f.controller.is_dirty());
    let stored = f.views.get(&view.view_id).unwrap();
    let people = stored
        .widget_overrides
        .iter()
        .find(|o| o.widget_id == "people")
        .unwrap();
    assert_eq!(people.sort_order, Some(SortOrder::Desc));
    assert_eq!(people_sort(&f.controller), Some(("name".to_string(), SortOrder::Desc)));
}

#[tokio::test]
async fn test_server_rejection_keeps_dirty() {
    let mut f = fixture();
    f.controller.load().await.unwrap();
    sort_people(&mut f.controller);
    f.controller.save_as_new("Mine", false).await.unwrap();

    sort_people(&mut f.controller);
    f.views.reject_mutations(true);
    let err = f.controller.overwrite().await.unwrap_err();
    assert!(err.is_authorization());
    assert!(f.controller.is_dirty());
    assert!(f.controller.save_as_new("Copy", false).await.is_err());
    assert!(f.controller.is_dirty());
}

#[tokio::test]
async fn test_delete_returns_to_default() {
    let mut f = fixture();
    f.controller.load().await.unwrap();
    sort_people(&mut f.controller);
    let view = f.controller.save_as_new("Temp", false).await.unwrap();

    f.controller.delete().await.unwrap();
    assert_eq!(f.controller.active_view_id(), None);
    assert_eq!(f.controller.active_view_name(), "Default View");
    assert!(f.views.get(&view.view_id).is_none());
    assert!(f.controller.saved_views().iter().all(|v| v.view_id != view.view_id));
    assert_eq!(people_sort(&f.controller), None);
}

#[tokio::test]
async fn test_overwrite_is_clean_when_reload_fails() {
    let (views, entities, mut controller) = unreliable_fixture();
    controller.load().await.unwrap();
    sort_people(&mut controller);
    let view = controller.save_as_new("Mine", false).await.unwrap();
    sort_people(&mut controller);

    entities.down.store(true, Ordering::SeqCst);
    let err = controller.overwrite().await.unwrap_err();

    // The update was stored, so the page is clean and still shows it.
    assert!(err.is_reload());
    assert!(!controller.is_dirty());
    assert_eq!(controller.active_view_id(), Some(view.view_id.as_str()));
    let stored = views.get(&view.view_id).unwrap();
    assert_eq!(stored.widget_overrides[0].sort_order, Some(SortOrder::Desc));
    assert_eq!(people_sort(&controller), Some(("name".to_string(), SortOrder::Desc)));
}

#[tokio::test]
async fn test_delete_keeps_view_when_default_unavailable() {
    let (views, entities, mut controller) = unreliable_fixture();
    controller.load().await.unwrap();
    sort_people(&mut controller);
    let view = controller.save_as_new("Temp", false).await.unwrap();
    sort_people(&mut controller);

    entities.down.store(true, Ordering::SeqCst);
    assert!(controller.delete().await.is_err());
    assert!(views.get(&view.view_id).is_some());
    assert_eq!(controller.active_view_id(), Some(view.view_id.as_str()));
    assert_eq!(controller.active_view_name(), "Temp");
    assert!(controller.is_dirty());

    entities.down.store(false, Ordering::SeqCst);
    controller.delete().await.unwrap();
    assert!(views.get(&view.view_id).is_none());
    assert_eq!(controller.active_view_id(), None);
    assert!(!controller.is_dirty());
}

#[tokio::test]
async fn test_select_view_discards_edits() {
    let mut f = fixture();
    f.controller.load().await.unwrap();
    sort_people(&mut f.controller);
    assert!(f.controller.is_dirty());

    f.controller.select_view(Some("bob-shared")).await.unwrap();
    assert!(!f.controller.is_dirty());

    // Unknown or private views fail and leave the page alone.
    sort_people(&mut f.controller);
    assert!(f.controller.select_view(Some("bob-private")).await.is_err());
    assert_eq!(f.controller.active_view_id(), Some("bob-shared"));
    assert!(f.controller.is_dirty());
}

#[tokio::test]
async fn test_initial_view_is_applied_on_load() {
    let f = fixture();
    let mut controller = f.controller.with_initial_view(Some("bob-shared".into()));
    controller.load().await.unwrap();
    assert_eq!(controller.active_view_id(), Some("bob-shared"));
    assert_eq!(people_sort(&controller), Some(("comp".to_string(), SortOrder::Desc)));
}

#[tokio::test]
async fn test_schedule_snapshot_is_frozen() {
    let mut f = fixture();
    let tickets = f.controller.load().await.unwrap();
    f.controller.fetch_all(&f.data, tickets).await;
    sort_people(&mut f.controller);

    let schedules = InMemoryScheduleStore::new("alice");
    let snapshot = SnapshotBuilder::from_board(f.controller.board());
    let draft = ScheduleDraft {
        name: "Morning digest".into(),
        recipients: "a@example.com, b@example.com".into(),
        ..Default::default()
    };
    let body = draft.to_create("stock", "AAPL", snapshot).unwrap();
    let created = schedules.create_schedule(&body).await.unwrap();
    assert!(!created.next_run_at.is_empty());
    assert_eq!(
        format_schedule(&created.recurrence, &DisplayZone::default()),
        "Mon, Tue, Wed, Thu, Fri @ 9:00 AM EST"
    );

    // Further edits to the page never reach the stored schedule.
    sort_people(&mut f.controller);
    let stored = schedules.get_schedule(&created.schedule_id).await.unwrap();
    let people = stored
        .widget_overrides
        .iter()
        .find(|o| o.widget_id == "people")
        .unwrap();
    assert_eq!(people.sort_order, Some(SortOrder::Asc));

    let log = schedules.send_now(&created.schedule_id).await.unwrap();
    assert_eq!(log.recipients.len(), 2);
    let logs = schedules.schedule_logs(&created.schedule_id).await.unwrap();
    assert_eq!(logs.len(), 2);

    let listed = schedules.list_schedules(Some("stock"), Some("AAPL")).await.unwrap();
    assert_eq!(listed.len(), 1);
    schedules.delete_schedule(&created.schedule_id).await.unwrap();
    assert!(schedules.get_schedule(&created.schedule_id).await.is_err());
}

#[tokio::test]
async fn test_invalid_draft_sends_nothing() {
    let schedules = InMemoryScheduleStore::new("alice");
    let draft = ScheduleDraft {
        name: "Digest".into(),
        recipients: " , ".into(),
        ..Default::default()
    };
    let err = draft.to_create("stock", "AAPL", Vec::new()).unwrap_err();
    assert_eq!(err.friendly_message(), "Please enter at least one recipient email.");
    assert_eq!(schedules.request_count(), 0);
}

#[tokio::test]
async fn test_view_store_enforces_ownership() {
    let store = InMemoryViewStore::new("alice");
    store.insert(foreign_view("bob-shared", "bob", true));
    let err = store.delete_view("bob-shared").await.unwrap_err();
    assert!(err.is_authorization());
    assert!(store.get("bob-shared").is_some());
}

#[tokio::test]
async fn test_switch_entity_starts_on_default() {
    let mut f = fixture();
    f.controller.load().await.unwrap();
    sort_people(&mut f.controller);

    // Unknown entity: nothing changes.
    assert!(f.controller.switch_entity("stock", "NOPE").await.is_err());
    assert_eq!(f.controller.entity_id(), "AAPL");
    assert!(f.controller.is_dirty());

    let other = EntityDetail {
        entity_id: "MSFT".into(),
        display_name: "Microsoft Corp.".into(),
        ..detail()
    };
    let entities = Arc::new(
        InMemoryEntitySource::new()
            .with_views(f.views.clone())
            .with_entity(detail())
            .with_entity(other),
    );
    let mut controller = ViewController::new("stock", "AAPL", "alice", entities, f.views.clone())
        .with_initial_view(Some("bob-shared".into()));
    controller.load().await.unwrap();
    assert_eq!(controller.saved_views().len(), 1);

    let tickets = controller.switch_entity("stock", "MSFT").await.unwrap();
    assert_eq!(tickets.len(), 2);
    assert_eq!(controller.entity_id(), "MSFT");
    assert_eq!(controller.active_view_id(), None);
    assert!(controller.saved_views().is_empty());
    assert!(!controller.is_dirty());
}
