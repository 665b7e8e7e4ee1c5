//! BackendClient against a wiremock server.

use std::sync::Arc;

use serde_json::json;
use vista_client::BackendClient;
use vista_core::VistaError;
use vista_views::{
    EntitySource, ScheduleDraft, ScheduleStore, SnapshotBuilder, ViewController, ViewStore,
};
use vista_widget::{PageQuery, SortOrder, WidgetDataSource};
use wiremock::{Mock, MockServer, ResponseTemplate, matchers};

fn client(server: &MockServer) -> BackendClient {
    BackendClient::new(&server.uri(), Some("test-token".into()), 5).unwrap()
}

fn detail_json(active_view: Option<(&str, &str)>) -> serde_json::Value {
    json!({
        "entity_type": "stock",
        "entity_id": "AAPL",
        "display_name": "Apple Inc.",
        "widgets": [{
            "widget_id": "people",
            "title": "Related People",
            "widget_type": "list",
            "endpoint": "/api/entities/stock/AAPL/people",
            "columns": [
                {"key": "name", "label": "Name"},
                {"key": "comp", "label": "Comp", "format": "currency"}
            ],
            "default_page_size": 10
        }],
        "active_view_id": active_view.map(|(id, _)| id),
        "active_view_name": active_view.map(|(_, name)| name),
    })
}

fn view_json(view_id: &str, owner: &str) -> serde_json::Value {
    json!({
        "view_id": view_id,
        "name": "Comp ranking",
        "owner": owner,
        "entity_type": "stock",
        "entity_id": "AAPL",
        "widget_overrides": [],
        "is_shared": true
    })
}

#[tokio::test]
async fn test_entity_detail_sends_view_and_token() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/api/entities/stock/AAPL"))
        .and(matchers::query_param("view_id", "v1"))
        .and(matchers::header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_json(Some(("v1", "Mine")))))
        .expect(1)
        .mount(&server)
        .await;

    let detail = client(&server)
        .entity_detail("stock", "AAPL", Some("v1"))
        .await
        .unwrap();
    assert_eq!(detail.widgets.len(), 1);
    assert_eq!(detail.active_view_name.as_deref(), Some("Mine"));
}

#[tokio::test]
async fn test_fetch_page_passes_query() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/api/entities/stock/AAPL/people"))
        .and(matchers::query_param("page", "2"))
        .and(matchers::query_param("page_size", "10"))
        .and(matchers::query_param("sort_by", "comp"))
        .and(matchers::query_param("sort_order", "desc"))
        .and(matchers::query_param("type", "analyst"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"name": "Ann", "comp": 1200}],
            "page": 2,
            "page_size": 10,
            "total_records": 11,
            "total_pages": 2,
            "has_next": false,
            "has_previous": true
        })))
        .mount(&server)
        .await;

    let mut query = PageQuery::unpaged("/api/entities/stock/AAPL/people");
    query.page = Some(2);
    query.page_size = Some(10);
    query.sort_by = Some("comp".into());
    query.sort_order = Some(SortOrder::Desc);
    query.filters.insert("type".into(), "analyst".into());

    let page = client(&server).fetch_page(&query).await.unwrap();
    assert_eq!(page.total_records, 11);
    assert!(page.has_previous);
    assert_eq!(page.data.len(), 1);
}

#[tokio::test]
async fn test_ids_are_path_encoded() {
    let server = MockServer::start().await;
    let mut body = detail_json(None);
    body["entity_id"] = json!("BRK/B x");
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/api/entities/stock/BRK%2FB%20x"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(matchers::method("DELETE"))
        .and(matchers::path("/api/views/v%3F1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let detail = client.entity_detail("stock", "BRK/B x", None).await.unwrap();
    assert_eq!(detail.entity_id, "BRK/B x");
    client.delete_view("v?1").await.unwrap();
}

#[tokio::test]
async fn test_status_codes_map_to_errors() {
    let server = MockServer::start().await;
    Mock::given(matchers::path("/api/views/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "View not found"})))
        .mount(&server)
        .await;
    Mock::given(matchers::path("/api/views/theirs"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"detail": "Not the owner"})))
        .mount(&server)
        .await;
    Mock::given(matchers::path("/api/entities/resolve"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client.delete_view("missing").await.unwrap_err();
    assert!(matches!(err, VistaError::NotFound { .. }));

    let err = client.delete_view("theirs").await.unwrap_err();
    assert!(err.is_authorization());
    assert!(err.to_string().contains("Not the owner"));

    let err = client.resolve("AAPL").await.unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(matchers::path("/api/views/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[{\"view_id\": 7}]"))
        .mount(&server)
        .await;

    let err = client(&server).list_views("stock", "AAPL").await.unwrap_err();
    assert!(matches!(err, VistaError::Decode { .. }));
}

#[tokio::test]
async fn test_delete_accepts_empty_body() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("DELETE"))
        .and(matchers::path("/api/views/v1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).delete_view("v1").await.unwrap();
}

#[tokio::test]
async fn test_rejected_overwrite_keeps_dirty() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/api/entities/stock/AAPL"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_json(Some(("v1", "Mine")))))
        .mount(&server)
        .await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/api/views/"))
        .and(matchers::query_param("entity_type", "stock"))
        .and(matchers::query_param("entity_id", "AAPL"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([view_json("v1", "alice")])))
        .mount(&server)
        .await;
    Mock::given(matchers::method("PUT"))
        .and(matchers::path("/api/views/v1"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"detail": "Read-only"})))
        .expect(1)
        .mount(&server)
        .await;

    let backend = Arc::new(client(&server));
    let mut controller =
        ViewController::new("stock", "AAPL", "alice", backend.clone(), backend.clone())
            .with_initial_view(Some("v1".into()));
    controller.load().await.unwrap();
    assert_eq!(controller.active_view_id(), Some("v1"));

    let transition = controller
        .board_mut()
        .get_mut("people")
        .and_then(|h| h.runtime_mut().as_list_mut())
        .unwrap()
        .toggle_sort("comp");
    controller.record(&transition);
    assert!(controller.can_overwrite());

    let err = controller.overwrite().await.unwrap_err();
    assert!(err.is_authorization());
    assert!(controller.is_dirty());
}

#[tokio::test]
async fn test_schedule_create_and_send_now() {
    let server = MockServer::start().await;
    let stored = json!({
        "schedule_id": "s1",
        "owner": "alice",
        "name": "Digest",
        "entity_type": "stock",
        "entity_id": "AAPL",
        "recipients": ["a@example.com"],
        "recurrence_type": "weekly",
        "days_of_week": [0, 1, 2, 3, 4],
        "day_of_month": null,
        "time_of_day": "14:00",
        "widget_overrides": [],
        "status": "active",
        "next_run_at": "2026-03-03T14:00:00+00:00"
    });
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/api/schedules/"))
        .and(matchers::body_partial_json(json!({
            "name": "Digest",
            "recurrence_type": "weekly",
            "time_of_day": "14:00",
            "day_of_month": null
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(stored))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/api/schedules/s1/send-now"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "log_id": "l1",
            "schedule_id": "s1",
            "sent_at": "2026-03-02T10:00:00+00:00",
            "status": "sent"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let draft = ScheduleDraft {
        name: "Digest".into(),
        recipients: "a@example.com".into(),
        ..Default::default()
    };
    let body = draft
        .to_create("stock", "AAPL", SnapshotBuilder::from_reference(&[], &[]))
        .unwrap();
    let created = client.create_schedule(&body).await.unwrap();
    assert_eq!(created.schedule_id, "s1");

    let log = client.send_now("s1").await.unwrap();
    assert_eq!(log.schedule_id, "s1");
}
