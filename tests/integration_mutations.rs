use farmdeck::{
    ApiError, ClientConfig, CreateSeasonPayload, EntityKind, FarmdeckClient, HttpResponse, Method,
    ListTaskFilters, QueryKey, TaskStatus, TaskStatusPayload, Transport, TransportError,
    TransportFuture, UpdateTaskPayload,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

// Scripted stand-in for the HTTP layer: responses are served in arrival
// order and every request is recorded for assertions.
#[derive(Default)]
struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<(Method, String, Option<Value>)>>,
}

impl ScriptedTransport {
    fn push_ok(&self, status: u16, body: Value) {
        self.responses
            .lock()
            .expect("responses lock")
            .push_back(Ok(HttpResponse { status, body }));
    }

    fn request_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    fn last_request(&self) -> (Method, String, Option<Value>) {
        self.requests
            .lock()
            .expect("requests lock")
            .last()
            .cloned()
            .expect("at least one request")
    }
}

impl Transport for ScriptedTransport {
    fn request(
        &self,
        method: Method,
        path: &str,
        _query: &[(String, String)],
        body: Option<Value>,
    ) -> TransportFuture {
        self.requests
            .lock()
            .expect("requests lock")
            .push((method, path.to_string(), body));
        let next = self
            .responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or_else(|| Err(TransportError("script exhausted".to_string())));
        Box::pin(async move { next })
    }
}

fn client_over(transport: &Arc<ScriptedTransport>) -> FarmdeckClient {
    FarmdeckClient::new(
        Arc::clone(transport) as Arc<dyn Transport>,
        ClientConfig::default(),
    )
    .expect("default config is valid")
}

fn task_body(id: i64, season_id: Option<i64>, title: &str, status: &str) -> Value {
    json!({
        "id": id,
        "seasonId": season_id,
        "title": title,
        "notes": null,
        "status": status,
        "dueDate": null,
        "estimatedHours": null,
        "actualStartDate": null,
        "actualEndDate": null,
        "createdAt": "2025-03-20T08:00:00Z"
    })
}

fn season_body(id: i64, plot_id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "plotId": plot_id,
        "name": name,
        "cropName": null,
        "status": "PLANNED",
        "startDate": "2025-03-01",
        "endDate": null,
        "actualStartDate": null,
        "actualEndDate": null,
        "notes": null,
        "createdAt": "2025-02-01T08:00:00Z"
    })
}

fn page_of(items: Vec<Value>) -> Value {
    let count = items.len();
    json!({
        "items": items,
        "page": 0,
        "size": 20,
        "totalElements": count,
        "totalPages": 1
    })
}

#[tokio::test]
async fn rejected_season_create_reverts_the_plot_list_exactly() {
    let transport = Arc::new(ScriptedTransport::default());
    let client = client_over(&transport);

    let plot_list = QueryKey::parent_list(EntityKind::Season, 3, &[]);
    let original = page_of(vec![
        season_body(1, 3, "Autumn24"),
        season_body(2, 3, "Winter24"),
    ]);
    client.cache().store(plot_list.clone(), original.clone());

    transport.push_ok(409, json!({ "message": "plot already has an open season" }));
    let handle = client
        .create_season(&CreateSeasonPayload {
            plot_id: 3,
            name: "Spring25".to_string(),
            crop_name: None,
            start_date: NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid date"),
            end_date: None,
            notes: None,
        })
        .expect("payload is valid");

    // speculative placeholder lands before the call settles
    let speculative = client.cache().peek(&plot_list).expect("list cached");
    assert_eq!(speculative["items"].as_array().expect("items").len(), 3);
    assert_eq!(speculative["items"][0]["name"], "Spring25");

    let error = handle.settled().await.expect_err("server rejected create");
    match &error {
        ApiError::Conflict(message) => assert_eq!(message, "plot already has an open season"),
        other => panic!("expected conflict, got {other:?}"),
    }

    // the list reverts to exactly its original two items
    assert_eq!(client.cache().peek(&plot_list), Some(original));
}

#[tokio::test]
async fn optimistic_create_is_visible_in_every_overlapping_list_at_once() {
    let transport = Arc::new(ScriptedTransport::default());
    let client = client_over(&transport);

    let season_list = QueryKey::parent_list(EntityKind::Task, 5, &[]);
    let workspace_list = QueryKey::workspace_list(EntityKind::Task, &[]);
    client
        .cache()
        .store(season_list.clone(), page_of(vec![task_body(1, Some(5), "Plough", "PENDING")]));
    client
        .cache()
        .store(workspace_list.clone(), page_of(vec![task_body(1, Some(5), "Plough", "PENDING")]));

    let _handle = client
        .create_task(&farmdeck::CreateTaskPayload {
            season_id: Some(5),
            title: "Irrigate".to_string(),
            notes: None,
            due_date: None,
            estimated_hours: None,
        })
        .expect("payload is valid");

    for key in [&season_list, &workspace_list] {
        let view = client.cache().peek(key).expect("list cached");
        assert_eq!(view["items"][0]["title"], "Irrigate");
    }
}

#[tokio::test]
async fn concurrent_edits_roll_back_independently() {
    let transport = Arc::new(ScriptedTransport::default());
    let client = client_over(&transport);

    let detail = QueryKey::detail(EntityKind::Task, 7);
    client
        .cache()
        .store(detail.clone(), task_body(7, Some(5), "Original", "PENDING"));

    // A (title edit) will be rejected; B (notes edit) will succeed with the
    // server's merged truth: original title, new notes.
    transport.push_ok(409, json!({ "message": "title is locked while task is queued" }));
    let mut authoritative = task_body(7, Some(5), "Original", "PENDING");
    authoritative["notes"] = json!("Y");
    transport.push_ok(200, json!({ "result": authoritative.clone() }));
    // fallback for the final read in case the failed edit settles last and
    // leaves the detail view stale
    transport.push_ok(200, json!({ "result": authoritative }));

    let edit_a = client
        .update_task(
            7,
            &UpdateTaskPayload {
                title: Some("X".to_string()),
                ..UpdateTaskPayload::default()
            },
        )
        .expect("payload is valid");
    let edit_b = client
        .update_task(
            7,
            &UpdateTaskPayload {
                notes: Some("Y".to_string()),
                ..UpdateTaskPayload::default()
            },
        )
        .expect("payload is valid");

    // both speculative edits applied in dispatch order
    let speculative = client.cache().peek(&detail).expect("detail cached");
    assert_eq!(speculative["title"], "X");
    assert_eq!(speculative["notes"], "Y");

    assert!(edit_a.settled().await.is_err());
    edit_b.settled().await.expect("second edit succeeds");

    // A rolled back, B applied: not a merge that reintroduces A's title
    let task = client.get_task(7).await.expect("detail read");
    assert_eq!(task.title, "Original");
    assert_eq!(task.notes.as_deref(), Some("Y"));
    assert!(transport.request_count() <= 3);
}

#[tokio::test]
async fn status_update_reads_identically_across_all_views() {
    let transport = Arc::new(ScriptedTransport::default());
    let client = client_over(&transport);

    // prime the season-scoped list through the real read path
    transport.push_ok(200, page_of(vec![task_body(42, Some(5), "Harvest", "PENDING")]));
    let filters = ListTaskFilters::default();
    let first = client
        .tasks_for_season(5, &filters)
        .await
        .expect("list read");
    assert_eq!(first.items[0].status, TaskStatus::Pending);

    let mut started = task_body(42, Some(5), "Harvest", "IN_PROGRESS");
    started["actualStartDate"] = json!("2025-04-01");
    transport.push_ok(200, json!({ "result": started }));
    transport.push_ok(
        200,
        page_of(vec![{
            let mut item = task_body(42, Some(5), "Harvest", "IN_PROGRESS");
            item["actualStartDate"] = json!("2025-04-01");
            item
        }]),
    );

    client
        .change_task_status(
            42,
            &TaskStatusPayload {
                status: TaskStatus::InProgress,
                actual_start_date: NaiveDate::from_ymd_opt(2025, 4, 1),
                actual_end_date: None,
            },
        )
        .expect("payload is valid")
        .settled()
        .await
        .expect("status change succeeds");

    // list was marked stale by the settle; this read re-fetches server truth
    let refreshed = client
        .tasks_for_season(5, &filters)
        .await
        .expect("list refetch");
    assert_eq!(refreshed.items[0].status, TaskStatus::InProgress);

    // detail was reconciled from the authoritative response, no lag
    let task = client.get_task(42).await.expect("detail read");
    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(
        task.actual_start_date,
        NaiveDate::from_ymd_opt(2025, 4, 1)
    );
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test]
async fn delete_removes_the_task_from_every_list() {
    let transport = Arc::new(ScriptedTransport::default());
    let client = client_over(&transport);

    let season_list = QueryKey::parent_list(EntityKind::Task, 5, &[]);
    let workspace_list = QueryKey::workspace_list(EntityKind::Task, &[]);
    let detail = QueryKey::detail(EntityKind::Task, 9);
    let both = vec![
        task_body(9, Some(5), "Old chore", "PENDING"),
        task_body(10, Some(5), "Keep me", "PENDING"),
    ];
    client.cache().store(season_list.clone(), page_of(both.clone()));
    client.cache().store(workspace_list.clone(), page_of(both));
    client
        .cache()
        .store(detail.clone(), task_body(9, Some(5), "Old chore", "PENDING"));

    transport.push_ok(204, Value::Null);
    client
        .remove_task(9)
        .settled()
        .await
        .expect("delete succeeds");

    for key in [&season_list, &workspace_list] {
        let view = client.cache().peek(key).expect("list cached");
        let ids: Vec<i64> = view["items"]
            .as_array()
            .expect("items")
            .iter()
            .map(|item| item["id"].as_i64().expect("id"))
            .collect();
        assert_eq!(ids, vec![10]);
    }
    assert_eq!(client.cache().peek(&detail), None);

    let (method, path, _) = transport.last_request();
    assert_eq!(method, Method::Delete);
    assert_eq!(path, "/api/tasks/9");
}

#[tokio::test]
async fn not_found_mutation_restores_the_entity_locally() {
    let transport = Arc::new(ScriptedTransport::default());
    let client = client_over(&transport);

    let workspace_list = QueryKey::workspace_list(EntityKind::Task, &[]);
    let original = page_of(vec![task_body(11, None, "Ghost", "PENDING")]);
    client.cache().store(workspace_list.clone(), original.clone());

    transport.push_ok(404, json!({ "message": "task 11 does not exist" }));
    let error = client
        .remove_task(11)
        .settled()
        .await
        .expect_err("entity vanished server-side");
    assert!(matches!(error, ApiError::NotFound(_)));

    // the cache cannot independently confirm the deletion; the view goes back
    // to showing the entity and the caller decides whether to re-fetch
    assert_eq!(client.cache().peek(&workspace_list), Some(original));
}
