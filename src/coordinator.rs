use crate::cache::{CacheStore, ViewSnapshot};
use crate::errors::{ApiError, ApiResult};
use crate::gateway::Gateway;
use crate::keys::{EntityKind, KeyPrefix, QueryKey, Scope};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    ChangeStatus,
    Delete,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::ChangeStatus => "change-status",
            Self::Delete => "delete",
        }
    }
}

struct IntentRecord {
    seq: u64,
    kind: EntityKind,
    action: MutationKind,
    target: Option<i64>,
    snapshots: Vec<ViewSnapshot>,
    touched: Vec<KeyPrefix>,
    dispatched_at: DateTime<Utc>,
}

pub struct MutationHandle {
    intent_id: Uuid,
    receiver: oneshot::Receiver<ApiResult<Option<Value>>>,
}

impl MutationHandle {
    pub fn intent_id(&self) -> Uuid {
        self.intent_id
    }

    pub async fn settled(self) -> ApiResult<Option<Value>> {
        match self.receiver.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ApiError::Network(
                "mutation task dropped before settling".to_string(),
            )),
        }
    }
}

pub struct MutationCoordinator {
    cache: Arc<CacheStore>,
    gateway: Arc<Gateway>,
    intents: Mutex<HashMap<Uuid, IntentRecord>>,
    dispatch_seq: AtomicU64,
    next_temp_id: AtomicI64,
}

impl MutationCoordinator {
    pub fn new(cache: Arc<CacheStore>, gateway: Arc<Gateway>) -> Self {
        Self {
            cache,
            gateway,
            intents: Mutex::new(HashMap::new()),
            dispatch_seq: AtomicU64::new(1),
            next_temp_id: AtomicI64::new(-1),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.intents.lock().expect("intent arena lock").len()
    }

    pub fn dispatch_create(
        self: &Arc<Self>,
        kind: EntityKind,
        parent_id: Option<i64>,
        payload: Value,
    ) -> MutationHandle {
        let mut prefixes = vec![KeyPrefix::ScopedLists(kind, Scope::Workspace)];
        if let Some(parent) = parent_id {
            prefixes.push(KeyPrefix::ScopedLists(kind, Scope::Parent(parent)));
        }
        let placeholder = self.build_placeholder(kind, &payload);
        let intent_id = self.begin(kind, MutationKind::Create, None, prefixes, |_, view| {
            prepend_item(view, &placeholder);
        });
        self.spawn_settle(intent_id, kind, MutationKind::Create, None, payload)
    }

    pub fn dispatch_update(
        self: &Arc<Self>,
        kind: EntityKind,
        id: i64,
        payload: Value,
    ) -> MutationHandle {
        let prefixes = vec![KeyPrefix::Detail(kind, id), KeyPrefix::Lists(kind)];
        let patch = payload.clone();
        let intent_id = self.begin(kind, MutationKind::Update, Some(id), prefixes, |_, view| {
            patch_entity(view, id, &patch);
        });
        self.spawn_settle(intent_id, kind, MutationKind::Update, Some(id), payload)
    }

    pub fn dispatch_change_status(
        self: &Arc<Self>,
        kind: EntityKind,
        id: i64,
        payload: Value,
    ) -> MutationHandle {
        let prefixes = vec![KeyPrefix::Detail(kind, id), KeyPrefix::Lists(kind)];
        let patch = payload.clone();
        let intent_id = self.begin(
            kind,
            MutationKind::ChangeStatus,
            Some(id),
            prefixes,
            |_, view| {
                patch_entity(view, id, &patch);
            },
        );
        self.spawn_settle(intent_id, kind, MutationKind::ChangeStatus, Some(id), payload)
    }

    pub fn dispatch_remove(self: &Arc<Self>, kind: EntityKind, id: i64) -> MutationHandle {
        // the detail view has no "deleted" representation; lists only
        let prefixes = vec![KeyPrefix::Lists(kind)];
        let intent_id = self.begin(kind, MutationKind::Delete, Some(id), prefixes, |_, view| {
            remove_item(view, id);
        });
        self.spawn_settle(intent_id, kind, MutationKind::Delete, Some(id), Value::Null)
    }

    fn begin(
        &self,
        kind: EntityKind,
        action: MutationKind,
        target: Option<i64>,
        prefixes: Vec<KeyPrefix>,
        apply: impl FnMut(&QueryKey, &mut Value),
    ) -> Uuid {
        let intent_id = Uuid::new_v4();
        let seq = self.dispatch_seq.fetch_add(1, Ordering::SeqCst);
        let snapshots = self.cache.snapshot_and_apply(&prefixes, apply);
        tracing::debug!(
            intent_id = %intent_id,
            seq,
            entity = kind.as_str(),
            action = action.as_str(),
            views = snapshots.len(),
            "mutation dispatched"
        );
        let record = IntentRecord {
            seq,
            kind,
            action,
            target,
            snapshots,
            touched: prefixes,
            dispatched_at: Utc::now(),
        };
        self.intents
            .lock()
            .expect("intent arena lock")
            .insert(intent_id, record);
        intent_id
    }

    fn spawn_settle(
        self: &Arc<Self>,
        intent_id: Uuid,
        kind: EntityKind,
        action: MutationKind,
        target: Option<i64>,
        payload: Value,
    ) -> MutationHandle {
        let (sender, receiver) = oneshot::channel();
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = coordinator
                .execute_remote(kind, action, target, &payload)
                .await;
            match &outcome {
                Ok(authoritative) => coordinator.settle_success(intent_id, authoritative.clone()),
                Err(error) => coordinator.settle_failure(intent_id, error),
            }
            let _ = sender.send(outcome);
        });
        MutationHandle {
            intent_id,
            receiver,
        }
    }

    async fn execute_remote(
        &self,
        kind: EntityKind,
        action: MutationKind,
        target: Option<i64>,
        payload: &Value,
    ) -> ApiResult<Option<Value>> {
        let id = target.unwrap_or_default();
        match (kind, action) {
            (EntityKind::Season, MutationKind::Create) => {
                entity_value(self.gateway.create_season(payload).await?)
            }
            (EntityKind::Season, MutationKind::Update) => {
                entity_value(self.gateway.update_season(id, payload).await?)
            }
            (EntityKind::Season, MutationKind::ChangeStatus) => {
                entity_value(self.gateway.change_season_status(id, payload).await?)
            }
            (EntityKind::Season, MutationKind::Delete) => {
                self.gateway.delete_season(id).await.map(|_| None)
            }
            (EntityKind::Task, MutationKind::Create) => {
                entity_value(self.gateway.create_task(payload).await?)
            }
            (EntityKind::Task, MutationKind::Update) => {
                entity_value(self.gateway.update_task(id, payload).await?)
            }
            (EntityKind::Task, MutationKind::ChangeStatus) => {
                entity_value(self.gateway.change_task_status(id, payload).await?)
            }
            (EntityKind::Task, MutationKind::Delete) => {
                self.gateway.delete_task(id).await.map(|_| None)
            }
            (EntityKind::Incident, MutationKind::Create) => {
                entity_value(self.gateway.create_incident(payload).await?)
            }
            (EntityKind::Incident, MutationKind::Update) => {
                entity_value(self.gateway.update_incident(id, payload).await?)
            }
            (EntityKind::Incident, MutationKind::ChangeStatus) => {
                entity_value(self.gateway.change_incident_status(id, payload).await?)
            }
            (EntityKind::Incident, MutationKind::Delete) => {
                self.gateway.delete_incident(id).await.map(|_| None)
            }
        }
    }

    fn settle_success(&self, intent_id: Uuid, authoritative: Option<Value>) {
        let record = {
            let mut intents = self.intents.lock().expect("intent arena lock");
            intents.remove(&intent_id)
        };
        let Some(record) = record else {
            tracing::debug!(intent_id = %intent_id, "settle for unknown intent; already settled");
            return;
        };

        // server-computed fields (assigned id, status, timestamps) cannot be
        // guessed client-side; the authoritative entity replaces the detail
        // view and the list scopes re-fetch
        if let Some(entity) = &authoritative {
            if let Some(id) = entity_id(entity) {
                self.cache
                    .store(QueryKey::detail(record.kind, id), entity.clone());
            }
        }
        if record.action == MutationKind::Delete {
            if let Some(id) = record.target {
                self.cache.remove(&QueryKey::detail(record.kind, id));
            }
        }
        for prefix in &record.touched {
            if !matches!(prefix, KeyPrefix::Detail(_, _)) {
                self.cache.mark_stale_matching(prefix);
            }
        }
        tracing::debug!(
            intent_id = %intent_id,
            seq = record.seq,
            entity = record.kind.as_str(),
            action = record.action.as_str(),
            elapsed_ms = (Utc::now() - record.dispatched_at).num_milliseconds(),
            "mutation settled"
        );
    }

    fn settle_failure(&self, intent_id: Uuid, error: &ApiError) {
        let record = {
            let mut intents = self.intents.lock().expect("intent arena lock");
            intents.remove(&intent_id)
        };
        let Some(record) = record else {
            tracing::debug!(intent_id = %intent_id, "failure for unknown intent; already settled");
            return;
        };

        self.cache.restore(&record.snapshots);
        // a restored snapshot may predate a newer intent's state; staling the
        // touched views makes the next read re-fetch server truth
        for prefix in &record.touched {
            self.cache.mark_stale_matching(prefix);
        }
        tracing::warn!(
            intent_id = %intent_id,
            seq = record.seq,
            entity = record.kind.as_str(),
            action = record.action.as_str(),
            error = %error,
            "mutation failed; views rolled back"
        );
    }

    fn build_placeholder(&self, kind: EntityKind, payload: &Value) -> Value {
        let temp_id = self.next_temp_id.fetch_sub(1, Ordering::SeqCst);
        let mut placeholder = if payload.is_object() {
            payload.clone()
        } else {
            json!({})
        };
        placeholder["id"] = json!(temp_id);
        placeholder["status"] = json!(initial_status(kind));
        placeholder["createdAt"] = json!(Utc::now());
        placeholder
    }
}

// Placeholder status for optimistic creates; superseded by the authoritative
// response as soon as the server answers.
fn initial_status(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Season => "PLANNED",
        EntityKind::Task => "PENDING",
        EntityKind::Incident => "OPEN",
    }
}

fn entity_value<T: serde::Serialize>(entity: T) -> ApiResult<Option<Value>> {
    serde_json::to_value(entity).map(Some).map_err(ApiError::from)
}

fn entity_id(value: &Value) -> Option<i64> {
    value.get("id").and_then(Value::as_i64)
}

fn prepend_item(view: &mut Value, item: &Value) {
    let Some(items) = view.get_mut("items").and_then(Value::as_array_mut) else {
        return;
    };
    items.insert(0, item.clone());
    if let Some(total) = view.get("totalElements").and_then(Value::as_u64) {
        view["totalElements"] = json!(total + 1);
    }
}

fn patch_entity(view: &mut Value, id: i64, patch: &Value) {
    if let Some(items) = view.get_mut("items").and_then(Value::as_array_mut) {
        for item in items {
            if entity_id(item) == Some(id) {
                merge_fields(item, patch);
            }
        }
        return;
    }
    if entity_id(view) == Some(id) {
        merge_fields(view, patch);
    }
}

fn merge_fields(entity: &mut Value, patch: &Value) {
    let Some(entity_map) = entity.as_object_mut() else {
        return;
    };
    let Some(patch_map) = patch.as_object() else {
        return;
    };
    for (field, value) in patch_map {
        entity_map.insert(field.clone(), value.clone());
    }
}

fn remove_item(view: &mut Value, id: i64) {
    let Some(items) = view.get_mut("items").and_then(Value::as_array_mut) else {
        return;
    };
    let before = items.len();
    items.retain(|item| entity_id(item) != Some(id));
    let removed = before - items.len();
    if removed > 0 {
        if let Some(total) = view.get("totalElements").and_then(Value::as_u64) {
            view["totalElements"] = json!(total.saturating_sub(removed as u64));
        }
    }
}
