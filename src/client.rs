use crate::cache::{CacheStore, Lookup};
use crate::config::ClientConfig;
use crate::contract;
use crate::coordinator::{MutationCoordinator, MutationHandle};
use crate::errors::{ApiError, ApiResult};
use crate::gateway::Gateway;
use crate::keys::{EntityKind, KeyPrefix, QueryKey};
use crate::models::{
    CreateIncidentPayload, CreateSeasonPayload, CreateTaskPayload, Incident, IncidentStatusPayload,
    ListIncidentFilters, ListSeasonFilters, ListTaskFilters, Page, Season, SeasonStatusPayload,
    Task, TaskStatusPayload, UpdateIncidentPayload, UpdateSeasonPayload, UpdateTaskPayload,
};
use crate::transport::Transport;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub struct FarmdeckClient {
    cache: Arc<CacheStore>,
    gateway: Arc<Gateway>,
    coordinator: Arc<MutationCoordinator>,
    config: ClientConfig,
}

impl FarmdeckClient {
    pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> ApiResult<Self> {
        config.validate()?;
        let cache = Arc::new(CacheStore::new(
            config.staleness_window,
            config.eviction_window,
        ));
        let gateway = Arc::new(Gateway::new(transport, config.base_path.clone()));
        let coordinator = Arc::new(MutationCoordinator::new(
            Arc::clone(&cache),
            Arc::clone(&gateway),
        ));
        Ok(Self {
            cache,
            gateway,
            coordinator,
            config,
        })
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn invalidate(&self, prefix: &KeyPrefix) -> usize {
        self.cache.mark_stale_matching(prefix)
    }

    pub fn spawn_maintenance(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                cache.evict_idle();
            }
        })
    }

    pub async fn list_seasons(&self, filters: &ListSeasonFilters) -> ApiResult<Page<Season>> {
        let mut filters = filters.clone();
        filters.size.get_or_insert(self.config.default_page_size);
        let key = QueryKey::workspace_list(EntityKind::Season, &filters.to_query());
        self.read_through(key, || self.gateway.list_seasons(&filters))
            .await
    }

    pub async fn seasons_for_plot(
        &self,
        plot_id: i64,
        filters: &ListSeasonFilters,
    ) -> ApiResult<Page<Season>> {
        let mut filters = filters.clone();
        filters.size.get_or_insert(self.config.default_page_size);
        let key = QueryKey::parent_list(EntityKind::Season, plot_id, &filters.to_query());
        self.read_through(key, || self.gateway.seasons_for_plot(plot_id, &filters))
            .await
    }

    pub async fn get_season(&self, id: i64) -> ApiResult<Season> {
        let key = QueryKey::detail(EntityKind::Season, id);
        self.read_through(key, || self.gateway.get_season(id)).await
    }

    pub fn create_season(&self, payload: &CreateSeasonPayload) -> ApiResult<MutationHandle> {
        let validated = contract::validate_season_create(&serde_json::to_value(payload)?)?;
        let parent = Some(validated.plot_id);
        Ok(self.coordinator.dispatch_create(
            EntityKind::Season,
            parent,
            serde_json::to_value(&validated)?,
        ))
    }

    pub fn update_season(&self, id: i64, payload: &UpdateSeasonPayload) -> ApiResult<MutationHandle> {
        let validated = contract::validate_season_update(&serde_json::to_value(payload)?)?;
        Ok(self.coordinator.dispatch_update(
            EntityKind::Season,
            id,
            serde_json::to_value(&validated)?,
        ))
    }

    pub fn change_season_status(
        &self,
        id: i64,
        payload: &SeasonStatusPayload,
    ) -> ApiResult<MutationHandle> {
        let validated = contract::validate_season_status(&serde_json::to_value(payload)?)?;
        Ok(self.coordinator.dispatch_change_status(
            EntityKind::Season,
            id,
            serde_json::to_value(&validated)?,
        ))
    }

    pub fn remove_season(&self, id: i64) -> MutationHandle {
        self.coordinator.dispatch_remove(EntityKind::Season, id)
    }

    pub async fn list_tasks(&self, filters: &ListTaskFilters) -> ApiResult<Page<Task>> {
        let mut filters = filters.clone();
        filters.size.get_or_insert(self.config.default_page_size);
        let key = QueryKey::workspace_list(EntityKind::Task, &filters.to_query());
        self.read_through(key, || self.gateway.list_tasks(&filters))
            .await
    }

    pub async fn tasks_for_season(
        &self,
        season_id: i64,
        filters: &ListTaskFilters,
    ) -> ApiResult<Page<Task>> {
        let mut filters = filters.clone();
        filters.size.get_or_insert(self.config.default_page_size);
        let key = QueryKey::parent_list(EntityKind::Task, season_id, &filters.to_query());
        self.read_through(key, || self.gateway.tasks_for_season(season_id, &filters))
            .await
    }

    pub async fn get_task(&self, id: i64) -> ApiResult<Task> {
        let key = QueryKey::detail(EntityKind::Task, id);
        self.read_through(key, || self.gateway.get_task(id)).await
    }

    pub fn create_task(&self, payload: &CreateTaskPayload) -> ApiResult<MutationHandle> {
        let validated = contract::validate_task_create(&serde_json::to_value(payload)?)?;
        let parent = validated.season_id;
        Ok(self.coordinator.dispatch_create(
            EntityKind::Task,
            parent,
            serde_json::to_value(&validated)?,
        ))
    }

    pub fn update_task(&self, id: i64, payload: &UpdateTaskPayload) -> ApiResult<MutationHandle> {
        let validated = contract::validate_task_update(&serde_json::to_value(payload)?)?;
        Ok(self.coordinator.dispatch_update(
            EntityKind::Task,
            id,
            serde_json::to_value(&validated)?,
        ))
    }

    pub fn change_task_status(
        &self,
        id: i64,
        payload: &TaskStatusPayload,
    ) -> ApiResult<MutationHandle> {
        let validated = contract::validate_task_status(&serde_json::to_value(payload)?)?;
        Ok(self.coordinator.dispatch_change_status(
            EntityKind::Task,
            id,
            serde_json::to_value(&validated)?,
        ))
    }

    pub fn remove_task(&self, id: i64) -> MutationHandle {
        self.coordinator.dispatch_remove(EntityKind::Task, id)
    }

    pub async fn list_incidents(&self, filters: &ListIncidentFilters) -> ApiResult<Page<Incident>> {
        let mut filters = filters.clone();
        filters.size.get_or_insert(self.config.default_page_size);
        let key = QueryKey::workspace_list(EntityKind::Incident, &filters.to_query());
        self.read_through(key, || self.gateway.list_incidents(&filters))
            .await
    }

    pub async fn incidents_for_season(
        &self,
        season_id: i64,
        filters: &ListIncidentFilters,
    ) -> ApiResult<Page<Incident>> {
        let mut filters = filters.clone();
        filters.size.get_or_insert(self.config.default_page_size);
        let key = QueryKey::parent_list(EntityKind::Incident, season_id, &filters.to_query());
        self.read_through(key, || {
            self.gateway.incidents_for_season(season_id, &filters)
        })
        .await
    }

    pub async fn get_incident(&self, id: i64) -> ApiResult<Incident> {
        let key = QueryKey::detail(EntityKind::Incident, id);
        self.read_through(key, || self.gateway.get_incident(id)).await
    }

    pub fn create_incident(&self, payload: &CreateIncidentPayload) -> ApiResult<MutationHandle> {
        let validated = contract::validate_incident_create(&serde_json::to_value(payload)?)?;
        let parent = Some(validated.season_id);
        Ok(self.coordinator.dispatch_create(
            EntityKind::Incident,
            parent,
            serde_json::to_value(&validated)?,
        ))
    }

    pub fn update_incident(
        &self,
        id: i64,
        payload: &UpdateIncidentPayload,
    ) -> ApiResult<MutationHandle> {
        let validated = contract::validate_incident_update(&serde_json::to_value(payload)?)?;
        Ok(self.coordinator.dispatch_update(
            EntityKind::Incident,
            id,
            serde_json::to_value(&validated)?,
        ))
    }

    pub fn change_incident_status(
        &self,
        id: i64,
        payload: &IncidentStatusPayload,
    ) -> ApiResult<MutationHandle> {
        let validated = contract::validate_incident_status(&serde_json::to_value(payload)?)?;
        Ok(self.coordinator.dispatch_change_status(
            EntityKind::Incident,
            id,
            serde_json::to_value(&validated)?,
        ))
    }

    pub fn remove_incident(&self, id: i64) -> MutationHandle {
        self.coordinator.dispatch_remove(EntityKind::Incident, id)
    }

    async fn read_through<T, F, Fut>(&self, key: QueryKey, fetch: F) -> ApiResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        if let Lookup::Fresh(value) = self.cache.lookup(&key) {
            return serde_json::from_value(value).map_err(ApiError::from);
        }
        let fetched = fetch().await?;
        self.cache.store(key, serde_json::to_value(&fetched)?);
        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::FarmdeckClient;
    use crate::config::ClientConfig;
    use crate::errors::ApiError;
    use crate::keys::{EntityKind, KeyPrefix};
    use crate::models::{CreateTaskPayload, ListTaskFilters};
    use crate::transport::{HttpResponse, Method, Transport, TransportError, TransportFuture};
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        request_count: Mutex<usize>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<HttpResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                request_count: Mutex::new(0),
            })
        }

        fn requests(&self) -> usize {
            *self.request_count.lock().expect("request count lock")
        }
    }

    impl Transport for ScriptedTransport {
        fn request(
            &self,
            _method: Method,
            _path: &str,
            _query: &[(String, String)],
            _body: Option<Value>,
        ) -> TransportFuture {
            *self.request_count.lock().expect("request count lock") += 1;
            let next = self
                .responses
                .lock()
                .expect("responses lock")
                .pop_front()
                .unwrap_or_else(|| Err(TransportError("script exhausted".to_string())));
            Box::pin(async move { next })
        }
    }

    fn task_page() -> Value {
        json!({
            "items": [{
                "id": 1,
                "seasonId": null,
                "title": "Plough",
                "notes": null,
                "status": "PENDING",
                "dueDate": null,
                "estimatedHours": null,
                "actualStartDate": null,
                "actualEndDate": null,
                "createdAt": "2025-03-20T08:00:00Z"
            }],
            "page": 0,
            "size": 20,
            "totalElements": 1,
            "totalPages": 1
        })
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let transport = ScriptedTransport::new(vec![Ok(HttpResponse {
            status: 200,
            body: task_page(),
        })]);
        let client = FarmdeckClient::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            ClientConfig::default(),
        )
        .expect("valid config");

        let filters = ListTaskFilters::default();
        let first = client.list_tasks(&filters).await.expect("first read");
        let second = client.list_tasks(&filters).await.expect("second read");
        assert_eq!(first, second);
        assert_eq!(transport.requests(), 1);
    }

    #[tokio::test]
    async fn invalidation_forces_a_refetch() {
        let transport = ScriptedTransport::new(vec![
            Ok(HttpResponse {
                status: 200,
                body: task_page(),
            }),
            Ok(HttpResponse {
                status: 200,
                body: task_page(),
            }),
        ]);
        let client = FarmdeckClient::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            ClientConfig::default(),
        )
        .expect("valid config");

        let filters = ListTaskFilters::default();
        client.list_tasks(&filters).await.expect("first read");
        assert_eq!(client.invalidate(&KeyPrefix::Lists(EntityKind::Task)), 1);
        client.list_tasks(&filters).await.expect("refetch");
        assert_eq!(transport.requests(), 2);
    }

    #[tokio::test]
    async fn invalid_create_payload_never_dispatches() {
        let transport = ScriptedTransport::new(vec![]);
        let client = FarmdeckClient::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            ClientConfig::default(),
        )
        .expect("valid config");

        let payload = CreateTaskPayload {
            season_id: None,
            title: String::new(),
            notes: None,
            due_date: None,
            estimated_hours: Some(-2.0),
        };
        let result = client.create_task(&payload);
        assert!(matches!(result, Err(ApiError::Validation(_))));
        assert_eq!(transport.requests(), 0);
        assert!(client.cache().is_empty());
    }
}
