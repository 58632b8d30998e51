use crate::contract;
use crate::errors::{ApiError, ApiResult};
use crate::models::{
    Incident, ListIncidentFilters, ListSeasonFilters, ListTaskFilters, Page, Season, Task,
};
use crate::transport::{HttpResponse, Method, Transport};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

pub struct Gateway {
    transport: Arc<dyn Transport>,
    base_path: String,
}

impl Gateway {
    pub fn new(transport: Arc<dyn Transport>, base_path: impl Into<String>) -> Self {
        Self {
            transport,
            base_path: base_path.into(),
        }
    }

    pub async fn list_seasons(&self, filters: &ListSeasonFilters) -> ApiResult<Page<Season>> {
        self.fetch_page(format!("{}/seasons", self.base_path), filters.to_query())
            .await
    }

    pub async fn seasons_for_plot(
        &self,
        plot_id: i64,
        filters: &ListSeasonFilters,
    ) -> ApiResult<Page<Season>> {
        self.fetch_page(
            format!("{}/plots/{}/seasons", self.base_path, plot_id),
            filters.to_query(),
        )
        .await
    }

    pub async fn get_season(&self, id: i64) -> ApiResult<Season> {
        self.fetch_resource(Method::Get, format!("{}/seasons/{}", self.base_path, id), None)
            .await
    }

    pub async fn create_season(&self, payload: &Value) -> ApiResult<Season> {
        let validated = contract::validate_season_create(payload)?;
        self.fetch_resource(
            Method::Post,
            format!("{}/seasons", self.base_path),
            Some(serde_json::to_value(&validated)?),
        )
        .await
    }

    pub async fn update_season(&self, id: i64, payload: &Value) -> ApiResult<Season> {
        let validated = contract::validate_season_update(payload)?;
        self.fetch_resource(
            Method::Patch,
            format!("{}/seasons/{}", self.base_path, id),
            Some(serde_json::to_value(&validated)?),
        )
        .await
    }

    pub async fn change_season_status(&self, id: i64, payload: &Value) -> ApiResult<Season> {
        let validated = contract::validate_season_status(payload)?;
        self.fetch_resource(
            Method::Put,
            format!("{}/seasons/{}/status", self.base_path, id),
            Some(serde_json::to_value(&validated)?),
        )
        .await
    }

    pub async fn delete_season(&self, id: i64) -> ApiResult<()> {
        self.delete(format!("{}/seasons/{}", self.base_path, id)).await
    }

    pub async fn list_tasks(&self, filters: &ListTaskFilters) -> ApiResult<Page<Task>> {
        self.fetch_page(format!("{}/tasks", self.base_path), filters.to_query())
            .await
    }

    pub async fn tasks_for_season(
        &self,
        season_id: i64,
        filters: &ListTaskFilters,
    ) -> ApiResult<Page<Task>> {
        self.fetch_page(
            format!("{}/seasons/{}/tasks", self.base_path, season_id),
            filters.to_query(),
        )
        .await
    }

    pub async fn get_task(&self, id: i64) -> ApiResult<Task> {
        self.fetch_resource(Method::Get, format!("{}/tasks/{}", self.base_path, id), None)
            .await
    }

    pub async fn create_task(&self, payload: &Value) -> ApiResult<Task> {
        let validated = contract::validate_task_create(payload)?;
        self.fetch_resource(
            Method::Post,
            format!("{}/tasks", self.base_path),
            Some(serde_json::to_value(&validated)?),
        )
        .await
    }

    pub async fn update_task(&self, id: i64, payload: &Value) -> ApiResult<Task> {
        let validated = contract::validate_task_update(payload)?;
        self.fetch_resource(
            Method::Patch,
            format!("{}/tasks/{}", self.base_path, id),
            Some(serde_json::to_value(&validated)?),
        )
        .await
    }

    pub async fn change_task_status(&self, id: i64, payload: &Value) -> ApiResult<Task> {
        let validated = contract::validate_task_status(payload)?;
        self.fetch_resource(
            Method::Put,
            format!("{}/tasks/{}/status", self.base_path, id),
            Some(serde_json::to_value(&validated)?),
        )
        .await
    }

    pub async fn delete_task(&self, id: i64) -> ApiResult<()> {
        self.delete(format!("{}/tasks/{}", self.base_path, id)).await
    }

    pub async fn list_incidents(&self, filters: &ListIncidentFilters) -> ApiResult<Page<Incident>> {
        self.fetch_page(format!("{}/incidents", self.base_path), filters.to_query())
            .await
    }

    pub async fn incidents_for_season(
        &self,
        season_id: i64,
        filters: &ListIncidentFilters,
    ) -> ApiResult<Page<Incident>> {
        self.fetch_page(
            format!("{}/seasons/{}/incidents", self.base_path, season_id),
            filters.to_query(),
        )
        .await
    }

    pub async fn get_incident(&self, id: i64) -> ApiResult<Incident> {
        self.fetch_resource(Method::Get, format!("{}/incidents/{}", self.base_path, id), None)
            .await
    }

    pub async fn create_incident(&self, payload: &Value) -> ApiResult<Incident> {
        let validated = contract::validate_incident_create(payload)?;
        self.fetch_resource(
            Method::Post,
            format!("{}/incidents", self.base_path),
            Some(serde_json::to_value(&validated)?),
        )
        .await
    }

    pub async fn update_incident(&self, id: i64, payload: &Value) -> ApiResult<Incident> {
        let validated = contract::validate_incident_update(payload)?;
        self.fetch_resource(
            Method::Patch,
            format!("{}/incidents/{}", self.base_path, id),
            Some(serde_json::to_value(&validated)?),
        )
        .await
    }

    pub async fn change_incident_status(&self, id: i64, payload: &Value) -> ApiResult<Incident> {
        let validated = contract::validate_incident_status(payload)?;
        self.fetch_resource(
            Method::Put,
            format!("{}/incidents/{}/status", self.base_path, id),
            Some(serde_json::to_value(&validated)?),
        )
        .await
    }

    pub async fn delete_incident(&self, id: i64) -> ApiResult<()> {
        self.delete(format!("{}/incidents/{}", self.base_path, id)).await
    }

    async fn fetch_page<T: DeserializeOwned>(
        &self,
        path: String,
        query: Vec<(String, String)>,
    ) -> ApiResult<Page<T>> {
        let response = self.send(Method::Get, &path, &query, None).await?;
        decode_page(&path, response.body)
    }

    async fn fetch_resource<T: DeserializeOwned>(
        &self,
        method: Method,
        path: String,
        body: Option<Value>,
    ) -> ApiResult<T> {
        let response = self.send(method, &path, &[], body).await?;
        decode_resource(response.body)
    }

    async fn delete(&self, path: String) -> ApiResult<()> {
        self.send(Method::Delete, &path, &[], None).await.map(|_| ())
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Value>,
    ) -> ApiResult<HttpResponse> {
        let response = self
            .transport
            .request(method, path, query, body)
            .await
            .map_err(|error| ApiError::Network(error.to_string()))?;
        if response.status >= 400 {
            let message = server_message(&response.body, response.status);
            return Err(ApiError::from_status(response.status, message));
        }
        Ok(response)
    }
}

fn server_message(body: &Value, status: u16) -> String {
    body.get("message")
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("request failed with status {}", status))
}

fn decode_resource<T: DeserializeOwned>(body: Value) -> ApiResult<T> {
    match body {
        Value::Object(mut map) => match map.remove("result") {
            Some(inner) => serde_json::from_value(inner).map_err(ApiError::from),
            None => Err(ApiError::Decode(
                "response missing 'result' envelope".to_string(),
            )),
        },
        _ => Err(ApiError::Decode(
            "response is not a single-resource envelope".to_string(),
        )),
    }
}

fn decode_page<T: DeserializeOwned>(path: &str, body: Value) -> ApiResult<Page<T>> {
    match body {
        // Some list endpoints still return a bare array instead of the
        // paginated envelope. Adapt it to a single full page rather than
        // failing the read.
        Value::Array(items) => {
            tracing::warn!(path = %path, count = items.len(), "bare array where a paginated envelope was expected; adapting");
            let items = items
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<Vec<T>, _>>()
                .map_err(ApiError::from)?;
            Ok(Page::single(items))
        }
        other => serde_json::from_value(other).map_err(ApiError::from),
    }
}
