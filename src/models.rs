use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeasonStatus {
    Planned,
    Active,
    Completed,
    Cancelled,
    Archived,
}

impl SeasonStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "PLANNED",
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Archived => "ARCHIVED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
    Overdue,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
            Self::Overdue => "OVERDUE",
            Self::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentStatus {
    Open,
    Investigating,
    Resolved,
    Dismissed,
}

impl IncidentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Investigating => "INVESTIGATING",
            Self::Resolved => "RESOLVED",
            Self::Dismissed => "DISMISSED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl IncidentSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub id: i64,
    pub plot_id: i64,
    pub name: String,
    pub crop_name: Option<String>,
    pub status: SeasonStatus,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub actual_start_date: Option<NaiveDate>,
    pub actual_end_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub season_id: Option<i64>,
    pub title: String,
    pub notes: Option<String>,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
    pub estimated_hours: Option<f64>,
    pub actual_start_date: Option<NaiveDate>,
    pub actual_end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: i64,
    pub season_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub severity: IncidentSeverity,
    pub status: IncidentStatus,
    pub occurred_on: NaiveDate,
    pub affected_area: Option<f64>,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn single(items: Vec<T>) -> Self {
        let count = items.len();
        Self {
            items,
            page: 0,
            size: count as u32,
            total_elements: count as u64,
            total_pages: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSeasonPayload {
    pub plot_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_name: Option<String>,
    pub start_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSeasonPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonStatusPayload {
    pub status: SeasonStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season_id: Option<i64>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusPayload {
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIncidentPayload {
    pub season_id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub severity: IncidentSeverity,
    pub occurred_on: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_area: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIncidentPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<IncidentSeverity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occurred_on: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_area: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentStatusPayload {
    pub status: IncidentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListSeasonFilters {
    pub status: Option<SeasonStatus>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl ListSeasonFilters {
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(status) = self.status {
            query.push(("status".to_string(), status.as_str().to_string()));
        }
        if let Some(search) = &self.search {
            query.push(("search".to_string(), search.clone()));
        }
        if let Some(page) = self.page {
            query.push(("page".to_string(), page.to_string()));
        }
        if let Some(size) = self.size {
            query.push(("size".to_string(), size.to_string()));
        }
        query
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListTaskFilters {
    pub status: Option<TaskStatus>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl ListTaskFilters {
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(status) = self.status {
            query.push(("status".to_string(), status.as_str().to_string()));
        }
        if let Some(search) = &self.search {
            query.push(("search".to_string(), search.clone()));
        }
        if let Some(page) = self.page {
            query.push(("page".to_string(), page.to_string()));
        }
        if let Some(size) = self.size {
            query.push(("size".to_string(), size.to_string()));
        }
        query
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListIncidentFilters {
    pub status: Option<IncidentStatus>,
    pub severity: Option<IncidentSeverity>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl ListIncidentFilters {
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(status) = self.status {
            query.push(("status".to_string(), status.as_str().to_string()));
        }
        if let Some(severity) = self.severity {
            query.push(("severity".to_string(), severity.as_str().to_string()));
        }
        if let Some(page) = self.page {
            query.push(("page".to_string(), page.to_string()));
        }
        if let Some(size) = self.size {
            query.push(("size".to_string(), size.to_string()));
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::{Page, Task, TaskStatus};

    #[test]
    fn task_round_trips_camel_case_wire_shape() {
        let raw = serde_json::json!({
            "id": 42,
            "seasonId": 5,
            "title": "Irrigate",
            "notes": null,
            "status": "IN_PROGRESS",
            "dueDate": "2025-04-01",
            "estimatedHours": 2.5,
            "actualStartDate": "2025-03-28",
            "actualEndDate": null,
            "createdAt": "2025-03-20T08:00:00Z"
        });
        let task: Task = serde_json::from_value(raw).expect("task decodes");
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.season_id, Some(5));
        let back = serde_json::to_value(&task).expect("task encodes");
        assert_eq!(back["status"], "IN_PROGRESS");
        assert_eq!(back["dueDate"], "2025-04-01");
    }

    #[test]
    fn unknown_status_value_is_rejected_not_defaulted() {
        let raw = serde_json::json!({
            "id": 1,
            "seasonId": null,
            "title": "x",
            "notes": null,
            "status": "PAUSED",
            "dueDate": null,
            "estimatedHours": null,
            "actualStartDate": null,
            "actualEndDate": null,
            "createdAt": "2025-03-20T08:00:00Z"
        });
        assert!(serde_json::from_value::<Task>(raw).is_err());
    }

    #[test]
    fn bare_array_adapts_to_single_full_page() {
        let page = Page::single(vec![1, 2, 3]);
        assert_eq!(page.page, 0);
        assert_eq!(page.size, 3);
        assert_eq!(page.total_elements, 3);
        assert_eq!(page.total_pages, 1);
    }
}
