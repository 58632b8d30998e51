use crate::models::{Incident, IncidentStatus, Season, SeasonStatus, Task, TaskStatus};
use chrono::{NaiveDate, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskBadge {
    Pending,
    InProgress,
    Done,
    Overdue,
    Cancelled,
}

impl TaskBadge {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In progress",
            Self::Done => "Done",
            Self::Overdue => "Overdue",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn tone(self) -> &'static str {
        match self {
            Self::Pending => "neutral",
            Self::InProgress => "info",
            Self::Done => "success",
            Self::Overdue => "danger",
            Self::Cancelled => "muted",
        }
    }
}

pub fn task_badge(task: &Task, today: NaiveDate) -> TaskBadge {
    match task.status {
        TaskStatus::Pending | TaskStatus::InProgress => {
            if task.due_date.is_some_and(|due| due < today) {
                TaskBadge::Overdue
            } else if task.status == TaskStatus::Pending {
                TaskBadge::Pending
            } else {
                TaskBadge::InProgress
            }
        }
        TaskStatus::Done => TaskBadge::Done,
        TaskStatus::Overdue => TaskBadge::Overdue,
        TaskStatus::Cancelled => TaskBadge::Cancelled,
    }
}

pub fn task_badge_now(task: &Task) -> TaskBadge {
    task_badge(task, Utc::now().date_naive())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonBadge {
    Planned,
    Active,
    Completed,
    Cancelled,
    Archived,
}

impl SeasonBadge {
    pub fn label(self) -> &'static str {
        match self {
            Self::Planned => "Planned",
            Self::Active => "Active",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
            Self::Archived => "Archived",
        }
    }

    pub fn tone(self) -> &'static str {
        match self {
            Self::Planned => "neutral",
            Self::Active => "info",
            Self::Completed => "success",
            Self::Cancelled => "muted",
            Self::Archived => "muted",
        }
    }
}

pub fn season_badge(season: &Season) -> SeasonBadge {
    match season.status {
        SeasonStatus::Planned => SeasonBadge::Planned,
        SeasonStatus::Active => SeasonBadge::Active,
        SeasonStatus::Completed => SeasonBadge::Completed,
        SeasonStatus::Cancelled => SeasonBadge::Cancelled,
        SeasonStatus::Archived => SeasonBadge::Archived,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidentBadge {
    Open,
    Investigating,
    Resolved,
    Dismissed,
}

impl IncidentBadge {
    pub fn label(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Investigating => "Investigating",
            Self::Resolved => "Resolved",
            Self::Dismissed => "Dismissed",
        }
    }

    pub fn tone(self) -> &'static str {
        match self {
            Self::Open => "danger",
            Self::Investigating => "info",
            Self::Resolved => "success",
            Self::Dismissed => "muted",
        }
    }
}

pub fn incident_badge(incident: &Incident) -> IncidentBadge {
    match incident.status {
        IncidentStatus::Open => IncidentBadge::Open,
        IncidentStatus::Investigating => IncidentBadge::Investigating,
        IncidentStatus::Resolved => IncidentBadge::Resolved,
        IncidentStatus::Dismissed => IncidentBadge::Dismissed,
    }
}
