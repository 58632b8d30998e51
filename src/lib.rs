pub mod cache;
pub mod client;
pub mod config;
pub mod contract;
pub mod coordinator;
pub mod errors;
pub mod gateway;
pub mod keys;
pub mod models;
pub mod projection;
pub mod transport;

pub use cache::{CacheStore, Lookup, ViewSnapshot};
pub use client::FarmdeckClient;
pub use config::ClientConfig;
pub use coordinator::{MutationCoordinator, MutationHandle, MutationKind};
pub use errors::{ApiError, ApiResult, FieldError, ValidationFailure};
pub use gateway::Gateway;
pub use keys::{EntityKind, KeyPrefix, QueryKey, Scope, View};
pub use models::{
    CreateIncidentPayload, CreateSeasonPayload, CreateTaskPayload, Incident, IncidentSeverity,
    IncidentStatus, IncidentStatusPayload, ListIncidentFilters, ListSeasonFilters, ListTaskFilters,
    Page, Season, SeasonStatus, SeasonStatusPayload, Task, TaskStatus, TaskStatusPayload,
    UpdateIncidentPayload, UpdateSeasonPayload, UpdateTaskPayload,
};
pub use transport::{HttpResponse, Method, Transport, TransportError, TransportFuture};

pub fn init_tracing() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|error| error.to_string())
}
