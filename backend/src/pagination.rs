//! Pagination and list query parameters for the workflow API

use gestor_shared::{BusinessModule, EntityType, JobStatus, LogEvent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflows::store::{JobFilter, LogFilter, WorkflowFilter};

/// Default page size if not specified
pub const DEFAULT_PAGE_SIZE: i64 = 25;
/// Maximum allowed page size
pub const MAX_PAGE_SIZE: i64 = 100;
/// Default page number (1-indexed for API consumers)
pub const DEFAULT_PAGE: i64 = 1;

/// Standard pagination query parameters
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationParams {
    /// Page number (1-indexed)
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

fn default_page() -> i64 {
    DEFAULT_PAGE
}

fn default_per_page() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl PaginationParams {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self { page, per_page }
    }

    /// Get SQL OFFSET value
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.limit()
    }

    /// Get SQL LIMIT value
    pub fn limit(&self) -> i64 {
        self.per_page.clamp(1, MAX_PAGE_SIZE)
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE, DEFAULT_PAGE_SIZE)
    }
}

/// Pagination metadata returned with list responses
#[derive(Debug, Clone, Serialize)]
pub struct PaginationMeta {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationMeta {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        let total_pages = (total + per_page - 1) / per_page;
        Self {
            page,
            per_page,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

/// Standard paginated response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub meta: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, params: &PaginationParams, total: i64) -> Self {
        Self {
            data,
            meta: PaginationMeta::new(params.page.max(1), params.limit(), total),
        }
    }
}

/// `GET /workflows` filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowListParams {
    pub module: Option<BusinessModule>,
    pub entity_type: Option<EntityType>,
    pub is_active: Option<bool>,
}

impl WorkflowListParams {
    pub fn filter(&self) -> WorkflowFilter {
        WorkflowFilter {
            module: self.module,
            entity_type: self.entity_type,
            is_active: self.is_active,
        }
    }
}

/// `GET /workflow-jobs` filters. Pagination fields are inline because
/// flattened structs lose numeric parsing in query strings.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduledJobListParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
    pub status: Option<JobStatus>,
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<Uuid>,
    pub trigger_id: Option<Uuid>,
}

impl ScheduledJobListParams {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }

    pub fn filter(&self) -> JobFilter {
        JobFilter {
            status: self.status,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            trigger_id: self.trigger_id,
        }
    }
}

/// `GET /workflow-logs` filters
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionLogListParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
    pub workflow_id: Option<Uuid>,
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<Uuid>,
    pub event: Option<LogEvent>,
}

impl ExecutionLogListParams {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }

    pub fn filter(&self) -> LogFilter {
        LogFilter {
            workflow_id: self.workflow_id,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            event: self.event,
        }
    }
}
