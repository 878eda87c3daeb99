use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::scope::TenantOwned;

/// Analytics report entity, the second tenant-owned table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Report {
    pub id: String,
    pub tenant_id: String,
    pub dealership_id: String,
    pub title: String,
    pub created_utc: DateTime<Utc>,
}

impl TenantOwned for Report {
    fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    fn set_tenant_id(&mut self, tenant_id: &str) {
        self.tenant_id = tenant_id.to_string();
    }
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub id: String,
    pub dealership_id: String,
    pub title: String,
    pub created_utc: DateTime<Utc>,
}

impl From<Report> for ReportResponse {
    fn from(r: Report) -> Self {
        Self {
            id: r.id,
            dealership_id: r.dealership_id,
            title: r.title,
            created_utc: r.created_utc,
        }
    }
}
