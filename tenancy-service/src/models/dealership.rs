use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::db::scope::TenantOwned;

/// Dealership entity. `tenant_id` is required and immutable after
/// creation; it is always set by the write guard, never by the client.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Dealership {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub domain: String,
    pub created_utc: DateTime<Utc>,
}

impl Dealership {
    pub fn from_request(req: CreateDealershipRequest) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            // Whatever the client claimed; the write guard overwrites it
            // with the caller's resolved tenant before any insert.
            tenant_id: req.tenant_id.unwrap_or_default(),
            name: req.name,
            domain: req.domain,
            created_utc: Utc::now(),
        }
    }
}

impl TenantOwned for Dealership {
    fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    fn set_tenant_id(&mut self, tenant_id: &str) {
        self.tenant_id = tenant_id.to_string();
    }
}

/// Create request. Clients sometimes send a `tenant_id` field; it is
/// deserialized so it can be discarded deliberately rather than silently.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDealershipRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1, max = 253))]
    pub domain: String,
    pub tenant_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DealershipResponse {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub domain: String,
    pub created_utc: DateTime<Utc>,
}

impl From<Dealership> for DealershipResponse {
    fn from(d: Dealership) -> Self {
        Self {
            id: d.id,
            tenant_id: d.tenant_id,
            name: d.name,
            domain: d.domain,
            created_utc: d.created_utc,
        }
    }
}
