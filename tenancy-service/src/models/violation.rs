//! Append-only record of a denied cross-tenant access attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationRecord {
    #[serde(rename = "_id")]
    pub id: String,
    /// User that made the attempt.
    pub actor_user_id: String,
    /// Tenant the actor belongs to, when resolved.
    pub actor_tenant_id: Option<String>,
    /// `table/resource_id` of the target.
    pub resource_path: String,
    /// Tenant that actually owns the target.
    pub attempted_tenant_id: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub occurred_at: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
}

impl ViolationRecord {
    pub fn new(
        actor_user_id: impl Into<String>,
        actor_tenant_id: Option<String>,
        resource_path: impl Into<String>,
        attempted_tenant_id: impl Into<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            actor_user_id: actor_user_id.into(),
            actor_tenant_id,
            resource_path: resource_path.into(),
            attempted_tenant_id: attempted_tenant_id.into(),
            occurred_at: Utc::now(),
            metadata,
        }
    }
}

/// API shape for forensic review; timestamps as RFC 3339 rather than the
/// storage encoding.
#[derive(Debug, Serialize)]
pub struct ViolationResponse {
    pub id: String,
    pub actor_user_id: String,
    pub actor_tenant_id: Option<String>,
    pub resource_path: String,
    pub attempted_tenant_id: String,
    pub occurred_at: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
}

impl From<ViolationRecord> for ViolationResponse {
    fn from(v: ViolationRecord) -> Self {
        Self {
            id: v.id,
            actor_user_id: v.actor_user_id,
            actor_tenant_id: v.actor_tenant_id,
            resource_path: v.resource_path,
            attempted_tenant_id: v.attempted_tenant_id,
            occurred_at: v.occurred_at,
            metadata: v.metadata,
        }
    }
}
