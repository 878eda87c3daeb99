//! Tenant entity - the isolation boundary. Every resource row belongs to
//! exactly one tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub tenant_id: String,
    pub tenant_slug: String,
    pub tenant_label: String,
    pub created_utc: DateTime<Utc>,
}

impl Tenant {
    /// Create a tenant record from provider-supplied identifiers. The
    /// tenant id is the provider's organization id, kept opaque.
    pub fn new(
        tenant_id: impl Into<String>,
        tenant_slug: impl Into<String>,
        tenant_label: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            tenant_slug: tenant_slug.into(),
            tenant_label: tenant_label.into(),
            created_utc: Utc::now(),
        }
    }
}
