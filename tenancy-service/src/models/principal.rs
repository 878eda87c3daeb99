//! Principal - an authenticated user as known to this subsystem.
//!
//! Created by the identity provider; the tenant assignment arrives
//! out-of-band (invitation, provisioning webhook) and is read-only on the
//! request path. A null `tenant_id` is the orphaned state, which is valid
//! and expected, not an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Principal {
    pub user_id: String,
    pub tenant_id: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl Principal {
    pub fn is_orphaned(&self) -> bool {
        self.tenant_id.is_none()
    }
}
