//! User-to-tenant directory.

use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::PgPool;

use crate::models::{Principal, Tenant};

/// Outcome of a tenant lookup. An orphaned user (known, but no tenant
/// assignment yet) is a valid state and is distinguished from an unknown
/// user internally; neither may pass the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantAssignment {
    Member(String),
    Orphaned,
    UnknownUser,
}

/// Read side of the user-to-tenant mapping, plus the out-of-band
/// provisioning inlet the identity-provider webhook feeds. Request-path
/// code only ever calls `tenant_for`.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn tenant_for(&self, user_id: &str) -> Result<TenantAssignment, AppError>;

    /// Record or clear a user's tenant assignment (provisioning only).
    async fn record_assignment(
        &self,
        user_id: &str,
        tenant_id: Option<&str>,
    ) -> Result<(), AppError>;

    /// Register a tenant (provisioning only).
    async fn record_tenant(&self, tenant: &Tenant) -> Result<(), AppError>;
}

pub struct PgTenantDirectory {
    pool: PgPool,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn tenant_for(&self, user_id: &str) -> Result<TenantAssignment, AppError> {
        let principal = sqlx::query_as::<_, Principal>(
            "SELECT user_id, tenant_id, created_utc FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match principal {
            Some(p) => match p.tenant_id {
                Some(tenant_id) => TenantAssignment::Member(tenant_id),
                None => TenantAssignment::Orphaned,
            },
            None => TenantAssignment::UnknownUser,
        })
    }

    async fn record_assignment(
        &self,
        user_id: &str,
        tenant_id: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO users (user_id, tenant_id) VALUES ($1, $2) \
             ON CONFLICT (user_id) DO UPDATE SET tenant_id = EXCLUDED.tenant_id",
        )
        .bind(user_id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_tenant(&self, tenant: &Tenant) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO tenants (tenant_id, tenant_slug, tenant_label, created_utc) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (tenant_id) DO NOTHING",
        )
        .bind(&tenant.tenant_id)
        .bind(&tenant.tenant_slug)
        .bind(&tenant.tenant_label)
        .bind(tenant.created_utc)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// In-memory directory for tests.
#[derive(Default)]
pub struct InMemoryTenantDirectory {
    users: std::sync::Mutex<std::collections::HashMap<String, Option<String>>>,
    tenants: std::sync::Mutex<Vec<Tenant>>,
}

impl InMemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(self, user_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        self.users
            .lock()
            .unwrap()
            .insert(user_id.into(), Some(tenant_id.into()));
        self
    }

    pub fn with_orphan(self, user_id: impl Into<String>) -> Self {
        self.users.lock().unwrap().insert(user_id.into(), None);
        self
    }

    pub fn tenants(&self) -> Vec<Tenant> {
        self.tenants.lock().unwrap().clone()
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn tenant_for(&self, user_id: &str) -> Result<TenantAssignment, AppError> {
        let users = self
            .users
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mutex poisoned: {}", e)))?;
        Ok(match users.get(user_id) {
            Some(Some(tenant_id)) => TenantAssignment::Member(tenant_id.clone()),
            Some(None) => TenantAssignment::Orphaned,
            None => TenantAssignment::UnknownUser,
        })
    }

    async fn record_assignment(
        &self,
        user_id: &str,
        tenant_id: Option<&str>,
    ) -> Result<(), AppError> {
        self.users
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mutex poisoned: {}", e)))?
            .insert(user_id.to_string(), tenant_id.map(|t| t.to_string()));
        Ok(())
    }

    async fn record_tenant(&self, tenant: &Tenant) -> Result<(), AppError> {
        self.tenants
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mutex poisoned: {}", e)))?
            .push(tenant.clone());
        Ok(())
    }
}
