//! Resource ownership lookups.

use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::PgPool;

use crate::db::scope::ScopedTable;

/// Answers "which tenant owns this resource". `None` means the resource
/// does not exist; callers treat that identically to foreign ownership so
/// nothing about existence leaks to an unauthorized actor.
#[async_trait]
pub trait OwnershipStore: Send + Sync {
    async fn owner_tenant(
        &self,
        table: ScopedTable,
        resource_id: &str,
        key_column: Option<&str>,
    ) -> Result<Option<String>, AppError>;
}

pub struct PgOwnershipStore {
    pool: PgPool,
}

impl PgOwnershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OwnershipStore for PgOwnershipStore {
    async fn owner_tenant(
        &self,
        table: ScopedTable,
        resource_id: &str,
        key_column: Option<&str>,
    ) -> Result<Option<String>, AppError> {
        let key_column = key_column.unwrap_or_else(|| table.default_key_column());
        if !table.allowed_columns().contains(&key_column) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Column '{}' is not a key column on table '{}'",
                key_column,
                table.as_str()
            )));
        }

        // Table and column both come from closed sets checked above.
        let owner = sqlx::query_scalar::<_, String>(&format!(
            "SELECT tenant_id FROM {} WHERE {} = $1",
            table.as_str(),
            key_column
        ))
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(owner)
    }
}

/// In-memory ownership map for tests, keyed by (table, resource id).
#[derive(Default)]
pub struct InMemoryOwnershipStore {
    rows: std::sync::Mutex<std::collections::HashMap<(ScopedTable, String), String>>,
}

impl InMemoryOwnershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(
        self,
        table: ScopedTable,
        resource_id: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        self.rows
            .lock()
            .unwrap()
            .insert((table, resource_id.into()), tenant_id.into());
        self
    }
}

#[async_trait]
impl OwnershipStore for InMemoryOwnershipStore {
    async fn owner_tenant(
        &self,
        table: ScopedTable,
        resource_id: &str,
        _key_column: Option<&str>,
    ) -> Result<Option<String>, AppError> {
        let rows = self
            .rows
            .lock()
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("Mutex poisoned: {}", e)))?;
        Ok(rows.get(&(table, resource_id.to_string())).cloned())
    }
}
