//! Tenant scoping for the data layer.
//!
//! Reads against tenant-owned tables go through [`ScopedQuery`], which owns
//! the underlying query builder and applies the tenant predicate before any
//! caller-supplied filter. The builder is never handed out, so a handler
//! cannot construct an unscoped query against these tables. Writes go
//! through [`with_tenant_id`], which stomps whatever tenant the payload
//! claimed with the caller's resolved tenant.

use service_core::error::AppError;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

/// Closed set of tenant-owned tables. Table names never come from request
/// data; they come from this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopedTable {
    Dealerships,
    Reports,
}

impl ScopedTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopedTable::Dealerships => "dealerships",
            ScopedTable::Reports => "reports",
        }
    }

    /// Columns a caller may filter or key on, per table.
    pub fn allowed_columns(&self) -> &'static [&'static str] {
        match self {
            ScopedTable::Dealerships => &["id", "domain"],
            ScopedTable::Reports => &["id", "dealership_id"],
        }
    }

    pub fn default_key_column(&self) -> &'static str {
        "id"
    }
}

/// Query over a tenant-owned table with the tenant filter baked in at
/// construction.
pub struct ScopedQuery<'a> {
    builder: QueryBuilder<'a, Postgres>,
}

impl<'a> ScopedQuery<'a> {
    /// `SELECT * FROM <table> WHERE tenant_id = $1`
    pub fn select(table: ScopedTable, tenant_id: &'a str) -> Self {
        let mut builder = QueryBuilder::new(format!(
            "SELECT * FROM {} WHERE tenant_id = ",
            table.as_str()
        ));
        builder.push_bind(tenant_id);
        Self { builder }
    }

    /// Add an equality filter on one of the table's allowed columns.
    pub fn and_eq(
        mut self,
        table: ScopedTable,
        column: &str,
        value: &'a str,
    ) -> Result<Self, AppError> {
        if !table.allowed_columns().contains(&column) {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Column '{}' is not filterable on table '{}'",
                column,
                table.as_str()
            )));
        }
        self.builder.push(format!(" AND {} = ", column));
        self.builder.push_bind(value);
        Ok(self)
    }

    pub fn order_by_newest(mut self) -> Self {
        self.builder.push(" ORDER BY created_utc DESC");
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.builder.push(" LIMIT ");
        self.builder.push_bind(limit);
        self
    }

    pub async fn fetch_all<T>(mut self, pool: &PgPool) -> Result<Vec<T>, AppError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        Ok(self.builder.build_query_as::<T>().fetch_all(pool).await?)
    }

    pub async fn fetch_optional<T>(mut self, pool: &PgPool) -> Result<Option<T>, AppError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        Ok(self
            .builder
            .build_query_as::<T>()
            .fetch_optional(pool)
            .await?)
    }

    /// The SQL accumulated so far. Exposed for assertions, not execution.
    pub fn sql(&self) -> &str {
        self.builder.sql()
    }
}

/// A record carrying a tenant column.
pub trait TenantOwned {
    fn tenant_id(&self) -> &str;
    fn set_tenant_id(&mut self, tenant_id: &str);
}

/// Force the record's tenant to the caller's resolved tenant, discarding
/// any client-supplied value. Applied on every write path.
pub fn with_tenant_id<T: TenantOwned>(mut record: T, tenant_id: &str) -> T {
    record.set_tenant_id(tenant_id);
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateDealershipRequest, Dealership};

    #[test]
    fn select_is_tenant_filtered_before_anything_else() {
        let query = ScopedQuery::select(ScopedTable::Dealerships, "tenant-a-uuid");
        assert!(query
            .sql()
            .starts_with("SELECT * FROM dealerships WHERE tenant_id = "));
    }

    #[test]
    fn and_eq_appends_after_tenant_filter() {
        let query = ScopedQuery::select(ScopedTable::Reports, "tenant-a-uuid")
            .and_eq(ScopedTable::Reports, "dealership_id", "d-1")
            .unwrap();
        let sql = query.sql();
        let tenant_pos = sql.find("tenant_id =").unwrap();
        let filter_pos = sql.find("dealership_id =").unwrap();
        assert!(tenant_pos < filter_pos);
    }

    #[test]
    fn and_eq_rejects_unknown_columns() {
        let result = ScopedQuery::select(ScopedTable::Dealerships, "tenant-a-uuid").and_eq(
            ScopedTable::Dealerships,
            "name; DROP TABLE dealerships",
            "x",
        );
        assert!(result.is_err());
    }

    #[test]
    fn with_tenant_id_discards_client_supplied_tenant() {
        let record = Dealership::from_request(CreateDealershipRequest {
            name: "Sunset Motors".to_string(),
            domain: "sunsetmotors.example".to_string(),
            tenant_id: Some("B".to_string()),
        });
        let record = with_tenant_id(record, "A");
        assert_eq!(record.tenant_id, "A");
    }

    #[test]
    fn with_tenant_id_fills_missing_tenant() {
        let record = Dealership::from_request(CreateDealershipRequest {
            name: "Sunset Motors".to_string(),
            domain: "sunsetmotors.example".to_string(),
            tenant_id: None,
        });
        let record = with_tenant_id(record, "tenant-a-uuid");
        assert_eq!(record.tenant_id, "tenant-a-uuid");
    }
}
