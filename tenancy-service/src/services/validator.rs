//! Access validation for single-resource operations.

use std::sync::Arc;

use metrics::counter;
use serde_json::json;
use service_core::error::AppError;

use crate::db::scope::ScopedTable;
use crate::models::ViolationRecord;
use crate::services::{AuditLogger, OwnershipStore, TenantAssignment, TenantDirectory};

/// The yes/no answer handed to callers. Why a denial happened is never
/// part of this value; all denial paths look identical from outside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub tenant_id: Option<String>,
}

impl AccessDecision {
    fn allowed(tenant_id: String) -> Self {
        Self {
            allowed: true,
            tenant_id: Some(tenant_id),
        }
    }

    fn denied() -> Self {
        Self {
            allowed: false,
            tenant_id: None,
        }
    }
}

/// Internal denial classification, used for audit and metrics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DenialReason {
    NoTenant,
    NotFoundOrForeign,
    CrossTenant,
}

impl DenialReason {
    fn as_str(&self) -> &'static str {
        match self {
            DenialReason::NoTenant => "no-tenant",
            DenialReason::NotFoundOrForeign => "not-found-or-foreign",
            DenialReason::CrossTenant => "cross-tenant",
        }
    }
}

/// Composes the tenant directory and the ownership store into an
/// allow/deny decision for a (user, resource) pair.
#[derive(Clone)]
pub struct AccessValidator {
    directory: Arc<dyn TenantDirectory>,
    ownership: Arc<dyn OwnershipStore>,
    audit: AuditLogger,
}

impl AccessValidator {
    pub fn new(
        directory: Arc<dyn TenantDirectory>,
        ownership: Arc<dyn OwnershipStore>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            directory,
            ownership,
            audit,
        }
    }

    /// Decide whether `user_id` may touch `table/resource_id`.
    ///
    /// A missing resource and a foreign-tenant resource deny identically;
    /// the caller cannot tell which case occurred. Store errors propagate
    /// rather than degrade into an allow.
    pub async fn validate_access(
        &self,
        user_id: &str,
        table: ScopedTable,
        resource_id: &str,
        key_column: Option<&str>,
    ) -> Result<AccessDecision, AppError> {
        let acting_tenant = match self.directory.tenant_for(user_id).await? {
            TenantAssignment::Member(tenant_id) => tenant_id,
            TenantAssignment::Orphaned | TenantAssignment::UnknownUser => {
                return Ok(self.deny(DenialReason::NoTenant));
            }
        };

        let owning_tenant = match self
            .ownership
            .owner_tenant(table, resource_id, key_column)
            .await?
        {
            Some(tenant_id) => tenant_id,
            None => return Ok(self.deny(DenialReason::NotFoundOrForeign)),
        };

        if owning_tenant == acting_tenant {
            return Ok(AccessDecision::allowed(acting_tenant));
        }

        self.audit.record_violation(ViolationRecord::new(
            user_id,
            Some(acting_tenant),
            format!("{}/{}", table.as_str(), resource_id),
            owning_tenant,
            Some(json!({ "key_column": key_column.unwrap_or_else(|| table.default_key_column()) })),
        ));

        Ok(self.deny(DenialReason::CrossTenant))
    }

    fn deny(&self, reason: DenialReason) -> AccessDecision {
        counter!(
            "tenant_isolation_denials_total",
            &[("reason", reason.as_str().to_string())]
        )
        .increment(1);
        AccessDecision::denied()
    }
}
