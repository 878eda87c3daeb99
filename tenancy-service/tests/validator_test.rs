//! Access validator properties over in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use tenancy_service::db::scope::ScopedTable;
use tenancy_service::services::{
    AccessValidator, AuditLogger, InMemoryOwnershipStore, InMemoryTenantDirectory, MemoryAuditSink,
};

struct Fixture {
    validator: AccessValidator,
    audit_sink: Arc<MemoryAuditSink>,
}

/// Two tenants, one resource each; alice belongs to tenant A, bob to
/// tenant B, casper to nothing.
fn fixture() -> Fixture {
    let directory = Arc::new(
        InMemoryTenantDirectory::new()
            .with_member("user-alice", "tenant-a-uuid")
            .with_member("user-bob", "tenant-b-uuid")
            .with_orphan("user-casper"),
    );
    let ownership = Arc::new(
        InMemoryOwnershipStore::new()
            .with_resource(ScopedTable::Dealerships, "resource-from-tenant-a", "tenant-a-uuid")
            .with_resource(ScopedTable::Dealerships, "resource-from-tenant-b", "tenant-b-uuid")
            .with_resource(ScopedTable::Reports, "report-a-1", "tenant-a-uuid"),
    );
    let audit_sink = Arc::new(MemoryAuditSink::new());
    let validator = AccessValidator::new(
        directory,
        ownership,
        AuditLogger::new(audit_sink.clone()),
    );
    Fixture {
        validator,
        audit_sink,
    }
}

/// Let the fire-and-forget audit append run.
async fn drain_audit() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn same_tenant_access_is_allowed() {
    let f = fixture();
    let decision = f
        .validator
        .validate_access("user-alice", ScopedTable::Dealerships, "resource-from-tenant-a", None)
        .await
        .unwrap();

    assert!(decision.allowed);
    assert_eq!(decision.tenant_id.as_deref(), Some("tenant-a-uuid"));
    drain_audit().await;
    assert!(f.audit_sink.records().is_empty());
}

#[tokio::test]
async fn cross_tenant_access_is_denied_and_audited() {
    let f = fixture();
    let decision = f
        .validator
        .validate_access("user-alice", ScopedTable::Dealerships, "resource-from-tenant-b", None)
        .await
        .unwrap();

    assert!(!decision.allowed);
    assert_eq!(decision.tenant_id, None);

    drain_audit().await;
    let records = f.audit_sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].actor_user_id, "user-alice");
    assert_eq!(records[0].actor_tenant_id.as_deref(), Some("tenant-a-uuid"));
    assert_eq!(records[0].resource_path, "dealerships/resource-from-tenant-b");
    assert_eq!(records[0].attempted_tenant_id, "tenant-b-uuid");
}

#[tokio::test]
async fn missing_resource_denies_without_audit() {
    let f = fixture();
    let decision = f
        .validator
        .validate_access("user-alice", ScopedTable::Dealerships, "no-such-resource", None)
        .await
        .unwrap();

    assert!(!decision.allowed);

    // A missing resource looks exactly like a foreign one to the caller,
    // but it is not a recorded violation.
    drain_audit().await;
    assert!(f.audit_sink.records().is_empty());
}

#[tokio::test]
async fn missing_and_foreign_resources_deny_identically() {
    let f = fixture();
    let missing = f
        .validator
        .validate_access("user-alice", ScopedTable::Dealerships, "no-such-resource", None)
        .await
        .unwrap();
    let foreign = f
        .validator
        .validate_access("user-alice", ScopedTable::Dealerships, "resource-from-tenant-b", None)
        .await
        .unwrap();

    assert_eq!(missing, foreign);
}

#[tokio::test]
async fn orphaned_user_is_denied_for_any_resource() {
    let f = fixture();
    for resource in ["resource-from-tenant-a", "resource-from-tenant-b"] {
        let decision = f
            .validator
            .validate_access("user-casper", ScopedTable::Dealerships, resource, None)
            .await
            .unwrap();
        assert!(!decision.allowed);
    }
    drain_audit().await;
    assert!(f.audit_sink.records().is_empty());
}

#[tokio::test]
async fn unknown_user_is_denied() {
    let f = fixture();
    let decision = f
        .validator
        .validate_access("user-nobody", ScopedTable::Dealerships, "resource-from-tenant-a", None)
        .await
        .unwrap();
    assert!(!decision.allowed);
}

#[tokio::test]
async fn decisions_are_idempotent_under_unchanged_ownership() {
    let f = fixture();
    for _ in 0..3 {
        let allowed = f
            .validator
            .validate_access("user-bob", ScopedTable::Dealerships, "resource-from-tenant-b", None)
            .await
            .unwrap();
        assert!(allowed.allowed);

        let denied = f
            .validator
            .validate_access("user-bob", ScopedTable::Reports, "report-a-1", None)
            .await
            .unwrap();
        assert!(!denied.allowed);
    }
}

#[tokio::test]
async fn each_cross_tenant_attempt_appends_one_record() {
    let f = fixture();
    for _ in 0..2 {
        f.validator
            .validate_access("user-bob", ScopedTable::Reports, "report-a-1", None)
            .await
            .unwrap();
    }
    drain_audit().await;
    assert_eq!(f.audit_sink.records().len(), 2);
}
