//! Route isolation gate integration tests, driven through the real router
//! with in-memory stores.

mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use chrono::Utc;
use common::{
    default_identity, sign_session_token, test_state, CountingResolver, FailingResolver,
    TEST_ADMIN_API_KEY, TEST_STRIPE_SECRET,
};
use http_body_util::BodyExt;
use serde_json::Value;
use service_core::utils::signature::sign_webhook_payload;
use tenancy_service::build_router;
use tenancy_service::middleware::{tenant_isolation_middleware, TenantContext};
use tenancy_service::services::{InMemoryTenantDirectory, TenantDirectory};
use tower::util::ServiceExt;

fn member_directory() -> Arc<InMemoryTenantDirectory> {
    Arc::new(
        InMemoryTenantDirectory::new()
            .with_member("user-alice", "tenant-a-uuid")
            .with_orphan("user-orphan"),
    )
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn decision_sequence_terminates_at_classification_for_public_routes() {
    use tenancy_service::middleware::{enforce_tenant_isolation, GateDecision};
    use tenancy_service::routes::{RouteClass, RouteTable};

    let identity = CountingResolver::new(default_identity());
    let directory = member_directory();
    let routes = RouteTable::default();

    // Health endpoint with no session at all: allowed outright.
    let decision =
        enforce_tenant_isolation(&routes, &identity, directory.as_ref(), "/api/health", None)
            .await
            .unwrap();
    assert_eq!(decision, GateDecision::Bypass(RouteClass::Public));
    assert_eq!(identity.call_count(), 0);

    // Same request against a protected dashboard path: 401.
    let decision = enforce_tenant_isolation(
        &routes,
        &identity,
        directory.as_ref(),
        "/api/dashboard/overview",
        None,
    )
    .await
    .unwrap();
    match decision {
        GateDecision::Deny(denial) => {
            assert_eq!(denial.status, StatusCode::UNAUTHORIZED);
            assert_eq!(denial.message, "Unauthorized");
        }
        other => panic!("expected denial, got {:?}", other),
    }

    // Same path with a session but an orphaned user: 403.
    let decision = enforce_tenant_isolation(
        &routes,
        &identity,
        directory.as_ref(),
        "/api/dashboard/overview",
        Some("token-orphan"),
    )
    .await
    .unwrap();
    match decision {
        GateDecision::Deny(denial) => {
            assert_eq!(denial.status, StatusCode::FORBIDDEN);
            assert_eq!(denial.message, "Access denied");
        }
        other => panic!("expected denial, got {:?}", other),
    }

    // And with a member session: allowed, tenant resolved.
    let decision = enforce_tenant_isolation(
        &routes,
        &identity,
        directory.as_ref(),
        "/api/dashboard/overview",
        Some("token-alice"),
    )
    .await
    .unwrap();
    match decision {
        GateDecision::Allow(ctx) => {
            assert_eq!(ctx.user_id, "user-alice");
            assert_eq!(ctx.tenant_id, "tenant-a-uuid");
        }
        other => panic!("expected allow, got {:?}", other),
    }
}

#[tokio::test]
async fn public_route_allowed_without_identity_check() {
    let counting = Arc::new(CountingResolver::new(default_identity()));
    let (state, _stores) = test_state(counting.clone(), member_directory(), Default::default());
    let app = build_router(state).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(counting.call_count(), 0);
}

#[tokio::test]
async fn protected_route_without_session_returns_401() {
    let (state, _stores) = test_state(default_identity(), member_directory(), Default::default());
    let app = build_router(state).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/dealerships")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn protected_route_with_invalid_token_returns_401() {
    let (state, _stores) = test_state(default_identity(), member_directory(), Default::default());
    let app = build_router(state).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/dealerships")
                .header("Authorization", "Bearer not-a-real-session")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn orphaned_user_returns_403() {
    let (state, _stores) = test_state(default_identity(), member_directory(), Default::default());
    let app = build_router(state).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/dealerships")
                .header("Authorization", "Bearer token-orphan")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Access denied");
}

#[tokio::test]
async fn unknown_user_returns_403() {
    let identity = Arc::new(
        tenancy_service::services::StaticIdentityResolver::new()
            .with_session("token-ghost", "user-ghost"),
    );
    let (state, _stores) = test_state(identity, member_directory(), Default::default());
    let app = build_router(state).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/dealerships")
                .header("Authorization", "Bearer token-ghost")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn member_passes_gate_with_tenant_context_attached() {
    let (state, _stores) = test_state(default_identity(), member_directory(), Default::default());

    // Probe handler so the asserted context is the one the gate attached.
    let app = Router::new()
        .route(
            "/api/whoami",
            get(|ctx: TenantContext| async move {
                axum::Json(serde_json::json!({
                    "user_id": ctx.user_id,
                    "tenant_id": ctx.tenant_id,
                }))
            }),
        )
        .layer(from_fn_with_state(state, tenant_isolation_middleware));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/whoami")
                .header("Authorization", "Bearer token-alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user_id"], "user-alice");
    assert_eq!(body["tenant_id"], "tenant-a-uuid");
}

#[tokio::test]
async fn session_cookie_is_accepted() {
    let (state, _stores) = test_state(default_identity(), member_directory(), Default::default());

    let app = Router::new()
        .route("/api/whoami", get(|ctx: TenantContext| async move { ctx.tenant_id }))
        .layer(from_fn_with_state(state, tenant_isolation_middleware));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/whoami")
                .header("Cookie", "__session=token-alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn identity_infrastructure_failure_denies() {
    let (state, _stores) = test_state(
        Arc::new(FailingResolver),
        member_directory(),
        Default::default(),
    );
    let app = build_router(state).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/dealerships")
                .header("Authorization", "Bearer token-alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn admin_route_requires_api_key_and_membership() {
    let (state, _stores) = test_state(default_identity(), member_directory(), Default::default());
    let app = build_router(state).await.unwrap();

    // Member with the operator key: allowed, empty forensic log.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/audit/violations")
                .header("Authorization", "Bearer token-alice")
                .header("x-admin-api-key", TEST_ADMIN_API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body, serde_json::json!([]));

    // Member without the key: rejected by the admin layer.
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/audit/violations")
                .header("Authorization", "Bearer token-alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn webhook_route_bypasses_session_but_requires_signature() {
    let counting = Arc::new(CountingResolver::new(default_identity()));
    let (state, _stores) = test_state(counting.clone(), member_directory(), Default::default());
    let app = build_router(state).await.unwrap();

    let body = r#"{"type":"invoice.paid"}"#;
    let timestamp = Utc::now().timestamp();
    let signature = sign_webhook_payload(TEST_STRIPE_SECRET, timestamp, body).unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/stripe/webhook")
                .header("content-type", "application/json")
                .header("x-webhook-timestamp", timestamp.to_string())
                .header("x-webhook-signature", signature)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["received"], true);
    // No end-user identity work happened for the webhook.
    assert_eq!(counting.call_count(), 0);

    // A bad signature is rejected by the handler, not the gate.
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/stripe/webhook")
                .header("content-type", "application/json")
                .header("x-webhook-timestamp", timestamp.to_string())
                .header("x-webhook-signature", "deadbeef")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn clerk_webhook_provisions_directory() {
    let directory = member_directory();
    let (state, stores) = test_state(default_identity(), directory, Default::default());
    let app = build_router(state).await.unwrap();

    let body = serde_json::json!({
        "type": "organizationMembership.created",
        "data": {
            "organization": { "id": "tenant-b-uuid" },
            "public_user_data": { "user_id": "user-bob" }
        }
    })
    .to_string();
    let timestamp = Utc::now().timestamp();
    let signature =
        sign_webhook_payload(common::TEST_CLERK_SECRET, timestamp, &body).unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/clerk/webhook")
                .header("content-type", "application/json")
                .header("x-webhook-timestamp", timestamp.to_string())
                .header("x-webhook-signature", signature)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let assignment = stores.directory.tenant_for("user-bob").await.unwrap();
    assert_eq!(
        assignment,
        tenancy_service::services::TenantAssignment::Member("tenant-b-uuid".to_string())
    );
}

#[tokio::test]
async fn verified_session_token_passes_gate() {
    use tenancy_service::services::{MemoryRevocations, RevocationStore, SessionVerifier};

    let revocations = Arc::new(MemoryRevocations::new());
    let verifier = Arc::new(
        SessionVerifier::from_pem(
            common::TEST_PUBLIC_KEY.as_bytes(),
            None,
            revocations.clone(),
        )
        .unwrap(),
    );
    let (state, _stores) = test_state(verifier, member_directory(), Default::default());

    let app = Router::new()
        .route("/api/whoami", get(|ctx: TenantContext| async move { ctx.user_id }))
        .layer(from_fn_with_state(state, tenant_isolation_middleware));

    let token = sign_session_token("user-alice", "sess-1", 15);
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/whoami")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Revoking the session turns the same token anonymous.
    revocations.revoke("sess-1", 900).await.unwrap();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/whoami")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_session_token_is_anonymous() {
    use tenancy_service::services::{MemoryRevocations, SessionVerifier};

    let verifier = Arc::new(
        SessionVerifier::from_pem(
            common::TEST_PUBLIC_KEY.as_bytes(),
            None,
            Arc::new(MemoryRevocations::new()),
        )
        .unwrap(),
    );
    let (state, _stores) = test_state(verifier, member_directory(), Default::default());
    let app = build_router(state).await.unwrap();

    let token = sign_session_token("user-alice", "sess-1", -5);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/dealerships")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
