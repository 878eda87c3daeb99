//! Provider webhook inlets.
//!
//! Webhook routes bypass the session gate by classification; they carry no
//! end-user credentials. Authenticity comes from an HMAC-SHA256 signature
//! over `timestamp|body` with a per-provider shared secret, checked in
//! constant time with a bounded delivery window.

use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use serde_json::{json, Value};
use service_core::error::AppError;
use service_core::utils::signature::verify_webhook_signature;

use crate::models::Tenant;
use crate::AppState;

pub const WEBHOOK_TIMESTAMP_HEADER: &str = "x-webhook-timestamp";
pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-webhook-signature";

fn verify_delivery(
    secret: &str,
    tolerance_seconds: i64,
    headers: &HeaderMap,
    body: &str,
) -> Result<(), AppError> {
    let timestamp: i64 = headers
        .get(WEBHOOK_TIMESTAMP_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing webhook timestamp")))?;

    if (Utc::now().timestamp() - timestamp).abs() > tolerance_seconds {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Webhook timestamp outside tolerance"
        )));
    }

    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing webhook signature")))?;

    let valid = verify_webhook_signature(secret, timestamp, body, signature)?;
    if !valid {
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Invalid webhook signature"
        )));
    }

    Ok(())
}

/// Payment-provider callbacks. Billing itself lives elsewhere; this inlet
/// only acknowledges verified deliveries.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, AppError> {
    verify_delivery(
        &state.config.security.stripe_webhook_secret,
        state.config.security.webhook_tolerance_seconds,
        &headers,
        &body,
    )?;

    let event: Value = serde_json::from_str(&body)
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Malformed webhook payload: {}", e)))?;

    tracing::info!(
        event_type = %event.pointer("/type").and_then(|v| v.as_str()).unwrap_or("unknown"),
        "Stripe webhook received"
    );

    Ok(Json(json!({ "received": true })))
}

/// Identity-provider callbacks: the out-of-band provisioning path for the
/// tenant directory. User and organization lifecycle events land here.
pub async fn clerk_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, AppError> {
    verify_delivery(
        &state.config.security.clerk_webhook_secret,
        state.config.security.webhook_tolerance_seconds,
        &headers,
        &body,
    )?;

    let event: Value = serde_json::from_str(&body)
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Malformed webhook payload: {}", e)))?;

    let event_type = event
        .pointer("/type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match event_type.as_str() {
        // New users start orphaned; membership events assign the tenant.
        "user.created" => {
            let user_id = require_str(&event, "/data/id")?;
            state.directory.record_assignment(user_id, None).await?;
            tracing::info!(user_id = %user_id, "User provisioned without tenant");
        }
        "organization.created" => {
            let tenant_id = require_str(&event, "/data/id")?;
            let slug = event
                .pointer("/data/slug")
                .and_then(Value::as_str)
                .unwrap_or(tenant_id);
            let label = event
                .pointer("/data/name")
                .and_then(Value::as_str)
                .unwrap_or(slug);
            state
                .directory
                .record_tenant(&Tenant::new(tenant_id, slug, label))
                .await?;
            tracing::info!(tenant_id = %tenant_id, "Tenant provisioned");
        }
        "organizationMembership.created" => {
            let user_id = require_str(&event, "/data/public_user_data/user_id")?;
            let tenant_id = require_str(&event, "/data/organization/id")?;
            state
                .directory
                .record_assignment(user_id, Some(tenant_id))
                .await?;
            tracing::info!(user_id = %user_id, tenant_id = %tenant_id, "Tenant assignment recorded");
        }
        "organizationMembership.deleted" => {
            let user_id = require_str(&event, "/data/public_user_data/user_id")?;
            state.directory.record_assignment(user_id, None).await?;
            tracing::info!(user_id = %user_id, "Tenant assignment cleared");
        }
        other => {
            tracing::debug!(event_type = %other, "Ignoring unhandled identity event");
        }
    }

    Ok(Json(json!({ "received": true })))
}

fn require_str<'a>(event: &'a Value, pointer: &str) -> Result<&'a str, AppError> {
    event
        .pointer(pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Webhook payload missing field {}", pointer))
        })
}
