pub mod admin;
pub mod gate;
pub mod tenant;

pub use admin::admin_auth_middleware;
pub use gate::{
    enforce_tenant_isolation, extract_session_token, tenant_isolation_middleware, GateDecision,
};
pub use tenant::TenantContext;
