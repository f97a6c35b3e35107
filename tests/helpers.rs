//! Shared test helpers for integration tests.

use sitehub_core::types::id::{ProjectId, UserId};
use sitehub_session::SessionContext;

/// Request context for a given user against the default site.
pub fn context(user_id: UserId) -> SessionContext {
    SessionContext {
        user_id,
        site_root: "/sites/default".to_string(),
        project_id: ProjectId::new(),
        ou_path: "/".to_string(),
    }
}

/// Request context for a fresh user.
pub fn fresh_context() -> SessionContext {
    context(UserId::new())
}
