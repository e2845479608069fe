use std::sync::Arc;

use crate::domain::repository::IdentityProvider;
use crate::domain::workflow::UserId;

/// Outcome of an advisory permission check
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PermissionCheck {
    /// The signed-in user, when a session exists
    pub user: Option<UserId>,

    /// Whether the user holds one of the elevated roles
    pub elevated: bool,
}

/// Advisory role check run before every mutation.
///
/// The gate never blocks: a missing session, a missing role or a failed
/// lookup is logged and the caller proceeds. Enforcement belongs to the store.
pub struct PermissionGate {
    identity: Arc<dyn IdentityProvider>,
    elevated_roles: Vec<String>,
}

impl PermissionGate {
    /// Create a new permission gate
    pub fn new(identity: Arc<dyn IdentityProvider>, elevated_roles: Vec<String>) -> Self {
        Self {
            identity,
            elevated_roles,
        }
    }

    /// Resolve the caller and whether they hold an elevated role
    pub async fn check(&self, action: &str) -> PermissionCheck {
        let session = match self.identity.current_session().await {
            Ok(Some(session)) => session,
            Ok(None) => {
                tracing::warn!(action, "No active session for step builder mutation");
                return PermissionCheck::default();
            }
            Err(e) => {
                tracing::warn!(action, error = %e, "Session lookup failed, continuing");
                return PermissionCheck::default();
            }
        };

        let roles = match self.identity.user_roles(&session.user_id).await {
            Ok(roles) => roles,
            Err(e) => {
                tracing::warn!(
                    action,
                    user_id = %session.user_id.0,
                    error = %e,
                    "Role lookup failed, continuing"
                );
                return PermissionCheck {
                    user: Some(session.user_id),
                    elevated: false,
                };
            }
        };

        let elevated = roles.iter().any(|role| {
            self.elevated_roles
                .iter()
                .any(|elevated| elevated.eq_ignore_ascii_case(role))
        });

        if !elevated {
            tracing::warn!(
                action,
                user_id = %session.user_id.0,
                "User lacks an elevated role for step builder mutation"
            );
        }

        PermissionCheck {
            user: Some(session.user_id),
            elevated,
        }
    }
}
