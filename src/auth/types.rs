//! Authentication user types.

use crate::jwt::Identity;

/// Authenticated user information decoded from the access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub identity: Identity,
}

impl AuthenticatedUser {
    pub fn user_id(&self) -> &str {
        &self.identity.id
    }

    /// The only tenant this request may read or write.
    pub fn tenant_id(&self) -> &str {
        &self.identity.tenant_id
    }
}
