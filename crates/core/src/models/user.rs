//! Signed-in identity.

use serde::{Deserialize, Serialize};

use crate::types::{Email, Role, UserId};

/// The identity attached to the active session.
///
/// Not persisted locally; it lives only as long as the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    /// Login email, also used as the display handle.
    pub email: Email,
    pub role: Role,
}

impl SessionUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
