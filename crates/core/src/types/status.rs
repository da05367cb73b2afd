//! Status and role enums.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a quote request.
///
/// `Pending` on creation. Admins may mark a pending quote as `Responded`, and
/// may close any quote that is not already closed. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    #[default]
    Pending,
    Responded,
    Closed,
}

impl QuoteStatus {
    /// Whether an admin may move a quote from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Responded) | (Self::Pending | Self::Responded, Self::Closed)
        )
    }

    /// The statuses reachable from `self`, in display order.
    #[must_use]
    pub fn next_statuses(self) -> Vec<Self> {
        [Self::Responded, Self::Closed]
            .into_iter()
            .filter(|next| self.can_transition_to(*next))
            .collect()
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl std::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Responded => write!(f, "responded"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for QuoteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "responded" => Ok(Self::Responded),
            "closed" => Ok(Self::Closed),
            _ => Err(format!("invalid quote status: {s}")),
        }
    }
}

/// Role of a signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Manages products, quotes and brand settings.
    Admin,
    /// Browses the catalog, requests quotes and writes reviews.
    #[default]
    Customer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Customer => write!(f, "customer"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "customer" => Ok(Self::Customer),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}
