//! Checkout lifecycle states.
//!
//! A single checkout operation moves through:
//!
//! ```text
//! Pending -> Validating -> Committing -> Committed
//!                      \             \-> RolledBack
//!                       \-> Rejected
//! ```
//!
//! `Rejected` and `RolledBack` leave no state behind; externally they are
//! indistinguishable.

use serde::{Deserialize, Serialize};

/// State of one checkout operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutState {
    #[default]
    Pending,
    Validating,
    Committing,
    Rejected,
    Committed,
    RolledBack,
}

impl CheckoutState {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Committed | Self::RolledBack)
    }

    /// Whether `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Validating)
                | (Self::Validating, Self::Committing | Self::Rejected)
                | (Self::Committing, Self::Committed | Self::RolledBack)
        )
    }

    /// Log-friendly lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validating => "validating",
            Self::Committing => "committing",
            Self::Rejected => "rejected",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
