use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Subscription status as reported by Stripe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProviderSubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Unpaid,
    Canceled,
    Incomplete,
    IncompleteExpired,
    Paused,
    Unknown,
}

impl ProviderSubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderSubscriptionStatus::Active => "active",
            ProviderSubscriptionStatus::Trialing => "trialing",
            ProviderSubscriptionStatus::PastDue => "past_due",
            ProviderSubscriptionStatus::Unpaid => "unpaid",
            ProviderSubscriptionStatus::Canceled => "canceled",
            ProviderSubscriptionStatus::Incomplete => "incomplete",
            ProviderSubscriptionStatus::IncompleteExpired => "incomplete_expired",
            ProviderSubscriptionStatus::Paused => "paused",
            ProviderSubscriptionStatus::Unknown => "unknown",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "active" => ProviderSubscriptionStatus::Active,
            "trialing" => ProviderSubscriptionStatus::Trialing,
            "past_due" => ProviderSubscriptionStatus::PastDue,
            "unpaid" => ProviderSubscriptionStatus::Unpaid,
            "canceled" => ProviderSubscriptionStatus::Canceled,
            "incomplete" => ProviderSubscriptionStatus::Incomplete,
            "incomplete_expired" => ProviderSubscriptionStatus::IncompleteExpired,
            "paused" => ProviderSubscriptionStatus::Paused,
            _ => ProviderSubscriptionStatus::Unknown,
        }
    }

    /// Whether a membership backed by this subscription may be used.
    pub fn grants_access(&self) -> bool {
        matches!(
            self,
            ProviderSubscriptionStatus::Active
                | ProviderSubscriptionStatus::Trialing
                | ProviderSubscriptionStatus::PastDue
        )
    }

    /// The provider will never bill this subscription again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProviderSubscriptionStatus::Canceled | ProviderSubscriptionStatus::IncompleteExpired
        )
    }
}

impl Display for ProviderSubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_values_do_not_grant_access() {
        let status = ProviderSubscriptionStatus::from_str("something_new");
        assert_eq!(status, ProviderSubscriptionStatus::Unknown);
        assert!(!status.grants_access());
        assert!(!status.is_terminal());
    }

    #[test]
    fn past_due_keeps_access_until_provider_gives_up() {
        assert!(ProviderSubscriptionStatus::PastDue.grants_access());
        assert!(ProviderSubscriptionStatus::Canceled.is_terminal());
        assert!(!ProviderSubscriptionStatus::Canceled.grants_access());
    }
}
