use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("insufficient credits: requested {requested}, remaining {remaining}")]
    InsufficientCredits { requested: u32, remaining: u32 },
    #[error("gym slot limit of {max_slots} reached")]
    SlotLimitExceeded { max_slots: u32 },
    #[error("gym is already selected")]
    AlreadySelected,
    #[error("member already holds an active booking")]
    DuplicateActiveBooking,
    #[error("gym is not in the member's current selection")]
    GymNotInSelection,
    #[error("plan does not include daily access")]
    DailyAccessRequired,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("invalid booking state: {0}")]
    InvalidBookingState(String),
    #[error("payment provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("plan currency mismatch: {current} vs {requested}")]
    CurrencyMismatch { current: String, requested: String },
    #[error("invalid webhook: {0}")]
    InvalidWebhook(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl MembershipError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MembershipError::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
            MembershipError::SlotLimitExceeded { .. }
            | MembershipError::AlreadySelected
            | MembershipError::DuplicateActiveBooking
            | MembershipError::InvalidBookingState(_) => StatusCode::CONFLICT,
            MembershipError::GymNotInSelection | MembershipError::DailyAccessRequired => {
                StatusCode::FORBIDDEN
            }
            MembershipError::NotFound(_) => StatusCode::NOT_FOUND,
            MembershipError::CurrencyMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            MembershipError::InvalidWebhook(_) => StatusCode::BAD_REQUEST,
            MembershipError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            MembershipError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            MembershipError::InsufficientCredits { .. } => "insufficient_credits",
            MembershipError::SlotLimitExceeded { .. } => "slot_limit_exceeded",
            MembershipError::AlreadySelected => "already_selected",
            MembershipError::DuplicateActiveBooking => "duplicate_active_booking",
            MembershipError::GymNotInSelection => "gym_not_in_selection",
            MembershipError::DailyAccessRequired => "daily_access_required",
            MembershipError::NotFound(_) => "not_found",
            MembershipError::InvalidBookingState(_) => "invalid_booking_state",
            MembershipError::ProviderUnavailable(_) => "provider_unavailable",
            MembershipError::CurrencyMismatch { .. } => "currency_mismatch",
            MembershipError::InvalidWebhook(_) => "invalid_webhook",
            MembershipError::Internal(_) => "internal",
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, MembershipError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_have_distinct_codes() {
        let errors = [
            MembershipError::InsufficientCredits {
                requested: 2,
                remaining: 1,
            },
            MembershipError::SlotLimitExceeded { max_slots: 3 },
            MembershipError::AlreadySelected,
            MembershipError::DuplicateActiveBooking,
            MembershipError::GymNotInSelection,
            MembershipError::DailyAccessRequired,
            MembershipError::NotFound("membership"),
            MembershipError::InvalidBookingState("completed".to_string()),
            MembershipError::ProviderUnavailable("timeout".to_string()),
            MembershipError::CurrencyMismatch {
                current: "thb".to_string(),
                requested: "usd".to_string(),
            },
            MembershipError::InvalidWebhook("signature".to_string()),
            MembershipError::Internal(anyhow::anyhow!("db down")),
        ];

        let mut codes: Vec<&str> = errors.iter().map(MembershipError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            MembershipError::NotFound("booking").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            MembershipError::SlotLimitExceeded { max_slots: 3 }.status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            MembershipError::ProviderUnavailable("timeout".to_string()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
