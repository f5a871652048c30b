pub mod booking_statuses;
pub mod price_change_timings;
pub mod provider_subscription_statuses;
pub mod selection_statuses;
