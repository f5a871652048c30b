use std::time::Duration;

/// Tunables injected into the use cases, filled from env config at startup.
#[derive(Debug, Clone)]
pub struct CoreSettings {
    /// Replaces every plan's `max_slots` when set. Meant for test environments.
    pub max_slots_override: Option<u32>,
    pub provider_timeout: Duration,
    pub provider_max_retries: u32,
    pub provider_retry_base: Duration,
    pub sync_batch_deadline: Duration,
    pub direct_visit_validity: chrono::Duration,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            max_slots_override: None,
            provider_timeout: Duration::from_secs(10),
            provider_max_retries: 3,
            provider_retry_base: Duration::from_millis(500),
            sync_batch_deadline: Duration::from_secs(300),
            direct_visit_validity: chrono::Duration::hours(
                crates::domain::value_objects::bookings::DIRECT_VISIT_VALIDITY_HOURS,
            ),
        }
    }
}
