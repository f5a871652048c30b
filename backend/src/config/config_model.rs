use std::time::Duration;

use crate::usecases::settings::CoreSettings;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub supabase: Supabase,
    pub stripe: Stripe,
    pub core: Core,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Supabase {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
}

/// Membership core tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct Core {
    pub max_slots_override: Option<u32>,
    pub provider_timeout_secs: u64,
    pub provider_max_retries: u32,
    pub provider_retry_base_ms: u64,
    pub sync_batch_deadline_secs: u64,
    pub direct_visit_validity_hours: i64,
}

impl Core {
    pub fn settings(&self) -> CoreSettings {
        CoreSettings {
            max_slots_override: self.max_slots_override,
            provider_timeout: Duration::from_secs(self.provider_timeout_secs),
            provider_max_retries: self.provider_max_retries,
            provider_retry_base: Duration::from_millis(self.provider_retry_base_ms),
            sync_batch_deadline: Duration::from_secs(self.sync_batch_deadline_secs),
            direct_visit_validity: chrono::Duration::hours(self.direct_visit_validity_hours),
        }
    }
}
