use anyhow::Result;
use backend::config::config_loader::{
    load_core, load_database, load_stripe, non_empty, parsed, parsed_or,
};

use super::config_model::{DotEnvyConfig, Reconciliation, WorkerServer};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(&|key| std::env::var(key).ok())
}

pub fn load_from(lookup: &dyn Fn(&str) -> Option<String>) -> Result<DotEnvyConfig> {
    let worker_server = WorkerServer {
        port: parsed(lookup, "SERVER_PORT_WORKER")?,
        body_limit: parsed(lookup, "SERVER_BODY_LIMIT")?,
        timeout: parsed(lookup, "SERVER_TIMEOUT")?,
    };

    let reconciliation = Reconciliation {
        interval_secs: parsed_or(lookup, "SYNC_INTERVAL_SECS", 900)?,
        internal_token: non_empty(lookup, "INTERNAL_SYNC_TOKEN"),
    };

    Ok(DotEnvyConfig {
        worker_server,
        database: load_database(lookup)?,
        stripe: load_stripe(lookup)?,
        core: load_core(lookup)?,
        reconciliation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("SERVER_PORT_WORKER", "8081"),
            ("SERVER_BODY_LIMIT", "1"),
            ("SERVER_TIMEOUT", "30"),
            ("DATABASE_URL", "postgres://localhost:5432/db"),
            ("STRIPE_SECRET_KEY", "sk_test_123"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_123"),
        ])
    }

    #[test]
    fn sync_defaults_when_unset() {
        let env = env();
        let config = load_from(&|key| env.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.worker_server.port, 8081);
        assert_eq!(config.reconciliation.interval_secs, 900);
        assert_eq!(config.reconciliation.internal_token, None);
    }

    #[test]
    fn token_is_trimmed() {
        let mut env = env();
        env.insert("INTERNAL_SYNC_TOKEN", "  s3cret ");
        env.insert("SYNC_INTERVAL_SECS", "60");

        let config = load_from(&|key| env.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.reconciliation.internal_token.as_deref(), Some("s3cret"));
        assert_eq!(config.reconciliation.interval_secs, 60);
    }
}
