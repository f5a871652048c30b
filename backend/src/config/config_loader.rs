use std::str::FromStr;

use anyhow::{Context, Result};

use super::{
    config_model::{BackendServer, Core, Database, DotEnvyConfig, Stripe, Supabase},
    stage::Stage,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(&|key| std::env::var(key).ok())
}

/// Builds the config from any key lookup, so parsing can be tested without touching the process env.
pub fn load_from(lookup: &dyn Fn(&str) -> Option<String>) -> Result<DotEnvyConfig> {
    let backend_server = BackendServer {
        port: parsed(lookup, "SERVER_PORT_BACKEND")?,
        body_limit: parsed(lookup, "SERVER_BODY_LIMIT")?,
        timeout: parsed(lookup, "SERVER_TIMEOUT")?,
    };

    let supabase = Supabase {
        jwt_secret: required(lookup, "SUPABASE_JWT_SECRET")?,
    };

    Ok(DotEnvyConfig {
        backend_server,
        database: load_database(lookup)?,
        supabase,
        stripe: load_stripe(lookup)?,
        core: load_core(lookup)?,
    })
}

pub fn load_database(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Database> {
    Ok(Database {
        url: required(lookup, "DATABASE_URL")?,
    })
}

pub fn load_stripe(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Stripe> {
    Ok(Stripe {
        secret_key: required(lookup, "STRIPE_SECRET_KEY")?,
        webhook_secret: required(lookup, "STRIPE_WEBHOOK_SECRET")?,
    })
}

pub fn load_core(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Core> {
    let max_slots_override = match non_empty(lookup, "MAX_SLOTS_OVERRIDE") {
        Some(value) => Some(
            value
                .parse::<u32>()
                .context("MAX_SLOTS_OVERRIDE is invalid")?,
        ),
        None => None,
    };

    Ok(Core {
        max_slots_override,
        provider_timeout_secs: parsed_or(lookup, "PROVIDER_TIMEOUT_SECS", 10)?,
        provider_max_retries: parsed_or(lookup, "PROVIDER_MAX_RETRIES", 3)?,
        provider_retry_base_ms: parsed_or(lookup, "PROVIDER_RETRY_BASE_MS", 500)?,
        sync_batch_deadline_secs: parsed_or(lookup, "SYNC_BATCH_DEADLINE_SECS", 300)?,
        direct_visit_validity_hours: parsed_or(lookup, "DIRECT_VISIT_VALIDITY_HOURS", 24)?,
    })
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = std::env::var("STAGE").unwrap_or("".to_string());
    Stage::try_from(&stage_str).unwrap_or_default()
}

pub fn required(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    non_empty(lookup, key).with_context(|| format!("{key} is invalid"))
}

pub fn parsed<T>(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    required(lookup, key)?
        .parse()
        .with_context(|| format!("{key} is invalid"))
}

pub fn parsed_or<T>(lookup: &dyn Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty(lookup, key) {
        Some(value) => value.parse().with_context(|| format!("{key} is invalid")),
        None => Ok(default),
    }
}

pub fn non_empty(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("SERVER_PORT_BACKEND", "8080"),
            ("SERVER_BODY_LIMIT", "10"),
            ("SERVER_TIMEOUT", "30"),
            ("DATABASE_URL", "postgres://localhost:5432/db"),
            ("SUPABASE_JWT_SECRET", "supersecretjwtsecretforunittesting123"),
            ("STRIPE_SECRET_KEY", "sk_test_123"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_123"),
        ])
    }

    fn load_with(env: &HashMap<&'static str, &'static str>) -> Result<DotEnvyConfig> {
        load_from(&|key| env.get(key).map(|value| value.to_string()))
    }

    #[test]
    fn core_settings_fall_back_to_defaults() {
        let config = load_with(&base_env()).unwrap();

        assert_eq!(config.backend_server.port, 8080);
        assert_eq!(config.core.max_slots_override, None);
        assert_eq!(config.core.provider_timeout_secs, 10);
        assert_eq!(config.core.provider_max_retries, 3);
        assert_eq!(config.core.direct_visit_validity_hours, 24);

        let settings = config.core.settings();
        assert_eq!(settings.provider_retry_base, std::time::Duration::from_millis(500));
        assert_eq!(settings.direct_visit_validity, chrono::Duration::hours(24));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut env = base_env();
        env.insert("MAX_SLOTS_OVERRIDE", "7");
        env.insert("PROVIDER_TIMEOUT_SECS", "2");
        env.insert("SYNC_BATCH_DEADLINE_SECS", "60");

        let config = load_with(&env).unwrap();

        assert_eq!(config.core.max_slots_override, Some(7));
        assert_eq!(config.core.provider_timeout_secs, 2);
        assert_eq!(config.core.sync_batch_deadline_secs, 60);
    }

    #[test]
    fn blank_override_means_unset() {
        let mut env = base_env();
        env.insert("MAX_SLOTS_OVERRIDE", "  ");

        let config = load_with(&env).unwrap();

        assert_eq!(config.core.max_slots_override, None);
    }

    #[test]
    fn missing_required_key_names_it() {
        let mut env = base_env();
        env.remove("STRIPE_WEBHOOK_SECRET");

        let err = load_with(&env).unwrap_err();

        assert!(err.to_string().contains("STRIPE_WEBHOOK_SECRET"));
    }

    #[test]
    fn malformed_number_is_rejected() {
        let mut env = base_env();
        env.insert("PROVIDER_MAX_RETRIES", "three");

        let err = load_with(&env).unwrap_err();

        assert!(err.to_string().contains("PROVIDER_MAX_RETRIES"));
    }
}
