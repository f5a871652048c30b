use std::env;
use tracing::Level;
use url::Url;

#[derive(Debug, Clone)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Debug, Clone)]
pub(crate) struct AlertConfig {
    pub(crate) webhook_url: Url,
    pub(crate) min_level: Level,
}

#[derive(Debug, Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) alerts: Option<AlertConfig>,
    /// Logged once tracing is up.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(component: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let component = component.trim().to_string();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let service_context = ServiceContext {
            service_name: non_empty("SERVICE_NAME").unwrap_or_else(|| component.clone()),
            environment: non_empty("STAGE").unwrap_or_else(|| "unknown".to_string()),
            component,
        };

        let mut warnings = Vec::new();
        let alerts = match non_empty("ALERT_WEBHOOK_URL") {
            None => None,
            Some(raw) => match Url::parse(raw.trim()) {
                Ok(webhook_url) => Some(AlertConfig {
                    webhook_url,
                    min_level: alert_level(non_empty("ALERT_LEVEL"), &mut warnings),
                }),
                Err(err) => {
                    // The URL itself carries a secret, only the parse error is reported.
                    warnings.push(format!("ALERT_WEBHOOK_URL is invalid ({err}); alerts disabled"));
                    None
                }
            },
        };

        Self {
            service_context,
            alerts,
            warnings,
        }
    }
}

fn alert_level(raw: Option<String>, warnings: &mut Vec<String>) -> Level {
    let Some(raw) = raw else {
        return Level::ERROR;
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" | "warning" => Level::WARN,
        "info" => Level::INFO,
        other => {
            warnings.push(format!("ALERT_LEVEL `{other}` is not supported; using error"));
            Level::ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn alerts_disabled_without_webhook() {
        let config = ObservabilityConfig::from_lookup("backend", lookup(&[("STAGE", "Local")]));

        assert!(config.alerts.is_none());
        assert!(config.warnings.is_empty());
        assert_eq!(config.service_context.service_name, "backend");
        assert_eq!(config.service_context.environment, "Local");
    }

    #[test]
    fn invalid_webhook_is_reported_not_fatal() {
        let config = ObservabilityConfig::from_lookup(
            "worker",
            lookup(&[("ALERT_WEBHOOK_URL", "not a url")]),
        );

        assert!(config.alerts.is_none());
        assert_eq!(config.warnings.len(), 1);
        assert!(!config.warnings[0].contains("not a url"));
    }

    #[test]
    fn unknown_level_falls_back_to_error() {
        let config = ObservabilityConfig::from_lookup(
            "backend",
            lookup(&[
                ("ALERT_WEBHOOK_URL", "https://hooks.example.com/alerts"),
                ("ALERT_LEVEL", "verbose"),
            ]),
        );

        let alerts = config.alerts.expect("alerts enabled");
        assert_eq!(alerts.min_level, Level::ERROR);
        assert_eq!(config.warnings.len(), 1);
    }
}
