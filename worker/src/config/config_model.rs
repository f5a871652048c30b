use backend::config::config_model::{Core, Database, Stripe};

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub worker_server: WorkerServer,
    pub database: Database,
    pub stripe: Stripe,
    pub core: Core,
    pub reconciliation: Reconciliation,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub timeout: u64,
    pub body_limit: u64,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub interval_secs: u64,
    /// Bearer token for the manual sync endpoint. The endpoint is disabled without it.
    pub internal_token: Option<String>,
}
