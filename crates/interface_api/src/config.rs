//! API configuration

use serde::Deserialize;

/// Which ledger store the server runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    /// Process-local store for tests and demos; state is lost on restart
    Memory,
}

/// API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    /// Maximum pooled database connections
    pub database_max_connections: u32,
    /// Seconds a request waits for a pooled connection
    pub database_acquire_timeout_secs: u64,
    /// Log level or `EnvFilter` directive
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    pub storage: StorageBackend,
    /// Seconds between background reconciliation sweeps; 0 disables the sweep
    pub reconcile_interval_secs: u64,
    /// Fresh serials tried before an append gives up with a conflict
    pub max_serial_attempts: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/retail_ledger".to_string(),
            database_max_connections: 10,
            database_acquire_timeout_secs: 30,
            log_level: "info".to_string(),
            log_json: false,
            storage: StorageBackend::Postgres,
            reconcile_interval_secs: 0,
            max_serial_attempts: domain_ledger::journal::DEFAULT_SERIAL_ATTEMPTS,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from `API_`-prefixed environment variables
    ///
    /// Unset variables keep their [`Default`] value, so `API_JWT_SECRET` and
    /// `API_DATABASE_URL` are the only ones a deployment normally sets.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(config::Environment::with_prefix("API").try_parsing(true))
    }

    fn from_source<S>(source: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let defaults = Self::default();
        config::Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", u64::from(defaults.port))?
            .set_default("jwt_secret", defaults.jwt_secret)?
            .set_default("jwt_expiration_secs", defaults.jwt_expiration_secs)?
            .set_default("database_url", defaults.database_url)?
            .set_default("database_max_connections", u64::from(defaults.database_max_connections))?
            .set_default("database_acquire_timeout_secs", defaults.database_acquire_timeout_secs)?
            .set_default("log_level", defaults.log_level)?
            .set_default("log_json", defaults.log_json)?
            .set_default("storage", "postgres")?
            .set_default("reconcile_interval_secs", defaults.reconcile_interval_secs)?
            .set_default("max_serial_attempts", u64::from(defaults.max_serial_attempts))?
            .add_source(source)
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
