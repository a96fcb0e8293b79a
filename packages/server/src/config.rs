use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory for blobs, sessions and published problems.
    pub data_dir: String,
    /// Maximum size of a single blob in bytes.
    pub max_blob_size: u64,
    /// Storage budget per problem in bytes (cases plus uploaded files).
    pub problem_quota: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RunnerConfig {
    /// Number of concurrent run workers.
    pub workers: usize,
    /// Queue capacity; submissions beyond it are rejected.
    pub queue_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub runner: RunnerConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            .set_default("storage.data_dir", "./data")?
            .set_default("storage.max_blob_size", 256 * 1024 * 1024)?
            .set_default("storage.problem_quota", 1024 * 1024 * 1024)?
            .set_default("runner.workers", 2)?
            .set_default("runner.queue_capacity", 64)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., POLYGON__STORAGE__DATA_DIR)
            .add_source(Environment::with_prefix("POLYGON").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
