use serde::Deserialize;

use crate::filter::{MatchKind, MatchPolicy};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub sender: SenderConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub host: String,
    pub port: u16,
    /// Number of writer tasks draining the ingestion queue.
    pub workers: usize,
    /// Accepted payloads that may wait for a writer before requests block.
    pub queue_capacity: usize,
    /// How long queued and in-flight writes may run after a shutdown signal.
    pub shutdown_grace_secs: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
            workers: 4,
            queue_capacity: 256,
            shutdown_grace_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub timeout_secs: u64,
    /// Log store failures and treat the write as handled.
    pub ignore_fail: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8086,
            database: "metrics".to_string(),
            username: "root".to_string(),
            password: "root".to_string(),
            timeout_secs: 15,
            ignore_fail: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    pub collector_url: String,
    /// Sampling window in seconds; one sample per second.
    pub interval_secs: u64,
    pub send_timeout_secs: u64,
    pub match_policy: MatchKind,
    /// Alias the sender runs under; never reported under `all_but_self` or `uuid`.
    pub self_alias: String,
    /// cAdvisor API base (e.g. `http://127.0.0.1:8989/api/v1.2`). Unset = Docker stats.
    pub cadvisor_url: Option<String>,
    /// Look for a running cAdvisor container when `cadvisor_url` is unset.
    pub discover_cadvisor: bool,
    /// Cap on concurrent per-container samplers; 0 = one task per container, no cap.
    pub max_concurrent_samplers: usize,
    /// Pin the Docker API version (e.g. `1.41`). Unset = bollard's default.
    pub docker_api_version: Option<String>,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            collector_url: "http://127.0.0.1:8787/collector/metrics".to_string(),
            interval_secs: 60,
            send_timeout_secs: 10,
            match_policy: MatchKind::All,
            self_alias: "sender".to_string(),
            cadvisor_url: None,
            discover_cadvisor: true,
            max_concurrent_samplers: 0,
            docker_api_version: None,
        }
    }
}

impl SenderConfig {
    pub fn match_policy(&self) -> MatchPolicy {
        MatchPolicy::new(self.match_policy, &self.self_alias)
    }
}

impl AppConfig {
    /// Reads `CONFIG_FILE` (default `config.toml`) when present, falls back to
    /// defaults otherwise, then applies environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let mut config: AppConfig = match std::fs::read_to_string(&path) {
            Ok(s) => toml::from_str(&s)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path, "no config file; using defaults");
                AppConfig::default()
            }
            Err(e) => return Err(e.into()),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Environment overrides, named as the deployment scripts set them.
    pub fn apply_env<F>(&mut self, get: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get("COLLECTOR_PORT") {
            self.collector.port = v.parse()?;
        }
        if let Some(v) = get("COLLECTOR_INFLUXDB_HOST") {
            self.store.host = v;
        }
        if let Some(v) = get("COLLECTOR_INFLUXDB_PORT") {
            self.store.port = v.parse()?;
        }
        if let Some(v) = get("COLLECTOR_INFLUXDB_NAME") {
            self.store.database = v;
        }
        if let Some(v) = get("INFLUXDB_ADMIN_USERNAME") {
            self.store.username = v;
        }
        if let Some(v) = get("INFLUXDB_ADMIN_PASSWORD") {
            self.store.password = v;
        }
        if let Some(v) = get("COLLECTOR_URL") {
            self.sender.collector_url = v;
        }
        if let Some(v) = get("CADVISOR_URL") {
            self.sender.cadvisor_url = Some(v);
        }
        if let Some(v) = get("MATCH_TYPE") {
            self.sender.match_policy = v.parse()?;
        }
        if let Some(v) = get("DOCKER_API_VERSION") {
            self.sender.docker_api_version = Some(v);
        }
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.collector.port > 0,
            "collector.port must be between 1 and 65535, got {}",
            self.collector.port
        );
        anyhow::ensure!(
            self.collector.workers > 0,
            "collector.workers must be > 0, got {}",
            self.collector.workers
        );
        anyhow::ensure!(
            self.collector.queue_capacity > 0,
            "collector.queue_capacity must be > 0, got {}",
            self.collector.queue_capacity
        );
        anyhow::ensure!(!self.store.host.is_empty(), "store.host must be non-empty");
        anyhow::ensure!(
            self.store.port > 0,
            "store.port must be between 1 and 65535, got {}",
            self.store.port
        );
        anyhow::ensure!(
            !self.store.database.is_empty(),
            "store.database must be non-empty"
        );
        anyhow::ensure!(
            self.store.timeout_secs > 0,
            "store.timeout_secs must be > 0, got {}",
            self.store.timeout_secs
        );
        anyhow::ensure!(
            !self.sender.collector_url.is_empty(),
            "sender.collector_url must be non-empty"
        );
        anyhow::ensure!(
            self.sender.interval_secs > 0,
            "sender.interval_secs must be > 0, got {}",
            self.sender.interval_secs
        );
        anyhow::ensure!(
            self.sender.send_timeout_secs > 0,
            "sender.send_timeout_secs must be > 0, got {}",
            self.sender.send_timeout_secs
        );
        if let Some(v) = &self.sender.docker_api_version {
            crate::docker_repo::parse_api_version(v)
                .map_err(|e| anyhow::anyhow!("sender.docker_api_version: {}", e))?;
        }
        Ok(())
    }
}
