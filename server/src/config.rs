use anyhow::Context;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Which object store implementation backs the server
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub enum StorageBackend {
    /// Disk-backed store rooted at `storage_path`
    Local,
    /// Ephemeral in-memory store (lost on restart)
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "disk" => Ok(StorageBackend::Local),
            "memory" | "mem" => Ok(StorageBackend::Memory),
            other => anyhow::bail!("unknown STORAGE_BACKEND '{}' (expected local or memory)", other),
        }
    }
}

/// Throttling knobs for folder batch operations
#[derive(Clone, Debug, Deserialize)]
pub struct BatchSettings {
    pub delete_batch_size: usize,
    pub delete_batch_delay: Duration,
    pub move_batch_size: usize,
    pub move_batch_delay: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            delete_batch_size: 50,
            delete_batch_delay: Duration::from_millis(100),
            move_batch_size: 20,
            move_batch_delay: Duration::from_millis(200),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub server_name: String,
    pub rest_port: u16,
    pub jwt_secret: String,
    pub storage_backend: StorageBackend,
    pub storage_path: String,
    /// `production` hides error details from response bodies
    pub app_env: String,
    /// Report out-of-namespace paths as 403 instead of 500
    pub access_denied_forbidden: bool,
    pub body_limit_bytes: usize,
    pub batch: BatchSettings,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = std::env::var("JWT_SECRET").context(
            "JWT_SECRET environment variable must be set. Generate with: openssl rand -hex 32",
        )?;

        let access_denied_status: u16 = env_or("ACCESS_DENIED_STATUS", 500)?;
        if access_denied_status != 500 && access_denied_status != 403 {
            anyhow::bail!("ACCESS_DENIED_STATUS must be 500 or 403, got {}", access_denied_status);
        }

        let batch = BatchSettings {
            delete_batch_size: env_or("DELETE_BATCH_SIZE", 50)?,
            delete_batch_delay: Duration::from_millis(env_or("DELETE_BATCH_DELAY_MS", 100)?),
            move_batch_size: env_or("MOVE_BATCH_SIZE", 20)?,
            move_batch_delay: Duration::from_millis(env_or("MOVE_BATCH_DELAY_MS", 200)?),
        };
        if batch.delete_batch_size == 0 || batch.move_batch_size == 0 {
            anyhow::bail!("batch sizes must be at least 1");
        }

        Ok(Config {
            server_name: std::env::var("SERVER_NAME").unwrap_or_else(|_| "Stowage".to_string()),
            rest_port: env_or("REST_PORT", 8080)?,
            jwt_secret,
            storage_backend: env_or("STORAGE_BACKEND", StorageBackend::Local)?,
            storage_path: std::env::var("STORAGE_PATH")
                .unwrap_or_else(|_| "./data/objects".to_string()),
            app_env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            access_denied_forbidden: access_denied_status == 403,
            body_limit_bytes: env_or("BODY_LIMIT_BYTES", 1024 * 1024)?,
            batch,
        })
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }
}

/// Read and parse an environment variable, falling back to `default` when unset
fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value for {}: {} ({})", key, raw, e)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// Configuration used by in-process tests: memory store, no throttling delay
    pub fn for_tests() -> Self {
        Config {
            server_name: "Stowage".to_string(),
            rest_port: 0,
            jwt_secret: "test_secret".to_string(),
            storage_backend: StorageBackend::Memory,
            storage_path: String::new(),
            app_env: "development".to_string(),
            access_denied_forbidden: false,
            body_limit_bytes: 1024 * 1024,
            batch: BatchSettings {
                delete_batch_delay: Duration::ZERO,
                move_batch_delay: Duration::ZERO,
                ..BatchSettings::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!("local".parse::<StorageBackend>().unwrap(), StorageBackend::Local);
        assert_eq!("MEMORY".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("s3".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_default_batches() {
        let batch = BatchSettings::default();
        assert_eq!(batch.delete_batch_size, 50);
        assert_eq!(batch.move_batch_size, 20);
        assert_eq!(batch.delete_batch_delay, Duration::from_millis(100));
        assert_eq!(batch.move_batch_delay, Duration::from_millis(200));
    }
}
