use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub store: StoreConfig,
    pub tracing: TracingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Diagnostics go to stdout when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

/// Document store that ingested records are posted to
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://opensearch:9200/logs/_doc".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Export spans over OTLP; when false spans are still sampled but never leave the process
    pub enabled: bool,
    pub service_name: String,
    /// Falls back to the OTEL_EXPORTER_OTLP_* environment variables when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otlp_endpoint: Option<String>,
    pub sampling_ratio: f64,
    pub max_queue_size: usize,
    pub max_export_batch_size: usize,
    pub scheduled_delay_ms: u64,
    pub export_timeout_ms: u64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_name: "telyx-backend".to_string(),
            otlp_endpoint: None,
            sampling_ratio: 0.1,
            max_queue_size: 2048,
            max_export_batch_size: 512,
            scheduled_delay_ms: 5000,
            export_timeout_ms: 10_000,
        }
    }
}

/// Load configuration from defaults, an optional TOML file and `TELYX_` environment variables
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix("TELYX")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    let ratio = cfg.tracing.sampling_ratio;
    if !(0.0..=1.0).contains(&ratio) {
        anyhow::bail!("Sampling ratio must be within [0, 1], got {}", ratio);
    }

    if cfg.tracing.service_name.is_empty() {
        anyhow::bail!("Tracing service name cannot be empty");
    }

    if cfg.tracing.max_queue_size == 0 || cfg.tracing.max_export_batch_size == 0 {
        anyhow::bail!("Span queue and batch sizes must be greater than zero");
    }

    if cfg.tracing.max_export_batch_size > cfg.tracing.max_queue_size {
        anyhow::bail!(
            "Span batch size ({}) cannot exceed the queue size ({})",
            cfg.tracing.max_export_batch_size,
            cfg.tracing.max_queue_size
        );
    }

    let url = reqwest::Url::parse(&cfg.store.url)
        .map_err(|e| anyhow::anyhow!("Invalid store URL '{}': {}", cfg.store.url, e))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("Store URL must use http or https, got '{}'", url.scheme());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        assert!(validate_config(&cfg).is_ok());
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.tracing.sampling_ratio, 0.1);
        assert_eq!(cfg.store.url, "http://opensearch:9200/logs/_doc");
    }

    #[test]
    fn test_validate_config_rejects_sampling_ratio() {
        let mut cfg = Config::default();
        cfg.tracing.sampling_ratio = 1.5;

        let result = validate_config(&cfg);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Sampling ratio"));
    }

    #[test]
    fn test_validate_config_rejects_store_url() {
        let mut cfg = Config::default();
        cfg.store.url = "not a url".to_string();
        assert!(validate_config(&cfg).is_err());

        cfg.store.url = "ftp://opensearch/logs".to_string();
        let result = validate_config(&cfg);
        assert!(result.unwrap_err().to_string().contains("http or https"));
    }

    #[test]
    fn test_validate_config_rejects_batch_larger_than_queue() {
        let mut cfg = Config::default();
        cfg.tracing.max_queue_size = 16;
        cfg.tracing.max_export_batch_size = 32;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn test_load_config_without_file_uses_defaults() {
        let cfg = load_config(Path::new("definitely-missing-telyx-config.toml")).unwrap();
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.logging.format, LogFormat::Text);
        assert_eq!(cfg.tracing.service_name, "telyx-backend");
    }
}
