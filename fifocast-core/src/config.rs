use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub pipe: PipeConfig,
    pub audio: AudioConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    /// Directory served for every path other than the stream endpoint
    /// (player page, worklet scripts).
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
            static_dir: "static".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    /// Named pipe (FIFO) the upstream writer feeds raw PCM into.
    pub path: PathBuf,
    /// Upper bound for a single read; one read becomes one published chunk.
    pub chunk_size: usize,
    /// Delay between open attempts while the pipe path is missing.
    pub open_retry_ms: u64,
    /// Delay before reopening after the writer closes its end.
    pub reopen_backoff_ms: u64,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/config/pcspk_audio/pcspk_out.raw"),
            chunk_size: 4096,
            open_retry_ms: 500,
            reopen_backoff_ms: 10,
        }
    }
}

/// PCM format of the upstream bytes. Only affects the WAV header; the
/// payload is relayed untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 32000,
            channels: 1,
            bits_per_sample: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // Override with environment variables. Nesting uses a doubled
        // underscore so multi-word keys survive the split:
        // FIFOCAST_SERVER__HTTP_PORT, FIFOCAST_PIPE__CHUNK_SIZE, ...
        builder = builder.add_source(
            Environment::with_prefix("FIFOCAST")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Get HTTP address
    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }

    /// Validate the configuration, collecting every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.pipe.chunk_size == 0 {
            errors.push("pipe.chunk_size must be greater than 0".to_string());
        }
        if self.audio.sample_rate == 0 {
            errors.push("audio.sample_rate must be greater than 0".to_string());
        }
        if self.audio.channels == 0 {
            errors.push("audio.channels must be greater than 0".to_string());
        }
        if !matches!(self.audio.bits_per_sample, 8 | 16 | 24 | 32) {
            errors.push(format!(
                "audio.bits_per_sample must be 8, 16, 24 or 32, got {}",
                self.audio.bits_per_sample
            ));
        }
        if self.server.http_port == 0 {
            errors.push("server.http_port must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
