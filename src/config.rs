use crate::error::{Result, SowcastError};
use crate::logic::emitter::DedupPolicy;
use crate::models::Language;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    pub openweathermap: OpenWeatherMapConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    pub twilio: Option<TwilioConfig>,
    pub email: Option<EmailConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    pub postgres: Option<PostgresConfig>,
}

#[derive(Clone, Deserialize, Serialize)]
pub struct PostgresConfig {
    pub host: String,
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    4
}

fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortValue {
        Number(u16),
        Text(String),
    }

    match PortValue::deserialize(deserializer)? {
        PortValue::Number(port) => Ok(port),
        PortValue::Text(value) => value.parse::<u16>().map_err(|_| {
            D::Error::custom(format!(
                "invalid port '{}' - ensure SOWCAST_DB_PORT environment variable is set",
                value
            ))
        }),
    }
}

impl PostgresConfig {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

impl std::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct OpenWeatherMapConfig {
    pub api_key: String,
    #[serde(default = "default_owm_base_url")]
    pub base_url: String,
}

fn default_owm_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".into()
}

impl std::fmt::Debug for OpenWeatherMapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenWeatherMapConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForecastConfig {
    /// Number of 3-hour samples requested for the multi-day outlook
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_sample_count() -> usize {
    24
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            sample_count: default_sample_count(),
            timeout_secs: default_timeout_secs(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ForecastConfig {
    /// Per-request timeout
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }

    /// Bound on a whole forecast fetch: every attempt may use the full
    /// per-request timeout, plus the backoff between attempts
    pub fn overall_timeout(&self) -> std::time::Duration {
        let attempts = self.retry.max_attempts.max(1);
        let backoff: std::time::Duration = (1..attempts).map(|a| self.retry.backoff(a)).sum();
        self.timeout() * attempts + backoff
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub dedup: DedupPolicy,
    /// Language of the stored alert text and SMS body
    #[serde(default)]
    pub language: Language,
    #[serde(default = "default_email_subject")]
    pub email_subject: String,
    #[serde(default)]
    pub notify_retry: RetryPolicy,
}

fn default_email_subject() -> String {
    "Sowing advisory / Obavještenje o sjetvi".into()
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            dedup: DedupPolicy::default(),
            language: Language::default(),
            email_subject: default_email_subject(),
            notify_retry: RetryPolicy::default(),
        }
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    #[serde(default = "default_twilio_base_url")]
    pub base_url: String,
}

fn default_twilio_base_url() -> String {
    "https://api.twilio.com/2010-04-01".into()
}

impl std::fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("from_number", &self.from_number)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    /// SMTP submission host, reached with STARTTLS
    pub smtp_host: String,
    #[serde(default = "default_smtp_port", deserialize_with = "deserialize_port")]
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub sender: String,
    #[serde(default = "default_signature")]
    pub signature: String,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_signature() -> String {
    "Sowcast".into()
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("sender", &self.sender)
            .field("signature", &self.signature)
            .finish()
    }
}

impl Config {
    pub fn load(config_override: Option<&PathBuf>) -> Result<Self> {
        let config_path = match config_override {
            Some(p) => p.clone(),
            None => Self::find_config_path()?,
        };

        if !config_path.exists() {
            return Err(SowcastError::Config(format!(
                "Config file not found at {:?}",
                config_path
            )));
        }

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| SowcastError::Config(format!("Failed to read config: {}", e)))?;

        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let content = Self::substitute_env_vars(content)?;

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| SowcastError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.openweathermap.api_key.is_empty() {
            return Err(SowcastError::Config(
                "openweathermap.api_key must not be empty".into(),
            ));
        }
        if self.forecast.sample_count == 0 {
            return Err(SowcastError::Config(
                "forecast.sample_count must be at least 1".into(),
            ));
        }
        if self.forecast.timeout_secs == 0 {
            return Err(SowcastError::Config(
                "forecast.timeout_secs must be at least 1".into(),
            ));
        }
        if self.store.backend == StoreBackend::Postgres && self.store.postgres.is_none() {
            return Err(SowcastError::Config(
                "store.backend is postgres but store.postgres is missing".into(),
            ));
        }
        self.forecast.retry.validate()?;
        self.alerts.notify_retry.validate()?;
        Ok(())
    }

    /// Search for config.yaml in standard locations.
    /// Returns the path of the first found config, or the XDG default path if none found.
    fn find_config_path() -> Result<PathBuf> {
        let local_config = PathBuf::from("config/config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let default_path = dirs::config_dir()
            .ok_or_else(|| SowcastError::Config("Cannot determine config directory".into()))?
            .join("sowcast")
            .join("config.yaml");
        Ok(default_path)
    }

    fn substitute_env_vars(content: &str) -> Result<String> {
        let mut result = content.to_string();

        let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
            .map_err(|e| SowcastError::Config(format!("Bad substitution pattern: {}", e)))?;

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];
            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(placeholder, &value);
            }
        }

        Ok(result)
    }

    pub fn data_dir(data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        // CLI override takes priority
        if let Some(dir) = data_dir_override {
            std::fs::create_dir_all(dir)?;
            return Ok(dir.clone());
        }

        if let Ok(dir) = std::env::var("SOWCAST_DATA_DIR") {
            let p = PathBuf::from(dir);
            std::fs::create_dir_all(&p)?;
            return Ok(p);
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| SowcastError::Config("Cannot determine data directory".into()))?
            .join("sowcast");

        std::fs::create_dir_all(&data_dir)?;
        Ok(data_dir)
    }

    pub fn db_path(data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        Ok(Self::data_dir(data_dir_override)?.join("sowcast.db"))
    }
}
