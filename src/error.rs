use thiserror::Error;

#[derive(Error, Debug)]
pub enum SowcastError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("External database error: {0}")]
    ExternalDatabase(#[from] sqlx::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Forecast unavailable: {0}")]
    ForecastUnavailable(String),

    #[error("Forecast unusable: {0}")]
    ForecastUnusable(String),

    #[error("Failed to persist alert: {0}")]
    Persistence(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, SowcastError>;
