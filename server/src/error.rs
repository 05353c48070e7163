#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidVar {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("invalid server configuration: {0}")]
    Invalid(String),
}
