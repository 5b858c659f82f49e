use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid config value for {key}: {value}")]
    InvalidConfig { key: String, value: String },

    #[error("Currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },
}
