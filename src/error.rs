use thiserror::Error;

/// The error taxonomy for the whole crate.
///
/// Construction-time errors (`Config`, `Validation`) are fatal to the run
/// that raised them; integration-time errors (`Integration`) terminate only
/// the sim id that raised them.
#[derive(Debug, Error)]
pub enum EpiError {
    #[error("config error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("integration error at day {day}: {message}")]
    Integration { day: usize, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, EpiError>;
