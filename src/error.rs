use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Record database failure
    #[error("record store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Session history log failure
    #[error("history log error: {0}")]
    History(#[from] csv::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// No usable location for application state
    #[error("could not resolve a state directory for {0}")]
    NoStateDir(&'static str),
}
