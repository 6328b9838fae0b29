use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagStackError {
    #[error("Stack '{name}' is closed")]
    Closed { name: String },
    #[error("Cursor protocol violated: {0}")]
    CursorProtocol(String),
    #[error("Item {order} was already removed")]
    AlreadyRemoved { order: u64 },
    #[error("Construction error: {0}")]
    Construction(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, TagStackError>;

// Helper conversions
impl From<config::ConfigError> for TagStackError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
