use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad column layout, empty rule set, etc.).
    ConfigValidation(String),
    /// Batch date string is not YYYY-MM-DD.
    DateParse { value: String },
    /// Storage-layer failure (insert, query, transaction).
    Storage(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::DateParse { value } => {
                write!(f, "cannot parse date '{value}' (expected YYYY-MM-DD)")
            }
            Self::Storage(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
