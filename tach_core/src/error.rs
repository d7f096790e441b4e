use thiserror::Error;

#[derive(Error, Debug)]
pub enum TachError {
    #[error("Missing configuration options for {}: {}", .label, .missing.join(", "))]
    MissingOptions { label: String, missing: Vec<String> },

    #[error("Invalid configuration for {label}: {reason}")]
    InvalidConfig { label: String, reason: String },

    #[error("Could not build statistic '{name}': {reason}")]
    Statistic { name: String, reason: String },

    #[error("Could not build notifier driver '{name}': {reason}")]
    Driver { name: String, reason: String },

    #[error("Could not parse {origin}: {reason}")]
    Parse { origin: String, reason: String },

    #[error("Could not load {path}: {cause}")]
    Resolution { path: String, cause: String },

    #[error("Cannot invoke {path}.{member}: {reason}")]
    Invocation {
        path: String,
        member: String,
        reason: String,
    },

    #[error("Error writing to server {endpoint}: {source}")]
    Delivery {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TachError {
    pub fn resolution(path: impl Into<String>, cause: impl ToString) -> Self {
        Self::Resolution {
            path: path.into(),
            cause: cause.to_string(),
        }
    }

    pub fn invalid(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            label: label.into(),
            reason: reason.into(),
        }
    }

    /// Malformed or incomplete declarative input.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TachError::MissingOptions { .. }
                | TachError::InvalidConfig { .. }
                | TachError::Statistic { .. }
                | TachError::Driver { .. }
                | TachError::Parse { .. }
        )
    }

    pub fn is_resolution(&self) -> bool {
        matches!(self, TachError::Resolution { .. })
    }
}

pub type Result<T> = std::result::Result<T, TachError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_options_lists_every_key() {
        let err = TachError::MissingOptions {
            label: "nova.api".to_string(),
            missing: vec!["module".to_string(), "metric".to_string()],
        };

        assert_eq!(
            err.to_string(),
            "Missing configuration options for nova.api: module, metric"
        );
        assert!(err.is_configuration());
        assert!(!err.is_resolution());
    }

    #[test]
    fn test_resolution_keeps_path_and_cause() {
        let err = TachError::resolution("app.models.User", "no module named 'app'");

        assert_eq!(
            err.to_string(),
            "Could not load app.models.User: no module named 'app'"
        );
        assert!(err.is_resolution());
    }
}
