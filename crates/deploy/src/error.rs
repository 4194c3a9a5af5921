//! Error taxonomy for planning runs.

use std::path::{Path, PathBuf};

/// A planning run failure.
///
/// Every failure is deterministic: the only recovery is to fix the input and run again.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Malformed or inconsistent input.
    #[error("invalid configuration for `{field}`: {reason}")]
    Configuration {
        /// The input that was rejected.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
    /// A file that could not be read, copied, created or renamed.
    #[error("resource error for {subject} at {}: {source}", path.display())]
    Resource {
        /// The node or artifact the file belongs to.
        subject: String,
        /// The offending path.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PlanError {
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn resource(subject: impl Into<String>, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Resource {
            subject: subject.into(),
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    pub fn is_resource(&self) -> bool {
        matches!(self, Self::Resource { .. })
    }
}

/// Result alias used across the planner.
pub type PlanResult<T> = std::result::Result<T, PlanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_message_names_field() {
        let err = PlanError::config("hosts", "host pool is empty");
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "invalid configuration for `hosts`: host pool is empty"
        );
    }

    #[test]
    fn test_resource_message_names_subject_and_path() {
        let err = PlanError::resource(
            "node_3",
            "accounts/account3",
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        );
        assert!(err.is_resource());
        let msg = err.to_string();
        assert!(msg.contains("node_3"));
        assert!(msg.contains("accounts/account3"));
    }
}
