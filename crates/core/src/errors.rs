use std::path::PathBuf;

/// Result type alias for taskprobe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for taskprobe operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Remote tracker failures: unreachable endpoint, rejected
    /// authentication, or an expired request timeout. Fatal to the walker
    /// run that observed it.
    #[error("fetch from '{endpoint}' failed: {message}")]
    Fetch { endpoint: String, message: String },

    /// Cache file I/O failures
    #[error("cache {operation} failed for '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// No cache entry exists for the requested key. A normal empty state
    /// for readers, not a system failure.
    #[error("no cache entry for key '{key}'")]
    NotFound { key: String },

    /// The entry file exists but does not hold a valid task record
    #[error("corrupt cache entry at '{}': {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// Helper methods for creating errors with context
impl Error {
    /// Create a fetch error
    #[must_use]
    pub fn fetch(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Fetch {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a cache I/O error with context
    #[must_use]
    pub fn io(
        path: impl Into<PathBuf>,
        operation: &'static str,
        source: std::io::Error,
    ) -> Self {
        Error::Io {
            path: path.into(),
            operation,
            source,
        }
    }

    /// Create a not-found error for a cache key
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Error::NotFound { key: key.into() }
    }

    /// Create a decode error for a corrupt cache entry
    #[must_use]
    pub fn decode(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Error::Decode {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is the normal "no entry yet" state. Readers must
    /// treat it differently from a corrupt or unreadable entry.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinguishable() {
        let absent = Error::not_found("policy-1");
        assert!(absent.is_not_found());

        let bad_json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let corrupt = Error::decode("/cache/byPolicy/policy-1.json", bad_json);
        assert!(!corrupt.is_not_found());
    }

    #[test]
    fn display_includes_context() {
        let err = Error::fetch("api/task_manager/v2/tasks", "status 503");
        assert_eq!(
            err.to_string(),
            "fetch from 'api/task_manager/v2/tasks' failed: status 503"
        );
    }
}
