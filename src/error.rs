//! Error taxonomy for the mirror core.
//!
//! Storage, remote-fetch, and git errors are separate enums so callers can
//! tell recoverable conditions (NotFound, lock contention) apart from fatal
//! ones. Driver-specific lock detection happens exactly once, in
//! [`StoreError::classify`]; the rest of the crate matches on the variants.

use thiserror::Error;

/// Errors surfaced by the entity store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A query matched no record. Callers use this to decide
    /// create-if-absent fallbacks.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// The SQLite engine reported the database as busy or locked.
    /// Recovered internally by backoff retry; only reaches callers once
    /// the retry budget is exhausted.
    #[error("database locked")]
    Locked,

    /// Any other storage failure. Aborts the active transaction.
    #[error("storage error during {operation} on {entity}: {message}")]
    Storage {
        entity: &'static str,
        operation: &'static str,
        message: String,
    },
}

impl StoreError {
    /// Classify a driver error into the store taxonomy.
    ///
    /// SQLite busy/locked conditions (result codes 5, 6 and their extended
    /// forms 261, 517) become [`StoreError::Locked`]; everything else is
    /// fatal for the operation and carries entity/operation context.
    pub fn classify(entity: &'static str, operation: &'static str, err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            let code_is_busy = db_err
                .code()
                .map(|c| matches!(c.as_ref(), "5" | "6" | "261" | "517"))
                .unwrap_or(false);
            if code_is_busy || db_err.message().contains("database is locked") {
                return Self::Locked;
            }
        }
        Self::Storage {
            entity,
            operation,
            message: err.to_string(),
        }
    }

    /// True for the condition the store retries transparently.
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked)
    }

    /// True when a query simply found nothing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors from the remote GitLab collaborator.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport-level failure (DNS, connect, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The API answered with a non-success status.
    #[error("api error ({status}) at {endpoint}: {message}")]
    Api {
        status: u16,
        endpoint: String,
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The configured token could not be used as a header value.
    #[error("invalid access token")]
    InvalidToken,
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network("request timed out".to_string())
        } else if err.is_connect() {
            Self::Network("failed to connect to server".to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Errors from the local git collaborator.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to run git: {0}")]
    Spawn(String),

    #[error("git {command} failed: {stderr}")]
    Command { command: String, stderr: String },
}

/// Top-level error for one `sync_milestone` invocation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// One of the three remote fetches failed; nothing was written.
    #[error("fetching {what} failed: {source}")]
    RemoteFetch {
        what: &'static str,
        #[source]
        source: RemoteError,
    },

    /// A persistence step failed; the transaction was rolled back.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A project could not be located locally or on the remote.
    #[error("project {name} not found locally or remotely")]
    UnknownProject { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = StoreError::NotFound { entity: "project" };
        assert_eq!(err.to_string(), "project not found");
        assert!(err.is_not_found());
        assert!(!err.is_locked());
    }

    #[test]
    fn test_storage_display_carries_context() {
        let err = StoreError::Storage {
            entity: "issue",
            operation: "batch_create",
            message: "disk I/O error".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("issue"));
        assert!(text.contains("batch_create"));
        assert!(text.contains("disk I/O error"));
    }

    #[test]
    fn test_classify_non_database_error_is_fatal() {
        let err = StoreError::classify("branch", "save", sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Storage { entity: "branch", .. }));
    }

    #[test]
    fn test_sync_error_names_failed_fetch() {
        let err = SyncError::RemoteFetch {
            what: "merge requests",
            source: RemoteError::Network("no route to host".to_string()),
        };
        assert!(err.to_string().contains("merge requests"));
    }
}
