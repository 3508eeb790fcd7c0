use thiserror::Error;

/// Errors surfaced by the PRISM pipeline.
///
/// Every variant maps to a recovery policy: `NotFound`, `InvalidInput` and
/// `Conflict` are surfaced to the caller with state intact; `Cancelled` is
/// swallowed by the event router; `InvariantViolation` is fatal to the
/// process.
#[derive(Error, Debug)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0} (try `prism index rebuild`)")]
    Conflict(String),

    #[error("external service unavailable: {0}")]
    ExternalUnavailable(String),

    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("cancelled")]
    Cancelled,

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("internal error")]
    Other {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    #[must_use]
    pub fn other(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other {
            source: Box::new(source),
        }
    }

    /// Process exit code for the CLI surface.
    ///
    /// 0 success, 1 general error, 2 configuration missing, 3 external
    /// service unavailable, 4 invariant violation in the store.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigurationMissing(_) => 2,
            Self::ExternalUnavailable(_) => 3,
            Self::InvariantViolation(_) => 4,
            _ => 1,
        }
    }

    /// Whether the event router should report this as a failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::message("boom").exit_code(), 1);
        assert_eq!(Error::not_found("skill x").exit_code(), 1);
        assert_eq!(Error::ConfigurationMissing("api key".into()).exit_code(), 2);
        assert_eq!(Error::ExternalUnavailable("board".into()).exit_code(), 3);
        assert_eq!(Error::InvariantViolation("index lost".into()).exit_code(), 4);
        assert_eq!(Error::Cancelled.exit_code(), 1);
    }

    #[test]
    fn test_conflict_suggests_rebuild() {
        let msg = Error::conflict("index disagrees with disk").to_string();
        assert!(msg.contains("prism index rebuild"));
    }

    #[test]
    fn test_cancelled_is_swallowed() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::message("x").is_cancelled());
    }
}
