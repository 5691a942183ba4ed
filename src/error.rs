//! Top-level error types for HubCommander.

use std::sync::Arc;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Github(#[from] GithubError),

    #[error(transparent)]
    Travis(#[from] TravisError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error("command argument `{0}` was not parsed")]
    MissingArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Status code of a failed GitHub call, if that is what this error is.
    pub fn github_status(&self) -> Option<u16> {
        match self {
            Error::Github(error) => error.status(),
            _ => None,
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config from {path}: {source}")]
    Load {
        path: String,
        source: Arc<std::io::Error>,
    },

    #[error("failed to parse config from {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("missing required credential: {0}")]
    MissingCredential(String),

    #[error("command {command} references unknown auth plugin `{plugin}`")]
    UnknownAuthPlugin { command: String, plugin: String },
}

/// Errors talking to the GitHub REST API.
#[derive(Debug, thiserror::Error)]
pub enum GithubError {
    #[error("An error was encountered communicating with GitHub ({operation}): Status Code: {status}")]
    UnexpectedStatus { operation: &'static str, status: u16 },

    #[error("github request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid github authorization header")]
    InvalidToken,

    #[error("`{0}` cannot be used as a github path segment")]
    InvalidPathSegment(String),
}

impl GithubError {
    /// The HTTP status GitHub returned, if the failure was a status mismatch.
    pub fn status(&self) -> Option<u16> {
        match self {
            GithubError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors talking to the Travis CI v3 API.
#[derive(Debug, thiserror::Error)]
pub enum TravisError {
    #[error("{operation} Status Code: {status}")]
    UnexpectedStatus { operation: &'static str, status: u16 },

    #[error("Travis CI was still syncing the {user} account after {polls} checks")]
    SyncTimedOut { user: String, polls: u32 },

    #[error("no Travis CI credentials are configured for the {0} endpoint")]
    MissingCredentials(&'static str),

    #[error("travis request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Authentication plugin errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("must provide DUO_* secrets to enable Duo authentication")]
    NoSecretsProvided,

    #[error("{0}")]
    InvalidResponse(u16),

    #[error("user cannot be authenticated by Duo")]
    CannotAuthenticate,

    #[error("duo request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Chat platform errors.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("failed to look up chat user {user_id}: {reason}")]
    UserLookup { user_id: String, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A user-supplied argument had a value the command cannot accept.
///
/// Rendered back to the caller with [`UsageError::format_proper_usage`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid argument passed for `{arg_type}`")]
pub struct UsageError {
    pub arg_type: String,
    pub proper_values: String,
}

impl UsageError {
    pub fn new(arg_type: impl Into<String>, proper_values: impl Into<String>) -> Self {
        Self {
            arg_type: arg_type.into(),
            proper_values: proper_values.into(),
        }
    }

    pub fn format_proper_usage(&self, user: &str) -> String {
        format!(
            "@{user}: Invalid argument passed for `{}`.\n\n{}",
            self.arg_type, self.proper_values
        )
    }
}

/// Failure raised by an argument validator.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_error_mentions_user_and_argument() {
        let error = UsageError::new("toggle", "Acceptable values are: `on, off`");
        assert_eq!(
            error.format_proper_usage("hcommander"),
            "@hcommander: Invalid argument passed for `toggle`.\n\nAcceptable values are: `on, off`"
        );
    }

    #[test]
    fn github_status_is_exposed() {
        let error = GithubError::UnexpectedStatus {
            operation: "delete repo",
            status: 403,
        };
        assert_eq!(error.status(), Some(403));
        assert!(error.to_string().contains("Status Code: 403"));
    }
}
