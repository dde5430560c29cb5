use crate::config::{ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_PASSWORD, ENV_USERNAME};
use crate::error::*;
use std::fmt::Display;
use tracing::error;

/// Classification shared by every error type of the workspace.
pub trait ErrorExt: Display {
    /// Stable identifier for logs.
    fn error_code(&self) -> &'static str;

    /// Message for the operator, with a hint at the fix where one exists.
    fn user_friendly_message(&self) -> String;
}

impl ErrorExt for CoreError {
    fn error_code(&self) -> &'static str {
        match self {
            CoreError::RedditApi(_) => "REDDIT_API",
            CoreError::Config(_) => "CONFIG",
            CoreError::Io(_) => "IO",
            CoreError::Serialization(_) => "SERIALIZATION",
            CoreError::Network(_) => "NETWORK",
            CoreError::InvalidInput { .. } => "INVALID_INPUT",
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::Internal { .. } => "INTERNAL",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::RedditApi(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(e) => format!("Could not reach Reddit: {}", e),
            CoreError::Io(e) => format!("File system error: {}", e),
            CoreError::NotFound { resource } => format!("Could not find {}", resource),
            other => other.to_string(),
        }
    }
}

impl ErrorExt for RedditApiError {
    fn error_code(&self) -> &'static str {
        match self {
            RedditApiError::AuthenticationFailed { .. } => "REDDIT_AUTH_FAILED",
            RedditApiError::RateLimitExceeded { .. } => "REDDIT_RATE_LIMIT",
            RedditApiError::Forbidden { .. } => "REDDIT_FORBIDDEN",
            RedditApiError::SubredditNotFound { .. } => "REDDIT_SUBREDDIT_NOT_FOUND",
            RedditApiError::PostNotFound { .. } => "REDDIT_POST_NOT_FOUND",
            RedditApiError::UserNotFound { .. } => "REDDIT_USER_NOT_FOUND",
            RedditApiError::InvalidToken => "REDDIT_INVALID_TOKEN",
            RedditApiError::RequestTimeout => "REDDIT_TIMEOUT",
            RedditApiError::InvalidResponse { .. } => "REDDIT_INVALID_RESPONSE",
            RedditApiError::ServerError { .. } => "REDDIT_SERVER_ERROR",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { reason } => format!(
                "Reddit rejected the login ({}). Check {}, {}, {} and {}; the app must be \
                 registered as a 'script' at https://www.reddit.com/prefs/apps",
                reason, ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_USERNAME, ENV_PASSWORD
            ),
            RedditApiError::RateLimitExceeded { retry_after } => {
                format!("Reddit is rate limiting requests; retry in {} seconds.", retry_after)
            }
            RedditApiError::Forbidden { resource } => {
                format!("Access to {} is forbidden (private or quarantined).", resource)
            }
            RedditApiError::SubredditNotFound { subreddit } => {
                format!("Subreddit r/{} does not exist or is banned.", subreddit)
            }
            RedditApiError::UserNotFound { username } => {
                format!("User u/{} does not exist or is suspended.", username)
            }
            RedditApiError::InvalidToken => {
                "Reddit authentication token is invalid or expired.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND",
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE",
            ConfigError::MissingEnvironmentVariable { .. } => "CONFIG_MISSING_ENV_VAR",
            ConfigError::Unreadable { .. } => "CONFIG_UNREADABLE",
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::MissingEnvironmentVariable { var_name } => format!(
                "{} is not set. Export it or add it to the [reddit] table of the config file.",
                var_name
            ),
            ConfigError::InvalidValue { field, value } => {
                format!("'{}' is not a valid value for {}.", value, field)
            }
            other => other.to_string(),
        }
    }
}

impl ErrorExt for SnapshotError {
    fn error_code(&self) -> &'static str {
        match self {
            SnapshotError::Auth(_) => "SNAPSHOT_AUTH",
            SnapshotError::Selection(_) => "SNAPSHOT_SELECTION",
            SnapshotError::CommentFetch { .. } => "SNAPSHOT_COMMENT_FETCH",
            SnapshotError::Validation { .. } => "SNAPSHOT_VALIDATION",
            SnapshotError::Config(_) => "SNAPSHOT_CONFIG",
            SnapshotError::Write { .. } => "SNAPSHOT_WRITE",
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            SnapshotError::Auth(e) => e.user_friendly_message(),
            SnapshotError::Selection(e) => {
                format!("An error occurred while fetching data: {}", e.user_friendly_message())
            }
            SnapshotError::Validation { message } => format!("Error: {}", message),
            SnapshotError::Config(e) => e.user_friendly_message(),
            SnapshotError::Write { path, source } => {
                format!("Could not save data to {}: {}", path, source)
            }
            SnapshotError::CommentFetch { .. } => self.to_string(),
        }
    }
}

/// Logs fatal errors at the process boundary, one line per error.
#[derive(Debug, Default)]
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn report_error<E: ErrorExt>(&self, error: &E) {
        error!(code = error.error_code(), "{}", error.user_friendly_message());
    }
}
