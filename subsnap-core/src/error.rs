use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Reddit API error: {0}")]
    RedditApi(#[from] RedditApiError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Error, Debug, Clone)]
pub enum RedditApiError {
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Forbidden access to resource: {resource}")]
    Forbidden { resource: String },

    #[error("Subreddit not found: {subreddit}")]
    SubredditNotFound { subreddit: String },

    #[error("Post not found: {post_id}")]
    PostNotFound { post_id: String },

    #[error("User not found: {username}")]
    UserNotFound { username: String },

    #[error("Invalid OAuth token")]
    InvalidToken,

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Environment variable not set: {var_name}")]
    MissingEnvironmentVariable { var_name: String },

    #[error("Could not read configuration file {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Run-level failures of a snapshot run.
///
/// Only [`SnapshotError::CommentFetch`] is recoverable: the run driver absorbs it
/// and keeps the post. Every other variant ends the run.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Authentication failed: {0}")]
    Auth(#[source] CoreError),

    #[error("Post selection failed: {0}")]
    Selection(#[source] CoreError),

    #[error("Error fetching comments for post {post_id}: {source}")]
    CommentFetch {
        post_id: String,
        #[source]
        source: CoreError,
    },

    #[error("Invalid input: {message}")]
    Validation { message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to write snapshot to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: CoreError,
    },
}

impl SnapshotError {
    pub fn validation(message: impl Into<String>) -> Self {
        SnapshotError::Validation {
            message: message.into(),
        }
    }

    /// True for the one failure kind a run isolates instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SnapshotError::CommentFetch { .. })
    }
}
