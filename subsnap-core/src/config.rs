use crate::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Looked up in the working directory when no explicit path is given.
pub const CONFIG_FILE_NAME: &str = "subsnap.toml";

pub const ENV_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
pub const ENV_USERNAME: &str = "REDDIT_USERNAME";
pub const ENV_PASSWORD: &str = "REDDIT_PASSWORD";
pub const ENV_USER_AGENT: &str = "REDDIT_USER_AGENT";

/// Largest page the listing endpoints will return.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub reddit: RedditCredentials,
    pub harvest: HarvestSettings,
}

/// Credentials of a Reddit "script" application.
#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
}

impl fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HarvestSettings {
    /// Items requested per listing page.
    pub page_size: u32,
    pub request_timeout_secs: u64,
    /// Write collected posts to `<output>.partial` when post selection fails.
    pub save_partial: bool,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            request_timeout_secs: 30,
            save_partial: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    reddit: FileCredentials,
    #[serde(default)]
    harvest: HarvestSettings,
}

#[derive(Debug, Default, Deserialize)]
struct FileCredentials {
    client_id: Option<String>,
    client_secret: Option<String>,
    username: Option<String>,
    password: Option<String>,
    user_agent: Option<String>,
}

impl AppConfig {
    /// Load from `path` (or `subsnap.toml` if present) and overlay the
    /// `REDDIT_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let contents = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound {
                        path: path.display().to_string(),
                    });
                }
                Some(read_config_file(path)?)
            }
            None => {
                let default_path = Path::new(CONFIG_FILE_NAME);
                if default_path.exists() {
                    Some(read_config_file(default_path)?)
                } else {
                    None
                }
            }
        };

        Self::from_sources(contents.as_deref(), |name| std::env::var(name).ok())
    }

    /// Build from optional TOML text and an environment lookup. Environment
    /// values win over the file.
    pub fn from_sources<F>(toml_text: Option<&str>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: FileConfig = match toml_text {
            Some(text) => toml::from_str(text)?,
            None => FileConfig::default(),
        };

        let lookup = |var: &str, from_file: Option<String>| {
            env(var)
                .filter(|v| !v.trim().is_empty())
                .or(from_file.filter(|v| !v.trim().is_empty()))
        };
        let require = |var: &str, from_file: Option<String>| {
            lookup(var, from_file).ok_or_else(|| ConfigError::MissingEnvironmentVariable {
                var_name: var.to_string(),
            })
        };

        let FileCredentials {
            client_id,
            client_secret,
            username,
            password,
            user_agent,
        } = file.reddit;

        let client_id = require(ENV_CLIENT_ID, client_id)?;
        let client_secret = require(ENV_CLIENT_SECRET, client_secret)?;
        let username = require(ENV_USERNAME, username)?;
        let password = require(ENV_PASSWORD, password)?;
        let user_agent = lookup(ENV_USER_AGENT, user_agent).unwrap_or_else(|| {
            format!("subsnap/{} (by /u/{})", env!("CARGO_PKG_VERSION"), username)
        });

        let config = Self {
            reddit: RedditCredentials {
                client_id,
                client_secret,
                username,
                password,
                user_agent,
            },
            harvest: file.harvest,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.harvest.page_size == 0 || self.harvest.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "harvest.page_size".to_string(),
                value: self.harvest.page_size.to_string(),
            });
        }
        if self.harvest.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "harvest.request_timeout_secs".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.display().to_string(),
        source,
    })
}
