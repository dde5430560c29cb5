use crate::comments::{MoreChildrenResponse, RedditThing, ThingListing};
use crate::rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
use crate::retry::{RetryConfig, RetryExecutor};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use subsnap_core::{CoreError, Post, RedditApiError};
use tracing::{debug, error, info, warn};
use url::Url;

const REDDIT_API_BASE: &str = "https://oauth.reddit.com";
pub const REDDIT_WEB_BASE: &str = "https://www.reddit.com";

/// Marker the API uses in place of a removed account name.
const DELETED_AUTHOR: &str = "[deleted]";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    #[serde(default)]
    pub after: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub author: Option<String>,
    pub subreddit: String,
    #[serde(default)]
    pub url: String,
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: u64,
    #[serde(default)]
    pub upvote_ratio: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditUserData {
    pub id: String,
    pub name: String,
}

/// One page of a listing request.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    pub limit: u32,
    pub after: Option<String>,
}

impl PageRequest {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("limit", self.limit.to_string())];
        if let Some(after) = &self.after {
            params.push(("after", after.clone()));
        }
        params
    }
}

/// Normalize an API author field: absent, null and `[deleted]` all mean
/// the account is gone.
pub(crate) fn normalize_author(author: Option<String>) -> Option<String> {
    author.filter(|name| !name.is_empty() && name != DELETED_AUTHOR)
}

pub(crate) fn absolute_permalink(permalink: &str) -> String {
    if permalink.starts_with("http://") || permalink.starts_with("https://") {
        permalink.to_string()
    } else {
        format!("{}{}", REDDIT_WEB_BASE, permalink)
    }
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    base_url: Url,
    rate_limiter: RateLimiter,
    retry: RetryExecutor,
    user_agent: String,
}

impl RedditApiClient {
    pub fn new(user_agent: String, timeout: Duration) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .build()?;

        let base_url = Url::parse(REDDIT_API_BASE).map_err(|e| CoreError::Internal {
            message: format!("Invalid API base URL: {}", e),
        })?;

        Ok(Self {
            http_client,
            base_url,
            rate_limiter: RateLimiter::new(RateLimitConfig::reddit_oauth()),
            retry: RetryExecutor::new(RetryConfig::reddit()),
            user_agent,
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Issue one request. Non-success statuses are mapped onto
    /// [`RedditApiError`] variants.
    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        query_params: &[(&str, String)],
    ) -> Result<Response, CoreError> {
        let url = self.base_url.join(endpoint).map_err(|e| CoreError::InvalidInput {
            message: format!("Invalid endpoint {}: {}", endpoint, e),
        })?;
        let start_time = Instant::now();

        let permit = self.rate_limiter.acquire_permit().await;
        debug!(
            "Acquired rate limit permit for {} {} after {:?}",
            method, endpoint, permit.queue_wait_time
        );

        let request_builder = self
            .http_client
            .request(method.clone(), url)
            .bearer_auth(access_token)
            .query(&[("raw_json", "1")])
            .query(query_params);

        debug!("Making Reddit API request: {} {}", method, endpoint);
        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for {} {}: {}", method, endpoint, e);
                if e.is_timeout() {
                    return Err(CoreError::RedditApi(RedditApiError::RequestTimeout));
                }
                return Err(CoreError::Network(e));
            }
        };

        let (remaining, reset) = quota_headers(response.headers());
        self.rate_limiter.observe_quota(remaining, reset).await;

        let status = response.status();
        debug!(
            "{} {} answered {} in {:?}",
            method,
            endpoint,
            status,
            start_time.elapsed()
        );

        if status.is_success() {
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);
        Err(status_error(status, response.headers(), endpoint))
    }

    /// GET `endpoint` and decode its JSON body, retrying transient failures.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        access_token: &str,
        query_params: &[(&str, String)],
    ) -> Result<T, CoreError> {
        self.retry
            .execute(endpoint, move || async move {
                let response = self
                    .make_request(Method::GET, endpoint, access_token, query_params)
                    .await?;
                response.json::<T>().await.map_err(|e| {
                    error!("Failed to parse response of {}: {}", endpoint, e);
                    CoreError::RedditApi(RedditApiError::InvalidResponse {
                        details: format!("Failed to parse response of {}", endpoint),
                    })
                })
            })
            .await
    }

    pub async fn get_user_info(&self, access_token: &str) -> Result<RedditUserData, CoreError> {
        let user_data: RedditUserData = self.get_json("/api/v1/me", access_token, &[]).await?;
        debug!("Retrieved user info for: {}", user_data.name);
        Ok(user_data)
    }

    pub async fn get_user_submissions(
        &self,
        access_token: &str,
        username: &str,
        page: &PageRequest,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let endpoint = format!("/user/{}/submitted", username);
        let mut params = page.query();
        params.push(("sort", "new".to_string()));

        let listing: RedditListing<RedditPostData> = self
            .get_json(&endpoint, access_token, &params)
            .await
            .map_err(|e| match e {
                CoreError::NotFound { .. } => CoreError::RedditApi(RedditApiError::UserNotFound {
                    username: username.to_string(),
                }),
                other => other,
            })?;

        info!(
            "Retrieved {} submissions of u/{}",
            listing.data.children.len(),
            username
        );
        Ok(listing)
    }

    pub async fn get_subreddit_new(
        &self,
        access_token: &str,
        subreddit: &str,
        page: &PageRequest,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let endpoint = format!("/r/{}/new", subreddit);
        let params = page.query();

        let listing: RedditListing<RedditPostData> = self
            .get_json(&endpoint, access_token, &params)
            .await
            .map_err(|e| match e {
                CoreError::NotFound { .. } => {
                    CoreError::RedditApi(RedditApiError::SubredditNotFound {
                        subreddit: subreddit.to_string(),
                    })
                }
                other => other,
            })?;

        info!(
            "Retrieved {} posts from r/{}",
            listing.data.children.len(),
            subreddit
        );
        Ok(listing)
    }

    /// The comment forest of a post, exactly as the API nests it.
    pub async fn get_comments(
        &self,
        access_token: &str,
        post_id: &str,
    ) -> Result<Vec<RedditThing>, CoreError> {
        let endpoint = format!("/comments/{}", post_id);
        self.get_comment_listing(&endpoint, access_token, post_id)
            .await
    }

    /// The thread rooted at one comment; the first child is that comment.
    pub async fn get_comment_thread(
        &self,
        access_token: &str,
        post_id: &str,
        comment_id: &str,
    ) -> Result<Vec<RedditThing>, CoreError> {
        let endpoint = format!("/comments/{}/_/{}", post_id, comment_id);
        self.get_comment_listing(&endpoint, access_token, post_id)
            .await
    }

    async fn get_comment_listing(
        &self,
        endpoint: &str,
        access_token: &str,
        post_id: &str,
    ) -> Result<Vec<RedditThing>, CoreError> {
        let (_post, comments): (serde_json::Value, ThingListing) = self
            .get_json(endpoint, access_token, &[])
            .await
            .map_err(|e| match e {
                CoreError::NotFound { .. } => CoreError::RedditApi(RedditApiError::PostNotFound {
                    post_id: post_id.to_string(),
                }),
                other => other,
            })?;

        debug!(
            "Retrieved {} top-level comment nodes from {}",
            comments.data.children.len(),
            endpoint
        );
        Ok(comments.data.children)
    }

    /// Resolve up to [`MORE_CHILDREN_BATCH`](crate::MORE_CHILDREN_BATCH) collapsed
    /// comment ids. The things come back flat, each carrying its `parent_id`.
    pub async fn get_more_children(
        &self,
        access_token: &str,
        link_fullname: &str,
        children: &[String],
    ) -> Result<Vec<RedditThing>, CoreError> {
        let params = [
            ("api_type", "json".to_string()),
            ("link_id", link_fullname.to_string()),
            ("children", children.join(",")),
            ("limit_children", "false".to_string()),
        ];

        let response: MoreChildrenResponse = self
            .get_json("/api/morechildren", access_token, &params)
            .await?;

        if !response.json.errors.is_empty() {
            warn!(
                "morechildren for {} reported errors: {:?}",
                link_fullname, response.json.errors
            );
            return Err(CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("morechildren failed for {}", link_fullname),
            }));
        }

        let things = response.json.data.map(|d| d.things).unwrap_or_default();
        debug!(
            "Expanded {} ids into {} things for {}",
            children.len(),
            things.len(),
            link_fullname
        );
        Ok(things)
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        self.rate_limiter.get_rate_limit_status().await
    }
}

fn quota_headers(headers: &HeaderMap) -> (Option<f64>, Option<u64>) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
    };

    let remaining = header("x-ratelimit-remaining").and_then(|v| v.parse::<f64>().ok());
    let reset = header("x-ratelimit-reset").and_then(|v| v.parse::<u64>().ok());
    (remaining, reset)
}

fn status_error(status: StatusCode, headers: &HeaderMap, endpoint: &str) -> CoreError {
    match status.as_u16() {
        429 => {
            let retry_after = headers
                .get("retry-after")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .unwrap_or(60);
            warn!("Rate limited, retry after {} seconds", retry_after);
            CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after })
        }
        401 => CoreError::RedditApi(RedditApiError::InvalidToken),
        403 => CoreError::RedditApi(RedditApiError::Forbidden {
            resource: endpoint.to_string(),
        }),
        404 => CoreError::NotFound {
            resource: endpoint.to_string(),
        },
        code if status.is_server_error() => {
            CoreError::RedditApi(RedditApiError::ServerError { status_code: code })
        }
        code => CoreError::RedditApi(RedditApiError::InvalidResponse {
            details: format!("Unexpected status {} for {}", code, endpoint),
        }),
    }
}

impl From<RedditPostData> for Post {
    fn from(post_data: RedditPostData) -> Self {
        Self {
            id: post_data.id,
            title: post_data.title,
            author: normalize_author(post_data.author),
            url: post_data.url,
            permalink: absolute_permalink(&post_data.permalink),
            created_utc: post_data.created_utc,
            score: post_data.score,
            upvote_ratio: post_data.upvote_ratio,
            selftext: post_data.selftext,
            num_comments: post_data.num_comments,
            comments: Vec::new(),
            subreddit: post_data.subreddit,
        }
    }
}
