pub mod api;
pub mod auth;
pub mod comments;
pub mod listing;
pub mod rate_limiter;
pub mod retry;


pub use auth::RedditToken;
pub use comments::MORE_CHILDREN_BATCH;

use api::{PageRequest, RedditApiClient, RedditListing, RedditPostData, RedditUserData};
use async_trait::async_trait;
use comments::{
    assemble_batches, continue_thread_parent, continue_thread_replies, more_children_batches,
    RedditThing,
};
use listing::{ListingSource, ListingStream};
use oauth2::basic::BasicClient;
use rate_limiter::RateLimitStatus;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use subsnap_core::{
    CommentNode, ContentSource, CoreError, HarvestSettings, MoreComments, PostStream,
    RedditApiError, RedditCredentials,
};
use tracing::{debug, info, warn};

/// Reddit client authenticated as a "script" application.
pub struct RedditClient {
    credentials: RedditCredentials,
    oauth: BasicClient,
    token_http: reqwest::Client,
    api: RedditApiClient,
    token: Mutex<Option<RedditToken>>,
    page_size: u32,
}

impl RedditClient {
    pub fn new(
        credentials: RedditCredentials,
        settings: &HarvestSettings,
    ) -> Result<Self, CoreError> {
        let timeout = Duration::from_secs(settings.request_timeout_secs);
        let oauth = auth::build_oauth_client(&credentials)?;
        let token_http = auth::build_token_http(&credentials.user_agent, timeout)?;
        let api = RedditApiClient::new(credentials.user_agent.clone(), timeout)?;

        Ok(Self {
            credentials,
            oauth,
            token_http,
            api,
            token: Mutex::new(None),
            page_size: settings.page_size,
        })
    }

    pub fn get_required_scopes() -> Vec<&'static str> {
        vec!["identity", "read", "history"]
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Obtain a token and confirm it by fetching the authenticated account.
    pub async fn authenticate(&self) -> Result<RedditUserData, CoreError> {
        let token = self.request_token().await?;
        let me = self.api.get_user_info(&token.access_token).await?;
        info!("Authenticated as u/{}", me.name);
        Ok(me)
    }

    pub fn set_token(&self, token: RedditToken) {
        *self.lock_token() = Some(token);
    }

    /// A usable access token, renewed first if it is about to expire.
    pub async fn ensure_authenticated(&self) -> Result<String, CoreError> {
        let current = self.lock_token().clone();
        match current {
            None => Err(CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: "Not authenticated. Call authenticate() first".to_string(),
            })),
            Some(token) if token.expires_within(auth::TOKEN_REFRESH_MARGIN) => {
                info!("Access token expiring, requesting a new one");
                Ok(self.request_token().await?.access_token)
            }
            Some(token) => Ok(token.access_token),
        }
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        self.api.get_rate_limit_status().await
    }

    async fn request_token(&self) -> Result<RedditToken, CoreError> {
        let scopes = Self::get_required_scopes();
        let token = auth::request_password_token(
            &self.oauth,
            &self.token_http,
            &self.credentials,
            &scopes,
        )
        .await?;
        debug!("Token granted with scopes {:?}", token.scope);
        self.set_token(token.clone());
        Ok(token)
    }

    fn lock_token(&self) -> MutexGuard<'_, Option<RedditToken>> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `operation` with the current token. A 401 triggers one fresh
    /// password grant and a single repeat.
    async fn with_token<T, F, Fut>(&self, operation: F) -> Result<T, CoreError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let token = self.ensure_authenticated().await?;
        match operation(token).await {
            Err(CoreError::RedditApi(RedditApiError::InvalidToken)) => {
                warn!("Access token rejected, re-authenticating");
                let token = self.request_token().await?;
                operation(token.access_token).await
            }
            other => other,
        }
    }

    pub(crate) async fn user_submissions_page(
        &self,
        author: &str,
        page: &PageRequest,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        self.with_token(move |token| async move {
            self.api.get_user_submissions(&token, author, page).await
        })
        .await
    }

    pub(crate) async fn subreddit_new_page(
        &self,
        subreddit: &str,
        page: &PageRequest,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        self.with_token(move |token| async move {
            self.api.get_subreddit_new(&token, subreddit, page).await
        })
        .await
    }

    async fn expand_continue_thread(
        &self,
        post_id: &str,
        more: &MoreComments,
    ) -> Result<Vec<CommentNode>, CoreError> {
        let Some(parent) = continue_thread_parent(more) else {
            warn!(
                "Continue-thread link {} of post {} has no parent comment, dropping it",
                more.id, post_id
            );
            return Ok(Vec::new());
        };

        let things = self
            .with_token(move |token| async move {
                self.api.get_comment_thread(&token, post_id, parent).await
            })
            .await?;
        Ok(continue_thread_replies(things, &more.parent_id))
    }
}

#[async_trait]
impl ContentSource for RedditClient {
    fn posts_by_author<'a>(&'a self, author: &str) -> Box<dyn PostStream + 'a> {
        Box::new(ListingStream::new(
            self,
            ListingSource::UserSubmitted(author.to_string()),
        ))
    }

    fn posts_in_collection_new<'a>(&'a self, collection: &str) -> Box<dyn PostStream + 'a> {
        Box::new(ListingStream::new(
            self,
            ListingSource::SubredditNew(collection.to_string()),
        ))
    }

    async fn comments_of(&self, post_id: &str) -> Result<Vec<CommentNode>, CoreError> {
        let things = self
            .with_token(move |token| async move { self.api.get_comments(&token, post_id).await })
            .await?;
        Ok(things.into_iter().map(RedditThing::into_node).collect())
    }

    async fn expand_more(
        &self,
        post_id: &str,
        more: &MoreComments,
    ) -> Result<Vec<CommentNode>, CoreError> {
        if more.is_continue_thread() {
            return self.expand_continue_thread(post_id, more).await;
        }

        let link_fullname = format!("t3_{}", post_id);
        let mut pages = Vec::new();
        for batch in more_children_batches(&more.children) {
            let link = link_fullname.as_str();
            let fetched = self
                .with_token(move |token| async move {
                    self.api.get_more_children(&token, link, batch).await
                })
                .await?;
            pages.push(fetched);
        }

        debug!(
            "Placeholder {} of post {} fetched in {} batches",
            more.id,
            post_id,
            pages.len()
        );
        Ok(assemble_batches(pages))
    }
}
