use crate::api::{PageRequest, RedditListing, RedditPostData};
use crate::RedditClient;
use async_trait::async_trait;
use std::collections::VecDeque;
use subsnap_core::{CoreError, Post, PostStream};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ListingSource {
    UserSubmitted(String),
    SubredditNew(String),
}

/// Pull stream over one paginated listing, following the `after` cursor.
pub struct ListingStream<'a> {
    client: &'a RedditClient,
    source: ListingSource,
    after: Option<String>,
    buffered: VecDeque<Post>,
    exhausted: bool,
    pages_fetched: u32,
}

impl<'a> ListingStream<'a> {
    pub(crate) fn new(client: &'a RedditClient, source: ListingSource) -> Self {
        Self {
            client,
            source,
            after: None,
            buffered: VecDeque::new(),
            exhausted: false,
            pages_fetched: 0,
        }
    }

    async fn fetch_page(&self) -> Result<RedditListing<RedditPostData>, CoreError> {
        let page = PageRequest {
            limit: self.client.page_size(),
            after: self.after.clone(),
        };
        match &self.source {
            ListingSource::UserSubmitted(author) => {
                self.client.user_submissions_page(author, &page).await
            }
            ListingSource::SubredditNew(subreddit) => {
                self.client.subreddit_new_page(subreddit, &page).await
            }
        }
    }

    fn absorb_page(&mut self, listing: RedditListing<RedditPostData>) {
        self.pages_fetched += 1;
        let data = listing.data;
        if data.children.is_empty() || data.after.is_none() {
            self.exhausted = true;
        }
        debug!(
            "Page {} of {:?}: {} posts, next cursor {:?}",
            self.pages_fetched,
            self.source,
            data.children.len(),
            data.after
        );
        self.after = data.after;
        self.buffered
            .extend(data.children.into_iter().map(|child| Post::from(child.data)));
    }
}

#[async_trait]
impl PostStream for ListingStream<'_> {
    async fn next_post(&mut self) -> Result<Option<Post>, CoreError> {
        loop {
            if let Some(post) = self.buffered.pop_front() {
                return Ok(Some(post));
            }
            if self.exhausted {
                return Ok(None);
            }
            let listing = self.fetch_page().await?;
            self.absorb_page(listing);
        }
    }
}
