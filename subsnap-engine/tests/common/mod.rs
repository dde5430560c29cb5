#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use subsnap_core::{
    Comment, CommentNode, ContentSource, CoreError, MoreComments, Post, PostStream,
    RedditApiError, ThreadedComment,
};

pub const DAY: f64 = 86_400.0;

/// In-memory content source that counts how far its stream was pulled.
#[derive(Default)]
pub struct MockSource {
    pub posts: Vec<Post>,
    pub forests: HashMap<String, Vec<CommentNode>>,
    pub failing_posts: HashSet<String>,
    pub pulls: AtomicUsize,
}

impl MockSource {
    pub fn with_posts(posts: Vec<Post>) -> Self {
        Self {
            posts,
            ..Self::default()
        }
    }

    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }
}

struct MockStream<'a> {
    source: &'a MockSource,
    position: usize,
}

#[async_trait]
impl PostStream for MockStream<'_> {
    async fn next_post(&mut self) -> Result<Option<Post>, CoreError> {
        self.source.pulls.fetch_add(1, Ordering::SeqCst);
        let post = self.source.posts.get(self.position).cloned();
        self.position += 1;
        Ok(post)
    }
}

#[async_trait]
impl ContentSource for MockSource {
    fn posts_by_author<'a>(&'a self, _author: &str) -> Box<dyn PostStream + 'a> {
        Box::new(MockStream {
            source: self,
            position: 0,
        })
    }

    fn posts_in_collection_new<'a>(&'a self, _collection: &str) -> Box<dyn PostStream + 'a> {
        Box::new(MockStream {
            source: self,
            position: 0,
        })
    }

    async fn comments_of(&self, post_id: &str) -> Result<Vec<CommentNode>, CoreError> {
        if self.failing_posts.contains(post_id) {
            return Err(CoreError::RedditApi(RedditApiError::ServerError {
                status_code: 502,
            }));
        }
        Ok(self.forests.get(post_id).cloned().unwrap_or_default())
    }

    async fn expand_more(
        &self,
        _post_id: &str,
        _more: &MoreComments,
    ) -> Result<Vec<CommentNode>, CoreError> {
        Ok(Vec::new())
    }
}

pub fn post(id: &str, created_utc: f64) -> Post {
    Post {
        id: id.to_string(),
        title: format!("Post {} about ünïcode", id),
        author: Some("alice".to_string()),
        url: format!("https://example.com/{}", id),
        permalink: format!("https://www.reddit.com/r/selfhosted/comments/{}/x/", id),
        created_utc,
        score: 7,
        upvote_ratio: Some(0.88),
        selftext: "body text".to_string(),
        num_comments: 1,
        comments: Vec::new(),
        subreddit: "selfhosted".to_string(),
    }
}

pub fn comment(id: &str, author: Option<&str>, replies: Vec<CommentNode>) -> CommentNode {
    CommentNode::Comment(ThreadedComment {
        comment: Comment {
            id: id.to_string(),
            author: author.map(str::to_string),
            body: format!("comment {}", id),
            score: 2,
            created_utc: 1700000500.0,
            permalink: format!("https://www.reddit.com/r/selfhosted/comments/p/x/{}/", id),
        },
        replies,
    })
}

/// Strictly decreasing timestamps below `start`.
pub fn decreasing_timestamps(rng: &mut fastrand::Rng, count: usize, start: f64) -> Vec<f64> {
    let mut current = start;
    (0..count)
        .map(|_| {
            current -= 1.0 + rng.f64() * 3.0 * DAY;
            current
        })
        .collect()
}
