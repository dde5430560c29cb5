use std::collections::HashMap;
use subsnap_core::{Comment, CoreError, Post, SnapshotDocument, SnapshotMetadata};

/// Accumulates one run's snapshot in discovery order.
#[derive(Debug)]
pub struct Aggregator {
    metadata: SnapshotMetadata,
    posts: Vec<Post>,
    positions: HashMap<String, usize>,
    posts_seen: usize,
    comments_seen: usize,
    comment_failures: Vec<String>,
}

/// What a run produced, complete or not.
#[derive(Debug, Clone, PartialEq)]
pub struct Harvest {
    pub document: SnapshotDocument,
    pub posts_seen: usize,
    pub comments_seen: usize,
    /// Ids of admitted posts whose comments could not be fetched.
    pub comment_failures: Vec<String>,
}

impl Aggregator {
    pub fn new(metadata: SnapshotMetadata) -> Self {
        Self {
            metadata,
            posts: Vec::new(),
            positions: HashMap::new(),
            posts_seen: 0,
            comments_seen: 0,
            comment_failures: Vec::new(),
        }
    }

    pub fn record_post(&mut self, post: Post) {
        self.positions.insert(post.id.clone(), self.posts.len());
        self.posts.push(post);
        self.posts_seen += 1;
    }

    /// Attach `comments` to a post recorded earlier.
    pub fn record_comments(&mut self, post_id: &str, comments: Vec<Comment>) -> Result<(), CoreError> {
        let post = self
            .positions
            .get(post_id)
            .and_then(|&position| self.posts.get_mut(position))
            .ok_or_else(|| CoreError::NotFound {
                resource: format!("post {}", post_id),
            })?;

        self.comments_seen += comments.len();
        post.comments = comments;
        Ok(())
    }

    pub fn record_comment_failure(&mut self, post_id: &str) {
        self.comment_failures.push(post_id.to_string());
    }

    pub fn posts_seen(&self) -> usize {
        self.posts_seen
    }

    pub fn comments_seen(&self) -> usize {
        self.comments_seen
    }

    pub fn finish(self) -> Harvest {
        Harvest {
            document: SnapshotDocument {
                metadata: self.metadata,
                posts: self.posts,
            },
            posts_seen: self.posts_seen,
            comments_seen: self.comments_seen,
            comment_failures: self.comment_failures,
        }
    }
}
