//! Capabilities a content client offers to the snapshot engine.
//!
//! Post collections are exposed as pull streams: lazy, unbounded, one-directional
//! and not restartable. Each pull may fail, and a failed stream is not resumed.

use crate::{CommentNode, CoreError, MoreComments, Post};
use async_trait::async_trait;

#[async_trait]
pub trait PostStream: Send {
    /// Pull the next post, or `None` once the source is exhausted.
    async fn next_post(&mut self) -> Result<Option<Post>, CoreError>;
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// The author's full submission history, newest first.
    fn posts_by_author<'a>(&'a self, author: &str) -> Box<dyn PostStream + 'a>;

    /// A collection's posts, strictly newest first.
    fn posts_in_collection_new<'a>(&'a self, collection: &str) -> Box<dyn PostStream + 'a>;

    /// The post's comment forest, placeholders left collapsed.
    async fn comments_of(&self, post_id: &str) -> Result<Vec<CommentNode>, CoreError>;

    /// The subtree that replaces one placeholder of the post's forest.
    /// The returned nodes may contain further placeholders.
    async fn expand_more(
        &self,
        post_id: &str,
        more: &MoreComments,
    ) -> Result<Vec<CommentNode>, CoreError>;
}
