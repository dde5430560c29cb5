//! Wire format of comment forests and its conversion into [`CommentNode`]s.

use crate::api::{absolute_permalink, normalize_author};
use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};
use subsnap_core::{Comment, CommentNode, MoreComments, ThreadedComment};

/// Most ids one `morechildren` call accepts.
pub const MORE_CHILDREN_BATCH: usize = 100;

/// A thing inside a comment listing: a comment or a "load more" stub.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum RedditThing {
    #[serde(rename = "t1")]
    Comment(RedditCommentData),
    #[serde(rename = "more")]
    More(RedditMoreData),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThingListing {
    pub kind: String,
    pub data: ThingListingData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThingListingData {
    #[serde(default)]
    pub children: Vec<RedditThing>,
    #[serde(default)]
    pub after: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditCommentData {
    pub id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub parent_id: String,
    /// An empty string when there are no replies, a listing otherwise.
    #[serde(default, deserialize_with = "deserialize_replies")]
    pub replies: Vec<RedditThing>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditMoreData {
    pub id: String,
    #[serde(default)]
    pub parent_id: String,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub children: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct MoreChildrenResponse {
    pub json: MoreChildrenBody,
}

#[derive(Debug, Deserialize)]
pub struct MoreChildrenBody {
    #[serde(default)]
    pub errors: Vec<serde_json::Value>,
    #[serde(default)]
    pub data: Option<MoreChildrenData>,
}

#[derive(Debug, Deserialize)]
pub struct MoreChildrenData {
    #[serde(default)]
    pub things: Vec<RedditThing>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RepliesField {
    Listing(ThingListing),
    Empty(String),
}

fn deserialize_replies<'de, D>(deserializer: D) -> Result<Vec<RedditThing>, D::Error>
where
    D: Deserializer<'de>,
{
    let field = Option::<RepliesField>::deserialize(deserializer)?;
    Ok(match field {
        Some(RepliesField::Listing(listing)) => listing.data.children,
        Some(RepliesField::Empty(_)) | None => Vec::new(),
    })
}

impl RedditCommentData {
    pub fn fullname(&self) -> String {
        format!("t1_{}", self.id)
    }

    fn into_threaded(self) -> ThreadedComment {
        let replies = self.replies.into_iter().map(RedditThing::into_node).collect();
        ThreadedComment {
            comment: Comment {
                id: self.id,
                author: normalize_author(self.author),
                body: self.body,
                score: self.score,
                created_utc: self.created_utc,
                permalink: absolute_permalink(&self.permalink),
            },
            replies,
        }
    }
}

impl From<RedditMoreData> for MoreComments {
    fn from(more: RedditMoreData) -> Self {
        Self {
            id: more.id,
            parent_id: more.parent_id,
            count: more.count,
            children: more.children,
        }
    }
}

impl RedditThing {
    pub fn parent_id(&self) -> &str {
        match self {
            RedditThing::Comment(comment) => &comment.parent_id,
            RedditThing::More(more) => &more.parent_id,
        }
    }

    /// Convert, keeping any replies nested inline.
    pub fn into_node(self) -> CommentNode {
        match self {
            RedditThing::Comment(comment) => CommentNode::Comment(comment.into_threaded()),
            RedditThing::More(more) => CommentNode::More(more.into()),
        }
    }
}

/// Rebuild the subtree a `morechildren` call describes.
///
/// The endpoint returns things flat, each pointing at its parent by fullname.
/// Things whose parent is not among the returned comments become roots. Order
/// follows the response at every level.
pub fn assemble_more_children(things: Vec<RedditThing>) -> Vec<CommentNode> {
    let returned: HashSet<String> = things
        .iter()
        .filter_map(|thing| match thing {
            RedditThing::Comment(comment) => Some(comment.fullname()),
            RedditThing::More(_) => None,
        })
        .collect();

    let mut children_of: HashMap<String, Vec<usize>> = HashMap::new();
    let mut roots = Vec::new();
    for (index, thing) in things.iter().enumerate() {
        let parent = thing.parent_id();
        if returned.contains(parent) {
            children_of.entry(parent.to_string()).or_default().push(index);
        } else {
            roots.push(index);
        }
    }

    let mut slots: Vec<Option<RedditThing>> = things.into_iter().map(Some).collect();
    roots
        .into_iter()
        .filter_map(|index| build_node(index, &mut slots, &children_of))
        .collect()
}

fn build_node(
    index: usize,
    slots: &mut [Option<RedditThing>],
    children_of: &HashMap<String, Vec<usize>>,
) -> Option<CommentNode> {
    match slots.get_mut(index)?.take()? {
        RedditThing::More(more) => Some(CommentNode::More(more.into())),
        RedditThing::Comment(comment) => {
            let fullname = comment.fullname();
            let mut threaded = comment.into_threaded();
            if let Some(indices) = children_of.get(&fullname) {
                threaded.replies.extend(
                    indices
                        .iter()
                        .filter_map(|&child| build_node(child, slots, children_of)),
                );
            }
            Some(CommentNode::Comment(threaded))
        }
    }
}

/// The ids of a placeholder in request-sized groups.
pub fn more_children_batches(children: &[String]) -> std::slice::Chunks<'_, String> {
    children.chunks(MORE_CHILDREN_BATCH)
}

/// Rebuild the subtree from every batch response, in request order. A thing
/// may point at a parent that came back in an earlier batch.
pub fn assemble_batches(pages: Vec<Vec<RedditThing>>) -> Vec<CommentNode> {
    assemble_more_children(pages.into_iter().flatten().collect())
}

/// Id of the comment a continue-thread link hangs under. Links directly
/// under the post have none.
pub fn continue_thread_parent(more: &MoreComments) -> Option<&str> {
    more.parent_id.strip_prefix("t1_")
}

/// The replies of `parent_fullname` out of a single-thread listing.
pub fn continue_thread_replies(things: Vec<RedditThing>, parent_fullname: &str) -> Vec<CommentNode> {
    let comments = things.into_iter().filter_map(|thing| match thing {
        RedditThing::Comment(comment) => Some(comment),
        RedditThing::More(_) => None,
    });

    let mut first = None;
    for comment in comments {
        if comment.fullname() == parent_fullname {
            return comment.into_threaded().replies;
        }
        if first.is_none() {
            first = Some(comment);
        }
    }

    first
        .map(|comment| comment.into_threaded().replies)
        .unwrap_or_default()
}
