use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// How a missing or deleted author is written into a snapshot.
pub const MISSING_AUTHOR: &str = "None";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    #[serde(serialize_with = "author_or_sentinel")]
    pub author: Option<String>,
    pub url: String,
    pub permalink: String,
    pub created_utc: f64,
    pub score: i64,
    pub upvote_ratio: Option<f64>,
    pub selftext: String,
    pub num_comments: u64,
    pub comments: Vec<Comment>,
    /// Subreddit the post was submitted to; used for filtering only.
    #[serde(skip)]
    pub subreddit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub id: String,
    #[serde(serialize_with = "author_or_sentinel")]
    pub author: Option<String>,
    pub body: String,
    pub score: i64,
    pub created_utc: f64,
    pub permalink: String,
}

/// One node of a post's comment forest as the API delivers it.
#[derive(Debug, Clone, PartialEq)]
pub enum CommentNode {
    Comment(ThreadedComment),
    More(MoreComments),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadedComment {
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

/// A collapsed "load more comments" placeholder.
///
/// An empty `children` list is a "continue this thread" link: the hidden
/// replies hang below `parent_id` and are only reachable by loading that
/// comment's own thread.
#[derive(Debug, Clone, PartialEq)]
pub struct MoreComments {
    pub id: String,
    /// Fullname of the parent thing (`t1_...` comment or `t3_...` post).
    pub parent_id: String,
    pub count: u32,
    pub children: Vec<String>,
}

impl MoreComments {
    pub fn is_continue_thread(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotDocument {
    #[serde(flatten)]
    pub metadata: SnapshotMetadata,
    pub posts: Vec<Post>,
}

/// Top-level keys of a snapshot. Author snapshots lead with `username`,
/// the others with `subreddit`.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotMetadata {
    pub subreddit: String,
    pub parameters: SnapshotParameters,
    pub download_time: String,
}

/// Mode-specific run parameters recorded alongside the posts.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotParameters {
    Author {
        username: String,
    },
    Window {
        time_period_days: u32,
    },
    DateRange {
        start_date: String,
        end_date: String,
        start_timestamp_utc: f64,
        end_timestamp_utc: f64,
    },
}

impl Serialize for SnapshotMetadata {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        match &self.parameters {
            SnapshotParameters::Author { username } => {
                map.serialize_entry("username", username)?;
                map.serialize_entry("subreddit", &self.subreddit)?;
            }
            SnapshotParameters::Window { time_period_days } => {
                map.serialize_entry("subreddit", &self.subreddit)?;
                map.serialize_entry("time_period_days", time_period_days)?;
            }
            SnapshotParameters::DateRange {
                start_date,
                end_date,
                start_timestamp_utc,
                end_timestamp_utc,
            } => {
                map.serialize_entry("subreddit", &self.subreddit)?;
                map.serialize_entry("start_date", start_date)?;
                map.serialize_entry("end_date", end_date)?;
                map.serialize_entry("start_timestamp_utc", start_timestamp_utc)?;
                map.serialize_entry("end_timestamp_utc", end_timestamp_utc)?;
            }
        }
        map.serialize_entry("download_time", &self.download_time)?;
        map.end()
    }
}

fn author_or_sentinel<S>(author: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(author.as_deref().unwrap_or(MISSING_AUTHOR))
}
