#[cfg(test)]
mod tests {
    use crate::{fetch_flat_comments, Harvester, PostSelector};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use subsnap_core::{
        Comment, CommentNode, ContentSource, CoreError, MoreComments, Post, PostStream,
        RedditApiError, SnapshotError, ThreadedComment,
    };

    #[derive(Default)]
    struct MockSource {
        posts: Vec<Post>,
        forests: HashMap<String, Vec<CommentNode>>,
        expansions: HashMap<String, Vec<CommentNode>>,
        failing_posts: HashSet<String>,
        failing_placeholders: HashSet<String>,
        fail_stream_at: Option<usize>,
        pulls: AtomicUsize,
        expansions_requested: AtomicUsize,
    }

    struct MockStream<'a> {
        source: &'a MockSource,
        position: usize,
    }

    #[async_trait]
    impl PostStream for MockStream<'_> {
        async fn next_post(&mut self) -> Result<Option<Post>, CoreError> {
            self.source.pulls.fetch_add(1, Ordering::SeqCst);
            if self.source.fail_stream_at == Some(self.position) {
                return Err(CoreError::RedditApi(RedditApiError::ServerError {
                    status_code: 503,
                }));
            }
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
                return Err(CoreError::RedditApi(RedditApiError::RequestTimeout));
            }
            Ok(self.forests.get(post_id).cloned().unwrap_or_default())
        }

        async fn expand_more(
            &self,
            _post_id: &str,
            more: &MoreComments,
        ) -> Result<Vec<CommentNode>, CoreError> {
            self.expansions_requested.fetch_add(1, Ordering::SeqCst);
            if self.failing_placeholders.contains(&more.id) {
                return Err(CoreError::RedditApi(RedditApiError::ServerError {
                    status_code: 500,
                }));
            }
            Ok(self.expansions.get(&more.id).cloned().unwrap_or_default())
        }
    }

    fn comment(id: &str, replies: Vec<CommentNode>) -> CommentNode {
        CommentNode::Comment(ThreadedComment {
            comment: Comment {
                id: id.to_string(),
                author: Some("bob".to_string()),
                body: format!("body {}", id),
                score: 1,
                created_utc: 1700000000.0,
                permalink: format!("https://www.reddit.com/r/selfhosted/comments/p/x/{}/", id),
            },
            replies,
        })
    }

    fn more(id: &str, parent: &str, children: &[&str]) -> CommentNode {
        CommentNode::More(MoreComments {
            id: id.to_string(),
            parent_id: parent.to_string(),
            count: children.len() as u32,
            children: children.iter().map(|c| c.to_string()).collect(),
        })
    }

    fn post(id: &str, created_utc: f64) -> Post {
        Post {
            id: id.to_string(),
            title: format!("Post {}", id),
            author: Some("alice".to_string()),
            url: format!("https://example.com/{}", id),
            permalink: format!("https://www.reddit.com/r/selfhosted/comments/{}/x/", id),
            created_utc,
            score: 5,
            upvote_ratio: Some(0.9),
            selftext: String::new(),
            num_comments: 0,
            comments: Vec::new(),
            subreddit: "selfhosted".to_string(),
        }
    }

    fn ids(comments: &[Comment]) -> Vec<&str> {
        comments.iter().map(|c| c.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_nested_placeholders_expand_in_place() {
        let mut source = MockSource::default();
        source.forests.insert(
            "p".to_string(),
            vec![
                comment("c1", vec![more("m1", "t1_c1", &["c3"])]),
                more("m0", "t3_p", &["c4", "c5"]),
                comment("c9", vec![]),
            ],
        );
        source.expansions.insert(
            "m1".to_string(),
            vec![comment("c3", vec![more("m2", "t1_c3", &["c6"])])],
        );
        source
            .expansions
            .insert("m2".to_string(), vec![comment("c6", vec![])]);
        source.expansions.insert(
            "m0".to_string(),
            vec![comment("c4", vec![]), comment("c5", vec![])],
        );

        let flat = fetch_flat_comments(&source, "p").await.unwrap();
        assert_eq!(ids(&flat), vec!["c1", "c3", "c6", "c4", "c5", "c9"]);
        assert_eq!(source.expansions_requested.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_continue_thread_placeholder_is_expanded() {
        let mut source = MockSource::default();
        source.forests.insert(
            "p".to_string(),
            vec![comment("c1", vec![more("m_cont", "t1_c1", &[])])],
        );
        source.expansions.insert(
            "m_cont".to_string(),
            vec![comment("c2", vec![comment("c3", vec![])])],
        );

        let flat = fetch_flat_comments(&source, "p").await.unwrap();
        assert_eq!(ids(&flat), vec!["c1", "c2", "c3"]);
    }

    #[tokio::test]
    async fn test_placeholder_returning_itself_is_dropped() {
        let mut source = MockSource::default();
        source.forests.insert(
            "p".to_string(),
            vec![comment("c1", vec![]), more("stuck", "t3_p", &["gone"])],
        );
        source.expansions.insert(
            "stuck".to_string(),
            vec![comment("c2", vec![]), more("stuck", "t3_p", &["gone"])],
        );

        let flat = fetch_flat_comments(&source, "p").await.unwrap();
        assert_eq!(ids(&flat), vec!["c1", "c2"]);
        assert_eq!(source.expansions_requested.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_alternating_placeholders_stop_expanding() {
        let mut source = MockSource::default();
        source.forests.insert(
            "p".to_string(),
            vec![comment("c1", vec![]), more("a", "t3_p", &["x"])],
        );
        source
            .expansions
            .insert("a".to_string(), vec![more("b", "t3_p", &["y"])]);
        source.expansions.insert(
            "b".to_string(),
            vec![comment("c2", vec![]), more("a", "t3_p", &["x"])],
        );

        let flat = fetch_flat_comments(&source, "p").await.unwrap();
        assert_eq!(ids(&flat), vec!["c1", "c2"]);
        assert_eq!(source.expansions_requested.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_nested_expansion_yields_no_comments() {
        let mut source = MockSource::default();
        source.forests.insert(
            "p".to_string(),
            vec![
                comment("c1", vec![]),
                comment("c2", vec![more("broken", "t1_c2", &["c3"])]),
            ],
        );
        source.failing_placeholders.insert("broken".to_string());

        let result = fetch_flat_comments(&source, "p").await;
        assert!(matches!(
            result,
            Err(CoreError::RedditApi(RedditApiError::ServerError { .. }))
        ));
    }

    #[tokio::test]
    async fn test_comment_failure_keeps_post_and_continues() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        let now_ts = now.timestamp() as f64;

        let mut source = MockSource::default();
        source.posts = vec![
            post("p1", now_ts - 100.0),
            post("p2", now_ts - 200.0),
            post("p3", now_ts - 300.0),
        ];
        source
            .forests
            .insert("p1".to_string(), vec![comment("a", vec![comment("b", vec![])])]);
        source
            .forests
            .insert("p3".to_string(), vec![comment("c", vec![])]);
        source.forests.insert("p2".to_string(), vec![comment("x", vec![])]);
        source.failing_posts.insert("p2".to_string());

        let selector = PostSelector::by_window("selfhosted", 1, now);
        let harvest = Harvester::new(&source).harvest(&selector, now).await.unwrap();

        let posts = &harvest.document.posts;
        assert_eq!(posts.len(), 3);
        assert_eq!(posts[0].comments.len(), 2);
        assert!(posts[1].comments.is_empty());
        assert_eq!(posts[2].comments.len(), 1);
        assert_eq!(harvest.posts_seen, 3);
        assert_eq!(harvest.comments_seen, 3);
        assert_eq!(harvest.comment_failures, vec!["p2".to_string()]);
    }

    #[tokio::test]
    async fn test_stream_failure_interrupts_with_partial() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        let now_ts = now.timestamp() as f64;

        let mut source = MockSource::default();
        source.posts = vec![post("p1", now_ts - 10.0), post("p2", now_ts - 20.0)];
        source.fail_stream_at = Some(1);

        let selector = PostSelector::by_window("selfhosted", 30, now);
        let interrupted = Harvester::new(&source)
            .harvest(&selector, now)
            .await
            .unwrap_err();

        assert!(matches!(interrupted.error, SnapshotError::Selection(_)));
        assert!(!interrupted.error.is_recoverable());
        assert_eq!(interrupted.partial.posts_seen, 1);
        assert_eq!(interrupted.partial.document.posts[0].id, "p1");
        assert_eq!(source.pulls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_author_mode_skips_other_subreddits_and_drains() {
        let mut source = MockSource::default();
        let mut elsewhere = post("p2", 50.0);
        elsewhere.subreddit = "homelab".to_string();
        let mut shouting = post("p3", 10.0);
        shouting.subreddit = "SelfHosted".to_string();
        source.posts = vec![post("p1", 100.0), elsewhere, shouting];

        let selector = PostSelector::by_author("alice", "selfhosted");
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        let harvest = Harvester::new(&source).harvest(&selector, now).await.unwrap();

        let admitted: Vec<&str> = harvest
            .document
            .posts
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(admitted, vec!["p1", "p3"]);
        // Three posts plus the end-of-stream pull
        assert_eq!(source.pulls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_empty_window_produces_empty_document() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        let mut source = MockSource::default();
        source.posts = vec![post("old", now.timestamp() as f64 - 40.0 * 86_400.0)];

        let selector = PostSelector::by_window("selfhosted", 30, now);
        let harvest =
            tokio_test::block_on(Harvester::new(&source).harvest(&selector, now)).unwrap();

        assert!(harvest.document.posts.is_empty());
        assert_eq!(harvest.posts_seen, 0);
        assert_eq!(harvest.document.metadata.download_time, "2024-06-15T00:00:00.000000Z");
    }
}
