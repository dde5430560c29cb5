use crate::aggregate::{Aggregator, Harvest};
use crate::flatten::fetch_flat_comments;
use crate::selector::{Decision, PostSelector};
use crate::writer::format_download_time;
use chrono::{DateTime, Utc};
use subsnap_core::{ContentSource, SnapshotError, SnapshotMetadata};
use thiserror::Error;
use tracing::{debug, error, info, warn};

const TITLE_PREVIEW_CHARS: usize = 50;

/// A run that stopped on a fatal error, with whatever it had collected.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct Interrupted {
    #[source]
    pub error: SnapshotError,
    pub partial: Harvest,
}

/// Drives one snapshot run against a content source.
pub struct Harvester<'a, S: ContentSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: ContentSource + ?Sized> Harvester<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Scan the selector's stream once, enriching each admitted post with
    /// its comments.
    ///
    /// A failed comment fetch keeps the post with no comments and the scan
    /// goes on. A failed pull from the post stream ends the run.
    pub async fn harvest(
        &self,
        selector: &PostSelector,
        now: DateTime<Utc>,
    ) -> Result<Harvest, Interrupted> {
        let mut aggregator = Aggregator::new(SnapshotMetadata {
            subreddit: selector.collection().to_string(),
            parameters: selector.parameters(),
            download_time: format_download_time(now),
        });
        let mut stream = selector.open(self.source);

        loop {
            let post = match stream.next_post().await {
                Ok(Some(post)) => post,
                Ok(None) => {
                    debug!("Post stream exhausted");
                    break;
                }
                Err(e) => {
                    error!("Post selection failed: {}", e);
                    return Err(Interrupted {
                        error: SnapshotError::Selection(e),
                        partial: aggregator.finish(),
                    });
                }
            };

            match selector.decide(&post) {
                Decision::Admit => {}
                Decision::Skip => {
                    debug!("Skipping post {}", post.id);
                    continue;
                }
                Decision::Terminate => {
                    info!("{}", selector.stop_message());
                    break;
                }
            }

            info!(
                "Processing post {}: {} (Created: {}) - \"{}...\"",
                aggregator.posts_seen() + 1,
                post.id,
                created_display(post.created_utc),
                title_preview(&post.title)
            );

            let post_id = post.id.clone();
            aggregator.record_post(post);

            match fetch_flat_comments(self.source, &post_id).await {
                Ok(comments) => {
                    info!("Found {} comments", comments.len());
                    if let Err(e) = aggregator.record_comments(&post_id, comments) {
                        warn!("Could not attach comments to post {}: {}", post_id, e);
                        aggregator.record_comment_failure(&post_id);
                    }
                }
                Err(source) => {
                    let failure = SnapshotError::CommentFetch {
                        post_id: post_id.clone(),
                        source,
                    };
                    warn!("{}", failure);
                    aggregator.record_comment_failure(&post_id);
                }
            }
        }

        Ok(aggregator.finish())
    }
}

fn created_display(created_utc: f64) -> String {
    DateTime::<Utc>::from_timestamp(created_utc.floor() as i64, 0)
        .map(|created| created.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| created_utc.to_string())
}

fn title_preview(title: &str) -> String {
    title.chars().take(TITLE_PREVIEW_CHARS).collect()
}
