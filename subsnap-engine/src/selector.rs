//! Which posts of a listing make it into a snapshot.
//!
//! Every mode answers the same per-post question through [`PostSelector::decide`]
//! and names the stream it reads through [`PostSelector::open`].

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use subsnap_core::{ContentSource, Post, PostStream, SnapshotError, SnapshotParameters};

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Offset of 23:59:59 from midnight.
const LAST_SECOND_OF_DAY: f64 = 86_399.0;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admit,
    Skip,
    Terminate,
}

/// Inclusive UTC range from the first second of `start_date` to the last
/// second of `end_date`.
#[derive(Debug, Clone, PartialEq)]
pub struct DateRange {
    start_date: NaiveDate,
    end_date: NaiveDate,
    start_ts: f64,
    end_ts: f64,
}

impl DateRange {
    pub fn from_dates(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self, SnapshotError> {
        let start_ts = midnight_utc(start_date);
        let end_ts = midnight_utc(end_date) + LAST_SECOND_OF_DAY;

        if start_ts > end_ts {
            return Err(SnapshotError::validation(
                "Start date cannot be after end date.",
            ));
        }

        Ok(Self {
            start_date,
            end_date,
            start_ts,
            end_ts,
        })
    }

    pub fn start_ts(&self) -> f64 {
        self.start_ts
    }

    pub fn end_ts(&self) -> f64 {
        self.end_ts
    }

    pub fn contains(&self, created_utc: f64) -> bool {
        self.start_ts <= created_utc && created_utc <= self.end_ts
    }
}

fn midnight_utc(date: NaiveDate) -> f64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp() as f64
}

#[derive(Debug, Clone, PartialEq)]
pub enum PostSelector {
    /// The author's whole history, restricted to one subreddit.
    ByAuthor { author: String, collection: String },
    /// Posts no older than `cutoff`, fixed when the selector is built.
    ByWindow {
        collection: String,
        window_days: u32,
        cutoff: f64,
    },
    ByDateRange { collection: String, range: DateRange },
}

impl PostSelector {
    pub fn by_author(author: impl Into<String>, collection: impl Into<String>) -> Self {
        PostSelector::ByAuthor {
            author: author.into(),
            collection: collection.into(),
        }
    }

    pub fn by_window(collection: impl Into<String>, window_days: u32, now: DateTime<Utc>) -> Self {
        let now_ts = now.timestamp_micros() as f64 / 1_000_000.0;
        PostSelector::ByWindow {
            collection: collection.into(),
            window_days,
            cutoff: now_ts - f64::from(window_days) * SECONDS_PER_DAY,
        }
    }

    /// Fails with a validation error when `start_date` is after `end_date`.
    pub fn by_date_range(
        collection: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self, SnapshotError> {
        Ok(PostSelector::ByDateRange {
            collection: collection.into(),
            range: DateRange::from_dates(start_date, end_date)?,
        })
    }

    pub fn collection(&self) -> &str {
        match self {
            PostSelector::ByAuthor { collection, .. }
            | PostSelector::ByWindow { collection, .. }
            | PostSelector::ByDateRange { collection, .. } => collection,
        }
    }

    pub fn decide(&self, post: &Post) -> Decision {
        match self {
            PostSelector::ByAuthor { collection, .. } => {
                if post.subreddit.eq_ignore_ascii_case(collection) {
                    Decision::Admit
                } else {
                    Decision::Skip
                }
            }
            PostSelector::ByWindow { cutoff, .. } => {
                if post.created_utc < *cutoff {
                    Decision::Terminate
                } else {
                    Decision::Admit
                }
            }
            PostSelector::ByDateRange { range, .. } => {
                if post.created_utc < range.start_ts {
                    Decision::Terminate
                } else if post.created_utc > range.end_ts {
                    Decision::Skip
                } else {
                    Decision::Admit
                }
            }
        }
    }

    pub fn open<'a, S>(&self, source: &'a S) -> Box<dyn PostStream + 'a>
    where
        S: ContentSource + ?Sized,
    {
        match self {
            PostSelector::ByAuthor { author, .. } => source.posts_by_author(author),
            PostSelector::ByWindow { collection, .. }
            | PostSelector::ByDateRange { collection, .. } => {
                source.posts_in_collection_new(collection)
            }
        }
    }

    pub fn parameters(&self) -> SnapshotParameters {
        match self {
            PostSelector::ByAuthor { author, .. } => SnapshotParameters::Author {
                username: author.clone(),
            },
            PostSelector::ByWindow { window_days, .. } => SnapshotParameters::Window {
                time_period_days: *window_days,
            },
            PostSelector::ByDateRange { range, .. } => SnapshotParameters::DateRange {
                start_date: range.start_date.format(DATE_FORMAT).to_string(),
                end_date: range.end_date.format(DATE_FORMAT).to_string(),
                start_timestamp_utc: range.start_ts,
                end_timestamp_utc: range.end_ts,
            },
        }
    }

    pub fn default_output_name(&self) -> String {
        match self {
            PostSelector::ByAuthor { author, collection } => {
                format!("{}_{}_data.json", author, collection)
            }
            PostSelector::ByWindow {
                collection,
                window_days,
                ..
            } => format!("{}_last_{}_days_data.json", collection, window_days),
            PostSelector::ByDateRange { collection, range } => format!(
                "{}_{}_to_{}_data.json",
                collection,
                range.start_date.format(DATE_FORMAT),
                range.end_date.format(DATE_FORMAT)
            ),
        }
    }

    /// Log line for the post that ended the scan.
    pub fn stop_message(&self) -> String {
        match self {
            PostSelector::ByAuthor { .. } => "End of the author's history".to_string(),
            PostSelector::ByWindow { window_days, .. } => {
                format!("Reached posts older than {} days. Stopping.", window_days)
            }
            PostSelector::ByDateRange { range, .. } => format!(
                "Reached posts older than the start date ({}). Stopping.",
                range.start_date.format(DATE_FORMAT)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post(created_utc: f64, subreddit: &str) -> Post {
        Post {
            id: "p".to_string(),
            title: "t".to_string(),
            author: None,
            url: String::new(),
            permalink: String::new(),
            created_utc,
            score: 0,
            upvote_ratio: None,
            selftext: String::new(),
            num_comments: 0,
            comments: Vec::new(),
            subreddit: subreddit.to_string(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_range_bounds() {
        let range = DateRange::from_dates(date(2024, 1, 1), date(2024, 1, 31)).unwrap();
        assert_eq!(range.start_ts(), 1704067200.0);
        assert_eq!(range.end_ts(), 1706745599.0);
        assert!(range.contains(1704067200.0));
        assert!(range.contains(1706745599.0));
        assert!(!range.contains(1706745600.0));
    }

    #[test]
    fn test_single_day_range_is_valid() {
        let range = DateRange::from_dates(date(2024, 3, 10), date(2024, 3, 10)).unwrap();
        assert_eq!(range.end_ts() - range.start_ts(), 86_399.0);
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let err = PostSelector::by_date_range("selfhosted", date(2024, 2, 1), date(2024, 1, 1))
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Validation { .. }));
        assert_eq!(err.to_string(), "Invalid input: Start date cannot be after end date.");
    }

    #[test]
    fn test_date_range_decisions() {
        let selector =
            PostSelector::by_date_range("selfhosted", date(2024, 1, 1), date(2024, 1, 31)).unwrap();
        assert_eq!(selector.decide(&post(1706745600.0, "selfhosted")), Decision::Skip);
        assert_eq!(selector.decide(&post(1705000000.0, "selfhosted")), Decision::Admit);
        assert_eq!(selector.decide(&post(1704067199.0, "selfhosted")), Decision::Terminate);
    }

    #[test]
    fn test_window_cutoff_from_injected_clock() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let selector = PostSelector::by_window("selfhosted", 7, now);
        let now_ts = now.timestamp() as f64;

        match &selector {
            PostSelector::ByWindow { cutoff, .. } => {
                assert_eq!(*cutoff, now_ts - 7.0 * SECONDS_PER_DAY)
            }
            other => panic!("Expected window selector, got {:?}", other),
        }

        let cutoff = now_ts - 7.0 * SECONDS_PER_DAY;
        assert_eq!(selector.decide(&post(cutoff, "selfhosted")), Decision::Admit);
        assert_eq!(selector.decide(&post(cutoff - 1.0, "selfhosted")), Decision::Terminate);
    }

    #[test]
    fn test_author_filter_ignores_case() {
        let selector = PostSelector::by_author("alice", "SelfHosted");
        assert_eq!(selector.decide(&post(1.0, "selfhosted")), Decision::Admit);
        assert_eq!(selector.decide(&post(1.0, "homelab")), Decision::Skip);
        // Old posts never stop an author scan
        assert_eq!(selector.decide(&post(0.0, "selfhosted")), Decision::Admit);
    }

    #[test]
    fn test_default_output_names() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        assert_eq!(
            PostSelector::by_author("alice", "selfhosted").default_output_name(),
            "alice_selfhosted_data.json"
        );
        assert_eq!(
            PostSelector::by_window("selfhosted", 30, now).default_output_name(),
            "selfhosted_last_30_days_data.json"
        );
        assert_eq!(
            PostSelector::by_date_range("selfhosted", date(2024, 1, 1), date(2024, 1, 31))
                .unwrap()
                .default_output_name(),
            "selfhosted_2024-01-01_to_2024-01-31_data.json"
        );
    }

    #[test]
    fn test_parameters() {
        let selector =
            PostSelector::by_date_range("selfhosted", date(2024, 1, 1), date(2024, 1, 31)).unwrap();
        assert_eq!(
            selector.parameters(),
            SnapshotParameters::DateRange {
                start_date: "2024-01-01".to_string(),
                end_date: "2024-01-31".to_string(),
                start_timestamp_utc: 1704067200.0,
                end_timestamp_utc: 1706745599.0,
            }
        );
        assert_eq!(
            PostSelector::by_author("alice", "selfhosted").parameters(),
            SnapshotParameters::Author {
                username: "alice".to_string()
            }
        );
    }
}
