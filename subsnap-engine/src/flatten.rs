use futures::future::{BoxFuture, FutureExt};
use std::collections::HashSet;
use subsnap_core::{Comment, CommentNode, ContentSource, CoreError};
use tracing::{debug, warn};

/// Every comment of a post, in depth-first order with parents first.
///
/// The forest is expanded completely before anything is emitted, so an
/// error during expansion yields no comments at all.
pub async fn fetch_flat_comments<S>(source: &S, post_id: &str) -> Result<Vec<Comment>, CoreError>
where
    S: ContentSource + ?Sized,
{
    let mut forest = source.comments_of(post_id).await?;
    expand_all(source, post_id, &mut forest, &mut Expanded::new()).await?;
    Ok(flatten(forest))
}

/// Placeholders already expanded for one post, keyed by id and children.
type Expanded = HashSet<(String, Vec<String>)>;

/// Replace every placeholder in `nodes` with its expansion, recursively.
///
/// A placeholder met again after its own expansion is dropped, so an
/// expansion cycle ends instead of looping.
fn expand_all<'a, S>(
    source: &'a S,
    post_id: &'a str,
    nodes: &'a mut Vec<CommentNode>,
    expanded: &'a mut Expanded,
) -> BoxFuture<'a, Result<(), CoreError>>
where
    S: ContentSource + ?Sized,
{
    async move {
        let mut index = 0;
        while index < nodes.len() {
            let more = match &mut nodes[index] {
                CommentNode::Comment(threaded) => {
                    expand_all(source, post_id, &mut threaded.replies, expanded).await?;
                    index += 1;
                    continue;
                }
                CommentNode::More(more) => more.clone(),
            };

            if !expanded.insert((more.id.clone(), more.children.clone())) {
                warn!(
                    "Placeholder {} of post {} came back after expansion, dropping it",
                    more.id, post_id
                );
                nodes.remove(index);
                continue;
            }

            let expansion = source.expand_more(post_id, &more).await?;
            debug!(
                "Placeholder {} ({} hidden) replaced by {} nodes",
                more.id,
                more.count,
                expansion.len()
            );
            // The inserted nodes are visited next and may hold placeholders of their own
            nodes.splice(index..=index, expansion);
        }
        Ok(())
    }
    .boxed()
}

/// Pre-order walk of the forest. Placeholders still present are skipped.
pub fn flatten(forest: Vec<CommentNode>) -> Vec<Comment> {
    let mut flat = Vec::new();
    let mut stack = vec![forest.into_iter()];

    while let Some(level) = stack.last_mut() {
        match level.next() {
            Some(CommentNode::Comment(threaded)) => {
                flat.push(threaded.comment);
                stack.push(threaded.replies.into_iter());
            }
            Some(CommentNode::More(more)) => {
                debug!("Skipping unexpanded placeholder {}", more.id);
            }
            None => {
                stack.pop();
            }
        }
    }

    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use subsnap_core::{MoreComments, ThreadedComment};

    fn comment(id: &str, replies: Vec<CommentNode>) -> CommentNode {
        CommentNode::Comment(ThreadedComment {
            comment: Comment {
                id: id.to_string(),
                author: None,
                body: String::new(),
                score: 0,
                created_utc: 0.0,
                permalink: String::new(),
            },
            replies,
        })
    }

    fn ids(comments: &[Comment]) -> Vec<&str> {
        comments.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_flatten_is_depth_first_preorder() {
        let forest = vec![
            comment(
                "a",
                vec![comment("a1", vec![comment("a1x", vec![])]), comment("a2", vec![])],
            ),
            comment("b", vec![comment("b1", vec![])]),
        ];

        let flat = flatten(forest);
        assert_eq!(ids(&flat), vec!["a", "a1", "a1x", "a2", "b", "b1"]);
    }

    #[test]
    fn test_flatten_skips_leftover_placeholders() {
        let forest = vec![
            comment("a", vec![]),
            CommentNode::More(MoreComments {
                id: "m".to_string(),
                parent_id: "t3_p".to_string(),
                count: 1,
                children: vec!["x".to_string()],
            }),
            comment("b", vec![]),
        ];

        assert_eq!(ids(&flatten(forest)), vec!["a", "b"]);
    }

    #[test]
    fn test_flatten_empty_forest() {
        assert!(flatten(Vec::new()).is_empty());
    }
}
