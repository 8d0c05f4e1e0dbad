use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationReason;
use crate::ids::{CommentId, PostId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub user_id: UserId,
    /// Another comment on the same post. Depth is not limited by the data.
    pub parent_id: Option<CommentId>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub post_id: PostId,
    pub user_id: UserId,
    pub parent_id: Option<CommentId>,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentInput {
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub parent_id: Option<CommentId>,
}

pub fn validate_comment_body(raw: Option<&str>) -> Result<String, ValidationReason> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(ValidationReason::MissingCommentBody)
}

/// A comment with its replies, oldest first at every level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<CommentThread>,
}

/// Builds the reply tree for one post. Comments whose parent is missing from
/// `comments` are promoted to the top level.
pub fn build_threads(mut comments: Vec<Comment>) -> Vec<CommentThread> {
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    let known: std::collections::HashSet<CommentId> = comments.iter().map(|c| c.id).collect();
    let mut children: HashMap<Option<CommentId>, Vec<Comment>> = HashMap::new();
    for comment in comments {
        let key = comment.parent_id.filter(|p| known.contains(p));
        children.entry(key).or_default().push(comment);
    }

    fn attach(
        parent: Option<CommentId>,
        children: &mut HashMap<Option<CommentId>, Vec<Comment>>,
    ) -> Vec<CommentThread> {
        children
            .remove(&parent)
            .unwrap_or_default()
            .into_iter()
            .map(|comment| {
                let replies = attach(Some(comment.id), children);
                CommentThread { comment, replies }
            })
            .collect()
    }

    attach(None, &mut children)
}
