//! Comment threads on recipe posts.

use std::sync::Arc;

use domains::{
    build_threads, validate_comment_body, AppError, Comment, CommentId, CommentInput, CommentRepo,
    CommentThread, NewComment, PostId, PostRepo, Result, UserId, ValidationReason,
};
use tracing::{debug, instrument};

use crate::bounded::FetchPolicy;

pub struct CommentService {
    comments: Arc<dyn CommentRepo>,
    posts: Arc<dyn PostRepo>,
    policy: FetchPolicy,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentRepo>,
        posts: Arc<dyn PostRepo>,
        policy: FetchPolicy,
    ) -> Self {
        Self { comments, posts, policy }
    }

    /// Top-level comments oldest first, replies nested beneath their parent.
    pub async fn list(&self, post_id: PostId) -> Result<Vec<CommentThread>> {
        self.require_post(post_id).await?;
        let comments = self
            .policy
            .fetch("comments", || self.comments.list_comments(post_id))
            .await?;
        Ok(build_threads(comments))
    }

    #[instrument(skip_all, fields(post_id = %post_id, user_id = %caller))]
    pub async fn create(
        &self,
        post_id: PostId,
        caller: UserId,
        input: CommentInput,
    ) -> Result<Comment> {
        let body = validate_comment_body(input.body.as_deref())?;
        self.require_post(post_id).await?;
        if let Some(parent_id) = input.parent_id {
            let parent = self
                .policy
                .fetch("parent comment", || self.comments.get_comment(parent_id))
                .await?;
            if !matches!(parent, Some(p) if p.post_id == post_id) {
                return Err(ValidationReason::ParentCommentMismatch.into());
            }
        }
        let comment = self
            .comments
            .insert_comment(NewComment {
                post_id,
                user_id: caller,
                parent_id: input.parent_id,
                body,
            })
            .await?;
        debug!(comment_id = %comment.id, "comment created");
        Ok(comment)
    }

    /// Author only.
    #[instrument(skip_all, fields(comment_id = %comment_id, user_id = %caller))]
    pub async fn edit(
        &self,
        comment_id: CommentId,
        caller: UserId,
        input: CommentInput,
    ) -> Result<Comment> {
        let body = validate_comment_body(input.body.as_deref())?;
        let comment = self.find(comment_id).await?;
        if comment.user_id != caller {
            return Err(AppError::AuthorizationError(
                "only the author may edit this comment".into(),
            ));
        }
        self.comments
            .update_comment_body(comment_id, body)
            .await?
            .ok_or_else(|| AppError::not_found("comment", comment_id))
    }

    /// Author or post owner. Replies beneath the comment are removed with it.
    #[instrument(skip_all, fields(comment_id = %comment_id, user_id = %caller))]
    pub async fn delete(&self, comment_id: CommentId, caller: UserId) -> Result<u64> {
        let comment = self.find(comment_id).await?;
        if comment.user_id != caller {
            let post = self.policy.fetch("post", || self.posts.get_post(comment.post_id)).await?;
            if !post.is_some_and(|p| p.is_owned_by(caller)) {
                return Err(AppError::AuthorizationError(
                    "only the author or the post owner may delete this comment".into(),
                ));
            }
        }
        let removed = self.comments.delete_comment(comment_id).await?;
        debug!(removed, "comment deleted");
        Ok(removed)
    }

    async fn find(&self, comment_id: CommentId) -> Result<Comment> {
        self.policy
            .fetch("comment", || self.comments.get_comment(comment_id))
            .await?
            .ok_or_else(|| AppError::not_found("comment", comment_id))
    }

    async fn require_post(&self, post_id: PostId) -> Result<()> {
        if self.policy.fetch("post", || self.posts.post_exists(post_id)).await? {
            Ok(())
        } else {
            Err(AppError::not_found("post", post_id))
        }
    }
}
