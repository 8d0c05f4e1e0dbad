//! # Ports
//!
//! Every storage or identity adapter implements these traits. Each method is
//! one atomic unit: either all of its writes are visible afterwards or none.

use async_trait::async_trait;

use crate::error::{Result, StoreResult};
use crate::ids::{BoxId, CommentId, PostId, UserId};
use crate::models::{
    BoxMembership, BoxType, Comment, Identity, NewComment, NewRecipeBox, NewRecipePost, NewUser,
    Page, PostQuery, RecipeBox, RecipePost, SaveOutcome, User,
};

/// Persistence contract for recipe posts.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostRepo: Send + Sync {
    async fn get_post(&self, id: PostId) -> StoreResult<Option<RecipePost>>;

    async fn post_exists(&self, id: PostId) -> StoreResult<bool>;

    /// Inserts the post with its ingredients, steps and tags. When `save_to`
    /// is set the new post is also saved into that box in the same write.
    async fn insert_post(
        &self,
        post: NewRecipePost,
        save_to: Option<BoxId>,
    ) -> StoreResult<RecipePost>;

    /// Replaces the mutable content of an existing post and bumps `updated_at`.
    /// Returns `None` when the post no longer exists.
    async fn update_post(&self, post: RecipePost) -> StoreResult<Option<RecipePost>>;

    /// Deletes the post together with its comments and box memberships.
    /// References from other posts' attribution/inspiration are left dangling.
    async fn delete_post(&self, id: PostId) -> StoreResult<bool>;

    async fn list_posts(&self, query: PostQuery, page: Page) -> StoreResult<Vec<RecipePost>>;
}

/// Persistence contract for recipe boxes and their memberships.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BoxRepo: Send + Sync {
    async fn get_box(&self, id: BoxId) -> StoreResult<Option<RecipeBox>>;

    async fn list_boxes(&self, owner: UserId) -> StoreResult<Vec<RecipeBox>>;

    async fn find_box_by_type(
        &self,
        owner: UserId,
        box_type: BoxType,
    ) -> StoreResult<Option<RecipeBox>>;

    async fn insert_box(&self, new_box: NewRecipeBox) -> StoreResult<RecipeBox>;

    async fn update_box(&self, recipe_box: RecipeBox) -> StoreResult<Option<RecipeBox>>;

    /// Deletes the box and its memberships.
    async fn delete_box(&self, id: BoxId) -> StoreResult<bool>;

    /// Insert-if-absent. A second save of the same pair returns the existing row.
    async fn save_post(&self, box_id: BoxId, post_id: PostId) -> StoreResult<SaveOutcome>;

    /// Returns whether a row was removed.
    async fn unsave_post(&self, box_id: BoxId, post_id: PostId) -> StoreResult<bool>;

    /// Memberships of one box, newest first.
    async fn box_entries(&self, box_id: BoxId) -> StoreResult<Vec<BoxMembership>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommentRepo: Send + Sync {
    async fn get_comment(&self, id: CommentId) -> StoreResult<Option<Comment>>;

    async fn list_comments(&self, post_id: PostId) -> StoreResult<Vec<Comment>>;

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment>;

    async fn update_comment_body(
        &self,
        id: CommentId,
        body: String,
    ) -> StoreResult<Option<Comment>>;

    /// Deletes the comment and every reply beneath it. Returns the number of rows removed.
    async fn delete_comment(&self, id: CommentId) -> StoreResult<u64>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Creates the user and their default boxes in one write. Idempotent per
    /// user id: the flag is `false` when the user already existed.
    async fn provision_user(&self, user: NewUser) -> StoreResult<(User, bool)>;

    async fn update_user(&self, user: User) -> StoreResult<Option<User>>;

    /// Case-insensitive substring match on username or display name.
    async fn search_users(&self, text: String, page: Page) -> StoreResult<Vec<User>>;

    /// Returns `true` when a new follow row was written.
    async fn follow(&self, follower: UserId, followed: UserId) -> StoreResult<bool>;

    async fn unfollow(&self, follower: UserId, followed: UserId) -> StoreResult<bool>;

    /// `(followers, following)` counts.
    async fn follow_counts(&self, user: UserId) -> StoreResult<(u64, u64)>;

    async fn list_followers(&self, user: UserId) -> StoreResult<Vec<User>>;

    async fn list_following(&self, user: UserId) -> StoreResult<Vec<User>>;
}

/// Verifies a bearer credential issued by the external authentication service.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Identity>;
}
