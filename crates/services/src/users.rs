//! User provisioning, profiles and follows.

use std::sync::Arc;

use domains::{
    AppError, Identity, NewUser, Page, Profile, ProfilePatch, Result, User, UserId, UserRepo,
    ValidationReason,
};
use tracing::{info, instrument};

use crate::bounded::FetchPolicy;
use crate::posts::non_blank_query;

const MAX_DISPLAY_NAME_LEN: usize = 100;
const MAX_BIO_LEN: usize = 500;
const MAX_PROFILE_IMAGE_URL_LEN: usize = 500;

pub struct UserService {
    users: Arc<dyn UserRepo>,
    policy: FetchPolicy,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepo>, policy: FetchPolicy) -> Self {
        Self { users, policy }
    }

    /// Creates the user and their default boxes on first sight. Repeat calls
    /// return the stored user unchanged.
    #[instrument(skip_all, fields(user_id = %identity.user_id))]
    pub async fn provision(&self, identity: &Identity, display_name: Option<&str>) -> Result<User> {
        let new_user = NewUser::from_identity(identity, display_name)?;
        let (user, created) = self.users.provision_user(new_user).await?;
        if created {
            info!(username = %user.username, "user provisioned");
        }
        Ok(user)
    }

    pub async fn profile(&self, user_id: UserId) -> Result<Profile> {
        let user = self.find(user_id).await?;
        let (follower_count, following_count) =
            self.policy.fetch("follow counts", || self.users.follow_counts(user_id)).await?;
        Ok(Profile {
            user,
            follower_count,
            following_count,
        })
    }

    pub async fn profile_by_username(&self, username: &str) -> Result<Profile> {
        let username = username.trim().to_lowercase();
        let user = self
            .policy
            .fetch("user", || self.users.find_user_by_username(&username))
            .await?
            .ok_or_else(|| AppError::not_found("user", &username))?;
        self.profile(user.id).await
    }

    /// Self only.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn update_profile(
        &self,
        user_id: UserId,
        caller: UserId,
        patch: ProfilePatch,
    ) -> Result<User> {
        if user_id != caller {
            return Err(AppError::AuthorizationError(
                "users may only edit their own profile".into(),
            ));
        }
        let mut user = self.find(user_id).await?;
        if let Some(display_name) = &patch.display_name {
            let display_name = display_name.trim();
            if display_name.is_empty() {
                return Err(ValidationReason::MissingDisplayName.into());
            }
            user.display_name = bounded_text(display_name, MAX_DISPLAY_NAME_LEN)?;
        }
        if let Some(bio) = &patch.bio {
            user.bio = optional_text(bio.as_deref(), MAX_BIO_LEN)?;
        }
        if let Some(url) = &patch.profile_image_url {
            user.profile_image_url = optional_text(url.as_deref(), MAX_PROFILE_IMAGE_URL_LEN)?;
        }
        self.users
            .update_user(user)
            .await?
            .ok_or_else(|| AppError::not_found("user", user_id))
    }

    /// Idempotent; returns whether a new follow was recorded.
    #[instrument(skip_all, fields(follower_id = %follower, followed_id = %followed))]
    pub async fn follow(&self, follower: UserId, followed: UserId) -> Result<bool> {
        if follower == followed {
            return Err(ValidationReason::SelfFollow.into());
        }
        self.find(followed).await?;
        Ok(self.users.follow(follower, followed).await?)
    }

    #[instrument(skip_all, fields(follower_id = %follower, followed_id = %followed))]
    pub async fn unfollow(&self, follower: UserId, followed: UserId) -> Result<bool> {
        self.find(followed).await?;
        Ok(self.users.unfollow(follower, followed).await?)
    }

    pub async fn followers(&self, user_id: UserId) -> Result<Vec<User>> {
        self.find(user_id).await?;
        Ok(self.policy.fetch("followers", || self.users.list_followers(user_id)).await?)
    }

    pub async fn following(&self, user_id: UserId) -> Result<Vec<User>> {
        self.find(user_id).await?;
        Ok(self.policy.fetch("following", || self.users.list_following(user_id)).await?)
    }

    pub async fn search(&self, text: &str, page: Page) -> Result<Vec<User>> {
        let text = non_blank_query(text)?;
        Ok(self
            .policy
            .fetch("user search", || self.users.search_users(text.clone(), page))
            .await?)
    }

    async fn find(&self, user_id: UserId) -> Result<User> {
        self.policy
            .fetch("user", || self.users.get_user(user_id))
            .await?
            .ok_or_else(|| AppError::not_found("user", user_id))
    }
}

fn bounded_text(value: &str, max: usize) -> Result<String> {
    if value.chars().count() > max {
        return Err(ValidationReason::ProfileFieldTooLong.into());
    }
    Ok(value.to_string())
}

fn optional_text(value: Option<&str>, max: usize) -> Result<Option<String>> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| bounded_text(s, max))
        .transpose()
}
