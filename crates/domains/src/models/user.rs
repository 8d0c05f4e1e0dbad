use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationReason;
use crate::ids::UserId;
use crate::serde_ext::nullable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub profile_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Caller identity as vouched for by the authentication boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
}

impl NewUser {
    /// Usernames are stored lower-cased; display name falls back to the username.
    pub fn from_identity(
        identity: &Identity,
        display_name: Option<&str>,
    ) -> Result<Self, ValidationReason> {
        let username = identity.username.trim().to_lowercase();
        if username.is_empty() {
            return Err(ValidationReason::MissingUsername);
        }
        let display_name = display_name
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| username.clone());
        Ok(NewUser {
            id: identity.user_id,
            username,
            display_name,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub profile_image_url: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(flatten)]
    pub user: User,
    pub follower_count: u64,
    pub following_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follow {
    pub follower_id: UserId,
    pub followed_id: UserId,
    pub created_at: DateTime<Utc>,
}
