//! Recipe boxes: named, user-owned collections of saved posts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationReason;
use crate::ids::{BoxId, PostId, UserId};
use crate::serde_ext::nullable;

pub const MAX_BOX_NAME_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxType {
    Liked,
    Cooked,
    WantToTry,
    Custom,
}

impl BoxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoxType::Liked => "liked",
            BoxType::Cooked => "cooked",
            BoxType::WantToTry => "want_to_try",
            BoxType::Custom => "custom",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "liked" => Some(BoxType::Liked),
            "cooked" => Some(BoxType::Cooked),
            "want_to_try" => Some(BoxType::WantToTry),
            "custom" => Some(BoxType::Custom),
            _ => None,
        }
    }

    /// System types belong to default boxes only.
    pub fn is_reserved(&self) -> bool {
        !matches!(self, BoxType::Custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeBox {
    pub id: BoxId,
    pub user_id: UserId,
    pub name: String,
    pub description: Option<String>,
    /// Default boxes can never be renamed or deleted.
    pub is_default: bool,
    pub box_type: BoxType,
    pub created_at: DateTime<Utc>,
}

impl RecipeBox {
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecipeBox {
    pub user_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub box_type: BoxType,
}

impl NewRecipeBox {
    /// The three boxes every user starts with.
    pub fn defaults_for(user_id: UserId) -> Vec<NewRecipeBox> {
        [
            ("Liked", BoxType::Liked),
            ("Cooked", BoxType::Cooked),
            ("Want to Try", BoxType::WantToTry),
        ]
        .into_iter()
        .map(|(name, box_type)| NewRecipeBox {
            user_id,
            name: name.to_string(),
            description: None,
            is_default: true,
            box_type,
        })
        .collect()
    }
}

/// Trims and bounds a box name.
pub fn validate_box_name(raw: Option<&str>) -> Result<String, ValidationReason> {
    let name = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ValidationReason::MissingBoxName)?;
    if name.chars().count() > MAX_BOX_NAME_LEN {
        return Err(ValidationReason::BoxNameTooLong);
    }
    Ok(name.to_string())
}

/// Body of a create-box request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_default: Option<bool>,
    #[serde(default)]
    pub box_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
}

/// One row per (box, post) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxMembership {
    pub box_id: BoxId,
    pub post_id: PostId,
    pub added_at: DateTime<Utc>,
}

/// Result of an idempotent save. Both variants are success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Created(BoxMembership),
    AlreadySaved(BoxMembership),
}

impl SaveOutcome {
    pub fn membership(&self) -> &BoxMembership {
        match self {
            SaveOutcome::Created(m) | SaveOutcome::AlreadySaved(m) => m,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, SaveOutcome::Created(_))
    }
}

/// A box plus the posts saved in it, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxDetail {
    #[serde(flatten)]
    pub recipe_box: RecipeBox,
    pub entries: Vec<BoxMembership>,
}
