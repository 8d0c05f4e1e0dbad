//! Recipe boxes and the idempotent save/unsave of posts into them.

use std::sync::Arc;

use domains::{
    validate_box_name, AppError, BoxDetail, BoxId, BoxInput, BoxPatch, BoxRepo, BoxType,
    NewRecipeBox, PostId, PostRepo, RecipeBox, Result, SaveOutcome, UserId, ValidationReason,
    MAX_DESCRIPTION_LEN,
};
use tracing::{debug, instrument, warn};

use crate::bounded::FetchPolicy;

pub struct BoxService {
    boxes: Arc<dyn BoxRepo>,
    posts: Arc<dyn PostRepo>,
    policy: FetchPolicy,
}

impl BoxService {
    pub fn new(boxes: Arc<dyn BoxRepo>, posts: Arc<dyn PostRepo>, policy: FetchPolicy) -> Self {
        Self { boxes, posts, policy }
    }

    pub async fn list_for(&self, owner: UserId) -> Result<Vec<RecipeBox>> {
        Ok(self.policy.fetch("boxes", || self.boxes.list_boxes(owner)).await?)
    }

    pub async fn get_detail(&self, box_id: BoxId) -> Result<BoxDetail> {
        let recipe_box = self.find(box_id).await?;
        let entries = self.policy.fetch("box entries", || self.boxes.box_entries(box_id)).await?;
        Ok(BoxDetail { recipe_box, entries })
    }

    /// Creates a `custom` box. Default boxes only come from provisioning.
    #[instrument(skip_all, fields(user_id = %owner))]
    pub async fn create(&self, owner: UserId, input: BoxInput) -> Result<RecipeBox> {
        if input.is_default == Some(true) {
            return Err(AppError::AuthorizationError("default boxes cannot be created".into()));
        }
        let box_type = match input.box_type.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => BoxType::Custom,
            Some(raw) => BoxType::parse(raw).ok_or(ValidationReason::UnknownBoxType)?,
        };
        if box_type.is_reserved() {
            return Err(AppError::AuthorizationError(format!(
                "box type {} is reserved for default boxes",
                box_type.as_str()
            )));
        }
        let name = validate_box_name(input.name.as_deref())?;
        let description = box_description(input.description.as_deref())?;

        let created = self
            .boxes
            .insert_box(NewRecipeBox {
                user_id: owner,
                name,
                description,
                is_default: false,
                box_type,
            })
            .await?;
        debug!(box_id = %created.id, "box created");
        Ok(created)
    }

    /// Owner-only. A default box keeps its name but may change its description.
    #[instrument(skip_all, fields(box_id = %box_id, user_id = %caller))]
    pub async fn update(
        &self,
        box_id: BoxId,
        caller: UserId,
        patch: BoxPatch,
    ) -> Result<RecipeBox> {
        let mut recipe_box = self.owned(box_id, caller).await?;
        if let Some(name) = &patch.name {
            if recipe_box.is_default {
                return Err(AppError::AuthorizationError("default boxes cannot be renamed".into()));
            }
            recipe_box.name = validate_box_name(Some(name))?;
        }
        if let Some(description) = &patch.description {
            recipe_box.description = box_description(description.as_deref())?;
        }
        self.boxes
            .update_box(recipe_box)
            .await?
            .ok_or_else(|| AppError::not_found("box", box_id))
    }

    #[instrument(skip_all, fields(box_id = %box_id, user_id = %caller))]
    pub async fn delete(&self, box_id: BoxId, caller: UserId) -> Result<()> {
        let recipe_box = self.owned(box_id, caller).await?;
        if recipe_box.is_default {
            return Err(AppError::AuthorizationError("default boxes cannot be deleted".into()));
        }
        if !self.boxes.delete_box(box_id).await? {
            return Err(AppError::not_found("box", box_id));
        }
        Ok(())
    }

    /// Saves `post_id` into a box the caller owns. A repeat save returns the
    /// existing membership as [`SaveOutcome::AlreadySaved`].
    #[instrument(skip_all, fields(box_id = %box_id, post_id = %post_id, user_id = %caller))]
    pub async fn save(
        &self,
        post_id: PostId,
        box_id: BoxId,
        caller: UserId,
    ) -> Result<SaveOutcome> {
        self.owned(box_id, caller).await?;
        if !self.policy.fetch("post", || self.posts.post_exists(post_id)).await? {
            return Err(AppError::not_found("post", post_id));
        }
        let outcome = self.boxes.save_post(box_id, post_id).await?;
        debug!(new = outcome.is_new(), "post saved");
        Ok(outcome)
    }

    /// Removing a post that is not in the box is not an error.
    #[instrument(skip_all, fields(box_id = %box_id, post_id = %post_id, user_id = %caller))]
    pub async fn unsave(&self, post_id: PostId, box_id: BoxId, caller: UserId) -> Result<()> {
        self.owned(box_id, caller).await?;
        let removed = self.boxes.unsave_post(box_id, post_id).await?;
        debug!(removed, "post unsaved");
        Ok(())
    }

    async fn find(&self, box_id: BoxId) -> Result<RecipeBox> {
        self.policy
            .fetch("box", || self.boxes.get_box(box_id))
            .await?
            .ok_or_else(|| AppError::not_found("box", box_id))
    }

    async fn owned(&self, box_id: BoxId, caller: UserId) -> Result<RecipeBox> {
        let recipe_box = self.find(box_id).await?;
        if !recipe_box.is_owned_by(caller) {
            warn!(box_id = %box_id, user_id = %caller, "non-owner attempted to modify box");
            return Err(AppError::AuthorizationError("only the owner may modify this box".into()));
        }
        Ok(recipe_box)
    }
}

fn box_description(raw: Option<&str>) -> Result<Option<String>> {
    let description = raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    if description.as_ref().is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN) {
        return Err(ValidationReason::DescriptionTooLong.into());
    }
    Ok(description)
}
