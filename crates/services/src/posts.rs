//! Recipe post use cases: create, cook, edit, reorder, delete, read and list.

use std::sync::Arc;

use domains::{
    AppError, Attribution, AttributionInput, BoxRepo, BoxType, DisplayInfo, IngredientInput,
    Inspiration, NewRecipePost, OrderedList, Page, PostBrief, PostContent, PostDraft, PostId,
    PostPatch, PostQuery, PostRepo, RecipePost, Result, SourceDisplay, StepInput, UserId, UserRepo,
    ValidationReason,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::bounded::FetchPolicy;
use crate::provenance::{CookAttribution, DisplayResolver, ProvenanceResolver};

/// Body of `POST /posts/recipe`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePost {
    #[serde(flatten)]
    pub draft: PostDraft,
    #[serde(flatten)]
    pub attribution: AttributionInput,
    #[serde(default)]
    pub inspo_post_id: Option<PostId>,
}

/// Content a cook may change relative to its source. `None` keeps the
/// source's value (or leaves the field empty for fields that never carry over).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookOverrides {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ingredients: Option<Vec<IngredientInput>>,
    #[serde(default)]
    pub steps: Option<Vec<StepInput>>,
    #[serde(default)]
    pub self_rating: Option<i64>,
    #[serde(default)]
    pub cook_time_minutes: Option<i64>,
    #[serde(default)]
    pub servings: Option<i64>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl CookOverrides {
    /// Source content minus the fields a cook must supply for themselves,
    /// with every override applied on top.
    fn merge_onto(&self, source: &PostContent) -> PostDraft {
        let mut draft = PostDraft::from(source);
        draft.description = self.description.clone();
        draft.image_url = self.image_url.clone();
        draft.self_rating = self.self_rating;

        if let Some(title) = &self.title {
            draft.title = Some(title.clone());
        }
        if let Some(ingredients) = &self.ingredients {
            draft.ingredients = ingredients.clone();
        }
        if let Some(steps) = &self.steps {
            draft.steps = steps.clone();
        }
        if self.cook_time_minutes.is_some() {
            draft.cook_time_minutes = self.cook_time_minutes;
        }
        if self.servings.is_some() {
            draft.servings = self.servings;
        }
        if self.difficulty.is_some() {
            draft.difficulty = self.difficulty.clone();
        }
        if let Some(tags) = &self.tags {
            draft.tags = tags.clone();
        }
        draft
    }
}

/// Body of `POST /posts/recipe/cook/{id}`. Attribution fields are accepted by
/// the parser only so that supplying them can be rejected explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookRequest {
    #[serde(flatten)]
    pub overrides: CookOverrides,
    #[serde(flatten)]
    pub attribution: AttributionInput,
    #[serde(default)]
    pub inspo_post_id: Option<PostId>,
}

/// Cook form pre-fill: the source post and the attribution a cook of it gets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookPreview {
    pub source_post: RecipePost,
    pub attribution: CookAttribution,
}

/// A post as served by `GET /posts/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: RecipePost,
    pub source_post: Option<PostBrief>,
    pub inspo_post: Option<PostBrief>,
    pub attribution_display: DisplayInfo,
}

pub struct PostService {
    posts: Arc<dyn PostRepo>,
    boxes: Arc<dyn BoxRepo>,
    users: Arc<dyn UserRepo>,
    provenance: ProvenanceResolver,
    display: Arc<DisplayResolver>,
    policy: FetchPolicy,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepo>,
        boxes: Arc<dyn BoxRepo>,
        users: Arc<dyn UserRepo>,
        display: Arc<DisplayResolver>,
        policy: FetchPolicy,
    ) -> Self {
        Self {
            provenance: ProvenanceResolver::new(posts.clone(), policy),
            posts,
            boxes,
            users,
            display,
            policy,
        }
    }

    #[instrument(skip_all, fields(user_id = %owner))]
    pub async fn create(&self, owner: UserId, request: CreatePost) -> Result<RecipePost> {
        let content = PostContent::from_draft(&request.draft)?;
        let attribution = request.attribution.validate()?;
        if let Attribution::Internal(source_id) = attribution {
            self.require_post(source_id, ValidationReason::MissingSourcePost).await?;
        }
        let inspiration = Inspiration::from(request.inspo_post_id);
        if let Some(inspo_id) = inspiration.post_id() {
            self.require_post(inspo_id, ValidationReason::MissingInspoPost).await?;
        }

        let post = self
            .posts
            .insert_post(
                NewRecipePost {
                    user_id: owner,
                    content,
                    attribution,
                    inspiration,
                },
                None,
            )
            .await?;
        info!(post_id = %post.id, source_type = %post.attribution.kind(), "recipe post created");
        Ok(post)
    }

    /// Source post plus the attribution a cook of it would get.
    pub async fn cook_preview(&self, source_id: PostId) -> Result<CookPreview> {
        let resolved = self.provenance.resolve_cook(source_id).await?;
        Ok(CookPreview {
            attribution: CookAttribution::from(&resolved),
            source_post: resolved.source,
        })
    }

    /// Creates a new post derived from `source_id`, saved into the caller's
    /// `cooked` box in the same write. Aborts if the source cannot be resolved.
    #[instrument(skip_all, fields(user_id = %owner, source_post_id = %source_id))]
    pub async fn cook_from(
        &self,
        owner: UserId,
        source_id: PostId,
        request: CookRequest,
    ) -> Result<RecipePost> {
        if !request.attribution.is_empty() || request.inspo_post_id.is_some() {
            return Err(ValidationReason::AttributionNotOverridable.into());
        }

        let resolved = self.provenance.resolve_cook(source_id).await?;
        let draft = request.overrides.merge_onto(&resolved.source.content);
        let content = PostContent::from_draft(&draft)?;

        let cooked_box = self
            .policy
            .fetch("cooked box", || self.boxes.find_box_by_type(owner, BoxType::Cooked))
            .await?
            .map(|b| b.id);
        if cooked_box.is_none() {
            warn!(user_id = %owner, "user has no cooked box; cook will not be auto-saved");
        }

        let post = self
            .posts
            .insert_post(
                NewRecipePost {
                    user_id: owner,
                    content,
                    attribution: resolved.attribution,
                    inspiration: resolved.inspiration,
                },
                cooked_box,
            )
            .await?;
        info!(post_id = %post.id, "recipe cooked");
        Ok(post)
    }

    #[instrument(skip_all, fields(post_id = %post_id, user_id = %caller))]
    pub async fn update(
        &self,
        post_id: PostId,
        caller: UserId,
        patch: PostPatch,
    ) -> Result<RecipePost> {
        let post = self.owned_post(post_id, caller).await?;
        let content = post.content.patched(&patch)?;

        let attribution = if patch.attribution.is_empty() {
            post.attribution.clone()
        } else {
            patch.attribution.validate_with_default(post.attribution.kind())?
        };
        if let Attribution::Internal(source_id) = attribution {
            if source_id == post.id {
                return Err(ValidationReason::SelfSource.into());
            }
            // An unchanged reference is tolerated even if its target is gone.
            if post.attribution.source_post_id() != Some(source_id) {
                self.require_post(source_id, ValidationReason::MissingSourcePost).await?;
            }
        }

        let inspiration = match patch.inspo_post_id {
            None => post.inspiration,
            Some(None) => Inspiration::none(),
            Some(Some(inspo_id)) => {
                let inspiration = Inspiration::of(inspo_id);
                inspiration.check_owner(post.id)?;
                if post.inspiration.post_id() != Some(inspo_id) {
                    self.require_post(inspo_id, ValidationReason::MissingInspoPost).await?;
                }
                inspiration
            }
        };

        let updated = self
            .posts
            .update_post(RecipePost {
                content,
                attribution,
                inspiration,
                ..post
            })
            .await?
            .ok_or_else(|| AppError::not_found("post", post_id))?;
        self.display.invalidate(post_id);
        debug!("recipe post updated");
        Ok(updated)
    }

    /// Rearranges one ordered list. `order` lists the current `sort_order`
    /// values in their new sequence.
    #[instrument(skip_all, fields(post_id = %post_id, user_id = %caller))]
    pub async fn reorder(
        &self,
        post_id: PostId,
        caller: UserId,
        list: OrderedList,
        order: &[i32],
    ) -> Result<RecipePost> {
        let mut post = self.owned_post(post_id, caller).await?;
        match list {
            OrderedList::Ingredients => {
                post.content.ingredients = domains::reorder(&post.content.ingredients, order)?
            }
            OrderedList::Steps => {
                post.content.steps = domains::reorder(&post.content.steps, order)?
            }
        }
        let updated = self
            .posts
            .update_post(post)
            .await?
            .ok_or_else(|| AppError::not_found("post", post_id))?;
        self.display.invalidate(post_id);
        Ok(updated)
    }

    /// Owner-only. Comments and box memberships go with the post; posts that
    /// reference it keep a dangling id.
    #[instrument(skip_all, fields(post_id = %post_id, user_id = %caller))]
    pub async fn delete(&self, post_id: PostId, caller: UserId) -> Result<()> {
        self.owned_post(post_id, caller).await?;
        if !self.posts.delete_post(post_id).await? {
            return Err(AppError::not_found("post", post_id));
        }
        self.display.invalidate(post_id);
        info!("recipe post deleted");
        Ok(())
    }

    /// Full post with its provenance resolved for display. Never fails
    /// because of a broken reference.
    pub async fn get(&self, post_id: PostId) -> Result<PostView> {
        let post = self
            .policy
            .fetch("post", || self.posts.get_post(post_id))
            .await?
            .ok_or_else(|| AppError::not_found("post", post_id))?;
        let display = self.display.resolve_display(&post.attribution, post.inspiration).await;

        let source_post = match &display.source {
            SourceDisplay::Internal { source } => source.brief().cloned(),
            _ => None,
        };
        let inspo_post = display.inspiration.as_ref().and_then(|link| link.brief().cloned());
        Ok(PostView {
            post,
            source_post,
            inspo_post,
            attribution_display: display,
        })
    }

    /// Chronological listing, newest first.
    pub async fn list(&self, query: PostQuery, page: Page) -> Result<Vec<RecipePost>> {
        let query = match query {
            PostQuery::Text(text) => PostQuery::Text(non_blank_query(&text)?),
            PostQuery::Tag { name, category } => PostQuery::Tag {
                name: non_blank_query(&name)?.to_lowercase(),
                category,
            },
            PostQuery::ByUser(user_id) => {
                self.policy
                    .fetch("user", || self.users.get_user(user_id))
                    .await?
                    .ok_or_else(|| AppError::not_found("user", user_id))?;
                PostQuery::ByUser(user_id)
            }
            PostQuery::All => PostQuery::All,
        };
        Ok(self
            .policy
            .fetch("recipe search", || self.posts.list_posts(query.clone(), page))
            .await?)
    }

    async fn owned_post(&self, post_id: PostId, caller: UserId) -> Result<RecipePost> {
        let post = self
            .policy
            .fetch("post", || self.posts.get_post(post_id))
            .await?
            .ok_or_else(|| AppError::not_found("post", post_id))?;
        if !post.is_owned_by(caller) {
            warn!(post_id = %post_id, user_id = %caller, "non-owner attempted to modify post");
            return Err(AppError::AuthorizationError("only the owner may modify this post".into()));
        }
        Ok(post)
    }

    /// Write-time existence check for a referenced post.
    async fn require_post(&self, id: PostId, missing: ValidationReason) -> Result<()> {
        if self.policy.fetch("referenced post", || self.posts.post_exists(id)).await? {
            Ok(())
        } else {
            Err(missing.into())
        }
    }
}

pub(crate) fn non_blank_query(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationReason::MissingQuery.into());
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use chrono::Utc;
    use domains::StoreError;
    use domains::{MockBoxRepo, MockPostRepo, MockUserRepo, RecipeBox, BoxId};
    use mockall::predicate::{always, eq};

    fn source(id: i64, owner: i64) -> RecipePost {
        let content = PostContent::from_draft(&PostDraft {
            title: Some("Cacio e Pepe".into()),
            description: Some("peppery".into()),
            self_rating: Some(5),
            servings: Some(2),
            ingredients: vec![IngredientInput {
                name: Some("pecorino".into()),
                ..Default::default()
            }],
            steps: vec![StepInput { body: Some("toss".into()) }],
            tags: vec!["italian".into()],
            ..Default::default()
        })
        .unwrap();
        RecipePost {
            id: PostId(id),
            user_id: UserId(owner),
            content,
            attribution: Attribution::Credit("Nonna".into()),
            inspiration: Inspiration::none(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn service(posts: MockPostRepo, boxes: MockBoxRepo) -> PostService {
        let posts: Arc<dyn PostRepo> = Arc::new(posts);
        let users: Arc<dyn UserRepo> = Arc::new(MockUserRepo::new());
        let policy = FetchPolicy::new(Duration::from_millis(50));
        let display = Arc::new(DisplayResolver::new(
            posts.clone(),
            users.clone(),
            policy,
            Duration::from_secs(1),
        ));
        PostService::new(posts, Arc::new(boxes), users, display, policy)
    }

    fn stored(new: NewRecipePost, id: i64) -> RecipePost {
        RecipePost {
            id: PostId(id),
            user_id: new.user_id,
            content: new.content,
            attribution: new.attribution,
            inspiration: new.inspiration,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_rejects_missing_internal_source() {
        let mut posts = MockPostRepo::new();
        posts.expect_post_exists().with(eq(PostId(99))).returning(|_| Ok(false));
        posts.expect_insert_post().never();

        let request = CreatePost {
            draft: PostDraft {
                title: Some("Pasta".into()),
                self_rating: Some(4),
                ..Default::default()
            },
            attribution: AttributionInput {
                source_type: Some("internal".into()),
                source_post_id: Some(PostId(99)),
                ..Default::default()
            },
            inspo_post_id: None,
        };
        let err = service(posts, MockBoxRepo::new()).create(UserId(1), request).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(ValidationReason::MissingSourcePost)));
    }

    #[tokio::test]
    async fn cook_rejects_attribution_overrides() {
        let request = CookRequest {
            attribution: AttributionInput {
                source_type: Some("original".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = service(MockPostRepo::new(), MockBoxRepo::new())
            .cook_from(UserId(1), PostId(2), request)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::ValidationError(ValidationReason::AttributionNotOverridable)
        ));
    }

    #[tokio::test]
    async fn cook_copies_content_and_saves_into_cooked_box() {
        let mut posts = MockPostRepo::new();
        posts.expect_get_post().returning(|id| Ok(Some(source(id.get(), 7))));
        posts
            .expect_insert_post()
            .with(always(), eq(Some(BoxId(30))))
            .returning(|new, _| Ok(stored(new, 100)));
        let mut boxes = MockBoxRepo::new();
        boxes
            .expect_find_box_by_type()
            .with(eq(UserId(1)), eq(BoxType::Cooked))
            .returning(|owner, box_type| {
                Ok(Some(RecipeBox {
                    id: BoxId(30),
                    user_id: owner,
                    name: "Cooked".into(),
                    description: None,
                    is_default: true,
                    box_type,
                    created_at: Utc::now(),
                }))
            });

        let request = CookRequest {
            overrides: CookOverrides {
                self_rating: Some(3),
                ..Default::default()
            },
            ..Default::default()
        };
        let post = service(posts, boxes).cook_from(UserId(1), PostId(42), request).await.unwrap();

        assert_eq!(post.attribution, Attribution::Internal(PostId(42)));
        assert_eq!(post.content.title, "Cacio e Pepe");
        assert_eq!(post.content.servings, Some(2));
        assert_eq!(post.content.description, None);
        assert_eq!(post.content.self_rating, 3);
    }

    #[tokio::test]
    async fn cook_without_rating_is_rejected() {
        let mut posts = MockPostRepo::new();
        posts.expect_get_post().returning(|id| Ok(Some(source(id.get(), 7))));
        posts.expect_insert_post().never();

        let err = service(posts, MockBoxRepo::new())
            .cook_from(UserId(1), PostId(42), CookRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(ValidationReason::MissingSelfRating)));
    }

    #[tokio::test]
    async fn only_owner_may_update() {
        let mut posts = MockPostRepo::new();
        posts.expect_get_post().returning(|id| Ok(Some(source(id.get(), 7))));
        posts.expect_update_post().never();

        let err = service(posts, MockBoxRepo::new())
            .update(PostId(5), UserId(8), PostPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthorizationError(_)));
    }

    #[tokio::test]
    async fn update_rejects_self_source_and_self_inspiration() {
        let mut posts = MockPostRepo::new();
        posts.expect_get_post().returning(|id| Ok(Some(source(id.get(), 7))));
        posts.expect_update_post().never();
        let service = service(posts, MockBoxRepo::new());

        let patch = PostPatch {
            attribution: AttributionInput {
                source_type: Some("internal".into()),
                source_post_id: Some(PostId(5)),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = service.update(PostId(5), UserId(7), patch).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(ValidationReason::SelfSource)));

        let patch = PostPatch {
            inspo_post_id: Some(Some(PostId(5))),
            ..Default::default()
        };
        let err = service.update(PostId(5), UserId(7), patch).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(ValidationReason::SelfInspiration)));
    }

    #[tokio::test]
    async fn update_switching_credit_text_keeps_kind() {
        let mut posts = MockPostRepo::new();
        posts.expect_get_post().returning(|id| Ok(Some(source(id.get(), 7))));
        posts.expect_update_post().returning(|post| Ok(Some(post)));

        let patch = PostPatch {
            attribution: AttributionInput {
                source_credit: Some("Grandma Rosa".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let post = service(posts, MockBoxRepo::new())
            .update(PostId(5), UserId(7), patch)
            .await
            .unwrap();
        assert_eq!(post.attribution, Attribution::Credit("Grandma Rosa".into()));
    }

    #[test]
    fn create_body_splits_content_and_attribution() {
        let body = serde_json::json!({
            "title": "Pasta",
            "self_rating": 5,
            "ingredients": [{"name": "pasta"}],
            "steps": [{"body": "boil"}],
            "source_type": "credit",
            "source_credit": "Nonna",
            "inspo_post_id": 7
        });
        let request: CreatePost = serde_json::from_value(body).unwrap();
        assert_eq!(request.draft.title.as_deref(), Some("Pasta"));
        assert_eq!(request.draft.ingredients.len(), 1);
        assert_eq!(request.attribution.source_credit.as_deref(), Some("Nonna"));
        assert_eq!(request.inspo_post_id, Some(PostId(7)));
    }

    #[tokio::test]
    async fn blank_search_is_rejected() {
        let err = service(MockPostRepo::new(), MockBoxRepo::new())
            .list(PostQuery::Text("   ".into()), Page::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(ValidationReason::MissingQuery)));
    }

    #[tokio::test]
    async fn recipe_search_retries_a_transient_failure() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        let mut posts = MockPostRepo::new();
        posts
            .expect_list_posts()
            .with(eq(PostQuery::Text("pasta".into())), always())
            .returning(move |_, _| {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(StoreError::Unavailable("connection reset".into()))
                } else {
                    Ok(vec![source(3, 1)])
                }
            });

        let found = service(posts, MockBoxRepo::new())
            .list(PostQuery::Text(" pasta ".into()), Page::default())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn feed_gives_up_after_one_retry() {
        let mut posts = MockPostRepo::new();
        posts
            .expect_list_posts()
            .times(2)
            .returning(|_, _| Err(StoreError::Unavailable("pool exhausted".into())));

        let err = service(posts, MockBoxRepo::new())
            .list(PostQuery::All, Page::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unavailable(_)));
    }
}
