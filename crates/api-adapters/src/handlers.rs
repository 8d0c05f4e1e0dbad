//! HTTP handlers. Each one unpacks the request, calls one service method and
//! wraps the result in the `{data, message}` envelope.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use domains::{
    AppError, BoxDetail, BoxId, BoxInput, BoxPatch, Comment, CommentId, CommentInput, CommentThread,
    OrderedList, Page, PageParams, PostId, PostPatch, PostQuery, Profile, ProfilePatch, RecipeBox,
    RecipePost, Result, SaveOutcome, Tag, TagCategory, User, UserId, ValidationReason,
};
use services::{parse_lines, CookPreview, CookRequest, CreatePost, ParsedIngredient, PostView};

use crate::error::{ApiError, ApiResponse, ALREADY_SAVED};
use crate::extract::CurrentUser;
use crate::AppState;

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;
type Created<T> = std::result::Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

fn created<T>(data: T) -> Created<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(data))))
}

/// Counts the outcome of a write before handing it back.
fn track<T>(state: &AppState, operation: &str, result: Result<T>) -> Result<T> {
    state.metrics.record(operation, result.as_ref().err());
    result
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

pub async fn feed(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> ApiResult<Vec<RecipePost>> {
    ok(state.services.posts.list(PostQuery::All, Page::from(page)).await?)
}

pub async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<CreatePost>,
) -> Created<RecipePost> {
    let result = state.services.posts.create(user.id, body).await;
    created(track(&state, "post_create", result)?)
}

pub async fn cook_preview(
    State(state): State<AppState>,
    Path(source_id): Path<PostId>,
) -> ApiResult<CookPreview> {
    ok(state.services.posts.cook_preview(source_id).await?)
}

pub async fn cook(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(source_id): Path<PostId>,
    Json(body): Json<CookRequest>,
) -> Created<RecipePost> {
    let result = state.services.posts.cook_from(user.id, source_id, body).await;
    created(track(&state, "post_cook", result)?)
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<PostId>,
) -> ApiResult<PostView> {
    ok(state.services.posts.get(post_id).await?)
}

pub async fn update_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<PostId>,
    Json(patch): Json<PostPatch>,
) -> ApiResult<RecipePost> {
    let result = state.services.posts.update(post_id, user.id, patch).await;
    ok(track(&state, "post_update", result)?)
}

#[derive(Debug, Deserialize)]
pub struct ReorderBody {
    pub list: OrderedList,
    pub order: Vec<i32>,
}

pub async fn reorder_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<PostId>,
    Json(body): Json<ReorderBody>,
) -> ApiResult<RecipePost> {
    let result = state.services.posts.reorder(post_id, user.id, body.list, &body.order).await;
    ok(track(&state, "post_reorder", result)?)
}

pub async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<PostId>,
) -> std::result::Result<StatusCode, ApiError> {
    let result = state.services.posts.delete(post_id, user.id).await;
    track(&state, "post_delete", result)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Saves
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SaveBody {
    pub box_id: BoxId,
}

/// 201 for a new membership, 409 with the existing row for a repeat.
pub async fn save_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<PostId>,
    Json(body): Json<SaveBody>,
) -> std::result::Result<Response, ApiError> {
    let result = state.services.boxes.save(post_id, body.box_id, user.id).await;
    let outcome = track(&state, "post_save", result)?;
    let response = match outcome {
        SaveOutcome::Created(membership) => {
            (StatusCode::CREATED, Json(ApiResponse::success(membership))).into_response()
        }
        SaveOutcome::AlreadySaved(membership) => (
            StatusCode::CONFLICT,
            Json(ApiResponse {
                data: membership,
                message: ALREADY_SAVED.to_string(),
            }),
        )
            .into_response(),
    };
    Ok(response)
}

pub async fn unsave_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((post_id, box_id)): Path<(PostId, BoxId)>,
) -> std::result::Result<StatusCode, ApiError> {
    let result = state.services.boxes.unsave(post_id, box_id, user.id).await;
    track(&state, "post_unsave", result)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<PostId>,
) -> ApiResult<Vec<CommentThread>> {
    ok(state.services.comments.list(post_id).await?)
}

pub async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<PostId>,
    Json(body): Json<CommentInput>,
) -> Created<Comment> {
    let result = state.services.comments.create(post_id, user.id, body).await;
    created(track(&state, "comment_create", result)?)
}

pub async fn edit_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(comment_id): Path<CommentId>,
    Json(body): Json<CommentInput>,
) -> ApiResult<Comment> {
    let result = state.services.comments.edit(comment_id, user.id, body).await;
    ok(track(&state, "comment_edit", result)?)
}

#[derive(Debug, serde::Serialize)]
pub struct Deleted {
    pub deleted: u64,
}

pub async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(comment_id): Path<CommentId>,
) -> ApiResult<Deleted> {
    let result = state.services.comments.delete(comment_id, user.id).await;
    ok(Deleted {
        deleted: track(&state, "comment_delete", result)?,
    })
}

// ---------------------------------------------------------------------------
// Boxes
// ---------------------------------------------------------------------------

pub async fn my_boxes(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Vec<RecipeBox>> {
    ok(state.services.boxes.list_for(user.id).await?)
}

pub async fn create_box(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<BoxInput>,
) -> Created<RecipeBox> {
    let result = state.services.boxes.create(user.id, body).await;
    created(track(&state, "box_create", result)?)
}

pub async fn get_box(
    State(state): State<AppState>,
    Path(box_id): Path<BoxId>,
) -> ApiResult<BoxDetail> {
    ok(state.services.boxes.get_detail(box_id).await?)
}

pub async fn update_box(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(box_id): Path<BoxId>,
    Json(patch): Json<BoxPatch>,
) -> ApiResult<RecipeBox> {
    let result = state.services.boxes.update(box_id, user.id, patch).await;
    ok(track(&state, "box_update", result)?)
}

pub async fn delete_box(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(box_id): Path<BoxId>,
) -> std::result::Result<StatusCode, ApiError> {
    let result = state.services.boxes.delete(box_id, user.id).await;
    track(&state, "box_delete", result)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub async fn me(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Profile> {
    ok(state.services.users.profile(user.id).await?)
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Profile> {
    ok(state.services.users.profile(user_id).await?)
}

pub async fn get_user_by_username(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Profile> {
    ok(state.services.users.profile_by_username(&username).await?)
}

pub async fn update_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(user_id): Path<UserId>,
    Json(patch): Json<ProfilePatch>,
) -> ApiResult<User> {
    let result = state.services.users.update_profile(user_id, user.id, patch).await;
    ok(track(&state, "profile_update", result)?)
}

pub async fn user_posts(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Query(page): Query<PageParams>,
) -> ApiResult<Vec<RecipePost>> {
    ok(state.services.posts.list(PostQuery::ByUser(user_id), Page::from(page)).await?)
}

pub async fn user_boxes(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Vec<RecipeBox>> {
    ok(state.services.boxes.list_for(user_id).await?)
}

pub async fn followers(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Vec<User>> {
    ok(state.services.users.followers(user_id).await?)
}

pub async fn following(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Vec<User>> {
    ok(state.services.users.following(user_id).await?)
}

#[derive(Debug, serde::Serialize)]
pub struct FollowState {
    pub following: bool,
    pub changed: bool,
}

pub async fn follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(user_id): Path<UserId>,
) -> ApiResult<FollowState> {
    let result = state.services.users.follow(user.id, user_id).await;
    let changed = track(&state, "follow", result)?;
    ok(FollowState { following: true, changed })
}

pub async fn unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(user_id): Path<UserId>,
) -> ApiResult<FollowState> {
    let result = state.services.users.unfollow(user.id, user_id).await;
    let changed = track(&state, "unfollow", result)?;
    ok(FollowState { following: false, changed })
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct TextSearch {
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TagSearch {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

pub async fn search_recipes(
    State(state): State<AppState>,
    Query(search): Query<TextSearch>,
    Query(page): Query<PageParams>,
) -> ApiResult<Vec<RecipePost>> {
    let query = PostQuery::Text(search.q.unwrap_or_default());
    ok(state.services.posts.list(query, Page::from(page)).await?)
}

pub async fn search_tags(
    State(state): State<AppState>,
    Query(search): Query<TagSearch>,
    Query(page): Query<PageParams>,
) -> ApiResult<Vec<RecipePost>> {
    let category = match search.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        None => None,
        Some(raw) => Some(
            TagCategory::parse(raw).ok_or(AppError::from(ValidationReason::UnknownTag))?,
        ),
    };
    let query = PostQuery::Tag {
        name: search.tag.unwrap_or_default(),
        category,
    };
    ok(state.services.posts.list(query, Page::from(page)).await?)
}

pub async fn search_users(
    State(state): State<AppState>,
    Query(search): Query<TextSearch>,
    Query(page): Query<PageParams>,
) -> ApiResult<Vec<User>> {
    let text = search.q.unwrap_or_default();
    ok(state.services.users.search(&text, Page::from(page)).await?)
}

// ---------------------------------------------------------------------------
// Utilities
// ---------------------------------------------------------------------------

pub async fn tags() -> ApiResult<Vec<Tag>> {
    ok(Tag::vocabulary())
}

#[derive(Debug, Deserialize)]
pub struct ParseBody {
    #[serde(default)]
    pub lines: Vec<String>,
}

pub async fn parse_ingredients(Json(body): Json<ParseBody>) -> ApiResult<Vec<ParsedIngredient>> {
    ok(parse_lines(&body.lines))
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn metrics(State(state): State<AppState>) -> std::result::Result<Response, ApiError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::Internal(format!("metrics encoding failed: {e}")))?;
    Ok((
        [(header::CONTENT_TYPE, "application/openmetrics-text; version=1.0.0; charset=utf-8")],
        body,
    )
        .into_response())
}
