//! # AppError
//!
//! Centralized error handling for the CookBook domain.
//! Maps domain-specific failures to actionable error types.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Machine-readable reason attached to every [`AppError::ValidationError`].
///
/// The `snake_case` form is the wire code clients switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationReason {
    // Attribution
    MissingSourceUrl,
    MissingSourcePost,
    MissingCreditText,
    ExtraneousSourceFields,
    SourceFieldTooLong,
    UnknownSourceType,
    SelfSource,
    AttributionNotOverridable,
    // Inspiration
    SelfInspiration,
    MissingInspoPost,
    // Post content
    MissingTitle,
    TitleTooLong,
    DescriptionTooLong,
    MissingSelfRating,
    SelfRatingOutOfRange,
    CookTimeOutOfRange,
    ServingsOutOfRange,
    InvalidDifficulty,
    MissingIngredientName,
    IngredientFieldTooLong,
    MissingStepBody,
    UnknownTag,
    ImageUrlTooLong,
    TooManyItems,
    InvalidReorder,
    // Boxes
    MissingBoxName,
    BoxNameTooLong,
    UnknownBoxType,
    // Comments
    MissingCommentBody,
    ParentCommentMismatch,
    // Users
    MissingUsername,
    MissingDisplayName,
    ProfileFieldTooLong,
    SelfFollow,
    // Queries
    MissingQuery,
}

impl ValidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingSourceUrl => "missing_source_url",
            Self::MissingSourcePost => "missing_source_post",
            Self::MissingCreditText => "missing_credit_text",
            Self::ExtraneousSourceFields => "extraneous_source_fields",
            Self::SourceFieldTooLong => "source_field_too_long",
            Self::UnknownSourceType => "unknown_source_type",
            Self::SelfSource => "self_source",
            Self::AttributionNotOverridable => "attribution_not_overridable",
            Self::SelfInspiration => "self_inspiration",
            Self::MissingInspoPost => "missing_inspo_post",
            Self::MissingTitle => "missing_title",
            Self::TitleTooLong => "title_too_long",
            Self::DescriptionTooLong => "description_too_long",
            Self::MissingSelfRating => "missing_self_rating",
            Self::SelfRatingOutOfRange => "self_rating_out_of_range",
            Self::CookTimeOutOfRange => "cook_time_out_of_range",
            Self::ServingsOutOfRange => "servings_out_of_range",
            Self::InvalidDifficulty => "invalid_difficulty",
            Self::MissingIngredientName => "missing_ingredient_name",
            Self::IngredientFieldTooLong => "ingredient_field_too_long",
            Self::MissingStepBody => "missing_step_body",
            Self::UnknownTag => "unknown_tag",
            Self::ImageUrlTooLong => "image_url_too_long",
            Self::TooManyItems => "too_many_items",
            Self::InvalidReorder => "invalid_reorder",
            Self::MissingBoxName => "missing_box_name",
            Self::BoxNameTooLong => "box_name_too_long",
            Self::UnknownBoxType => "unknown_box_type",
            Self::MissingCommentBody => "missing_comment_body",
            Self::ParentCommentMismatch => "parent_comment_mismatch",
            Self::MissingUsername => "missing_username",
            Self::MissingDisplayName => "missing_display_name",
            Self::ProfileFieldTooLong => "profile_field_too_long",
            Self::SelfFollow => "self_follow",
            Self::MissingQuery => "missing_query",
        }
    }
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason attached to [`AppError::ProvenanceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceReason {
    /// The post being cooked was deleted or could not be fetched.
    SourceUnavailable,
}

impl ProvenanceReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceUnavailable => "source_unavailable",
        }
    }
}

impl fmt::Display for ProvenanceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The primary error type for all domain and service operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Post, Box, Comment)
    #[error("{0} not found with ID {1}")]
    NotFound(&'static str, String),

    /// Caller input is wrong; fixable by correcting the request.
    #[error("validation error: {0}")]
    ValidationError(ValidationReason),

    /// Caller is identified but may not perform this action
    /// (non-owner mutation, default box mutation).
    #[error("forbidden: {0}")]
    AuthorizationError(String),

    /// No caller identity was supplied by the boundary.
    #[error("authentication required")]
    Unauthenticated,

    /// A cook could not resolve its source post. Aborts the write.
    #[error("provenance error: {0}")]
    ProvenanceError(ProvenanceReason),

    /// Resource already exists (e.g., duplicate username)
    #[error("conflict: {0}")]
    Conflict(String),

    /// A bounded dependency call timed out or the store is unreachable.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Infrastructure failure (e.g., DB down, corrupt row)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(kind: &'static str, id: impl fmt::Display) -> Self {
        AppError::NotFound(kind, id.to_string())
    }

    /// Machine-readable code for the wire envelope.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(..) => "not_found",
            AppError::ValidationError(reason) => reason.as_str(),
            AppError::AuthorizationError(_) => "forbidden",
            AppError::Unauthenticated => "unauthenticated",
            AppError::ProvenanceError(reason) => reason.as_str(),
            AppError::Conflict(_) => "conflict",
            AppError::Unavailable(_) => "unavailable",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<ValidationReason> for AppError {
    fn from(reason: ValidationReason) -> Self {
        AppError::ValidationError(reason)
    }
}

/// Errors surfaced by repository ports.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transient: the backing store did not answer in time or refused the connection.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness constraint rejected the write.
    #[error("store conflict: {0}")]
    Conflict(String),

    /// A row the write depends on disappeared before it landed.
    #[error("{0} {1} no longer exists")]
    Missing(&'static str, String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => AppError::Unavailable(msg),
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::Missing(kind, id) => AppError::NotFound(kind, id),
            StoreError::Backend(e) => AppError::Internal(format!("{e:#}")),
        }
    }
}

/// A specialized Result type for CookBook logic.
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type returned by repository ports.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
