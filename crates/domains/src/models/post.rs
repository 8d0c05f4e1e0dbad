//! The recipe post aggregate: content, ordered ingredient/step lists, tags,
//! attribution and inspiration.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationReason;
use crate::ids::{PostId, UserId};
use crate::models::attribution::{Attribution, AttributionInput, Inspiration};
use crate::models::tag::Tag;
use crate::serde_ext::nullable;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const MAX_INGREDIENT_NAME_LEN: usize = 200;
pub const MAX_INGREDIENT_FIELD_LEN: usize = 50;
pub const MAX_IMAGE_URL_LEN: usize = 500;
/// Per list: a post holds at most this many ingredients and this many steps.
pub const MAX_LIST_ITEMS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationReason> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(ValidationReason::InvalidDifficulty),
        }
    }
}

/// Items that carry a dense, zero-based position within their post.
pub trait Ordered {
    fn sort_order(&self) -> i32;
    fn set_sort_order(&mut self, order: i32);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub name: String,
    pub sort_order: i32,
}

impl Ordered for Ingredient {
    fn sort_order(&self) -> i32 {
        self.sort_order
    }

    fn set_sort_order(&mut self, order: i32) {
        self.sort_order = order;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub body: String,
    pub sort_order: i32,
}

impl Ordered for Step {
    fn sort_order(&self) -> i32 {
        self.sort_order
    }

    fn set_sort_order(&mut self, order: i32) {
        self.sort_order = order;
    }
}

/// Assigns `0..n` in current sequence order. Validated lists never exceed
/// [`MAX_LIST_ITEMS`], so the position always fits a sort order.
pub fn renumber<T: Ordered>(items: &mut [T]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.set_sort_order(i32::try_from(index).unwrap_or(i32::MAX));
    }
}

/// True when the sort orders are exactly `0..n` in sequence.
pub fn is_dense<T: Ordered>(items: &[T]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(index, item)| i32::try_from(index).is_ok_and(|i| i == item.sort_order()))
}

/// Rearranges `items` so that the item whose current `sort_order` is
/// `order[i]` lands at position `i`, then renumbers.
///
/// `order` must be a permutation of the current sort orders.
pub fn reorder<T: Ordered + Clone>(items: &[T], order: &[i32]) -> Result<Vec<T>, ValidationReason> {
    if order.len() != items.len() {
        return Err(ValidationReason::InvalidReorder);
    }
    let mut taken = vec![false; items.len()];
    let mut arranged = Vec::with_capacity(items.len());
    for wanted in order {
        let index = items
            .iter()
            .position(|item| item.sort_order() == *wanted)
            .ok_or(ValidationReason::InvalidReorder)?;
        if std::mem::replace(&mut taken[index], true) {
            return Err(ValidationReason::InvalidReorder);
        }
        arranged.push(items[index].clone());
    }
    renumber(&mut arranged);
    Ok(arranged)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientInput {
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepInput {
    #[serde(default)]
    pub body: Option<String>,
}

/// Unvalidated post content as submitted by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDraft {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<IngredientInput>,
    #[serde(default)]
    pub steps: Vec<StepInput>,
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
    pub tags: Vec<String>,
}

/// Validated post content. Ingredient and step `sort_order`s are dense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostContent {
    pub title: String,
    pub description: Option<String>,
    pub ingredients: Vec<Ingredient>,
    pub steps: Vec<Step>,
    pub self_rating: i32,
    pub cook_time_minutes: Option<i32>,
    pub servings: Option<i32>,
    pub difficulty: Option<Difficulty>,
    pub image_url: Option<String>,
    pub tags: BTreeSet<Tag>,
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn too_long(value: &Option<String>, max: usize) -> bool {
    value.as_ref().is_some_and(|v| v.chars().count() > max)
}

impl PostContent {
    /// Validates every content invariant and assigns `sort_order` in
    /// submission order.
    pub fn from_draft(draft: &PostDraft) -> Result<Self, ValidationReason> {
        let title = trimmed(draft.title.as_deref()).ok_or(ValidationReason::MissingTitle)?;
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(ValidationReason::TitleTooLong);
        }

        let description = trimmed(draft.description.as_deref());
        if too_long(&description, MAX_DESCRIPTION_LEN) {
            return Err(ValidationReason::DescriptionTooLong);
        }

        let self_rating = draft.self_rating.ok_or(ValidationReason::MissingSelfRating)?;
        if !(1..=5).contains(&self_rating) {
            return Err(ValidationReason::SelfRatingOutOfRange);
        }

        let cook_time_minutes = draft
            .cook_time_minutes
            .map(|v| i32::try_from(v).ok().filter(|v| *v >= 0))
            .map(|v| v.ok_or(ValidationReason::CookTimeOutOfRange))
            .transpose()?;

        let servings = draft
            .servings
            .map(|v| i32::try_from(v).ok().filter(|v| *v >= 1))
            .map(|v| v.ok_or(ValidationReason::ServingsOutOfRange))
            .transpose()?;

        let difficulty = trimmed(draft.difficulty.as_deref())
            .map(|raw| Difficulty::parse(&raw))
            .transpose()?;

        let image_url = trimmed(draft.image_url.as_deref());
        if too_long(&image_url, MAX_IMAGE_URL_LEN) {
            return Err(ValidationReason::ImageUrlTooLong);
        }

        if draft.ingredients.len() > MAX_LIST_ITEMS || draft.steps.len() > MAX_LIST_ITEMS {
            return Err(ValidationReason::TooManyItems);
        }

        let mut ingredients = draft
            .ingredients
            .iter()
            .map(|raw| {
                let name = trimmed(raw.name.as_deref())
                    .ok_or(ValidationReason::MissingIngredientName)?;
                let quantity = trimmed(raw.quantity.as_deref());
                let unit = trimmed(raw.unit.as_deref());
                if name.chars().count() > MAX_INGREDIENT_NAME_LEN
                    || too_long(&quantity, MAX_INGREDIENT_FIELD_LEN)
                    || too_long(&unit, MAX_INGREDIENT_FIELD_LEN)
                {
                    return Err(ValidationReason::IngredientFieldTooLong);
                }
                Ok(Ingredient { quantity, unit, name, sort_order: 0 })
            })
            .collect::<Result<Vec<_>, _>>()?;
        renumber(&mut ingredients);

        let mut steps = draft
            .steps
            .iter()
            .map(|raw| {
                trimmed(raw.body.as_deref())
                    .map(|body| Step { body, sort_order: 0 })
                    .ok_or(ValidationReason::MissingStepBody)
            })
            .collect::<Result<Vec<_>, _>>()?;
        renumber(&mut steps);

        let tags = draft
            .tags
            .iter()
            .map(|name| Tag::lookup(name))
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(PostContent {
            title,
            description,
            ingredients,
            steps,
            self_rating: self_rating as i32,
            cook_time_minutes,
            servings,
            difficulty,
            image_url,
            tags,
        })
    }

    /// Applies the content half of a patch and re-validates.
    pub fn patched(&self, patch: &PostPatch) -> Result<Self, ValidationReason> {
        let mut draft = PostDraft::from(self);
        if let Some(title) = &patch.title {
            draft.title = Some(title.clone());
        }
        if let Some(description) = &patch.description {
            draft.description = description.clone();
        }
        if let Some(ingredients) = &patch.ingredients {
            draft.ingredients = ingredients.clone();
        }
        if let Some(steps) = &patch.steps {
            draft.steps = steps.clone();
        }
        if let Some(rating) = patch.self_rating {
            draft.self_rating = Some(rating);
        }
        if let Some(cook_time) = patch.cook_time_minutes {
            draft.cook_time_minutes = cook_time;
        }
        if let Some(servings) = patch.servings {
            draft.servings = servings;
        }
        if let Some(difficulty) = &patch.difficulty {
            draft.difficulty = difficulty.clone();
        }
        if let Some(image_url) = &patch.image_url {
            draft.image_url = image_url.clone();
        }
        if let Some(tags) = &patch.tags {
            draft.tags = tags.clone();
        }
        PostContent::from_draft(&draft)
    }
}

impl From<&PostContent> for PostDraft {
    fn from(content: &PostContent) -> Self {
        PostDraft {
            title: Some(content.title.clone()),
            description: content.description.clone(),
            ingredients: content
                .ingredients
                .iter()
                .map(|i| IngredientInput {
                    quantity: i.quantity.clone(),
                    unit: i.unit.clone(),
                    name: Some(i.name.clone()),
                })
                .collect(),
            steps: content
                .steps
                .iter()
                .map(|s| StepInput { body: Some(s.body.clone()) })
                .collect(),
            self_rating: Some(i64::from(content.self_rating)),
            cook_time_minutes: content.cook_time_minutes.map(i64::from),
            servings: content.servings.map(i64::from),
            difficulty: content.difficulty.map(|d| d.as_str().to_string()),
            image_url: content.image_url.clone(),
            tags: content.tags.iter().map(|t| t.name.clone()).collect(),
        }
    }
}

/// Partial update submitted by a post owner. Absent fields are untouched;
/// `null` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub ingredients: Option<Vec<IngredientInput>>,
    #[serde(default)]
    pub steps: Option<Vec<StepInput>>,
    #[serde(default)]
    pub self_rating: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub cook_time_minutes: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub servings: Option<Option<i64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub difficulty: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub image_url: Option<Option<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(flatten)]
    pub attribution: AttributionInput,
    #[serde(default, deserialize_with = "nullable")]
    pub inspo_post_id: Option<Option<PostId>>,
}

/// A post ready to be persisted; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecipePost {
    pub user_id: UserId,
    pub content: PostContent,
    pub attribution: Attribution,
    pub inspiration: Inspiration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipePost {
    pub id: PostId,
    /// Owner; immutable after creation.
    pub user_id: UserId,
    #[serde(flatten)]
    pub content: PostContent,
    #[serde(flatten)]
    pub attribution: Attribution,
    #[serde(rename = "inspo_post_id")]
    pub inspiration: Inspiration,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecipePost {
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}

/// Which ordered list a reorder targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderedList {
    Ingredients,
    Steps,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pasta() -> PostDraft {
        PostDraft {
            title: Some("Pasta".into()),
            self_rating: Some(5),
            ingredients: vec![IngredientInput { name: Some("pasta".into()), ..Default::default() }],
            steps: vec![StepInput { body: Some("boil".into()) }],
            ..Default::default()
        }
    }

    #[test]
    fn minimal_draft_gets_dense_orders() {
        let content = PostContent::from_draft(&pasta()).unwrap();
        assert_eq!(content.ingredients[0].sort_order, 0);
        assert_eq!(content.steps[0].sort_order, 0);
        assert!(content.tags.is_empty());
    }

    #[test]
    fn required_fields_and_ranges() {
        let mut draft = pasta();
        draft.title = Some("   ".into());
        assert_eq!(PostContent::from_draft(&draft), Err(ValidationReason::MissingTitle));

        let mut draft = pasta();
        draft.self_rating = None;
        assert_eq!(PostContent::from_draft(&draft), Err(ValidationReason::MissingSelfRating));

        for rating in [0, 6, -1] {
            let mut draft = pasta();
            draft.self_rating = Some(rating);
            assert_eq!(
                PostContent::from_draft(&draft),
                Err(ValidationReason::SelfRatingOutOfRange)
            );
        }

        let mut draft = pasta();
        draft.servings = Some(0);
        assert_eq!(PostContent::from_draft(&draft), Err(ValidationReason::ServingsOutOfRange));

        let mut draft = pasta();
        draft.cook_time_minutes = Some(-5);
        assert_eq!(PostContent::from_draft(&draft), Err(ValidationReason::CookTimeOutOfRange));

        let mut draft = pasta();
        draft.cook_time_minutes = Some(0);
        assert!(PostContent::from_draft(&draft).is_ok());
    }

    #[test]
    fn description_limit_counts_chars() {
        let mut draft = pasta();
        draft.description = Some("é".repeat(MAX_DESCRIPTION_LEN));
        assert!(PostContent::from_draft(&draft).is_ok());
        draft.description = Some("é".repeat(MAX_DESCRIPTION_LEN + 1));
        assert_eq!(PostContent::from_draft(&draft), Err(ValidationReason::DescriptionTooLong));
    }

    #[test]
    fn tags_are_deduplicated_and_checked() {
        let mut draft = pasta();
        draft.tags = vec!["Vegan".into(), "vegan".into(), "italian".into()];
        let content = PostContent::from_draft(&draft).unwrap();
        assert_eq!(content.tags.len(), 2);

        draft.tags.push("klingon".into());
        assert_eq!(PostContent::from_draft(&draft), Err(ValidationReason::UnknownTag));
    }

    #[test]
    fn blank_step_or_ingredient_name_is_rejected() {
        let mut draft = pasta();
        draft.steps.push(StepInput { body: Some(" ".into()) });
        assert_eq!(PostContent::from_draft(&draft), Err(ValidationReason::MissingStepBody));

        let mut draft = pasta();
        draft.ingredients.push(IngredientInput {
            quantity: Some("2".into()),
            ..Default::default()
        });
        assert_eq!(
            PostContent::from_draft(&draft),
            Err(ValidationReason::MissingIngredientName)
        );
    }

    #[test]
    fn reorder_renumbers_contiguously() {
        let steps: Vec<Step> = ["a", "b", "c"]
            .iter()
            .enumerate()
            .map(|(i, b)| Step { body: b.to_string(), sort_order: i as i32 })
            .collect();
        let arranged = reorder(&steps, &[2, 0, 1]).unwrap();
        let bodies: Vec<_> = arranged.iter().map(|s| s.body.as_str()).collect();
        assert_eq!(bodies, ["c", "a", "b"]);
        assert!(is_dense(&arranged));
    }

    #[test]
    fn reorder_rejects_non_permutations() {
        let steps = vec![
            Step { body: "a".into(), sort_order: 0 },
            Step { body: "b".into(), sort_order: 1 },
        ];
        assert_eq!(reorder(&steps, &[0, 0]), Err(ValidationReason::InvalidReorder));
        assert_eq!(reorder(&steps, &[0]), Err(ValidationReason::InvalidReorder));
        assert_eq!(reorder(&steps, &[0, 5]), Err(ValidationReason::InvalidReorder));
    }

    #[test]
    fn patch_distinguishes_null_from_absent() {
        let patch: PostPatch = serde_json::from_value(serde_json::json!({
            "description": null,
            "servings": 4
        }))
        .unwrap();
        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.servings, Some(Some(4)));
        assert_eq!(patch.cook_time_minutes, None);
        assert!(patch.attribution.is_empty());
    }

    #[test]
    fn oversized_lists_are_rejected() {
        let mut draft = pasta();
        draft.steps = vec![StepInput { body: Some("stir".into()) }; MAX_LIST_ITEMS + 1];
        assert_eq!(PostContent::from_draft(&draft), Err(ValidationReason::TooManyItems));

        draft.steps.truncate(MAX_LIST_ITEMS);
        let content = PostContent::from_draft(&draft).unwrap();
        assert_eq!(content.steps.last().map(|s| s.sort_order), Some(99));
        assert!(is_dense(&content.steps));
    }

    #[test]
    fn patched_replaces_lists_and_renumbers() {
        let content = PostContent::from_draft(&pasta()).unwrap();
        let patch = PostPatch {
            steps: Some(vec![
                StepInput { body: Some("salt the water".into()) },
                StepInput { body: Some("boil".into()) },
            ]),
            description: Some(Some("weeknight staple".into())),
            ..Default::default()
        };
        let next = content.patched(&patch).unwrap();
        assert_eq!(next.steps.len(), 2);
        assert!(is_dense(&next.steps));
        assert_eq!(next.description.as_deref(), Some("weeknight staple"));
        assert_eq!(next.title, "Pasta");
    }
}
