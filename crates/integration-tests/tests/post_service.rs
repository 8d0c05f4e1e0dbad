//! Post aggregate and provenance behavior over the in-memory store.

use domains::{
    AppError, Attribution, AttributionInput, IngredientInput, LinkedPost, OrderedList, Page,
    PostDraft, PostId, PostPatch, PostQuery, ProvenanceReason, SourceDisplay, SourceType, StepInput,
    ValidationReason,
};
use integration_tests::{fake_draft, memory_services, original_post, provisioned};
use services::{CookOverrides, CookRequest, CreatePost};

fn external(url: &str) -> CreatePost {
    CreatePost {
        draft: fake_draft(),
        attribution: AttributionInput {
            source_type: Some("external".into()),
            source_url: Some(url.into()),
            ..Default::default()
        },
        inspo_post_id: None,
    }
}

fn sort_orders<T>(items: &[T], key: impl Fn(&T) -> i32) -> Vec<i32> {
    items.iter().map(key).collect()
}

#[tokio::test]
async fn scenario_a_original_post_gets_dense_sort_orders() {
    let (_, services) = memory_services();
    let owner = provisioned(&services, 1, "alice").await;

    let post = services
        .posts
        .create(
            owner,
            CreatePost {
                draft: PostDraft {
                    title: Some("Pasta".into()),
                    self_rating: Some(5),
                    ingredients: vec![IngredientInput {
                        name: Some("pasta".into()),
                        ..Default::default()
                    }],
                    steps: vec![StepInput {
                        body: Some("boil".into()),
                    }],
                    ..Default::default()
                },
                attribution: AttributionInput {
                    source_type: Some("original".into()),
                    ..Default::default()
                },
                inspo_post_id: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(post.attribution.kind(), SourceType::Original);
    assert_eq!(sort_orders(&post.content.ingredients, |i| i.sort_order), vec![0]);
    assert_eq!(sort_orders(&post.content.steps, |s| s.sort_order), vec![0]);
}

#[tokio::test]
async fn scenario_b_cook_of_external_post_is_internal() {
    let (_, services) = memory_services();
    let alice = provisioned(&services, 1, "alice").await;
    let bob = provisioned(&services, 2, "bob").await;

    let source = services.posts.create(alice, external("https://x.com")).await.unwrap();
    let cooked = services
        .posts
        .cook_from(bob, source.id, CookRequest::default())
        .await
        .unwrap();

    assert_eq!(cooked.attribution, Attribution::Internal(source.id));
    assert_eq!(cooked.user_id, bob);
    assert_eq!(cooked.content.title, source.content.title);
}

#[tokio::test]
async fn cook_chains_point_one_hop_back() {
    let (_, services) = memory_services();
    let alice = provisioned(&services, 1, "alice").await;
    let bob = provisioned(&services, 2, "bob").await;
    let cara = provisioned(&services, 3, "cara").await;

    let a = services.posts.create(alice, original_post()).await.unwrap();
    let b = services.posts.cook_from(bob, a.id, CookRequest::default()).await.unwrap();
    let c = services.posts.cook_from(cara, b.id, CookRequest::default()).await.unwrap();

    assert_eq!(c.attribution.source_post_id(), Some(b.id));
    assert_ne!(c.attribution.source_post_id(), Some(a.id));
}

#[tokio::test]
async fn inspiration_passes_through_a_cook() {
    let (_, services) = memory_services();
    let alice = provisioned(&services, 1, "alice").await;
    let bob = provisioned(&services, 2, "bob").await;

    let spark = services.posts.create(alice, original_post()).await.unwrap();
    let mut inspired = original_post();
    inspired.inspo_post_id = Some(spark.id);
    let source = services.posts.create(alice, inspired).await.unwrap();

    let cooked = services.posts.cook_from(bob, source.id, CookRequest::default()).await.unwrap();
    assert_eq!(cooked.inspiration.post_id(), Some(spark.id));

    let preview = services.posts.cook_preview(source.id).await.unwrap();
    assert_eq!(preview.attribution.inspo_post_id, Some(spark.id));
    assert_eq!(preview.attribution.source_post_id, Some(source.id));
}

#[tokio::test]
async fn cook_overrides_apply_to_content_only() {
    let (_, services) = memory_services();
    let alice = provisioned(&services, 1, "alice").await;
    let bob = provisioned(&services, 2, "bob").await;
    let source = services.posts.create(alice, original_post()).await.unwrap();

    let cooked = services
        .posts
        .cook_from(
            bob,
            source.id,
            CookRequest {
                overrides: CookOverrides {
                    title: Some("Bob's take".into()),
                    self_rating: Some(2),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cooked.content.title, "Bob's take");
    assert_eq!(cooked.content.self_rating, 2);

    let err = services
        .posts
        .cook_from(
            bob,
            source.id,
            CookRequest {
                attribution: AttributionInput {
                    source_type: Some("original".into()),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::ValidationError(ValidationReason::AttributionNotOverridable)
    ));
}

#[tokio::test]
async fn scenario_d_deleted_source_aborts_the_cook() {
    let (_, services) = memory_services();
    let alice = provisioned(&services, 1, "alice").await;
    let bob = provisioned(&services, 2, "bob").await;

    let source = services.posts.create(alice, original_post()).await.unwrap();
    services.posts.cook_preview(source.id).await.unwrap();
    services.posts.delete(source.id, alice).await.unwrap();

    let err = services
        .posts
        .cook_from(bob, source.id, CookRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::ProvenanceError(ProvenanceReason::SourceUnavailable)
    ));

    let bobs = services
        .posts
        .list(PostQuery::ByUser(bob), Page::default())
        .await
        .unwrap();
    assert!(bobs.is_empty());
}

#[tokio::test]
async fn deleted_source_renders_as_placeholder() {
    let (_, services) = memory_services();
    let alice = provisioned(&services, 1, "alice").await;
    let bob = provisioned(&services, 2, "bob").await;

    let source = services.posts.create(alice, original_post()).await.unwrap();
    let cooked = services.posts.cook_from(bob, source.id, CookRequest::default()).await.unwrap();

    let view = services.posts.get(cooked.id).await.unwrap();
    assert_eq!(view.source_post.as_ref().map(|b| b.id), Some(source.id));
    assert_eq!(
        view.attribution_display.source_label,
        format!("Based on \"{}\"", source.content.title)
    );

    services.posts.delete(source.id, alice).await.unwrap();

    let view = services.posts.get(cooked.id).await.unwrap();
    assert!(view.source_post.is_none());
    assert_eq!(
        view.attribution_display.source,
        SourceDisplay::Internal {
            source: LinkedPost::Unavailable { post_id: source.id }
        }
    );
    assert_eq!(view.attribution_display.source_label, "(original recipe unavailable)");
}

#[tokio::test]
async fn internal_source_must_exist_on_create() {
    let (_, services) = memory_services();
    let alice = provisioned(&services, 1, "alice").await;

    let request = CreatePost {
        draft: fake_draft(),
        attribution: AttributionInput {
            source_type: Some("internal".into()),
            source_post_id: Some(PostId(404)),
            ..Default::default()
        },
        inspo_post_id: None,
    };
    let err = services.posts.create(alice, request).await.unwrap_err();
    assert!(matches!(err, AppError::ValidationError(ValidationReason::MissingSourcePost)));
}

#[tokio::test]
async fn owner_can_correct_attribution_kind() {
    let (_, services) = memory_services();
    let alice = provisioned(&services, 1, "alice").await;
    let bob = provisioned(&services, 2, "bob").await;
    let post = services.posts.create(alice, original_post()).await.unwrap();

    let patch = PostPatch {
        attribution: AttributionInput {
            source_type: Some("credit".into()),
            source_credit: Some("Nonna".into()),
            ..Default::default()
        },
        ..Default::default()
    };
    let err = services.posts.update(post.id, bob, patch.clone()).await.unwrap_err();
    assert!(matches!(err, AppError::AuthorizationError(_)));

    let updated = services.posts.update(post.id, alice, patch).await.unwrap();
    assert_eq!(updated.attribution, Attribution::Credit("Nonna".into()));

    let bad = PostPatch {
        attribution: AttributionInput {
            source_type: Some("original".into()),
            source_url: Some("https://example.com".into()),
            ..Default::default()
        },
        ..Default::default()
    };
    let err = services.posts.update(post.id, alice, bad).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::ValidationError(ValidationReason::ExtraneousSourceFields)
    ));
}

#[tokio::test]
async fn self_inspiration_is_rejected_once_the_id_is_known() {
    let (_, services) = memory_services();
    let alice = provisioned(&services, 1, "alice").await;
    let post = services.posts.create(alice, original_post()).await.unwrap();

    let err = services
        .posts
        .update(
            post.id,
            alice,
            PostPatch {
                inspo_post_id: Some(Some(post.id)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(ValidationReason::SelfInspiration)));
}

#[tokio::test]
async fn sort_orders_stay_dense_across_edits() {
    let (_, services) = memory_services();
    let alice = provisioned(&services, 1, "alice").await;
    let mut request = original_post();
    request.draft.steps = ["chop", "fry", "serve"]
        .iter()
        .map(|body| StepInput {
            body: Some(body.to_string()),
        })
        .collect();
    let post = services.posts.create(alice, request).await.unwrap();

    let reordered = services
        .posts
        .reorder(post.id, alice, OrderedList::Steps, &[2, 0, 1])
        .await
        .unwrap();
    let bodies: Vec<_> = reordered.content.steps.iter().map(|s| s.body.as_str()).collect();
    assert_eq!(bodies, ["serve", "chop", "fry"]);
    assert_eq!(sort_orders(&reordered.content.steps, |s| s.sort_order), vec![0, 1, 2]);

    let trimmed = services
        .posts
        .update(
            post.id,
            alice,
            PostPatch {
                steps: Some(vec![
                    StepInput { body: Some("eat".into()) },
                    StepInput { body: Some("nap".into()) },
                ]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(sort_orders(&trimmed.content.steps, |s| s.sort_order), vec![0, 1]);

    let err = services
        .posts
        .reorder(post.id, alice, OrderedList::Steps, &[0, 0])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(ValidationReason::InvalidReorder)));
}

#[tokio::test]
async fn out_of_vocabulary_tags_are_rejected() {
    let (_, services) = memory_services();
    let alice = provisioned(&services, 1, "alice").await;
    let mut request = original_post();
    request.draft.tags = vec!["italian".into(), "french".into()];

    let err = services.posts.create(alice, request).await.unwrap_err();
    assert!(matches!(err, AppError::ValidationError(ValidationReason::UnknownTag)));
}
