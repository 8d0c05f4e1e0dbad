//! api-adapters/src/lib.rs
//!
//! HTTP surface for CookBook. The wire envelope and error mapping are always
//! built; the axum router sits behind the `web-axum` feature.

pub mod error;
pub mod metrics;

#[cfg(feature = "web-axum")]
pub mod extract;
#[cfg(feature = "web-axum")]
pub mod handlers;
#[cfg(feature = "web-axum")]
pub mod middleware;

pub use error::{status_code, ApiError, ApiResponse, ErrorBody};
pub use metrics::Metrics;

#[cfg(feature = "web-axum")]
pub use web::{router, AppState};

#[cfg(feature = "web-axum")]
mod web {
    use std::sync::Arc;

    use axum::routing::{get, post, put};
    use axum::Router;
    use domains::IdentityVerifier;
    use services::Services;

    use crate::handlers::*;
    use crate::metrics::Metrics;
    use crate::middleware;

    /// Shared by every handler. Cloning is cheap.
    #[derive(Clone)]
    pub struct AppState {
        pub services: Services,
        pub verifier: Arc<dyn IdentityVerifier>,
        pub metrics: Arc<Metrics>,
    }

    impl AppState {
        pub fn new(services: Services, verifier: Arc<dyn IdentityVerifier>) -> Self {
            AppState {
                services,
                verifier,
                metrics: Arc::new(Metrics::new()),
            }
        }
    }

    fn api_routes() -> Router<AppState> {
        Router::new()
            // posts
            .route("/posts/feed", get(feed))
            .route("/posts/recipe", post(create_post))
            .route("/posts/recipe/cook/{id}", get(cook_preview).post(cook))
            .route("/posts/{id}", get(get_post).patch(update_post).delete(delete_post))
            .route("/posts/{id}/order", put(reorder_post))
            .route("/posts/{id}/save", post(save_post))
            .route("/posts/{id}/save/{box_id}", axum::routing::delete(unsave_post))
            .route("/posts/{id}/comments", get(list_comments).post(create_comment))
            .route("/comments/{id}", axum::routing::patch(edit_comment).delete(delete_comment))
            // boxes
            .route("/boxes", get(my_boxes).post(create_box))
            .route("/boxes/{id}", get(get_box).patch(update_box).delete(delete_box))
            // users
            .route("/users/me", get(me))
            .route("/users/by-username/{username}", get(get_user_by_username))
            .route("/users/{id}", get(get_user).patch(update_user))
            .route("/users/{id}/posts", get(user_posts))
            .route("/users/{id}/boxes", get(user_boxes))
            .route("/users/{id}/followers", get(followers))
            .route("/users/{id}/following", get(following))
            .route("/users/{id}/follow", post(follow).delete(unfollow))
            // search
            .route("/search/recipes", get(search_recipes))
            .route("/search/tags", get(search_tags))
            .route("/search/users", get(search_users))
            .route("/tags", get(tags))
            .route("/parse/ingredients", post(parse_ingredients))
    }

    /// Full application router with request-id, tracing and CORS layers applied.
    pub fn router(state: AppState, cors_origins: &[String]) -> Router {
        let app = Router::new()
            .nest("/api", api_routes())
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .with_state(state);
        middleware::apply(app, cors_origins)
    }
}
