//! services/src/lib.rs
//!
//! Use cases for CookBook. Each service holds the ports it needs and is
//! shared behind an `Arc` by the HTTP layer.

use std::sync::Arc;
use std::time::Duration;

use domains::{BoxRepo, CommentRepo, PostRepo, UserRepo};

pub mod bounded;
pub mod boxes;
pub mod comments;
pub mod ingredient_parser;
pub mod posts;
pub mod provenance;
pub mod users;

pub use bounded::FetchPolicy;
pub use boxes::BoxService;
pub use comments::CommentService;
pub use ingredient_parser::{parse_ingredient, parse_lines, ParsedIngredient};
pub use posts::{CookOverrides, CookPreview, CookRequest, CreatePost, PostService, PostView};
pub use provenance::{CookAttribution, DisplayResolver, ProvenanceResolver, ResolvedProvenance};
pub use users::UserService;

/// The four repository ports, usually all backed by one store.
#[derive(Clone)]
pub struct Repos {
    pub posts: Arc<dyn PostRepo>,
    pub boxes: Arc<dyn BoxRepo>,
    pub comments: Arc<dyn CommentRepo>,
    pub users: Arc<dyn UserRepo>,
}

impl Repos {
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: PostRepo + BoxRepo + CommentRepo + UserRepo + 'static,
    {
        Repos {
            posts: store.clone(),
            boxes: store.clone(),
            comments: store.clone(),
            users: store,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    /// Bound on every lookup made while serving a request.
    pub fetch_timeout: Duration,
    /// How long a resolved source/inspiration link is reused for display.
    pub display_cache_ttl: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        ServiceSettings {
            fetch_timeout: bounded::DEFAULT_FETCH_TIMEOUT,
            display_cache_ttl: Duration::from_secs(30),
        }
    }
}

#[derive(Clone)]
pub struct Services {
    pub posts: Arc<PostService>,
    pub boxes: Arc<BoxService>,
    pub comments: Arc<CommentService>,
    pub users: Arc<UserService>,
}

impl Services {
    pub fn new(repos: Repos, settings: ServiceSettings) -> Self {
        let policy = FetchPolicy::new(settings.fetch_timeout);
        let display = Arc::new(DisplayResolver::new(
            repos.posts.clone(),
            repos.users.clone(),
            policy,
            settings.display_cache_ttl,
        ));
        Services {
            posts: Arc::new(PostService::new(
                repos.posts.clone(),
                repos.boxes.clone(),
                repos.users.clone(),
                display,
                policy,
            )),
            boxes: Arc::new(BoxService::new(repos.boxes.clone(), repos.posts.clone(), policy)),
            comments: Arc::new(CommentService::new(
                repos.comments.clone(),
                repos.posts.clone(),
                policy,
            )),
            users: Arc::new(UserService::new(repos.users, policy)),
        }
    }
}
