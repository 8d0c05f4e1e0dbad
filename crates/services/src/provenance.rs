//! # Provenance
//!
//! Write path: computing the attribution and inspiration of a post cooked
//! from another one. Read path: turning stored references into display
//! information without ever failing the page.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use domains::{
    AppError, Attribution, DisplayInfo, Inspiration, LinkedPost, PostBrief, PostId, PostRepo,
    ProvenanceReason, RecipePost, Result, SourceDisplay, SourceType, UserRepo,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bounded::FetchPolicy;

/// Outcome of resolving a cook's source.
#[derive(Debug, Clone)]
pub struct ResolvedProvenance {
    pub source: RecipePost,
    pub attribution: Attribution,
    pub inspiration: Inspiration,
}

/// The `attribution` object served with a cook form pre-fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookAttribution {
    pub source_type: SourceType,
    pub source_post_id: Option<PostId>,
    pub source_url: Option<String>,
    pub source_credit: Option<String>,
    pub inspo_post_id: Option<PostId>,
}

impl From<&ResolvedProvenance> for CookAttribution {
    fn from(resolved: &ResolvedProvenance) -> Self {
        let record = resolved.attribution.to_record();
        CookAttribution {
            source_type: record.source_type,
            source_post_id: record.source_post_id,
            source_url: record.source_url,
            source_credit: record.source_credit,
            inspo_post_id: resolved.inspiration.post_id(),
        }
    }
}

#[derive(Clone)]
pub struct ProvenanceResolver {
    posts: Arc<dyn PostRepo>,
    policy: FetchPolicy,
}

impl ProvenanceResolver {
    pub fn new(posts: Arc<dyn PostRepo>, policy: FetchPolicy) -> Self {
        Self { posts, policy }
    }

    /// Attribution for a post cooked from `source_id`.
    ///
    /// One hop only: the new post always points at its immediate parent,
    /// whatever the parent was itself attributed to. Inspiration is carried
    /// over unchanged. A source that is gone or unreachable aborts the cook.
    pub async fn resolve_cook(&self, source_id: PostId) -> Result<ResolvedProvenance> {
        let lookup = self.policy.fetch("source post", || self.posts.get_post(source_id)).await;
        let source = match lookup {
            Ok(Some(post)) => post,
            Ok(None) => {
                warn!(source_post_id = %source_id, "cook source no longer exists");
                return Err(AppError::ProvenanceError(ProvenanceReason::SourceUnavailable));
            }
            Err(AppError::Unavailable(cause)) => {
                warn!(source_post_id = %source_id, %cause, "cook source unreachable");
                return Err(AppError::ProvenanceError(ProvenanceReason::SourceUnavailable));
            }
            Err(other) => return Err(other),
        };

        let inspiration = match source.inspiration.post_id() {
            None => Inspiration::none(),
            Some(inspo_id) => match self
                .policy
                .fetch("inspiration post", || self.posts.post_exists(inspo_id))
                .await
            {
                Ok(true) => Inspiration::of(inspo_id),
                Ok(false) => {
                    warn!(
                        source_post_id = %source_id,
                        inspo_post_id = %inspo_id,
                        "dropping dangling inspiration on cook"
                    );
                    Inspiration::none()
                }
                // Not evidence of deletion; keep the reference as it was.
                Err(AppError::Unavailable(_)) => Inspiration::of(inspo_id),
                Err(other) => return Err(other),
            },
        };

        Ok(ResolvedProvenance {
            attribution: Attribution::Internal(source.id),
            inspiration,
            source,
        })
    }
}

struct CachedLink {
    /// `None` records a confirmed deletion.
    brief: Option<PostBrief>,
    fetched_at: Instant,
}

/// Read-time resolution of attribution and inspiration references.
pub struct DisplayResolver {
    posts: Arc<dyn PostRepo>,
    users: Arc<dyn UserRepo>,
    policy: FetchPolicy,
    ttl: Duration,
    cache: DashMap<PostId, CachedLink>,
}

impl DisplayResolver {
    pub fn new(
        posts: Arc<dyn PostRepo>,
        users: Arc<dyn UserRepo>,
        policy: FetchPolicy,
        ttl: Duration,
    ) -> Self {
        Self {
            posts,
            users,
            policy,
            ttl,
            cache: DashMap::new(),
        }
    }

    pub async fn resolve_display(
        &self,
        attribution: &Attribution,
        inspiration: Inspiration,
    ) -> DisplayInfo {
        let source = match attribution {
            Attribution::Original => SourceDisplay::Original,
            Attribution::External(url) => SourceDisplay::External {
                url: url.to_string(),
                host: domains::short_host(url),
            },
            Attribution::Credit(text) => SourceDisplay::Credit { text: text.clone() },
            Attribution::Internal(id) => SourceDisplay::Internal {
                source: self.link(*id).await,
            },
        };
        let inspiration = match inspiration.post_id() {
            Some(id) => Some(self.link(id).await),
            None => None,
        };
        DisplayInfo::new(source, inspiration)
    }

    /// Drops any cached view of `id`; call after the post changes.
    pub fn invalidate(&self, id: PostId) {
        self.cache.remove(&id);
    }

    async fn link(&self, id: PostId) -> LinkedPost {
        if let Some(hit) = self.cache.get(&id) {
            if hit.fetched_at.elapsed() < self.ttl {
                return match &hit.brief {
                    Some(brief) => LinkedPost::Resolved { post: brief.clone() },
                    None => LinkedPost::Unavailable { post_id: id },
                };
            }
        }

        match self.policy.fetch("linked post", || self.posts.get_post(id)).await {
            Ok(Some(post)) => {
                let author = self
                    .policy
                    .fetch("post author", || self.users.get_user(post.user_id))
                    .await;
                let username = match author {
                    Ok(user) => user.map(|u| u.username),
                    Err(e) => {
                        debug!(post_id = %id, error = %e, "author lookup failed");
                        None
                    }
                };
                let brief = PostBrief::of(&post, username);
                self.remember(id, Some(brief.clone()));
                LinkedPost::Resolved { post: brief }
            }
            Ok(None) => {
                debug!(post_id = %id, "linked post was deleted");
                self.remember(id, None);
                LinkedPost::Unavailable { post_id: id }
            }
            Err(e) => {
                debug!(post_id = %id, error = %e, "linked post lookup incomplete");
                LinkedPost::NeedsLookup { post_id: id }
            }
        }
    }

    /// Expired entries are evicted on every insert so the cache only holds
    /// links displayed within the last `ttl`.
    fn remember(&self, id: PostId, brief: Option<PostBrief>) {
        let ttl = self.ttl;
        self.cache.retain(|_, cached| cached.fetched_at.elapsed() < ttl);
        self.cache.insert(
            id,
            CachedLink {
                brief,
                fetched_at: Instant::now(),
            },
        );
    }
}
