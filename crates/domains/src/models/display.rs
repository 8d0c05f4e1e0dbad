//! Read-time view of a post's provenance.
//!
//! Unlike the cook write path, display resolution never fails: a deleted
//! reference becomes a placeholder and a lookup that could not complete
//! becomes [`LinkedPost::NeedsLookup`].

use serde::{Deserialize, Serialize};
use url::Url;

use crate::ids::{PostId, UserId};
use crate::models::post::RecipePost;

const MAX_HOST_LABEL_LEN: usize = 30;

pub const ORIGINAL_LABEL: &str = "Original Recipe";
pub const SOURCE_UNAVAILABLE_LABEL: &str = "(original recipe unavailable)";
pub const SOURCE_PENDING_LABEL: &str = "Based on another recipe";
pub const INSPIRATION_UNAVAILABLE_LABEL: &str = "(inspiration unavailable)";
pub const INSPIRATION_PENDING_LABEL: &str = "Inspired by another cook";

/// Just enough of a referenced post to link to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostBrief {
    pub id: PostId,
    pub title: String,
    pub user_id: UserId,
    pub username: Option<String>,
    pub image_url: Option<String>,
}

impl PostBrief {
    pub fn of(post: &RecipePost, username: Option<String>) -> Self {
        PostBrief {
            id: post.id,
            title: post.content.title.clone(),
            user_id: post.user_id,
            username,
            image_url: post.content.image_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LinkedPost {
    Resolved { post: PostBrief },
    /// The referenced post was deleted.
    Unavailable { post_id: PostId },
    /// The id is known but the lookup did not complete; not evidence of deletion.
    NeedsLookup { post_id: PostId },
}

impl LinkedPost {
    pub fn post_id(&self) -> PostId {
        match self {
            LinkedPost::Resolved { post } => post.id,
            LinkedPost::Unavailable { post_id } | LinkedPost::NeedsLookup { post_id } => *post_id,
        }
    }

    pub fn brief(&self) -> Option<&PostBrief> {
        match self {
            LinkedPost::Resolved { post } => Some(post),
            _ => None,
        }
    }

    fn source_label(&self) -> String {
        match self {
            LinkedPost::Resolved { post } => format!("Based on \"{}\"", post.title),
            LinkedPost::Unavailable { .. } => SOURCE_UNAVAILABLE_LABEL.to_string(),
            LinkedPost::NeedsLookup { .. } => SOURCE_PENDING_LABEL.to_string(),
        }
    }

    fn inspiration_label(&self) -> String {
        match self {
            LinkedPost::Resolved { post } => match &post.username {
                Some(username) => format!("Inspired by {username}"),
                None => INSPIRATION_PENDING_LABEL.to_string(),
            },
            LinkedPost::Unavailable { .. } => INSPIRATION_UNAVAILABLE_LABEL.to_string(),
            LinkedPost::NeedsLookup { .. } => INSPIRATION_PENDING_LABEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceDisplay {
    Original,
    External { url: String, host: String },
    Internal { source: LinkedPost },
    Credit { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub source: SourceDisplay,
    pub source_label: String,
    pub inspiration: Option<LinkedPost>,
    pub inspiration_label: Option<String>,
}

impl DisplayInfo {
    pub fn new(source: SourceDisplay, inspiration: Option<LinkedPost>) -> Self {
        let source_label = match &source {
            SourceDisplay::Original => ORIGINAL_LABEL.to_string(),
            SourceDisplay::External { host, .. } => host.clone(),
            SourceDisplay::Internal { source } => source.source_label(),
            SourceDisplay::Credit { text } => text.clone(),
        };
        let inspiration_label = inspiration.as_ref().map(LinkedPost::inspiration_label);
        DisplayInfo {
            source,
            source_label,
            inspiration,
            inspiration_label,
        }
    }
}

/// Host without a leading `www.`, cut to 30 chars.
pub fn short_host(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.chars().count() > MAX_HOST_LABEL_LEN {
        let cut: String = host.chars().take(MAX_HOST_LABEL_LEN).collect();
        format!("{cut}…")
    } else {
        host.to_string()
    }
}
