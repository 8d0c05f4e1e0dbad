use serde::{Deserialize, Serialize};

use crate::ids::UserId;
use crate::models::tag::TagCategory;

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

/// Raw `?limit=&offset=` query parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Page {
    fn default() -> Self {
        Page { limit: DEFAULT_LIMIT, offset: 0 }
    }
}

impl From<PageParams> for Page {
    /// Limit is capped at 100; non-positive limits fall back to the default.
    fn from(params: PageParams) -> Self {
        let limit = match params.limit {
            Some(limit) if limit > 0 => limit.min(i64::from(MAX_LIMIT)) as u32,
            _ => DEFAULT_LIMIT,
        };
        let offset = params
            .offset
            .filter(|o| *o > 0)
            .map(|o| o.min(i64::from(u32::MAX)) as u32)
            .unwrap_or(0);
        Page { limit, offset }
    }
}

/// Chronological post listings. Newest first; no ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostQuery {
    All,
    ByUser(UserId),
    /// Case-insensitive substring of the title or any ingredient name.
    Text(String),
    /// Partial tag name, optionally limited to one category.
    Tag {
        name: String,
        category: Option<TagCategory>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_capped_and_defaulted() {
        let page = Page::from(PageParams { limit: Some(500), offset: Some(40) });
        assert_eq!(page, Page { limit: 100, offset: 40 });

        let page = Page::from(PageParams { limit: Some(0), offset: Some(-3) });
        assert_eq!(page, Page::default());
    }
}
