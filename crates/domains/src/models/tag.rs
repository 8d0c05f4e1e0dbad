//! Closed tag vocabulary. Tags are looked up by name; the category is implied.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagCategory {
    Cuisine,
    Dietary,
}

impl TagCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagCategory::Cuisine => "cuisine",
            TagCategory::Dietary => "dietary",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cuisine" => Some(TagCategory::Cuisine),
            "dietary" => Some(TagCategory::Dietary),
            _ => None,
        }
    }
}

impl fmt::Display for TagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const VOCABULARY: &[(TagCategory, &str)] = &[
    (TagCategory::Cuisine, "italian"),
    (TagCategory::Cuisine, "mexican"),
    (TagCategory::Cuisine, "japanese"),
    (TagCategory::Cuisine, "american"),
    (TagCategory::Cuisine, "mediterranean"),
    (TagCategory::Dietary, "vegan"),
    (TagCategory::Dietary, "vegetarian"),
    (TagCategory::Dietary, "gluten-free"),
    (TagCategory::Dietary, "dairy-free"),
];

/// A vocabulary tag. Ordered by category, then name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
    pub category: TagCategory,
    pub name: String,
}

impl Tag {
    /// Resolves a tag name (case-insensitive) against the vocabulary.
    pub fn lookup(name: &str) -> Result<Tag, ValidationReason> {
        let needle = name.trim().to_ascii_lowercase();
        VOCABULARY
            .iter()
            .find(|(_, known)| *known == needle)
            .map(|(category, known)| Tag {
                category: *category,
                name: (*known).to_string(),
            })
            .ok_or(ValidationReason::UnknownTag)
    }

    /// Every tag in the vocabulary, grouped by category.
    pub fn vocabulary() -> Vec<Tag> {
        VOCABULARY
            .iter()
            .map(|(category, name)| Tag {
                category: *category,
                name: (*name).to_string(),
            })
            .collect()
    }
}
