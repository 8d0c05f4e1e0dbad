//! Attribution and inspiration: how a recipe post declares where it came from.
//!
//! An [`Attribution`] is one of four kinds and carries exactly the auxiliary
//! field its kind needs. Inspiration is an independent, optional pointer to
//! another post and never affects the attribution kind.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ValidationReason;
use crate::ids::PostId;

pub const MAX_SOURCE_URL_LEN: usize = 500;
pub const MAX_SOURCE_CREDIT_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Original,
    External,
    Internal,
    Credit,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Original => "original",
            SourceType::External => "external",
            SourceType::Internal => "internal",
            SourceType::Credit => "credit",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = ValidationReason;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "original" => Ok(SourceType::Original),
            "external" => Ok(SourceType::External),
            "internal" => Ok(SourceType::Internal),
            "credit" => Ok(SourceType::Credit),
            _ => Err(ValidationReason::UnknownSourceType),
        }
    }
}

/// Validated attribution. Exactly the field matching the kind is populated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "AttributionRecord", try_from = "AttributionRecord")]
pub enum Attribution {
    #[default]
    Original,
    External(Url),
    /// Derived from another post on the platform.
    Internal(PostId),
    Credit(String),
}

impl Attribution {
    pub fn kind(&self) -> SourceType {
        match self {
            Attribution::Original => SourceType::Original,
            Attribution::External(_) => SourceType::External,
            Attribution::Internal(_) => SourceType::Internal,
            Attribution::Credit(_) => SourceType::Credit,
        }
    }

    pub fn source_post_id(&self) -> Option<PostId> {
        match self {
            Attribution::Internal(id) => Some(*id),
            _ => None,
        }
    }

    /// Builds an attribution from its flat parts, applying the strict
    /// one-field-per-kind rule.
    ///
    /// Blank strings count as absent. A missing kind-specific field is
    /// reported before any extraneous field.
    pub fn from_parts(
        kind: SourceType,
        source_url: Option<&str>,
        source_post_id: Option<PostId>,
        source_credit: Option<&str>,
    ) -> Result<Self, ValidationReason> {
        let source_url = non_blank(source_url);
        let source_credit = non_blank(source_credit);

        let attribution = match kind {
            SourceType::Original => Attribution::Original,
            SourceType::External => {
                let raw = source_url.ok_or(ValidationReason::MissingSourceUrl)?;
                Attribution::External(parse_source_url(raw)?)
            }
            SourceType::Internal => {
                Attribution::Internal(source_post_id.ok_or(ValidationReason::MissingSourcePost)?)
            }
            SourceType::Credit => {
                let credit = source_credit.ok_or(ValidationReason::MissingCreditText)?;
                if credit.chars().count() > MAX_SOURCE_CREDIT_LEN {
                    return Err(ValidationReason::SourceFieldTooLong);
                }
                Attribution::Credit(credit.to_string())
            }
        };

        let extraneous = (kind != SourceType::External && source_url.is_some())
            || (kind != SourceType::Internal && source_post_id.is_some())
            || (kind != SourceType::Credit && source_credit.is_some());
        if extraneous {
            return Err(ValidationReason::ExtraneousSourceFields);
        }

        Ok(attribution)
    }

    pub fn to_record(&self) -> AttributionRecord {
        self.clone().into()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_source_url(raw: &str) -> Result<Url, ValidationReason> {
    if raw.len() > MAX_SOURCE_URL_LEN {
        return Err(ValidationReason::SourceFieldTooLong);
    }
    let url = Url::parse(raw).map_err(|_| ValidationReason::MissingSourceUrl)?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(ValidationReason::MissingSourceUrl),
    }
}

/// Flat wire/storage shape of an attribution, as the REST API exposes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionRecord {
    pub source_type: SourceType,
    pub source_url: Option<String>,
    pub source_post_id: Option<PostId>,
    pub source_credit: Option<String>,
}

impl From<Attribution> for AttributionRecord {
    fn from(attribution: Attribution) -> Self {
        let source_type = attribution.kind();
        let mut record = AttributionRecord {
            source_type,
            source_url: None,
            source_post_id: None,
            source_credit: None,
        };
        match attribution {
            Attribution::Original => {}
            Attribution::External(url) => record.source_url = Some(url.into()),
            Attribution::Internal(id) => record.source_post_id = Some(id),
            Attribution::Credit(text) => record.source_credit = Some(text),
        }
        record
    }
}

impl TryFrom<AttributionRecord> for Attribution {
    type Error = ValidationReason;

    fn try_from(record: AttributionRecord) -> Result<Self, Self::Error> {
        Attribution::from_parts(
            record.source_type,
            record.source_url.as_deref(),
            record.source_post_id,
            record.source_credit.as_deref(),
        )
    }
}

/// Unvalidated attribution fields as submitted by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionInput {
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub source_post_id: Option<PostId>,
    #[serde(default)]
    pub source_credit: Option<String>,
}

impl AttributionInput {
    /// True when the client supplied no attribution field at all.
    pub fn is_empty(&self) -> bool {
        self.source_type.is_none()
            && self.source_url.is_none()
            && self.source_post_id.is_none()
            && self.source_credit.is_none()
    }

    /// Validates a fresh submission. A missing kind means `original`.
    pub fn validate(&self) -> Result<Attribution, ValidationReason> {
        self.validate_with_default(SourceType::Original)
    }

    /// Validates with `fallback` as the kind when none is given; used by edits
    /// that only touch the auxiliary field.
    pub fn validate_with_default(
        &self,
        fallback: SourceType,
    ) -> Result<Attribution, ValidationReason> {
        let kind = match non_blank(self.source_type.as_deref()) {
            Some(raw) => raw.parse()?,
            None => fallback,
        };
        Attribution::from_parts(
            kind,
            self.source_url.as_deref(),
            self.source_post_id,
            self.source_credit.as_deref(),
        )
    }
}

/// Optional pointer to a post cited as creative influence.
///
/// Only a platform-internal link exists; there is no textual form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inspiration(Option<PostId>);

impl Inspiration {
    pub fn none() -> Self {
        Inspiration(None)
    }

    pub fn of(post_id: PostId) -> Self {
        Inspiration(Some(post_id))
    }

    pub fn post_id(&self) -> Option<PostId> {
        self.0
    }

    pub fn is_some(&self) -> bool {
        self.0.is_some()
    }

    /// Rejects a post naming itself as its inspiration. Only meaningful once
    /// the owning post has an id.
    pub fn check_owner(&self, owner: PostId) -> Result<(), ValidationReason> {
        match self.0 {
            Some(id) if id == owner => Err(ValidationReason::SelfInspiration),
            _ => Ok(()),
        }
    }
}

impl From<Option<PostId>> for Inspiration {
    fn from(value: Option<PostId>) -> Self {
        Inspiration(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://x.com/pasta";
    const CREDIT: &str = "Grandma's notebook";

    fn input(kind: &str, url: bool, post: bool, credit: bool) -> AttributionInput {
        AttributionInput {
            source_type: Some(kind.to_string()),
            source_url: url.then(|| URL.to_string()),
            source_post_id: post.then_some(PostId(42)),
            source_credit: credit.then(|| CREDIT.to_string()),
        }
    }

    #[test]
    fn exactly_one_matching_field_is_accepted() {
        for kind in ["original", "external", "internal", "credit"] {
            for mask in 0u8..8 {
                let (url, post, credit) = (mask & 1 != 0, mask & 2 != 0, mask & 4 != 0);
                let result = input(kind, url, post, credit).validate();
                let expected_ok = match kind {
                    "original" => !url && !post && !credit,
                    "external" => url && !post && !credit,
                    "internal" => !url && post && !credit,
                    _ => !url && !post && credit,
                };
                assert_eq!(
                    result.is_ok(),
                    expected_ok,
                    "kind={kind} url={url} post={post} credit={credit} -> {result:?}"
                );
                if let Ok(attribution) = result {
                    let record = attribution.to_record();
                    let populated = [
                        record.source_url.is_some(),
                        record.source_post_id.is_some(),
                        record.source_credit.is_some(),
                    ]
                    .iter()
                    .filter(|set| **set)
                    .count();
                    assert_eq!(populated, usize::from(kind != "original"));
                }
            }
        }
    }

    #[test]
    fn missing_field_reasons() {
        let cases = [
            ("external", ValidationReason::MissingSourceUrl),
            ("internal", ValidationReason::MissingSourcePost),
            ("credit", ValidationReason::MissingCreditText),
        ];
        for (kind, reason) in cases {
            assert_eq!(input(kind, false, false, false).validate(), Err(reason));
        }
    }

    #[test]
    fn missing_field_reported_before_extraneous() {
        assert_eq!(
            input("external", false, true, false).validate(),
            Err(ValidationReason::MissingSourceUrl)
        );
        assert_eq!(
            input("original", true, false, false).validate(),
            Err(ValidationReason::ExtraneousSourceFields)
        );
    }

    #[test]
    fn blank_credit_is_missing() {
        let raw = AttributionInput {
            source_type: Some("credit".into()),
            source_credit: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(raw.validate(), Err(ValidationReason::MissingCreditText));
    }

    #[test]
    fn relative_or_non_http_urls_are_rejected() {
        let rejected = [
            "/recipes/1",
            "not a url",
            "mailto:chef@example.com",
            "ftp://files.example.com/r",
        ];
        for bad in rejected {
            let raw = AttributionInput {
                source_type: Some("external".into()),
                source_url: Some(bad.into()),
                ..Default::default()
            };
            assert_eq!(raw.validate(), Err(ValidationReason::MissingSourceUrl), "{bad}");
        }
    }

    #[test]
    fn missing_kind_defaults_to_original() {
        assert_eq!(AttributionInput::default().validate(), Ok(Attribution::Original));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let raw = AttributionInput { source_type: Some("stolen".into()), ..Default::default() };
        assert_eq!(raw.validate(), Err(ValidationReason::UnknownSourceType));
    }

    #[test]
    fn serializes_flat() {
        let value = serde_json::to_value(Attribution::Internal(PostId(42))).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "source_type": "internal",
                "source_url": null,
                "source_post_id": 42,
                "source_credit": null
            })
        );
    }

    #[test]
    fn deserializing_inconsistent_record_fails() {
        let raw = serde_json::json!({
            "source_type": "credit",
            "source_url": "https://x.com",
            "source_post_id": null,
            "source_credit": "Mom"
        });
        assert!(serde_json::from_value::<Attribution>(raw).is_err());
    }

    #[test]
    fn self_inspiration_is_rejected() {
        assert_eq!(
            Inspiration::of(PostId(7)).check_owner(PostId(7)),
            Err(ValidationReason::SelfInspiration)
        );
        assert!(Inspiration::of(PostId(7)).check_owner(PostId(8)).is_ok());
        assert!(Inspiration::none().check_owner(PostId(8)).is_ok());
    }
}
