//! Feature request data types
//!
//! A feature request lives for exactly one API call. It selects a content
//! kind, which decides the collections searched for the document, and a plan,
//! which decides how long the listing stays featured.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Paid featuring plans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeaturePlan {
    #[serde(rename = "1_week")]
    OneWeek,
    #[serde(rename = "3_week")]
    ThreeWeeks,
}

impl FeaturePlan {
    #[must_use]
    pub fn weeks(self) -> i64 {
        match self {
            Self::OneWeek => 1,
            Self::ThreeWeeks => 3,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneWeek => "1_week",
            Self::ThreeWeeks => "3_week",
        }
    }
}

impl fmt::Display for FeaturePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown plan '{0}', expected 1_week or 3_week")]
pub struct UnknownPlan(pub String);

impl FromStr for FeaturePlan {
    type Err = UnknownPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1_week" => Ok(Self::OneWeek),
            "3_week" => Ok(Self::ThreeWeeks),
            other => Err(UnknownPlan(other.to_string())),
        }
    }
}

/// What kind of content is being featured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Job,
    /// Billboard listings and every other non-job content type
    Listing,
}

impl ContentKind {
    /// `"job"` selects jobs, every other content type is a listing
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type == "job" {
            Self::Job
        } else {
            Self::Listing
        }
    }

    /// Human label used in response messages
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Job => "Job",
            Self::Listing => "Listing",
        }
    }
}

/// A validated feature request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRequest {
    pub content_id: String,
    pub kind: ContentKind,
    pub plan: FeaturePlan,
    pub payment_id: Option<String>,
}

/// The time range during which a listing is featured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureWindow {
    pub featured_at: DateTime<Utc>,
    pub featured_until: DateTime<Utc>,
}

impl FeatureWindow {
    #[must_use]
    pub fn starting_at(now: DateTime<Utc>, plan: FeaturePlan) -> Self {
        Self {
            featured_at: now,
            featured_until: now + Duration::days(7 * plan.weeks()),
        }
    }
}
