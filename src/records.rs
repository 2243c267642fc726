//! Record types persisted by the preference core
//!
//! Field names serialize as camelCase: the persisted snapshots are read
//! back by the JS presentation layer and must keep its layout.

use serde::{Deserialize, Serialize};

use crate::current_time_ms;

/// A bare reference to a brand as the presentation layer knows it:
/// enough to render a card, not enough to compare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

impl BrandRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            logo: None,
        }
    }
}

/// One liked or disliked brand. The same shape serves both sets; a given
/// id lives in at most one of the two at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceEntry {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    pub timestamp: u64,
}

impl PreferenceEntry {
    /// Build an entry for the given reference with a fresh timestamp.
    pub fn from_ref(reference: &BrandRef) -> Self {
        Self {
            id: reference.id.clone(),
            name: reference.name.clone(),
            logo: reference.logo.clone(),
            timestamp: current_time_ms(),
        }
    }
}

/// Fully detailed brand record held in the compare set.
///
/// Produced either by a remote fetch or by deterministic synthesis; callers
/// never see which.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandDetail {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    pub grade: String,
    pub investment_min: u64,
    pub investment_max: u64,
    pub franchise_fee: u64,
    pub working_capital: u64,
    /// Marketing fund contribution, percent of gross sales
    pub marketing_fee: f64,
    /// Ongoing royalty, percent of gross sales
    pub royalty: f64,
    /// Initial franchise term, years
    pub initial_term: u32,
    pub locations: u32,
    pub founded: u32,
    pub item19_disclosed: bool,
    pub why_yes: Vec<String>,
    pub why_not: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_revenue: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_profit: Option<u64>,
}

/// A saved brand: a reference plus whatever summary fields were on hand
/// when the user saved it. Enriched lazily at display time; independent of
/// likes, dislikes, and compare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedBrand {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investment_min: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investment_max: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit_chips: Option<Vec<String>>,
}

impl SavedBrand {
    pub fn from_ref(reference: &BrandRef) -> Self {
        Self {
            id: reference.id.clone(),
            name: reference.name.clone(),
            grade: None,
            investment_min: None,
            investment_max: None,
            sector: None,
            category: None,
            fit_chips: None,
        }
    }
}

/// A brand's published grade, kept in the global (non-user-scoped) registry.
/// Keyed by slug; also looked up by brand id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandGrade {
    pub brand_id: String,
    pub brand_slug: String,
    pub grade: String,
    pub last_updated: u64,
}

/// CRM contact, upserted keyed by email. The generated id is stable across
/// updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmContact {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_action: Option<String>,
}

/// What the user did. Serialized lowercase into the engagement log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementAction {
    Like,
    Unlike,
    Dislike,
    Undislike,
    Save,
    Unsave,
    Compare,
    Uncompare,
}

impl EngagementAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementAction::Like => "like",
            EngagementAction::Unlike => "unlike",
            EngagementAction::Dislike => "dislike",
            EngagementAction::Undislike => "undislike",
            EngagementAction::Save => "save",
            EngagementAction::Unsave => "unsave",
            EngagementAction::Compare => "compare",
            EngagementAction::Uncompare => "uncompare",
        }
    }
}

/// One entry in the append-only engagement log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementRecord {
    pub id: String,
    pub user_id: String,
    pub brand_id: String,
    pub brand_name: String,
    pub action: EngagementAction,
    pub timestamp: u64,
}

/// A user action handed to the telemetry sink after its mutation committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementEvent {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    pub brand_id: String,
    pub brand_name: String,
    pub action: EngagementAction,
    pub timestamp: u64,
}

impl EngagementEvent {
    /// Build an event for a committed mutation, stamped now.
    pub fn new(user_id: impl Into<String>, action: EngagementAction, brand: &BrandRef) -> Self {
        Self {
            user_id: user_id.into(),
            contact_email: None,
            contact_name: None,
            brand_id: brand.id.clone(),
            brand_name: brand.name.clone(),
            action,
            timestamp: current_time_ms(),
        }
    }

    pub fn with_contact(
        mut self,
        email: impl Into<String>,
        name: Option<String>,
    ) -> Self {
        self.contact_email = Some(email.into());
        self.contact_name = name;
        self
    }
}

/// Category metadata served by the remote data service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryData {
    pub slug: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub brand_count: u32,
}
