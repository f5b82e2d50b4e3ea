//! Core data model
//!
//! Mirrors the recommender JSON shape closely enough to deserialize it
//! directly, while keeping the interpretation of operations in
//! [`crate::operation`].

use serde::{Deserialize, Serialize};

/// Lifecycle state of a recommendation as reported by the recommender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationState {
    /// Recommendation can be applied
    #[default]
    Active,
    /// Someone is applying the recommendation
    Claimed,
    /// Recommendation was applied
    Succeeded,
    /// Applying the recommendation failed
    Failed,
    /// Recommendation was dismissed by a user
    Dismissed,
    /// Any state this crate does not know about
    #[serde(other)]
    Unspecified,
}

impl RecommendationState {
    /// Wire name of the state
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Claimed => "CLAIMED",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Dismissed => "DISMISSED",
            Self::Unspecified => "STATE_UNSPECIFIED",
        }
    }
}

impl std::fmt::Display for RecommendationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State wrapper as it appears on the wire
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateInfo {
    /// Current state
    #[serde(default)]
    pub state: RecommendationState,
}

/// A cloud-provider-suggested change
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    /// Full resource name, unique per recommendation
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Recommender-specific subtype (e.g. `CHANGE_MACHINE_TYPE`)
    #[serde(default)]
    pub recommender_subtype: String,
    /// Consistency token required by every state transition
    #[serde(default)]
    pub etag: String,
    /// Lifecycle state
    #[serde(default)]
    pub state_info: StateInfo,
    /// Ordered operation groups
    #[serde(default)]
    pub content: RecommendationContent,
}

impl Recommendation {
    /// Current lifecycle state
    #[inline]
    #[must_use]
    pub fn state(&self) -> RecommendationState {
        self.state_info.state
    }

    /// All operations in application order
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.content
            .operation_groups
            .iter()
            .flat_map(|group| group.operations.iter())
    }

    /// Total number of operations across all groups
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.content
            .operation_groups
            .iter()
            .map(|group| group.operations.len())
            .sum()
    }
}

/// Content of a recommendation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationContent {
    /// Groups applied in order
    #[serde(default)]
    pub operation_groups: Vec<OperationGroup>,
}

/// Ordered operations applied together
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OperationGroup {
    /// Operations applied in order
    #[serde(default)]
    pub operations: Vec<Operation>,
}

/// One declarative step as received from the recommender
///
/// `value` is left untyped here; it is resolved against the action when the
/// operation is planned (see [`crate::operation::Step`]).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// `test`, `replace`, `add` or `remove`
    pub action: String,
    /// URL-like identifier of the target resource
    #[serde(default)]
    pub resource: String,
    /// Resource type, e.g. `compute.googleapis.com/Instance`
    #[serde(default)]
    pub resource_type: String,
    /// Field path inside the resource, e.g. `/machineType`
    #[serde(default)]
    pub path: String,
    /// Literal value (string or structured)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Pattern matcher, alternative to `value` for `test`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_matcher: Option<ValueMatcher>,
}

/// Pattern matcher for `test` operations
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueMatcher {
    /// Regular expression the whole field must match
    pub matches_pattern: String,
}

/// Live state of a compute instance
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    /// Instance name
    pub name: String,
    /// Machine type URL
    pub machine_type: String,
    /// Instance status, e.g. `RUNNING` or `TERMINATED`
    pub status: String,
}

/// A named precondition for listing or applying recommendations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    /// API title or permission group
    pub name: String,
    /// Whether the precondition holds
    pub satisfied: bool,
    /// Explanation when not satisfied
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,
}

impl Requirement {
    /// A satisfied requirement
    pub fn satisfied(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            satisfied: true,
            error_message: String::new(),
        }
    }

    /// An unsatisfied requirement with an explanation
    pub fn unsatisfied(name: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            satisfied: false,
            error_message: error_message.into(),
        }
    }
}

/// Requirement statuses of a single project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRequirements {
    /// Project id
    pub project: String,
    /// Every requirement checked for the project
    pub requirements: Vec<Requirement>,
}

impl ProjectRequirements {
    /// Whether every requirement is satisfied
    #[must_use]
    pub fn all_satisfied(&self) -> bool {
        self.requirements.iter().all(|r| r.satisfied)
    }
}

/// Outcome of listing recommendations across projects
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult {
    /// Recommendations of every project whose requirements are satisfied (unordered)
    pub recommendations: Vec<Recommendation>,
    /// Projects skipped because of unsatisfied requirements
    pub failed_projects: Vec<ProjectRequirements>,
}
