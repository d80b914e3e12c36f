//! Structural compatibility comparison
//!
//! Four independent category comparators (types, endpoints, authentication,
//! errors) each push typed change records into a shared [`ChangeCollector`].
//! The collector applies ignore rules and the final list is sorted by a
//! stable key, so output never depends on input array order.

pub mod auth;
pub mod endpoints;
pub mod types;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::checksum::Checksum;
use crate::error::{AnalysisError, ErrorCode};
use crate::reference::ReferenceIndex;
use crate::schema::CanonicalSchema;

/// Severity of a detected change
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Breaking,
    NonBreaking,
    Patch,
    Informational,
}

impl Severity {
    /// `breaking` when the condition holds, otherwise `non-breaking`
    pub fn breaking_if(condition: bool) -> Self {
        if condition {
            Severity::Breaking
        } else {
            Severity::NonBreaking
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Breaking => "breaking",
            Severity::NonBreaking => "non-breaking",
            Severity::Patch => "patch",
            Severity::Informational => "informational",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of change categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeCategory {
    TypeAdded,
    TypeRemoved,
    TypeModified,
    PropertyAdded,
    PropertyRemoved,
    PropertyTypeChanged,
    PropertyRequirementChanged,
    EnumValueAdded,
    EnumValueRemoved,
    UnionVariantAdded,
    UnionVariantRemoved,
    EndpointAdded,
    EndpointRemoved,
    EndpointModified,
    EndpointDeprecated,
    ParameterAdded,
    ParameterRemoved,
    ParameterModified,
    RequestBodyChanged,
    ResponseAdded,
    ResponseRemoved,
    ResponseModified,
    AuthSchemeAdded,
    AuthSchemeRemoved,
    AuthSchemeModified,
    ErrorCodeAdded,
    ErrorCodeRemoved,
    DocumentationChanged,
}

impl ChangeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeCategory::TypeAdded => "type-added",
            ChangeCategory::TypeRemoved => "type-removed",
            ChangeCategory::TypeModified => "type-modified",
            ChangeCategory::PropertyAdded => "property-added",
            ChangeCategory::PropertyRemoved => "property-removed",
            ChangeCategory::PropertyTypeChanged => "property-type-changed",
            ChangeCategory::PropertyRequirementChanged => "property-requirement-changed",
            ChangeCategory::EnumValueAdded => "enum-value-added",
            ChangeCategory::EnumValueRemoved => "enum-value-removed",
            ChangeCategory::UnionVariantAdded => "union-variant-added",
            ChangeCategory::UnionVariantRemoved => "union-variant-removed",
            ChangeCategory::EndpointAdded => "endpoint-added",
            ChangeCategory::EndpointRemoved => "endpoint-removed",
            ChangeCategory::EndpointModified => "endpoint-modified",
            ChangeCategory::EndpointDeprecated => "endpoint-deprecated",
            ChangeCategory::ParameterAdded => "parameter-added",
            ChangeCategory::ParameterRemoved => "parameter-removed",
            ChangeCategory::ParameterModified => "parameter-modified",
            ChangeCategory::RequestBodyChanged => "request-body-changed",
            ChangeCategory::ResponseAdded => "response-added",
            ChangeCategory::ResponseRemoved => "response-removed",
            ChangeCategory::ResponseModified => "response-modified",
            ChangeCategory::AuthSchemeAdded => "auth-scheme-added",
            ChangeCategory::AuthSchemeRemoved => "auth-scheme-removed",
            ChangeCategory::AuthSchemeModified => "auth-scheme-modified",
            ChangeCategory::ErrorCodeAdded => "error-code-added",
            ChangeCategory::ErrorCodeRemoved => "error-code-removed",
            ChangeCategory::DocumentationChanged => "documentation-changed",
        }
    }
}

impl fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Area of the schema a comparator covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisCategory {
    Types,
    Endpoints,
    Authentication,
    Errors,
}

impl AnalysisCategory {
    pub const ALL: [AnalysisCategory; 4] = [
        AnalysisCategory::Types,
        AnalysisCategory::Endpoints,
        AnalysisCategory::Authentication,
        AnalysisCategory::Errors,
    ];
}

impl fmt::Display for AnalysisCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisCategory::Types => "types",
            AnalysisCategory::Endpoints => "endpoints",
            AnalysisCategory::Authentication => "authentication",
            AnalysisCategory::Errors => "errors",
        };
        f.write_str(name)
    }
}

impl FromStr for AnalysisCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "types" => Ok(AnalysisCategory::Types),
            "endpoints" => Ok(AnalysisCategory::Endpoints),
            "authentication" | "auth" => Ok(AnalysisCategory::Authentication),
            "errors" => Ok(AnalysisCategory::Errors),
            other => Err(format!("unknown analysis category '{}'", other)),
        }
    }
}

/// Who is affected by a change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeImpact {
    pub affected_components: Vec<String>,
    pub affected_languages: Vec<String>,
    /// 1 (trivial) to 5 (major rework)
    pub migration_complexity: u8,
}

/// A single detected difference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityChange {
    pub change_id: String,
    pub category: ChangeCategory,
    pub severity: Severity,
    /// Dotted locator, e.g. `types.User.properties.name`
    pub path: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_value: Option<serde_json::Value>,
    pub impact: ChangeImpact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_guidance: Option<String>,
}

impl CompatibilityChange {
    pub fn new(
        category: ChangeCategory,
        severity: Severity,
        path: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            change_id: String::new(),
            category,
            severity,
            path: path.into(),
            description: description.into(),
            source_value: None,
            target_value: None,
            impact: ChangeImpact {
                affected_components: Vec::new(),
                affected_languages: Vec::new(),
                migration_complexity: 1,
            },
            upgrade_guidance: None,
        }
    }

    pub fn complexity(mut self, level: u8) -> Self {
        self.impact.migration_complexity = level.clamp(1, 5);
        self
    }

    pub fn source<T: Serialize>(mut self, value: T) -> Self {
        self.source_value = serde_json::to_value(value).ok();
        self
    }

    pub fn target<T: Serialize>(mut self, value: T) -> Self {
        self.target_value = serde_json::to_value(value).ok();
        self
    }

    pub fn components(mut self, components: Vec<String>) -> Self {
        self.impact.affected_components = components;
        self
    }

    pub fn is_breaking(&self) -> bool {
        self.severity == Severity::Breaking
    }

    /// Ordering key for emitted change lists
    fn sort_key(&self) -> (&str, ChangeCategory, String, String) {
        (
            self.path.as_str(),
            self.category,
            value_key(&self.source_value),
            value_key(&self.target_value),
        )
    }

    /// Content-derived id, stable across runs
    fn assign_id(&mut self) {
        let digest = Checksum::from_text(&format!(
            "{}|{}|{}|{}",
            self.category,
            self.path,
            value_key(&self.source_value),
            value_key(&self.target_value),
        ));
        self.change_id = format!("chg-{}", digest.short());
    }
}

fn value_key(value: &Option<serde_json::Value>) -> String {
    value
        .as_ref()
        .map(crate::checksum::canonical_string)
        .unwrap_or_default()
}

/// Path prefixes excluded from analysis.
///
/// Matching is per dotted segment: `types.User` covers `types.User` and
/// `types.User.properties.id` but not `types.UserProfile`. Element ids may
/// themselves contain dots, so a prefix must either name a whole category
/// (`types`) or cover the whole owning element: `types.acme` does not reach
/// into `types.acme.User`.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    prefixes: Vec<String>,
}

impl IgnoreRules {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut prefixes: Vec<String> = prefixes
            .into_iter()
            .map(|p| p.as_ref().trim().trim_end_matches('.').to_string())
            .filter(|p| !p.is_empty())
            .collect();
        prefixes.sort();
        prefixes.dedup();
        Self { prefixes }
    }

    /// Whether `path`, located inside the element `owner`, is excluded
    pub fn is_ignored(&self, path: &str, owner: &str) -> bool {
        let category = owner.split('.').next().unwrap_or(owner);
        self.prefixes.iter().any(|prefix| {
            is_within(path, prefix) && (prefix.len() >= owner.len() || prefix == category)
        })
    }
}

/// `path` equals `prefix` or continues it at a segment boundary
fn is_within(path: &str, prefix: &str) -> bool {
    path == prefix
        || (path.starts_with(prefix) && path.as_bytes().get(prefix.len()) == Some(&b'.'))
}

/// A recoverable problem noticed while comparing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisWarning {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl AnalysisWarning {
    pub fn from_error(error: &AnalysisError, path: Option<String>) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
            path,
        }
    }
}

/// Accumulates changes from the category comparators
#[derive(Debug)]
pub struct ChangeCollector<'a> {
    ignore: &'a IgnoreRules,
    languages: &'a [String],
    owner: Option<String>,
    changes: Vec<CompatibilityChange>,
    warnings: Vec<AnalysisWarning>,
}

impl<'a> ChangeCollector<'a> {
    pub fn new(ignore: &'a IgnoreRules, languages: &'a [String]) -> Self {
        Self {
            ignore,
            languages,
            owner: None,
            changes: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Attribute the changes pushed next to the element at `owner`,
    /// e.g. `types.acme.User` or `endpoints.getUser`.
    ///
    /// Returns false when the whole element is ignored.
    pub fn enter(&mut self, owner: impl Into<String>) -> bool {
        let owner = owner.into();
        let ignored = self.ignore.is_ignored(&owner, &owner);
        self.owner = Some(owner);
        !ignored
    }

    pub fn push(&mut self, mut change: CompatibilityChange) {
        let owner = match &self.owner {
            Some(owner) if is_within(&change.path, owner) => owner.clone(),
            _ => change.path.clone(),
        };
        if self.ignore.is_ignored(&change.path, &owner) {
            return;
        }
        if matches!(change.severity, Severity::Breaking | Severity::NonBreaking) {
            change.impact.affected_languages = self.languages.to_vec();
        }
        if change.impact.affected_components.is_empty() {
            change.impact.affected_components.push(owner);
        }
        self.changes.push(change);
    }

    pub fn warn(&mut self, warning: AnalysisWarning) {
        self.warnings.push(warning);
    }

    /// Sorted changes with stable ids, plus warnings
    pub fn finish(self) -> (Vec<CompatibilityChange>, Vec<AnalysisWarning>) {
        let mut changes = self.changes;
        for change in &mut changes {
            change.assign_id();
        }
        changes.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let mut warnings = self.warnings;
        warnings.sort_by(|a, b| (&a.path, &a.message).cmp(&(&b.path, &b.message)));
        warnings.dedup();
        (changes, warnings)
    }
}

/// Outcome of running the selected comparators
#[derive(Debug, Clone, Default)]
pub struct ComparisonOutcome {
    pub changes: Vec<CompatibilityChange>,
    pub warnings: Vec<AnalysisWarning>,
}

/// Compares two schema versions
pub struct CompatibilityChecker<'a> {
    source: &'a CanonicalSchema,
    target: &'a CanonicalSchema,
    ignore: IgnoreRules,
    languages: Vec<String>,
}

impl<'a> CompatibilityChecker<'a> {
    /// Create a checker over two schemas
    pub fn new(source: &'a CanonicalSchema, target: &'a CanonicalSchema) -> Self {
        Self {
            source,
            target,
            ignore: IgnoreRules::default(),
            languages: Vec::new(),
        }
    }

    /// Skip every path under these prefixes
    pub fn ignoring(mut self, ignore: IgnoreRules) -> Self {
        self.ignore = ignore;
        self
    }

    /// SDK languages reported on breaking and non-breaking changes
    pub fn languages(mut self, languages: Vec<String>) -> Self {
        self.languages = languages;
        self
    }

    /// Run the comparators for `categories`.
    ///
    /// Both schemas are normalized first so recorded values, and the change
    /// ids derived from them, do not depend on serialization order.
    pub fn compare(&self, categories: &BTreeSet<AnalysisCategory>) -> ComparisonOutcome {
        let source = self.source.normalized();
        let target = self.target.normalized();
        let mut collector = ChangeCollector::new(&self.ignore, &self.languages);

        for category in categories {
            let before = collector.changes.len();
            collector.owner = None;
            match category {
                AnalysisCategory::Types => {
                    let index = ReferenceIndex::build(&source);
                    types::compare_types(&source, &target, &index, &mut collector);
                }
                AnalysisCategory::Endpoints => {
                    endpoints::compare_endpoints(&source, &target, &mut collector);
                }
                AnalysisCategory::Authentication => {
                    auth::compare_auth_schemes(&source, &target, &mut collector);
                }
                AnalysisCategory::Errors => {
                    auth::compare_errors(&source, &target, &mut collector);
                }
            }
            debug!(
                category = %category,
                changes = collector.changes.len() - before,
                "category compared"
            );
        }

        let (changes, warnings) = collector.finish();
        ComparisonOutcome { changes, warnings }
    }
}
