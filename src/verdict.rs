//! Change aggregation and compatibility verdicts

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::compatibility::{ChangeCategory, CompatibilityChange, Severity};

/// How strictly breaking changes are judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    Strict,
    #[default]
    Standard,
    Lenient,
}

impl fmt::Display for Strictness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strictness::Strict => "strict",
            Strictness::Standard => "standard",
            Strictness::Lenient => "lenient",
        };
        f.write_str(name)
    }
}

impl FromStr for Strictness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Strictness::Strict),
            "standard" => Ok(Strictness::Standard),
            "lenient" => Ok(Strictness::Lenient),
            other => Err(format!("unknown strictness '{}'", other)),
        }
    }
}

/// Coarse compatibility classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompatibilityVerdict {
    FullyCompatible,
    BackwardsCompatible,
    Breaking,
    Incompatible,
}

impl CompatibilityVerdict {
    /// Process exit code recommended for CLI callers
    pub fn exit_code(&self) -> i32 {
        match self {
            CompatibilityVerdict::FullyCompatible | CompatibilityVerdict::BackwardsCompatible => 0,
            CompatibilityVerdict::Breaking => 1,
            CompatibilityVerdict::Incompatible => 2,
        }
    }
}

impl fmt::Display for CompatibilityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompatibilityVerdict::FullyCompatible => "fully-compatible",
            CompatibilityVerdict::BackwardsCompatible => "backwards-compatible",
            CompatibilityVerdict::Breaking => "breaking",
            CompatibilityVerdict::Incompatible => "incompatible",
        };
        f.write_str(name)
    }
}

/// Breaking-change counts above which a verdict becomes `incompatible`.
///
/// `strict` has no threshold: any breaking change is incompatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictPolicy {
    #[serde(default = "default_lenient_threshold")]
    pub lenient_incompatible_above: usize,
    #[serde(default = "default_standard_threshold")]
    pub standard_incompatible_above: usize,
}

fn default_lenient_threshold() -> usize {
    5
}

fn default_standard_threshold() -> usize {
    10
}

impl Default for VerdictPolicy {
    fn default() -> Self {
        Self {
            lenient_incompatible_above: default_lenient_threshold(),
            standard_incompatible_above: default_standard_threshold(),
        }
    }
}

impl VerdictPolicy {
    /// Classify a change set
    pub fn determine_verdict(
        &self,
        changes: &[CompatibilityChange],
        strictness: Strictness,
    ) -> CompatibilityVerdict {
        let breaking = changes.iter().filter(|c| c.is_breaking()).count();

        if breaking == 0 {
            return if changes.iter().any(|c| c.severity == Severity::NonBreaking) {
                CompatibilityVerdict::BackwardsCompatible
            } else {
                CompatibilityVerdict::FullyCompatible
            };
        }

        let incompatible = match strictness {
            Strictness::Strict => true,
            Strictness::Lenient => breaking > self.lenient_incompatible_above,
            Strictness::Standard => breaking > self.standard_incompatible_above,
        };

        if incompatible {
            CompatibilityVerdict::Incompatible
        } else {
            CompatibilityVerdict::Breaking
        }
    }
}

/// Verdict under the default thresholds
pub fn determine_verdict(changes: &[CompatibilityChange], strictness: Strictness) -> CompatibilityVerdict {
    VerdictPolicy::default().determine_verdict(changes, strictness)
}

/// Change counts by severity and category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilitySummary {
    pub total_changes: usize,
    pub breaking_changes: usize,
    pub non_breaking_changes: usize,
    pub patch_changes: usize,
    pub informational_changes: usize,
    pub by_category: BTreeMap<ChangeCategory, usize>,
}

impl CompatibilitySummary {
    pub fn from_changes(changes: &[CompatibilityChange]) -> Self {
        let mut summary = Self {
            total_changes: changes.len(),
            ..Self::default()
        };
        for change in changes {
            match change.severity {
                Severity::Breaking => summary.breaking_changes += 1,
                Severity::NonBreaking => summary.non_breaking_changes += 1,
                Severity::Patch => summary.patch_changes += 1,
                Severity::Informational => summary.informational_changes += 1,
            }
            *summary.by_category.entry(change.category).or_insert(0) += 1;
        }
        summary
    }
}
