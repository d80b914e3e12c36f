//! Semantic version bump recommendations

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::compatibility::{CompatibilityChange, Severity};

/// Kind of release a change set requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpType {
    Major,
    Minor,
    Patch,
    None,
}

impl fmt::Display for BumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BumpType::Major => "major",
            BumpType::Minor => "minor",
            BumpType::Patch => "patch",
            BumpType::None => "none",
        };
        f.write_str(name)
    }
}

/// Recommended next version for the target schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecommendation {
    pub bump_type: BumpType,
    pub current_version: String,
    pub recommended_version: String,
    pub rationale: String,
}

/// Parse a version, accepting a leading `v`
pub fn parse_version(version_str: &str) -> Result<Version, semver::Error> {
    let trimmed = version_str.trim();
    let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(bare)
}

/// Apply a bump; pre-release and build metadata are dropped.
///
/// Returns `None` when the bumped component would overflow.
pub fn bump(version: &Version, bump_type: BumpType) -> Option<Version> {
    match bump_type {
        BumpType::Major => Some(Version::new(version.major.checked_add(1)?, 0, 0)),
        BumpType::Minor => Some(Version::new(version.major, version.minor.checked_add(1)?, 0)),
        BumpType::Patch => Some(Version::new(
            version.major,
            version.minor,
            version.patch.checked_add(1)?,
        )),
        BumpType::None => Some(version.clone()),
    }
}

/// Recommend the next version given `current_version` and the detected changes.
///
/// An unparseable or exhausted version never fails the analysis: the
/// recommendation falls back to `none` and says why.
pub fn calculate_version_recommendation(
    current_version: &str,
    changes: &[CompatibilityChange],
) -> VersionRecommendation {
    let count = |severity: Severity| changes.iter().filter(|c| c.severity == severity).count();
    let breaking = count(Severity::Breaking);
    let non_breaking = count(Severity::NonBreaking);
    let patch = count(Severity::Patch);

    let version = match parse_version(current_version) {
        Ok(version) => version,
        Err(err) => {
            return VersionRecommendation {
                bump_type: BumpType::None,
                current_version: current_version.to_string(),
                recommended_version: current_version.to_string(),
                rationale: format!(
                    "Cannot parse '{}' as major.minor.patch ({}); no bump recommended",
                    current_version, err
                ),
            };
        }
    };

    let (bump_type, rationale) = if breaking > 0 {
        (
            BumpType::Major,
            format!("{} breaking change(s) require a major version bump", breaking),
        )
    } else if non_breaking > 0 {
        (
            BumpType::Minor,
            format!("{} backwards-compatible addition(s) warrant a minor version bump", non_breaking),
        )
    } else if patch > 0 {
        (
            BumpType::Patch,
            format!("{} patch-level change(s) warrant a patch version bump", patch),
        )
    } else {
        (BumpType::None, "No version-relevant changes detected".to_string())
    };

    let prefix = if current_version.trim().starts_with('v') { "v" } else { "" };
    let recommended_version = if bump_type == BumpType::None {
        current_version.to_string()
    } else {
        match bump(&version, bump_type) {
            Some(next) => format!("{}{}", prefix, next),
            None => {
                return VersionRecommendation {
                    bump_type: BumpType::None,
                    current_version: current_version.to_string(),
                    recommended_version: current_version.to_string(),
                    rationale: format!(
                        "{}, but '{}' cannot be bumped further; no bump recommended",
                        rationale, current_version
                    ),
                };
            }
        }
    };

    VersionRecommendation {
        bump_type,
        current_version: current_version.to_string(),
        recommended_version,
        rationale,
    }
}
