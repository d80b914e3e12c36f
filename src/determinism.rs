//! Reproducibility hashes
//!
//! The input hash covers what determines an analysis (both schema hashes and
//! the normalized options). The output hash covers what the analysis decided.
//! Timing and request ids are excluded from both.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::analyzer::AnalysisOptions;
use crate::checksum::Checksum;
use crate::compatibility::{AnalysisCategory, ChangeCategory, CompatibilityChange, Severity};
use crate::error::Result;
use crate::schema::SchemaVersion;
use crate::verdict::{CompatibilitySummary, CompatibilityVerdict, Strictness};
use crate::version::VersionRecommendation;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NormalizedOptions {
    strictness: Strictness,
    include_upgrade_guidance: bool,
    include_detailed_diff: bool,
    analyze_categories: BTreeSet<AnalysisCategory>,
    ignore_paths: BTreeSet<String>,
}

impl From<&AnalysisOptions> for NormalizedOptions {
    fn from(options: &AnalysisOptions) -> Self {
        Self {
            strictness: options.strictness,
            include_upgrade_guidance: options.include_upgrade_guidance,
            include_detailed_diff: options.include_detailed_diff,
            analyze_categories: options.effective_categories(),
            ignore_paths: options
                .ignore_paths
                .iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InputDigest<'a> {
    source_schema_hash: &'a str,
    target_schema_hash: &'a str,
    options: NormalizedOptions,
}

#[derive(Serialize, PartialEq, Eq, PartialOrd, Ord)]
struct ChangeDigest<'a> {
    category: ChangeCategory,
    path: &'a str,
    severity: Severity,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutputDigest<'a> {
    verdict: CompatibilityVerdict,
    summary: &'a CompatibilitySummary,
    changes: Vec<ChangeDigest<'a>>,
    version_recommendation: &'a VersionRecommendation,
}

/// Hash over the schema identities and normalized options
pub fn input_hash(
    source: &SchemaVersion,
    target: &SchemaVersion,
    options: &AnalysisOptions,
) -> Result<Checksum> {
    let digest = InputDigest {
        source_schema_hash: &source.schema_hash,
        target_schema_hash: &target.schema_hash,
        options: options.into(),
    };
    Ok(Checksum::of(&digest)?)
}

/// Hash over the decision.
///
/// Changes are reduced to (category, path, severity) and sorted by
/// (category, path) first, so the hash does not depend on emission order.
pub fn output_hash(
    verdict: CompatibilityVerdict,
    summary: &CompatibilitySummary,
    changes: &[CompatibilityChange],
    recommendation: &VersionRecommendation,
) -> Result<Checksum> {
    let mut simplified: Vec<ChangeDigest<'_>> = changes
        .iter()
        .map(|c| ChangeDigest {
            category: c.category,
            path: &c.path,
            severity: c.severity,
        })
        .collect();
    simplified.sort();

    let digest = OutputDigest {
        verdict,
        summary,
        changes: simplified,
        version_recommendation: recommendation,
    };
    Ok(Checksum::of(&digest)?)
}
