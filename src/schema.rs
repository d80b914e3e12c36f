//! Canonical schema model
//!
//! Provider-neutral description of one API version: types, endpoints,
//! authentication schemes and error codes. Analysis only ever reads these.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::checksum::Checksum;
use crate::error::{AnalysisError, Result, SchemaSide};

/// Identity of one side of a comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaVersion {
    pub provider_id: String,
    /// Semver string (e.g., "1.4.0")
    pub version: String,
    pub schema_hash: String,
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.provider_id, self.version)
    }
}

/// A complete schema version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalSchema {
    pub provider_id: String,
    pub version: String,
    /// Hash supplied by the producer; computed from content when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_hash: Option<String>,
    #[serde(default)]
    pub types: Vec<TypeDefinition>,
    #[serde(default)]
    pub endpoints: Vec<EndpointDefinition>,
    #[serde(default)]
    pub auth_schemes: Vec<AuthScheme>,
    #[serde(default)]
    pub errors: Vec<ErrorDefinition>,
}

/// A named type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: TypeKind,
}

/// The shape of a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeKind {
    /// Scalar such as `string`, `integer`, `date-time`
    Primitive { format: String },
    Object {
        #[serde(default)]
        properties: Vec<PropertyDefinition>,
    },
    Array { items: String },
    Union { members: Vec<String> },
    Enum { values: Vec<String> },
    /// Alias of another type
    Reference { target: String },
}

/// Discriminant of [`TypeKind`] without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKindTag {
    Primitive,
    Object,
    Array,
    Union,
    Enum,
    Reference,
}

impl fmt::Display for TypeKindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeKindTag::Primitive => "primitive",
            TypeKindTag::Object => "object",
            TypeKindTag::Array => "array",
            TypeKindTag::Union => "union",
            TypeKindTag::Enum => "enum",
            TypeKindTag::Reference => "reference",
        };
        f.write_str(name)
    }
}

impl TypeKind {
    pub fn tag(&self) -> TypeKindTag {
        match self {
            TypeKind::Primitive { .. } => TypeKindTag::Primitive,
            TypeKind::Object { .. } => TypeKindTag::Object,
            TypeKind::Array { .. } => TypeKindTag::Array,
            TypeKind::Union { .. } => TypeKindTag::Union,
            TypeKind::Enum { .. } => TypeKindTag::Enum,
            TypeKind::Reference { .. } => TypeKindTag::Reference,
        }
    }
}

/// A property of an object type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDefinition {
    pub name: String,
    pub type_ref: String,
    #[serde(default)]
    pub required: bool,
}

/// An API operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDefinition {
    pub operation_id: String,
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    #[serde(default)]
    pub responses: Vec<ResponseDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub deprecated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDefinition {
    pub name: String,
    pub location: ParameterLocation,
    pub type_ref: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    pub type_ref: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDefinition {
    /// "200", "404", "2XX" or "default"
    pub status_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_ref: Option<String>,
}

impl ResponseDefinition {
    /// Success responses are part of the client contract
    pub fn is_success(&self) -> bool {
        self.status_code.starts_with('2')
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthScheme {
    pub id: String,
    #[serde(rename = "type")]
    pub scheme_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDefinition {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CanonicalSchema {
    /// Create an empty schema
    pub fn new(provider_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            version: version.into(),
            schema_hash: None,
            types: Vec::new(),
            endpoints: Vec::new(),
            auth_schemes: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Number of top-level elements, used for resource limits
    pub fn element_count(&self) -> usize {
        self.types.len() + self.endpoints.len() + self.auth_schemes.len() + self.errors.len()
    }

    /// Reject structurally invalid schemas
    pub fn validate(&self, side: SchemaSide) -> Result<()> {
        let mut reasons = Vec::new();

        if self.provider_id.trim().is_empty() {
            reasons.push("providerId is empty".to_string());
        }
        if self.version.trim().is_empty() {
            reasons.push("version is empty".to_string());
        }

        collect_duplicates("type id", self.types.iter().map(|t| t.id.as_str()), &mut reasons);
        collect_duplicates(
            "operationId",
            self.endpoints.iter().map(|e| e.operation_id.as_str()),
            &mut reasons,
        );
        collect_duplicates(
            "auth scheme id",
            self.auth_schemes.iter().map(|a| a.id.as_str()),
            &mut reasons,
        );
        collect_duplicates("error code", self.errors.iter().map(|e| e.code.as_str()), &mut reasons);

        for ty in &self.types {
            if let TypeKind::Object { properties } = &ty.kind {
                collect_duplicates(
                    &format!("property of type '{}'", ty.id),
                    properties.iter().map(|p| p.name.as_str()),
                    &mut reasons,
                );
            }
        }
        for endpoint in &self.endpoints {
            collect_duplicates(
                &format!("parameter of '{}'", endpoint.operation_id),
                endpoint
                    .parameters
                    .iter()
                    .map(|p| format!("{} {}", p.location, p.name)),
                &mut reasons,
            );
            collect_duplicates(
                &format!("response status of '{}'", endpoint.operation_id),
                endpoint.responses.iter().map(|r| r.status_code.as_str()),
                &mut reasons,
            );
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(AnalysisError::InvalidSchema { side, reasons })
        }
    }

    /// Copy with every collection sorted by its identity key.
    ///
    /// Two schemas that differ only in serialization order normalize to the same value.
    pub fn normalized(&self) -> Self {
        let mut schema = self.clone();
        schema.schema_hash = None;

        schema.types.sort_by(|a, b| a.id.cmp(&b.id));
        for ty in &mut schema.types {
            match &mut ty.kind {
                TypeKind::Object { properties } => properties.sort_by(|a, b| a.name.cmp(&b.name)),
                TypeKind::Union { members } => {
                    members.sort();
                    members.dedup();
                }
                TypeKind::Enum { values } => {
                    values.sort();
                    values.dedup();
                }
                TypeKind::Primitive { .. } | TypeKind::Array { .. } | TypeKind::Reference { .. } => {}
            }
        }

        schema.endpoints.sort_by(|a, b| a.operation_id.cmp(&b.operation_id));
        for endpoint in &mut schema.endpoints {
            endpoint
                .parameters
                .sort_by(|a, b| (a.location, &a.name).cmp(&(b.location, &b.name)));
            endpoint.responses.sort_by(|a, b| a.status_code.cmp(&b.status_code));
        }

        schema.auth_schemes.sort_by(|a, b| a.id.cmp(&b.id));
        schema.errors.sort_by(|a, b| a.code.cmp(&b.code));
        schema
    }

    /// Hash over the normalized content
    pub fn content_hash(&self) -> Result<Checksum> {
        Ok(Checksum::of(&self.normalized())?)
    }

    /// Identity used on the response; falls back to the content hash
    pub fn version_info(&self) -> Result<SchemaVersion> {
        let schema_hash = match &self.schema_hash {
            Some(hash) => hash.clone(),
            None => self.content_hash()?.to_string(),
        };
        Ok(SchemaVersion {
            provider_id: self.provider_id.clone(),
            version: self.version.clone(),
            schema_hash,
        })
    }
}

fn collect_duplicates<I, S>(label: &str, ids: I, reasons: &mut Vec<String>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = BTreeSet::new();
    let mut reported = BTreeSet::new();
    for id in ids {
        let id = id.as_ref();
        if id.trim().is_empty() {
            reasons.push(format!("empty {}", label));
        } else if !seen.insert(id.to_string()) && reported.insert(id.to_string()) {
            reasons.push(format!("duplicate {} '{}'", label, id));
        }
    }
}
