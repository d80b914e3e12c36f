//! Reverse type-reference index
//!
//! Maps every type id to the places that mention it, so impact reporting for a
//! removed type is a lookup instead of a rescan of the whole schema.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use crate::schema::{CanonicalSchema, TypeKind};

/// Syntactic position of a type reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceKind {
    ObjectProperty,
    ArrayItems,
    UnionMember,
    Alias,
    RequestBody,
    Response,
    Parameter,
}

/// Element that owns a reference
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "owner", content = "id", rename_all = "lowercase")]
pub enum ReferenceOwner {
    Type(String),
    Endpoint(String),
}

/// One place where a type id is referenced
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReferenceLocation {
    /// Dotted locator, e.g. `types.Order.properties.customer`
    pub path: String,
    pub kind: ReferenceKind,
    pub owner: ReferenceOwner,
}

/// A reference to a type id the schema does not define
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnresolvedReference {
    pub type_id: String,
    pub path: String,
}

/// Result of tracing everything that depends on one type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImpactTrace {
    /// Sorted, de-duplicated reference locations, direct and transitive
    pub locations: Vec<ReferenceLocation>,
    /// Some type on the trace reaches itself
    pub cycle_detected: bool,
}

impl ImpactTrace {
    pub fn paths(&self) -> Vec<String> {
        self.locations.iter().map(|l| l.path.clone()).collect()
    }
}

/// Reverse reference index for one schema
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    by_type: BTreeMap<String, Vec<ReferenceLocation>>,
    unresolved: Vec<UnresolvedReference>,
}

impl ReferenceIndex {
    /// Single pass over the schema
    pub fn build(schema: &CanonicalSchema) -> Self {
        let known: HashSet<&str> = schema.types.iter().map(|t| t.id.as_str()).collect();
        let mut index = Self::default();

        for ty in &schema.types {
            let owner = ReferenceOwner::Type(ty.id.clone());
            let base = format!("types.{}", ty.id);
            match &ty.kind {
                TypeKind::Primitive { .. } => {}
                TypeKind::Object { properties } => {
                    for prop in properties {
                        index.record(
                            &known,
                            &prop.type_ref,
                            format!("{}.properties.{}", base, prop.name),
                            ReferenceKind::ObjectProperty,
                            &owner,
                        );
                    }
                }
                TypeKind::Array { items } => {
                    index.record(&known, items, format!("{}.items", base), ReferenceKind::ArrayItems, &owner);
                }
                TypeKind::Union { members } => {
                    for member in members {
                        index.record(
                            &known,
                            member,
                            format!("{}.variants.{}", base, member),
                            ReferenceKind::UnionMember,
                            &owner,
                        );
                    }
                }
                TypeKind::Enum { .. } => {}
                TypeKind::Reference { target } => {
                    index.record(&known, target, format!("{}.target", base), ReferenceKind::Alias, &owner);
                }
            }
        }

        for endpoint in &schema.endpoints {
            let owner = ReferenceOwner::Endpoint(endpoint.operation_id.clone());
            let base = format!("endpoints.{}", endpoint.operation_id);
            for param in &endpoint.parameters {
                index.record(
                    &known,
                    &param.type_ref,
                    format!("{}.parameters.{}.{}", base, param.location, param.name),
                    ReferenceKind::Parameter,
                    &owner,
                );
            }
            if let Some(body) = &endpoint.request_body {
                index.record(
                    &known,
                    &body.type_ref,
                    format!("{}.requestBody", base),
                    ReferenceKind::RequestBody,
                    &owner,
                );
            }
            for response in &endpoint.responses {
                if let Some(type_ref) = &response.type_ref {
                    index.record(
                        &known,
                        type_ref,
                        format!("{}.responses.{}", base, response.status_code),
                        ReferenceKind::Response,
                        &owner,
                    );
                }
            }
        }

        for locations in index.by_type.values_mut() {
            locations.sort();
            locations.dedup();
        }
        index.unresolved.sort();
        index
    }

    fn record(
        &mut self,
        known: &HashSet<&str>,
        type_id: &str,
        path: String,
        kind: ReferenceKind,
        owner: &ReferenceOwner,
    ) {
        if !known.contains(type_id) {
            self.unresolved.push(UnresolvedReference {
                type_id: type_id.to_string(),
                path: path.clone(),
            });
        }
        self.by_type
            .entry(type_id.to_string())
            .or_default()
            .push(ReferenceLocation {
                path,
                kind,
                owner: owner.clone(),
            });
    }

    /// Locations that mention `type_id` directly
    pub fn direct_references(&self, type_id: &str) -> &[ReferenceLocation] {
        self.by_type.get(type_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// References to ids that no type in the schema defines
    pub fn unresolved(&self) -> &[UnresolvedReference] {
        &self.unresolved
    }

    /// Everything that reaches `type_id`, following enclosing types outward.
    ///
    /// Each type is expanded at most once, so self- and mutually-recursive
    /// types terminate.
    pub fn impact_of(&self, type_id: &str) -> ImpactTrace {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut found: BTreeSet<&ReferenceLocation> = BTreeSet::new();

        visited.insert(type_id);
        queue.push_back(type_id);

        while let Some(current) = queue.pop_front() {
            for location in self.direct_references(current) {
                found.insert(location);
                if let ReferenceOwner::Type(owner) = &location.owner {
                    if visited.insert(owner.as_str()) {
                        queue.push_back(owner.as_str());
                    }
                }
            }
        }

        ImpactTrace {
            locations: found.into_iter().cloned().collect(),
            cycle_detected: self.has_cycle(&visited),
        }
    }

    /// Types that enclose a reference to `type_id`
    fn owner_types(&self, type_id: &str) -> Vec<&str> {
        self.direct_references(type_id)
            .iter()
            .filter_map(|location| match &location.owner {
                ReferenceOwner::Type(owner) => Some(owner.as_str()),
                ReferenceOwner::Endpoint(_) => None,
            })
            .collect()
    }

    /// Whether the enclosing-type graph over `types` contains a cycle.
    ///
    /// `types` must be closed under [`Self::owner_types`], which the impact
    /// walk guarantees. Shared dependents (diamonds) are not cycles.
    fn has_cycle(&self, types: &HashSet<&str>) -> bool {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            OnStack,
            Done,
        }

        let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(types.len());
        for &start in types {
            if marks.contains_key(start) {
                continue;
            }
            marks.insert(start, Mark::OnStack);
            let mut stack: Vec<(&str, usize)> = vec![(start, 0)];

            while let Some((node, next)) = stack.pop() {
                let owners = self.owner_types(node);
                let Some(&owner) = owners.get(next) else {
                    marks.insert(node, Mark::Done);
                    continue;
                };
                stack.push((node, next + 1));
                match marks.get(owner) {
                    Some(Mark::OnStack) => return true,
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(owner, Mark::OnStack);
                        stack.push((owner, 0));
                    }
                }
            }
        }
        false
    }
}
