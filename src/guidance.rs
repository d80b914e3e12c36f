//! Upgrade guidance for detected changes

use crate::compatibility::{ChangeCategory, CompatibilityChange};

fn template(category: ChangeCategory) -> Option<&'static str> {
    let text = match category {
        ChangeCategory::TypeRemoved => {
            "Type at {path} no longer exists. Replace its usages with a supported type before upgrading."
        }
        ChangeCategory::TypeModified => {
            "The shape of {path} changed. Regenerate client models and update code that constructs or reads it."
        }
        ChangeCategory::TypeAdded => "New type {path} is available. No action required.",
        ChangeCategory::PropertyRemoved => {
            "Stop reading or sending {path}; it is no longer part of the type."
        }
        ChangeCategory::PropertyAdded => {
            "Populate {path} when constructing this type if it is required; otherwise no action is needed."
        }
        ChangeCategory::PropertyTypeChanged => {
            "Update every read and write of {path} to the new type."
        }
        ChangeCategory::PropertyRequirementChanged => {
            "Check that {path} is always provided when required, and tolerate its absence when optional."
        }
        ChangeCategory::EnumValueRemoved => {
            "Remove uses of the value at {path} and handle any persisted data that still holds it."
        }
        ChangeCategory::EnumValueAdded => {
            "Make sure switch/match statements over this enum handle {path} or have a fallback branch."
        }
        ChangeCategory::UnionVariantRemoved => {
            "Drop handling of the variant at {path} and migrate values that use it."
        }
        ChangeCategory::UnionVariantAdded => {
            "Handle the new variant at {path} wherever the union is inspected."
        }
        ChangeCategory::EndpointRemoved => {
            "Calls to {path} will fail. Migrate to a replacement operation before upgrading."
        }
        ChangeCategory::EndpointAdded => "New operation {path} is available. No action required.",
        ChangeCategory::EndpointModified => {
            "Update clients and routing that call {path}; the request line changed."
        }
        ChangeCategory::EndpointDeprecated => {
            "Plan migration away from {path}; it may be removed in a future major version."
        }
        ChangeCategory::ParameterRemoved => "Stop sending the parameter {path}.",
        ChangeCategory::ParameterAdded => {
            "Send the parameter {path} on every call if it is required."
        }
        ChangeCategory::ParameterModified => {
            "Adjust how the parameter {path} is supplied to match its new definition."
        }
        ChangeCategory::RequestBodyChanged => {
            "Update request payloads sent to {path} to match the new body definition."
        }
        ChangeCategory::ResponseRemoved => {
            "Code that handles {path} will no longer see it; review fallback handling."
        }
        ChangeCategory::ResponseModified => {
            "Update response parsing for {path} to the new payload type."
        }
        ChangeCategory::ResponseAdded => {
            "Consider handling the new response {path}; unknown statuses should already be tolerated."
        }
        ChangeCategory::AuthSchemeRemoved => {
            "Credentials for {path} are no longer accepted. Switch to a remaining scheme."
        }
        ChangeCategory::AuthSchemeModified => {
            "Reconfigure credentials for {path}; the scheme type changed."
        }
        ChangeCategory::AuthSchemeAdded => "Authentication option {path} is now available.",
        ChangeCategory::ErrorCodeAdded => {
            "Handle {path} explicitly if it needs special treatment; otherwise generic error handling applies."
        }
        ChangeCategory::ErrorCodeRemoved | ChangeCategory::DocumentationChanged => return None,
    };
    Some(text)
}

/// Static guidance for a change, falling back to a generic message
pub fn generate_upgrade_guidance(change: &CompatibilityChange) -> String {
    match template(change.category) {
        Some(text) => text.replace("{path}", &change.path),
        None => format!(
            "Review and update code that depends on {} ({}).",
            change.path, change.category
        ),
    }
}
