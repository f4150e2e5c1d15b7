use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResource;
use serde::{Deserialize, Serialize};

use crate::error::DiscoveryError;

/// Resolved coordinates of a single API resource type.
///
/// Built fresh for every resolution; nothing holds on to it between calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    /// API group, empty for the core group.
    pub group: String,
    pub version: String,
    pub kind: String,
    /// The discovery resource name, e.g. `deployments`.
    pub plural_name: String,
    pub singular_name: String,
    pub short_names: Vec<String>,
    pub namespaced: bool,
}

impl ResourceDescriptor {
    /// Combine a discovered resource with the group version it was served under.
    pub fn from_api_resource(
        api_resource: &APIResource,
        group_version: &str,
    ) -> Result<Self, DiscoveryError> {
        let (group, version) = parse_group_version(group_version)?;
        Ok(Self {
            group,
            version,
            kind: api_resource.kind.clone(),
            plural_name: api_resource.name.clone(),
            singular_name: api_resource.singular_name.clone(),
            short_names: api_resource.short_names.clone().unwrap_or_default(),
            namespaced: api_resource.namespaced,
        })
    }

    /// `v1` for the core group, `group/version` otherwise.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

/// Split a group version string such as `apps/v1` into its group and version.
///
/// A bare version (`v1`) belongs to the core group. Empty input and a lone `/`
/// yield an empty group and version.
pub fn parse_group_version(group_version: &str) -> Result<(String, String), DiscoveryError> {
    if group_version.is_empty() || group_version == "/" {
        return Ok((String::new(), String::new()));
    }

    let mut parts = group_version.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(version), None, None) => Ok((String::new(), version.to_string())),
        (Some(group), Some(version), None) => Ok((group.to_string(), version.to_string())),
        _ => Err(DiscoveryError::GroupVersion(group_version.to_string())),
    }
}
