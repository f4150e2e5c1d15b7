use std::collections::HashSet;

use futures::future::try_join_all;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::Client;
use tracing::{debug, trace};

/// Fetches preferred API resources straight from the discovery endpoints of a
/// [`kube::Client`].
///
/// The core group comes first, then every named group in the order `/apis`
/// reports them. Every served version of a group is read, and each resource is
/// kept once per group: at the preferred version when it is served there,
/// otherwise at the first listed version that serves it.
#[derive(Clone)]
pub struct DiscoverClient {
    client: Client,
}

/// A group and the group versions it serves, preferred first.
#[derive(Debug, PartialEq)]
struct ServedGroup {
    name: String,
    group_versions: Vec<String>,
}

impl ServedGroup {
    fn new(name: String, preferred: Option<String>, listed: Vec<String>) -> Self {
        let mut group_versions = Vec::with_capacity(listed.len());
        if let Some(preferred) = preferred.filter(|p| listed.contains(p)) {
            group_versions.push(preferred);
        }
        for group_version in listed {
            if !group_versions.contains(&group_version) {
                group_versions.push(group_version);
            }
        }
        Self {
            name,
            group_versions,
        }
    }
}

impl DiscoverClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// List the preferred resources of every API group.
    ///
    /// One list is returned per group version that still holds a resource after
    /// merging; the preferred version of a group comes before its other
    /// versions. Subresources such as `pods/log` are dropped.
    pub async fn list_preferred_resources(&self) -> kube::Result<Vec<APIResourceList>> {
        let groups = self.served_groups().await?;
        debug!(count = groups.len(), "discovered api groups");

        let lists = try_join_all(groups.iter().map(|group| {
            try_join_all(
                group
                    .group_versions
                    .iter()
                    .map(|group_version| self.list_group_version_resources(group_version)),
            )
        }))
        .await?;

        Ok(groups
            .iter()
            .zip(lists)
            .flat_map(|(group, lists)| merge_group_versions(&group.name, lists))
            .collect())
    }

    async fn served_groups(&self) -> kube::Result<Vec<ServedGroup>> {
        let mut groups = Vec::new();

        let core = self.client.list_core_api_versions().await?;
        if !core.versions.is_empty() {
            groups.push(ServedGroup::new(String::new(), None, core.versions));
        }

        let api_groups = self.client.list_api_groups().await?;
        for group in api_groups.groups {
            if group.versions.is_empty() {
                trace!(group = %group.name, "skipping group without versions");
                continue;
            }
            let preferred = group.preferred_version.map(|v| v.group_version);
            let listed = group.versions.into_iter().map(|v| v.group_version).collect();
            groups.push(ServedGroup::new(group.name, preferred, listed));
        }

        Ok(groups)
    }

    async fn list_group_version_resources(
        &self,
        group_version: &str,
    ) -> kube::Result<APIResourceList> {
        trace!(group_version, "listing group version resources");
        if group_version.contains('/') {
            self.client.list_api_group_resources(group_version).await
        } else {
            self.client.list_core_api_resources(group_version).await
        }
    }
}

/// Keep each resource name once per group, at the first version in `lists`
/// that serves it. `lists` is in [`ServedGroup::group_versions`] order.
fn merge_group_versions(group: &str, lists: Vec<APIResourceList>) -> Vec<APIResourceList> {
    let mut seen = HashSet::new();
    lists
        .into_iter()
        .filter_map(|mut list| {
            list.resources.retain(|api_resource| {
                !api_resource.name.contains('/') && seen.insert(api_resource.name.clone())
            });
            if list.resources.is_empty() {
                trace!(group, group_version = %list.group_version, "no resources left after merge");
                None
            } else {
                Some(list)
            }
        })
        .collect()
}
