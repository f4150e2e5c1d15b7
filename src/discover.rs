use std::future::Future;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::Client;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    Result, cancellable, error::DiscoveryError, error::Error, resource::ResourceDescriptor,
    resource_matches_target,
};

pub mod client;
use client::DiscoverClient;

/// Source of the cluster's preferred API resources, grouped by group version.
///
/// The order of the returned lists, and of the resources inside each list, is the
/// order in which [`SchemaResolver`] looks for a match.
pub trait DiscoveryService {
    fn preferred_resources(&self) -> impl Future<Output = kube::Result<Vec<APIResourceList>>>;
}

impl DiscoveryService for Client {
    fn preferred_resources(&self) -> impl Future<Output = kube::Result<Vec<APIResourceList>>> {
        let discover = DiscoverClient::new(self.clone());
        async move { discover.list_preferred_resources().await }
    }
}

impl<D: DiscoveryService> DiscoveryService for &D {
    fn preferred_resources(&self) -> impl Future<Output = kube::Result<Vec<APIResourceList>>> {
        (**self).preferred_resources()
    }
}

/// Resolves informal resource names (`po`, `pods`, `Pod`) to a [`ResourceDescriptor`].
///
/// Every call performs a fresh discovery round-trip; results are never cached.
#[derive(Debug, Clone)]
pub struct SchemaResolver<D> {
    discovery: D,
}

impl<D: DiscoveryService> SchemaResolver<D> {
    pub fn new(discovery: D) -> Self {
        Self { discovery }
    }

    /// Resolve `object_type` against the cluster's preferred resources.
    ///
    /// # Errors
    /// - [`Error::Discovery`] when discovery fails or reports a malformed group version.
    /// - [`Error::NotFound`] when no resource matches.
    /// - [`Error::Cancelled`] when `cancel` fires first.
    pub async fn resolve(
        &self,
        object_type: &str,
        cancel: &CancellationToken,
    ) -> Result<ResourceDescriptor> {
        let resource_lists = cancellable(cancel, async {
            self.discovery
                .preferred_resources()
                .await
                .map_err(|err| Error::Discovery(DiscoveryError::Api(err)))
        })
        .await?;

        let descriptor = find_resource(object_type, &resource_lists)?
            .ok_or_else(|| Error::NotFound(object_type.to_string()))?;
        debug!(
            object_type,
            api_version = %descriptor.api_version(),
            plural = %descriptor.plural_name,
            "resolved resource type"
        );
        Ok(descriptor)
    }
}

/// Find the first resource matching `target`, walking group versions and their
/// resources in the order given.
///
/// The first hit wins even when later group versions hold another candidate with
/// the same name.
pub fn find_resource(
    target: &str,
    resource_lists: &[APIResourceList],
) -> Result<Option<ResourceDescriptor>, DiscoveryError> {
    for list in resource_lists {
        if let Some(api_resource) = list
            .resources
            .iter()
            .find(|api_resource| resource_matches_target(target, api_resource))
        {
            return ResourceDescriptor::from_api_resource(api_resource, &list.group_version)
                .map(Some);
        }
    }
    Ok(None)
}
