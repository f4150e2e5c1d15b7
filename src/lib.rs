#![cfg_attr(not(doctest), doc = include_str!("../README.md"))]
#![cfg_attr(docsrs, feature(doc_cfg))]

use std::future::Future;

pub use clap_complete;
pub use k8s_openapi;
pub use kube;
pub use tokio_util::sync::CancellationToken;

pub mod claputil;
pub use claputil::{context_value_completer, resource_value_completer};
pub mod config;
pub use config::{Settings, determine_context, determine_namespace};
pub mod discover;
pub use discover::{DiscoveryService, SchemaResolver};
pub mod dynamic;
pub use dynamic::ListedObject;
pub mod error;
pub use error::{ConfigError, DiscoveryError, Error, ExecError, Result};
pub mod lister;
pub use lister::{DynamicLister, ListService, object_names};
pub mod query;
pub use query::{ExecOutput, ProcessExecutor, QueryBuilder, QueryExecutor, QueryResult, QuerySpec};
pub mod resource;
pub use resource::ResourceDescriptor;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResource;

/// Checks if the given `api_resource` matches the `target` resource name.
/// Matching is exact and case-sensitive against the kind, the plural name,
/// the singular name and every short name.
pub fn resource_matches_target(target: &str, api_resource: &APIResource) -> bool {
    api_resource.kind == target
        || api_resource.name == target
        || api_resource.singular_name == target
        || api_resource
            .short_names
            .as_ref()
            .is_some_and(|short_names| short_names.iter().any(|short| short == target))
}

/// Drive `future` to completion unless `cancel` fires first.
///
/// A token that is already cancelled wins without polling `future` at all.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = future => result,
    }
}
