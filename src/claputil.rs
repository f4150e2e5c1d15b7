use std::{collections::HashSet, ffi::OsStr, future::Future, path::Path};

use clap_complete::engine::{ArgValueCompleter, CompletionCandidate};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use kube::config::Kubeconfig;
use tokio::{runtime::Handle, task};

use crate::{Settings, discover::client::DiscoverClient};

/// Create an `ArgValueCompleter` that lists contexts from the active kubeconfig.
///
/// The current context is tagged in the candidate help.
pub fn context_value_completer() -> ArgValueCompleter {
    ArgValueCompleter::new(|input: &OsStr| -> Vec<CompletionCandidate> {
        let kubeconfig = match Kubeconfig::read() {
            Ok(config) => config,
            Err(_) => return Vec::new(),
        };

        // Convert OsStr to &str with trimmed whitespace
        let input = input.to_string_lossy();
        let input = input.trim();

        kubeconfig
            .contexts
            .iter()
            .filter(|named_context| named_context.name.starts_with(input))
            .map(|named_context| {
                let candidate = CompletionCandidate::new(named_context.name.as_str());
                if kubeconfig.current_context.as_deref() == Some(named_context.name.as_str()) {
                    candidate.help(Some("current".into()))
                } else {
                    candidate
                }
            })
            .collect()
    })
}

/// Create an `ArgValueCompleter` that lists resource types served by the cluster.
///
/// This makes a live discovery call against the cluster named by the default
/// settings file (falling back to the kubeconfig defaults when it is missing or
/// unreadable), so it may be slow or return nothing when the cluster is
/// unreachable or access is denied.
pub fn resource_value_completer() -> ArgValueCompleter {
    ArgValueCompleter::new(|input: &OsStr| -> Vec<CompletionCandidate> {
        let input = input.to_string_lossy().trim().to_string();

        let resource_lists = block_on(async {
            let Ok(client) = completion_settings(None).client().await else {
                return Vec::new();
            };
            DiscoverClient::new(client)
                .list_preferred_resources()
                .await
                .unwrap_or_default()
        });

        resource_candidates(&input, &resource_lists)
    })
}

/// Settings used while completing, where no flags have been parsed yet.
///
/// `None` reads the default settings file. Errors fall back to the defaults.
fn completion_settings(path: Option<&Path>) -> Settings {
    Settings::load(path).unwrap_or_default()
}

/// Plural names starting with `input`, deduplicated, with the kind as help text.
fn resource_candidates(input: &str, resource_lists: &[APIResourceList]) -> Vec<CompletionCandidate> {
    let mut seen = HashSet::new();
    resource_lists
        .iter()
        .flat_map(|list| list.resources.iter())
        .filter(|api_resource| api_resource.name.starts_with(input))
        .filter(|api_resource| seen.insert(api_resource.name.clone()))
        .map(|api_resource| {
            CompletionCandidate::new(api_resource.name.as_str())
                .help(Some(api_resource.kind.clone().into()))
        })
        .collect()
}

// If called on an existing Tokio runtime, `Runtime::block_on` will panic.
// Therefore, if a runtime exists, we use `block_in_place` to escape to a blocking thread,
// and from there we call `block_on` with the current handle.
fn block_on<T: Default>(future: impl Future<Output = T>) -> T {
    match Handle::try_current() {
        Ok(handle) => task::block_in_place(move || handle.block_on(future)),
        Err(_) => tokio::runtime::Runtime::new()
            .map(|rt| rt.block_on(future))
            .unwrap_or_default(),
    }
}
