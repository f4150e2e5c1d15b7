use std::future::Future;

use kube::{
    Api, Client,
    api::{ListParams, ResourceExt},
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{Result, cancellable, dynamic::ListedObject, error::Error, resource::ResourceDescriptor};

/// Lists objects of an arbitrary resource type without a static schema.
pub trait ListService {
    /// List every object of `resource` in `namespace`, or across all namespaces
    /// when `namespace` is empty.
    fn list_objects(
        &self,
        resource: &ResourceDescriptor,
        namespace: &str,
    ) -> impl Future<Output = kube::Result<Vec<ListedObject>>>;
}

impl ListService for Client {
    fn list_objects(
        &self,
        resource: &ResourceDescriptor,
        namespace: &str,
    ) -> impl Future<Output = kube::Result<Vec<ListedObject>>> {
        let api: Api<ListedObject> = if namespace.is_empty() {
            Api::all_with(self.clone(), resource)
        } else {
            Api::namespaced_with(self.clone(), namespace, resource)
        };
        // A single page: continuation tokens are not followed.
        async move { api.list(&ListParams::default()).await.map(|list| list.items) }
    }
}

/// Lists objects for a resolved [`ResourceDescriptor`].
#[derive(Debug, Clone)]
pub struct DynamicLister<L> {
    service: L,
}

impl<L: ListService> DynamicLister<L> {
    pub fn new(service: L) -> Self {
        Self { service }
    }

    /// Issue one list call for `resource` in `namespace` (empty for all namespaces).
    ///
    /// Objects come back in the order the server returned them. Only the first page
    /// the server hands out is returned; large collections may be truncated by the
    /// server's default page size.
    pub async fn list(
        &self,
        resource: &ResourceDescriptor,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ListedObject>> {
        let objects = cancellable(cancel, async {
            self.service
                .list_objects(resource, namespace)
                .await
                .map_err(|source| Error::List {
                    resource: resource.plural_name.clone(),
                    source,
                })
        })
        .await?;

        debug!(
            resource = %resource.plural_name,
            namespace,
            count = objects.len(),
            "listed objects"
        );
        Ok(objects)
    }
}

/// Names of `objects`, in order, skipping objects without one.
///
/// With `qualified`, namespaced objects are printed as `<namespace>/<name>`, as
/// a cluster-wide list needs.
pub fn object_names(objects: &[ListedObject], qualified: bool) -> Vec<String> {
    objects
        .iter()
        .filter(|object| object.metadata.name.is_some())
        .map(|object| match object.namespace() {
            Some(namespace) if qualified => format!("{namespace}/{}", object.name_any()),
            _ => object.name_any(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use futures::pin_mut;
    use http::{Request, Response};
    use kube::{Client, Error as KubeError, client::Body, core::ErrorResponse};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::{DynamicLister, ListService, object_names};
    use crate::{dynamic::ListedObject, error::Error, resource::ResourceDescriptor};

    fn pods() -> ResourceDescriptor {
        ResourceDescriptor {
            group: String::new(),
            version: "v1".into(),
            kind: "Pod".into(),
            plural_name: "pods".into(),
            singular_name: "pod".into(),
            short_names: vec!["po".into()],
            namespaced: true,
        }
    }

    fn deployments() -> ResourceDescriptor {
        ResourceDescriptor {
            group: "apps".into(),
            version: "v1".into(),
            kind: "Deployment".into(),
            plural_name: "deployments".into(),
            singular_name: "deployment".into(),
            short_names: vec!["deploy".into()],
            namespaced: true,
        }
    }

    fn object(name: &str, namespace: &str) -> serde_json::Value {
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": { "name": name, "namespace": namespace }
        })
    }

    struct FakeList(Vec<&'static str>);

    impl ListService for FakeList {
        async fn list_objects(
            &self,
            _resource: &ResourceDescriptor,
            namespace: &str,
        ) -> kube::Result<Vec<ListedObject>> {
            Ok(self
                .0
                .iter()
                .map(|name| serde_json::from_value(object(name, namespace)).unwrap())
                .collect())
        }
    }

    struct DeniedList;

    impl ListService for DeniedList {
        async fn list_objects(
            &self,
            _resource: &ResourceDescriptor,
            _namespace: &str,
        ) -> kube::Result<Vec<ListedObject>> {
            Err(KubeError::Api(
                ErrorResponse {
                    status: "Failure".into(),
                    message: "pods is forbidden".into(),
                    reason: "Forbidden".into(),
                    code: 403,
                },
            ))
        }
    }

    struct HangingList;

    impl ListService for HangingList {
        async fn list_objects(
            &self,
            _resource: &ResourceDescriptor,
            _namespace: &str,
        ) -> kube::Result<Vec<ListedObject>> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn keeps_server_order() {
        let lister = DynamicLister::new(FakeList(vec!["zeta", "alpha", "mid"]));
        let objects = lister
            .list(&pods(), "default", &CancellationToken::new())
            .await
            .expect("list succeeds");

        assert_eq!(object_names(&objects, false), vec!["zeta", "alpha", "mid"]);
        assert!(objects.iter().all(|o| o.namespace() == Some("default")));
    }

    #[tokio::test]
    async fn wraps_list_failures() {
        let err = DynamicLister::new(DeniedList)
            .list(&pods(), "default", &CancellationToken::new())
            .await
            .expect_err("forbidden");
        match err {
            Error::List { resource, source: KubeError::Api(status) } => {
                assert_eq!(resource, "pods");
                assert_eq!(status.code, 403);
            }
            other => panic!("expected list error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_before_list_completes() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = DynamicLister::new(HangingList)
            .list(&pods(), "", &cancel)
            .await
            .expect_err("cancelled");
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn object_names_skips_unnamed_objects() {
        let named: ListedObject = serde_json::from_value(object("pod-a", "default")).unwrap();
        let unnamed: ListedObject =
            serde_json::from_value(json!({ "metadata": { "generateName": "pod-" } })).unwrap();
        assert_eq!(object_names(&[named, unnamed], false), vec!["pod-a"]);
    }

    #[test]
    fn qualified_names_carry_the_namespace() {
        let pod: ListedObject = serde_json::from_value(object("pod-a", "team-a")).unwrap();
        let node: ListedObject = serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Node",
            "metadata": { "name": "node-1" }
        }))
        .unwrap();
        let objects = [pod, node];

        assert_eq!(object_names(&objects, true), vec!["team-a/pod-a", "node-1"]);
        assert_eq!(object_names(&objects, false), vec!["pod-a", "node-1"]);
    }

    #[tokio::test]
    async fn client_lists_namespaced_group_resources() {
        let (mock_service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (request, send) = handle.next_request().await.expect("service not called");
            assert_eq!(request.method(), http::Method::GET);
            assert_eq!(
                request.uri().path(),
                "/apis/apps/v1/namespaces/team-a/deployments"
            );
            let body = json!({
                "kind": "DeploymentList",
                "apiVersion": "apps/v1",
                "metadata": { "resourceVersion": "7" },
                "items": [
                    { "apiVersion": "apps/v1", "kind": "Deployment", "metadata": { "name": "web", "namespace": "team-a" } },
                    { "apiVersion": "apps/v1", "kind": "Deployment", "metadata": { "name": "api", "namespace": "team-a" } }
                ]
            });
            send.send_response(
                Response::builder()
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            );
        });

        let lister = DynamicLister::new(Client::new(mock_service, "default"));
        let objects = lister
            .list(&deployments(), "team-a", &CancellationToken::new())
            .await
            .expect("list succeeds");
        spawned.await.unwrap();

        assert_eq!(object_names(&objects, false), vec!["web", "api"]);
    }

    #[tokio::test]
    async fn client_lists_across_namespaces_for_empty_namespace() {
        let (mock_service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (request, send) = handle.next_request().await.expect("service not called");
            assert_eq!(request.uri().path(), "/api/v1/pods");
            let body = json!({
                "kind": "PodList",
                "apiVersion": "v1",
                "metadata": {},
                "items": [object("pod-a", "default"), object("pod-b", "kube-system")]
            });
            send.send_response(
                Response::builder()
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            );
        });

        let objects = DynamicLister::new(Client::new(mock_service, "default"))
            .list(&pods(), "", &CancellationToken::new())
            .await
            .expect("list succeeds");
        spawned.await.unwrap();

        let namespaces = objects
            .iter()
            .map(|object| object.namespace().unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(object_names(&objects, false), vec!["pod-a", "pod-b"]);
        assert_eq!(namespaces, vec!["default", "kube-system"]);
    }
}
