//! # Dynamic resource module
//!
//! This module provides the untyped resource path for callers without a
//! generated Rust type for their CRD: a [`kube::core::DynamicObject`] plus
//! an explicit [`ApiResource`] descriptor. It shares the generic
//! [`crate::controller::Controller`]/[`crate::watcher::Watcher`] code
//! verbatim with the typed path — both are built against the same
//! `kube::Resource` bound that `DynamicObject` itself satisfies — so no
//! separate, looser state machine is maintained here.

use kube::{
    api::{Api, DynamicObject},
    discovery::ApiResource,
};

/// Builds a [`crate::client::KubeApiClient`] over [`DynamicObject`], scoped
/// to a single namespace and parameterized by a runtime [`ApiResource`]
/// (group, version, kind, plural) rather than a compile-time type.
///
/// `KubeApiClient::namespaced`/`cluster` require `T::DynamicType = ()`,
/// which `DynamicObject` does not satisfy (its dynamic type is the
/// `ApiResource` itself), so dynamic callers go through this constructor
/// instead.
pub fn namespaced_client(client: kube::Client, namespace: &str, resource: ApiResource) -> KubeApiClientDynamic {
    KubeApiClientDynamic {
        api: Api::namespaced_with(client, namespace, &resource),
    }
}

/// Builds a cluster-wide dynamic client, see [`namespaced_client`].
pub fn cluster_client(client: kube::Client, resource: ApiResource) -> KubeApiClientDynamic {
    KubeApiClientDynamic {
        api: Api::all_with(client, &resource),
    }
}

/// The dynamic-typed counterpart to [`KubeApiClient`]. Implements
/// [`crate::client::KubernetesClient<DynamicObject>`] exactly like the typed
/// adapter, just constructed with an `ApiResource` instead of relying on
/// `DynamicType: Default`.
pub struct KubeApiClientDynamic {
    api: Api<DynamicObject>,
}

#[async_trait::async_trait]
impl crate::client::KubernetesClient<DynamicObject> for KubeApiClientDynamic {
    async fn watch(
        &self,
        label_selector: Option<&str>,
        timeout_seconds: u32,
    ) -> Result<
        std::pin::Pin<Box<dyn futures::Stream<Item = Result<crate::event::Event<DynamicObject>, kube::Error>> + Send>>,
        kube::Error,
    > {
        use futures::StreamExt;
        use kube::api::{ListParams, WatchEvent};

        let mut params = ListParams::default().timeout(timeout_seconds);
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }

        let list = self.api.list(&params).await?;
        let resource_version = list.metadata.resource_version.unwrap_or_default();

        let stream = self.api.watch(&params, &resource_version).await?;
        let events = stream.filter_map(|item| async move {
            match item {
                Ok(WatchEvent::Added(obj)) => Some(Ok(crate::event::Event::Added(obj))),
                Ok(WatchEvent::Modified(obj)) => Some(Ok(crate::event::Event::Modified(obj))),
                Ok(WatchEvent::Deleted(obj)) => Some(Ok(crate::event::Event::Deleted(obj))),
                Ok(WatchEvent::Bookmark(_)) => Some(Ok(crate::event::Event::Bookmark)),
                Ok(WatchEvent::Error(err)) => Some(Ok(crate::event::Event::Error(err.message))),
                Err(err) => Some(Err(err)),
            }
        });

        Ok(Box::pin(events))
    }

    async fn replace(&self, obj: &DynamicObject) -> Result<DynamicObject, kube::Error> {
        use kube::ResourceExt;

        let name = obj.name_any();
        self.api.replace(&name, &Default::default(), obj).await
    }

    async fn patch_status(&self, obj: &DynamicObject, status: serde_json::Value) -> Result<DynamicObject, kube::Error> {
        use kube::{
            api::{Patch, PatchParams},
            ResourceExt,
        };

        let name = obj.name_any();
        let patch = serde_json::json!({ "status": status });

        self.api
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
    }
}

#[allow(dead_code)]
fn assert_assignable_to_generic_controller() {
    fn requires_client_bound<C: crate::client::KubernetesClient<DynamicObject>>() {}
    requires_client_bound::<KubeApiClientDynamic>();
}
