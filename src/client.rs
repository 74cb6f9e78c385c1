//! # Client module
//!
//! This module provides two things: a helper to build a [`kube::Client`]
//! from a kubeconfig (or the in-cluster service account), and the
//! [`KubernetesClient`] trait — the Rust realization of the abstract
//! Kubernetes client the engine consumes (§6 of `SPEC_FULL.md`).
//!
//! The spec describes six methods split by cluster/namespace scope
//! (`listAndWatchCluster` vs. `listAndWatchNamespaced`, and so on). In this
//! realization scope is baked into the `kube::Api<T>` an adapter is built
//! against at construction time (`Api::all` vs. `Api::namespaced`), so the
//! trait exposes three scope-agnostic methods instead of six — `kube::Api`
//! already abstracts over scope, and duplicating that distinction on top of
//! it would just be ceremony. See `DESIGN.md` for the rationale.

use std::{convert::TryFrom, fmt::Debug, hash::Hash, path::PathBuf, pin::Pin};

use async_trait::async_trait;
use futures::Stream;
use kube::{
    api::{ListParams, Patch, PatchParams, WatchEvent},
    config::{KubeConfigOptions, Kubeconfig, KubeconfigError},
    Api, Config, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::event::Event;

// -----------------------------------------------------------------------------
// Bootstrap helpers

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read kubernetes configuration file, {0}")]
    Kubeconfig(KubeconfigError),
    #[error("failed to create kubernetes client, {0}")]
    CreateClient(kube::Error),
}

/// Returns a new kubernetes client built from the given kubeconfig path, or
/// from the environment/default locations if `path` is `None`.
#[tracing::instrument]
pub async fn try_new(path: Option<PathBuf>) -> Result<kube::Client, Error> {
    let kubeconfig = match path {
        None => Kubeconfig::read().map_err(Error::Kubeconfig)?,
        Some(path) => Kubeconfig::read_from(path).map_err(Error::Kubeconfig)?,
    };

    let opts = KubeConfigOptions::default();
    let config = Config::from_custom_kubeconfig(kubeconfig, &opts)
        .await
        .map_err(Error::Kubeconfig)?;

    kube::Client::try_from(config).map_err(Error::CreateClient)
}

/// Returns a new kubernetes client using the ambient environment: in-cluster
/// service account if running inside a pod, otherwise the local kubeconfig.
#[tracing::instrument]
pub async fn try_default() -> Result<kube::Client, Error> {
    kube::Client::try_default().await.map_err(Error::CreateClient)
}

// -----------------------------------------------------------------------------
// KubernetesClient trait

/// The abstract Kubernetes client the engine is built against. A single
/// implementation is provided ([`KubeApiClient`]); the trait exists so the
/// test harness (`crate::testing`) can substitute an in-memory fake without
/// a real API server.
#[async_trait]
pub trait KubernetesClient<T>: Send + Sync
where
    T: Resource + Clone + DeserializeOwned + Serialize + Debug + Send + Sync + 'static,
{
    /// Issues a streaming list+watch session. The returned stream yields one
    /// item per watch event; the session is expected to end (so the caller
    /// can reconnect) after roughly `timeout_seconds`.
    async fn watch(
        &self,
        label_selector: Option<&str>,
        timeout_seconds: u32,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<Event<T>, kube::Error>> + Send>>, kube::Error>;

    /// Performs a full replace (`PUT`) of the resource, relying on
    /// `resourceVersion` optimistic concurrency.
    async fn replace(&self, obj: &T) -> Result<T, kube::Error>;

    /// Performs a JSON merge-patch of the resource's `status` subresource.
    async fn patch_status(&self, obj: &T, status: serde_json::Value) -> Result<T, kube::Error>;
}

// -----------------------------------------------------------------------------
// KubeApiClient structure

/// Implements [`KubernetesClient`] against a `kube::Api<T>`, already scoped
/// to either the whole cluster or a single namespace by whoever constructed
/// it (see [`KubeApiClient::cluster`] / [`KubeApiClient::namespaced`]).
pub struct KubeApiClient<T> {
    api: Api<T>,
}

impl<T> KubeApiClient<T>
where
    T: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    /// Builds a client watching every namespace.
    pub fn cluster(client: kube::Client) -> Self {
        Self { api: Api::all(client) }
    }

    /// Builds a client restricted to a single namespace.
    pub fn namespaced(client: kube::Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
        }
    }
}

#[async_trait]
impl<T> KubernetesClient<T> for KubeApiClient<T>
where
    T: Resource<DynamicType = ()> + Clone + DeserializeOwned + Serialize + Debug + Send + Sync + 'static,
{
    async fn watch(
        &self,
        label_selector: Option<&str>,
        timeout_seconds: u32,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<Event<T>, kube::Error>> + Send>>, kube::Error> {
        use futures::StreamExt;

        let mut params = ListParams::default().timeout(timeout_seconds);
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }

        let list = self.api.list(&params).await?;
        let resource_version = list.metadata.resource_version.unwrap_or_default();

        let stream = self.api.watch(&params, &resource_version).await?;
        let events = stream.filter_map(|item| async move {
            match item {
                Ok(WatchEvent::Added(obj)) => Some(Ok(Event::Added(obj))),
                Ok(WatchEvent::Modified(obj)) => Some(Ok(Event::Modified(obj))),
                Ok(WatchEvent::Deleted(obj)) => Some(Ok(Event::Deleted(obj))),
                Ok(WatchEvent::Bookmark(_)) => Some(Ok(Event::Bookmark)),
                Ok(WatchEvent::Error(err)) => Some(Ok(Event::Error(err.message))),
                Err(err) => Some(Err(err)),
            }
        });

        Ok(Box::pin(events))
    }

    async fn replace(&self, obj: &T) -> Result<T, kube::Error> {
        let name = obj.name_any();
        self.api.replace(&name, &Default::default(), obj).await
    }

    async fn patch_status(&self, obj: &T, status: serde_json::Value) -> Result<T, kube::Error> {
        let name = obj.name_any();
        let patch = serde_json::json!({ "status": status });

        self.api
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
    }
}

#[allow(dead_code)]
fn assert_send_sync<T: Send + Sync>() {}

#[allow(dead_code)]
fn _static_asserts<T>()
where
    T: Resource<DynamicType = ()> + Clone + DeserializeOwned + Serialize + Debug + Send + Sync + 'static,
    T::DynamicType: Eq + Hash,
{
    assert_send_sync::<KubeApiClient<T>>();
}
