//! # Test harness module
//!
//! Provides an in-memory [`FakeClient`] implementing [`crate::client::KubernetesClient`]
//! plus a scripted event source, so the reconciliation engine's invariants
//! (mutual exclusion, coalescing, retry, finalizer lifecycle) can be
//! exercised deterministically without a real API server.
//!
//! Exported behind the `testing` feature for downstream operator crates that
//! want to unit-test their own hooks against this engine; always compiled
//! for this crate's own `#[cfg(test)]` modules.

use std::{
    collections::VecDeque,
    fmt::Debug,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use futures::{stream, Stream, StreamExt};
use kube::Resource;
use serde::{de::DeserializeOwned, Serialize};

use crate::{client::KubernetesClient, event::Event};

/// An in-memory stand-in for a Kubernetes API server, scoped to a single
/// resource type. Records every `replace`/`patch_status` call and can be
/// configured to script a watch stream or to fail writes with a 409, the
/// same `kube::Error::Api{code: 409, ..}` shape a real apiserver conflict
/// would produce.
pub struct FakeClient<T> {
    events: Mutex<VecDeque<Event<T>>>,
    replaced: Mutex<Vec<T>>,
    patched_status: Mutex<Vec<(T, serde_json::Value)>>,
    force_conflict: AtomicBool,
}

impl<T> Default for FakeClient<T> {
    fn default() -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            replaced: Mutex::new(Vec::new()),
            patched_status: Mutex::new(Vec::new()),
            force_conflict: AtomicBool::new(false),
        }
    }
}

impl<T> FakeClient<T>
where
    T: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues events to be replayed, in order, by the next [`FakeClient::watch`] call.
    pub fn with_events(self, events: Vec<Event<T>>) -> Self {
        *self.events.lock().expect("fake client mutex poisoned") = events.into();
        self
    }

    /// Makes every subsequent `replace`/`patch_status` call fail with a 409,
    /// as if another writer had raced this one.
    pub fn force_conflict(&self, on: bool) {
        self.force_conflict.store(on, Ordering::SeqCst);
    }

    pub fn replace_calls(&self) -> usize {
        self.replaced.lock().expect("fake client mutex poisoned").len()
    }

    pub fn last_replaced(&self) -> Option<T> {
        self.replaced.lock().expect("fake client mutex poisoned").last().cloned()
    }

    pub fn patch_status_calls(&self) -> usize {
        self.patched_status.lock().expect("fake client mutex poisoned").len()
    }

    pub fn last_patched_status(&self) -> Option<(T, serde_json::Value)> {
        self.patched_status
            .lock()
            .expect("fake client mutex poisoned")
            .last()
            .cloned()
    }

    fn conflict() -> kube::Error {
        kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "Conflict".to_string(),
            reason: "Conflict".to_string(),
            code: 409,
        })
    }
}

#[async_trait]
impl<T> KubernetesClient<T> for FakeClient<T>
where
    T: Resource + Clone + DeserializeOwned + Serialize + Debug + Send + Sync + 'static,
{
    async fn watch(
        &self,
        _label_selector: Option<&str>,
        _timeout_seconds: u32,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<Event<T>, kube::Error>> + Send>>, kube::Error> {
        let queued: Vec<_> = self
            .events
            .lock()
            .expect("fake client mutex poisoned")
            .drain(..)
            .collect();
        Ok(Box::pin(stream::iter(queued.into_iter().map(Ok))))
    }

    async fn replace(&self, obj: &T) -> Result<T, kube::Error> {
        if self.force_conflict.load(Ordering::SeqCst) {
            return Err(Self::conflict());
        }

        self.replaced.lock().expect("fake client mutex poisoned").push(obj.clone());
        Ok(obj.clone())
    }

    async fn patch_status(&self, obj: &T, status: serde_json::Value) -> Result<T, kube::Error> {
        if self.force_conflict.load(Ordering::SeqCst) {
            return Err(Self::conflict());
        }

        self.patched_status
            .lock()
            .expect("fake client mutex poisoned")
            .push((obj.clone(), status));
        Ok(obj.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;

    #[tokio::test]
    async fn replace_records_the_call_and_echoes_the_object() {
        let client = FakeClient::<ConfigMap>::new();
        let obj = ConfigMap::default();

        let result = client.replace(&obj).await;

        assert!(result.is_ok());
        assert_eq!(client.replace_calls(), 1);
    }

    #[tokio::test]
    async fn forced_conflict_surfaces_as_a_409_api_error() {
        let client = FakeClient::<ConfigMap>::new();
        client.force_conflict(true);

        let err = client.replace(&ConfigMap::default()).await.unwrap_err();
        match err {
            kube::Error::Api(response) => assert_eq!(response.code, 409),
            other => panic!("expected a 409 Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn watch_replays_scripted_events_in_order() {
        let client = FakeClient::new().with_events(vec![
            Event::Added(ConfigMap::default()),
            Event::Bookmark,
        ]);

        let events: Vec<_> = client.watch(None, 60).await.unwrap().collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Ok(Event::Added(_))));
        assert!(matches!(events[1], Ok(Event::Bookmark)));
    }
}
