//! # Controller module
//!
//! This module provides [`Controller`], the per-resource-type state machine:
//! it consumes events handed to it by a [`crate::watcher::Watcher`], drives
//! the finalizer/generation lifecycle, and calls the two user-supplied hooks
//! with bounded retry.
//!
//! Per the "replace inheritance with two callback slots" guidance, a
//! `Controller` is a value, not a base class: `addOrModify`/`delete` are
//! function-typed fields (closures), defaulting to no-ops.

use std::{future::Future, pin::Pin, sync::Arc};

use kube::{Resource, ResourceExt};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::{
    client::KubernetesClient, descriptor::ResourceDescriptor, event::Event, finalizer, queue::EventQueue,
    resource, retry::RetryPolicy, tracker::ChangeTracker,
};

// -----------------------------------------------------------------------------
// ConflictAware

/// Lets the controller ask a user error type "were you a 409 Conflict?"
/// without forcing every user to wrap [`kube::Error`]. The default answer is
/// `false`; a user error enum that carries a `#[from] kube::Error` variant
/// can override it (see `DESIGN.md`).
pub trait ConflictAware {
    fn is_conflict(&self) -> bool {
        false
    }
}

impl ConflictAware for kube::Error {
    fn is_conflict(&self) -> bool {
        matches!(self, kube::Error::Api(response) if response.code == 409)
    }
}

// -----------------------------------------------------------------------------
// ReconcileContext

/// Handed to both user hooks. Carries the cancellation token the hook should
/// honour promptly, and the two mutation helpers the spec grants user code:
/// a status merge-patch and a full replace.
pub struct ReconcileContext<T, C> {
    client: Arc<C>,
    cancellation: CancellationToken,
    _resource: std::marker::PhantomData<T>,
}

impl<T, C> ReconcileContext<T, C>
where
    T: Resource + Clone + DeserializeOwned + Serialize + std::fmt::Debug + Send + Sync + 'static,
    C: KubernetesClient<T>,
{
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Merge-patches the `status` subresource.
    pub async fn update_status(&self, obj: &T, status: serde_json::Value) -> Result<T, kube::Error> {
        self.client.patch_status(obj, status).await
    }

    /// Fully replaces the resource, relying on `resourceVersion`.
    pub async fn replace(&self, obj: &T) -> Result<T, kube::Error> {
        self.client.replace(obj).await
    }
}

// -----------------------------------------------------------------------------
// Hook types

type HookFuture<E> = Pin<Box<dyn Future<Output = Result<(), E>> + Send>>;

/// A user reconciliation hook. Takes the observed resource and a
/// [`ReconcileContext`], returns whether reconciliation succeeded.
pub type Hook<T, C, E> = Box<dyn Fn(T, ReconcileContext<T, C>) -> HookFuture<E> + Send + Sync>;

fn noop_hook<T, C, E>() -> Hook<T, C, E>
where
    T: Send + 'static,
    C: Send + 'static,
    E: Send + 'static,
{
    Box::new(|_obj, _ctx| Box::pin(async { Ok(()) }))
}

// -----------------------------------------------------------------------------
// Outcome of a single tryHandle attempt

enum Outcome<E> {
    Handled,
    Retry(E),
}

// -----------------------------------------------------------------------------
// ControllerState: the single piece of mutable shared state per controller

struct ControllerState<T> {
    queue: EventQueue<T>,
    tracker: ChangeTracker,
}

// -----------------------------------------------------------------------------
// Controller structure

/// Consumes events for one resource type. Serializes reconciliation per
/// resource uid (via [`EventQueue`]'s `handling` set) but interleaves work
/// freely across distinct uids. The [`EventQueue`] and [`ChangeTracker`] are
/// the only mutable shared state and are guarded together by one
/// `tokio::sync::Mutex`, per the one-lock-per-controller policy.
pub struct Controller<T, C, E> {
    descriptor: ResourceDescriptor,
    client: Arc<C>,
    retry_policy: RetryPolicy,
    state: Mutex<ControllerState<T>>,
    add_or_modify: Hook<T, C, E>,
    delete: Hook<T, C, E>,
}

impl<T, C, E> Controller<T, C, E>
where
    T: Resource + ResourceExt + Clone + DeserializeOwned + Serialize + std::fmt::Debug + Send + Sync + 'static,
    C: KubernetesClient<T> + Send + Sync + 'static,
    E: ConflictAware + std::fmt::Display + Send + Sync + 'static,
{
    /// Builds a controller with no-op hooks and `discard_duplicate_generations`
    /// driven by the operator configuration.
    pub fn new(
        descriptor: ResourceDescriptor,
        client: Arc<C>,
        retry_policy: RetryPolicy,
        discard_duplicate_generations: bool,
    ) -> Self {
        Self {
            descriptor,
            client,
            retry_policy,
            state: Mutex::new(ControllerState {
                queue: EventQueue::new(),
                tracker: ChangeTracker::new(discard_duplicate_generations),
            }),
            add_or_modify: noop_hook(),
            delete: noop_hook(),
        }
    }

    /// Sets the hook called on the add/modify path, once the finalizer is
    /// present and the generation gate has been cleared.
    pub fn on_add_or_modify(mut self, hook: Hook<T, C, E>) -> Self {
        self.add_or_modify = hook;
        self
    }

    /// Sets the hook called on the deletion path, before the finalizer is
    /// removed.
    pub fn on_delete(mut self, hook: Hook<T, C, E>) -> Self {
        self.delete = hook;
        self
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    /// Top-level entry called by the Watcher for every decoded event. Never
    /// propagates an error: failures are logged and swallowed, since there
    /// is no caller above the Watcher able to act on them usefully.
    pub async fn process_event(&self, event: Event<T>, cancel: CancellationToken) {
        match &event {
            Event::Error(message) => {
                warn!(%message, descriptor = %self.descriptor, "watch stream reported an error for an item");
                return;
            }
            Event::Deleted(_) | Event::Bookmark => return,
            Event::Added(_) | Event::Modified(_) => {}
        }

        let Some(uid) = event.uid() else {
            warn!(descriptor = %self.descriptor, "event carried no uid, dropping");
            return;
        };

        {
            let mut state = self.state.lock().await;
            state.queue.enqueue(uid.clone(), event);
        }

        self.drain(&uid, &cancel).await;
    }

    /// Drains the pending slot for `uid`, reconciling the latest event each
    /// time through the loop until nothing is left pending or cancellation
    /// is observed.
    async fn drain(&self, uid: &str, cancel: &CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                return;
            }

            let next = {
                let mut state = self.state.lock().await;
                state.queue.dequeue(uid)
            };

            let Some(event) = next else {
                return;
            };

            self.handle_event(uid, event, cancel).await;
        }
    }

    /// Runs the bounded-retry attempt loop for a single dequeued event.
    async fn handle_event(&self, uid: &str, event: Event<T>, cancel: &CancellationToken) {
        {
            let mut state = self.state.lock().await;
            state.queue.begin_handle(uid.to_string(), event.clone());
        }

        let mut backoff = self.retry_policy.backoff();
        let mut attempt = 1;

        loop {
            match self.try_handle(&event, cancel).await {
                Outcome::Handled => {
                    #[cfg(feature = "metrics")]
                    crate::http::metrics::record(self.descriptor.plural(), crate::http::metrics::Outcome::Success);
                    break;
                }
                Outcome::Retry(err) => {
                    if !self.can_retry(uid, attempt, cancel).await {
                        warn!(uid, attempt, descriptor = %self.descriptor, error = %err, "giving up after failed reconciliation");
                        #[cfg(feature = "metrics")]
                        crate::http::metrics::record(self.descriptor.plural(), crate::http::metrics::Outcome::Failure);
                        break;
                    }

                    #[cfg(feature = "metrics")]
                    crate::http::metrics::record(self.descriptor.plural(), crate::http::metrics::Outcome::Retry);

                    let delay = backoff.next_delay();
                    warn!(uid, attempt, ?delay, descriptor = %self.descriptor, error = %err, "reconciliation failed, retrying");

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => break,
                    }

                    attempt += 1;
                }
            }
        }

        let mut state = self.state.lock().await;
        state.queue.end_handle(uid);
    }

    /// Returns whether another attempt is worth making: not cancelled, no
    /// newer event already superseding this one, and under the attempt cap.
    async fn can_retry(&self, uid: &str, attempt: u32, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }

        if attempt >= self.retry_policy.max_attempts() {
            return false;
        }

        let state = self.state.lock().await;
        state.queue.peek(uid).is_none()
    }

    /// A single attempt at reconciling `event`: the finalizer-gate /
    /// generation-gate / deletion-path state machine.
    async fn try_handle(&self, event: &Event<T>, cancel: &CancellationToken) -> Outcome<E> {
        let Some(obj) = event.resource() else {
            return Outcome::Handled;
        };

        if resource::deleted(obj) {
            self.try_handle_deletion(obj, cancel).await
        } else {
            self.try_handle_add_or_modify(obj, cancel).await
        }
    }

    async fn try_handle_deletion(&self, obj: &T, cancel: &CancellationToken) -> Outcome<E> {
        let finalizer = self.descriptor.finalizer();

        if !finalizer::contains(obj, finalizer) {
            debug!(uid = obj.uid().as_deref().unwrap_or_default(), descriptor = %self.descriptor, "deletion pending without our finalizer, nothing to do");
            return Outcome::Handled;
        }

        let ctx = self.context(cancel);
        match (self.delete)(obj.clone(), ctx).await {
            Ok(()) => {}
            Err(err) if cancel.is_cancelled() || err.is_conflict() => return Outcome::Handled,
            Err(err) => return Outcome::Retry(err),
        }

        if let Some(uid) = obj.uid() {
            let mut state = self.state.lock().await;
            state.tracker.track_deleted(&uid);
        }

        let stripped = finalizer::remove(obj.clone(), finalizer);
        match self.client.replace(&stripped).await {
            Ok(_) => Outcome::Handled,
            Err(err) if is_conflict(&err) => Outcome::Handled,
            Err(err) => {
                error!(descriptor = %self.descriptor, error = %err, "failed to persist finalizer removal");
                Outcome::Handled
            }
        }
    }

    async fn try_handle_add_or_modify(&self, obj: &T, cancel: &CancellationToken) -> Outcome<E> {
        let finalizer = self.descriptor.finalizer();

        if !finalizer::contains(obj, finalizer) {
            let with_finalizer = finalizer::add(obj.clone(), finalizer);
            return match self.client.replace(&with_finalizer).await {
                Ok(_) => Outcome::Handled,
                Err(err) if is_conflict(&err) => Outcome::Handled,
                Err(err) => {
                    error!(descriptor = %self.descriptor, error = %err, "failed to persist finalizer addition");
                    Outcome::Handled
                }
            };
        }

        let uid = obj.uid().unwrap_or_default();
        let generation = resource::generation(obj);

        let already_handled = {
            let state = self.state.lock().await;
            state.tracker.is_already_handled(&uid, generation)
        };

        if already_handled {
            debug!(uid, generation, descriptor = %self.descriptor, "generation already handled, skipping");
            return Outcome::Handled;
        }

        let ctx = self.context(cancel);
        match (self.add_or_modify)(obj.clone(), ctx).await {
            Ok(()) => {
                let mut state = self.state.lock().await;
                state.tracker.track_handled(&uid, generation);
                Outcome::Handled
            }
            Err(err) if cancel.is_cancelled() || err.is_conflict() => Outcome::Handled,
            Err(err) => Outcome::Retry(err),
        }
    }

    fn context(&self, cancel: &CancellationToken) -> ReconcileContext<T, C> {
        ReconcileContext {
            client: Arc::clone(&self.client),
            cancellation: cancel.clone(),
            _resource: std::marker::PhantomData,
        }
    }
}

fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 409)
}
