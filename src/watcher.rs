//! # Watcher module
//!
//! This module provides [`Watcher`], the long-lived list+watch session that
//! decodes events for one resource type and forwards them to its
//! [`crate::controller::Controller`].

use std::{fmt::Debug, sync::Arc};

use futures::StreamExt;
use kube::{Resource, ResourceExt};
use serde::{de::DeserializeOwned, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    client::KubernetesClient,
    controller::{Controller, ConflictAware},
    descriptor::{ResourceDescriptor, DEFAULT_WATCH_TIMEOUT_SECONDS},
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("watch session for '{0}' terminated unexpectedly, {1}")]
    Terminated(ResourceDescriptor, kube::Error),
    #[error("watch session for '{0}' closed by the remote end")]
    Closed(ResourceDescriptor),
}

/// One Watcher per (resource type, namespace-scope, label-selector). Issues
/// a streaming list+watch session and forwards every decoded event to its
/// Controller. Does not transparently reconnect: a stream error or a clean
/// remote close are both reported as unexpected termination, delegating
/// process-level supervision to the host orchestrator (see `DESIGN.md`).
pub struct Watcher<T, C, E> {
    controller: Arc<Controller<T, C, E>>,
    client: Arc<C>,
    label_selector: Option<String>,
    timeout_seconds: u32,
}

impl<T, C, E> Watcher<T, C, E>
where
    T: Resource + ResourceExt + Clone + DeserializeOwned + Serialize + Debug + Send + Sync + 'static,
    C: KubernetesClient<T> + Send + Sync + 'static,
    E: ConflictAware + std::fmt::Display + Send + Sync + 'static,
{
    pub fn new(controller: Arc<Controller<T, C, E>>, client: Arc<C>, label_selector: Option<String>) -> Self {
        Self {
            controller,
            client,
            label_selector,
            timeout_seconds: DEFAULT_WATCH_TIMEOUT_SECONDS,
        }
    }

    /// Runs the watch session until the stream ends or `cancel` fires.
    /// Returns `Ok(())` only on clean cancellation; any other termination
    /// (stream error or remote close) is an [`Error`] the caller (the
    /// Operator) treats as this watcher having died unexpectedly.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), Error> {
        let descriptor = self.controller.descriptor().clone();
        info!(%descriptor, "starting watch session");

        let mut stream = self
            .client
            .watch(self.label_selector.as_deref(), self.timeout_seconds)
            .await
            .map_err(|err| Error::Terminated(descriptor.clone(), err))?;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(%descriptor, "watch session cancelled");
                    return Ok(());
                }
                next = stream.next() => {
                    match next {
                        Some(Ok(event)) => {
                            self.controller.process_event(event, cancel.clone()).await;
                        }
                        Some(Err(err)) => {
                            error!(%descriptor, error = %err, "watch stream reported an error");
                            return Err(Error::Terminated(descriptor, err));
                        }
                        None => {
                            warn!(%descriptor, "watch stream closed by the remote end");
                            return Err(Error::Closed(descriptor));
                        }
                    }
                }
            }
        }
    }
}
