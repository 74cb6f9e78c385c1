//! # Operator module
//!
//! This module provides [`Operator`], the root lifecycle: it registers
//! Watchers, starts them all concurrently, owns the single cancellation
//! source, and exits with a status signalling whether any watcher died
//! unexpectedly.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("operator can only register controllers before it is started")]
    AlreadyStarted,
    #[error("operator has already been started once and cannot be restarted")]
    AlreadyStopped,
}

/// A boxed, already-spawnable watcher task. Built by the caller (typically
/// a generic helper closing over a `Watcher<T, C, E>` and its `Arc`) so the
/// Operator itself stays free of the resource-type generic parameter and
/// can hold a heterogeneous set of watchers for different CRDs.
pub type WatcherTask = Box<dyn FnOnce(CancellationToken) -> tokio::task::JoinHandle<Result<(), String>> + Send>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
    New,
    Running,
    Stopping,
    Stopped,
}

/// Lifecycle states: `New -> Running -> Stopping -> Stopped`. The Operator
/// owns a single cancellation source; every Watcher and Controller observes
/// it read-only.
pub struct Operator {
    state: std::sync::Mutex<State>,
    cancel: CancellationToken,
    watchers: std::sync::Mutex<Vec<WatcherTask>>,
    started: AtomicBool,
}

impl Default for Operator {
    fn default() -> Self {
        Self {
            state: std::sync::Mutex::new(State::New),
            cancel: CancellationToken::new(),
            watchers: std::sync::Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }
}

impl Operator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cancellation token every Watcher/Controller built against this
    /// Operator should observe.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Registers a watcher task. Only allowed in the `New` state.
    pub fn add_watcher(&self, task: WatcherTask) -> Result<(), Error> {
        let state = self.state.lock().expect("operator mutex poisoned");
        if *state != State::New {
            return Err(Error::AlreadyStarted);
        }
        drop(state);

        self.watchers.lock().expect("operator mutex poisoned").push(task);
        Ok(())
    }

    /// Transitions to `Running`, spawns one task per registered watcher, and
    /// awaits them all. Returns exit code 0 if every watcher ran until
    /// cancellation; 1 if any watcher terminated unexpectedly while
    /// running. With no registered watchers, returns 0 immediately. Once a
    /// prior call has run to completion the operator is `Stopped` and
    /// cannot be restarted; a second call returns [`Error::AlreadyStopped`].
    pub async fn start(&self) -> Result<i32, Error> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyStopped);
        }

        {
            let mut state = self.state.lock().expect("operator mutex poisoned");
            *state = State::Running;
        }

        let tasks: Vec<_> = self.watchers.lock().expect("operator mutex poisoned").drain(..).collect();
        if tasks.is_empty() {
            info!("no controllers registered, exiting immediately");
            let mut state = self.state.lock().expect("operator mutex poisoned");
            *state = State::Stopped;
            return Ok(0);
        }

        let mut join_set = JoinSet::new();
        for task in tasks {
            let cancel = self.cancel.clone();
            join_set.spawn(async move { task(cancel).await });
        }

        let mut unexpected_termination = false;

        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(reason))) => {
                    error!(reason, "a watcher terminated unexpectedly");
                    unexpected_termination = true;
                }
                Ok(Err(join_err)) => {
                    error!(error = %join_err, "a watcher task panicked");
                    unexpected_termination = true;
                }
                Err(join_err) => {
                    error!(error = %join_err, "failed to join a watcher task");
                    unexpected_termination = true;
                }
            }
        }

        {
            let mut state = self.state.lock().expect("operator mutex poisoned");
            *state = State::Stopped;
        }

        Ok(if unexpected_termination { 1 } else { 0 })
    }

    /// Signals cancellation to every watcher and every in-flight
    /// reconciliation. Idempotent: calling it more than once has the effect
    /// of one call.
    pub fn stop(&self) {
        let mut state = self.state.lock().expect("operator mutex poisoned");
        if *state == State::Stopping || *state == State::Stopped {
            return;
        }

        *state = State::Stopping;
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn start_with_no_watchers_returns_zero_immediately() {
        let operator = Operator::new();
        assert_eq!(operator.start().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn start_returns_one_if_a_watcher_terminates_unexpectedly() {
        let operator = Operator::new();
        operator
            .add_watcher(Box::new(|_cancel| {
                tokio::spawn(async { Err("boom".to_string()) })
            }))
            .unwrap();

        assert_eq!(operator.start().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn restarting_a_stopped_operator_is_rejected() {
        let operator = Operator::new();
        assert_eq!(operator.start().await.unwrap(), 0);

        let err = operator.start().await.unwrap_err();
        assert!(matches!(err, Error::AlreadyStopped));
    }

    #[tokio::test]
    async fn start_returns_zero_when_every_watcher_exits_cleanly_on_cancellation() {
        let operator = Arc::new(Operator::new());
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = Arc::clone(&ran);

        operator
            .add_watcher(Box::new(move |cancel| {
                tokio::spawn(async move {
                    cancel.cancelled().await;
                    ran_clone.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            }))
            .unwrap();

        let operator_clone = Arc::clone(&operator);
        let handle = tokio::spawn(async move { operator_clone.start().await });

        tokio::task::yield_now().await;
        operator.stop();

        assert_eq!(handle.await.unwrap().unwrap(), 0);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_is_idempotent() {
        let operator = Operator::new();
        operator.stop();
        operator.stop();
        assert!(operator.cancellation().is_cancelled());
    }

    #[tokio::test]
    async fn registering_a_watcher_after_start_is_rejected() {
        let operator = Operator::new();
        let _ = operator.start().await;

        let err = operator
            .add_watcher(Box::new(|_cancel| tokio::spawn(async { Ok(()) })))
            .unwrap_err();

        assert!(matches!(err, Error::AlreadyStarted));
    }
}
