//! A reusable reconciliation engine for Kubernetes custom-resource
//! operators: event dispatch, per-uid coalescing, bounded retry, and the
//! finalizer/generation lifecycle that lets Kubernetes safely delegate
//! deletion to user code.
//!
//! A user supplies a [`descriptor::ResourceDescriptor`] and a pair of
//! reconciliation hooks per resource type, builds a [`controller::Controller`],
//! wraps it in a [`watcher::Watcher`], and registers both with an
//! [`operator::Operator`]. The core watches the cluster, funnels events
//! through [`queue::EventQueue`] and [`tracker::ChangeTracker`], and invokes
//! the hooks with bounded retry via [`retry::RetryPolicy`].

pub mod client;
pub mod config;
pub mod controller;
pub mod descriptor;
pub mod dynamic;
pub mod event;
pub mod finalizer;
pub mod http;
pub mod logging;
pub mod operator;
pub mod queue;
pub mod resource;
pub mod retry;
pub mod tracker;
pub mod watcher;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
