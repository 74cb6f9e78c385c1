//! # Resource module
//!
//! This module provides small helpers on a [`kube::Resource`] used
//! throughout the engine: whether it is pending deletion, its
//! namespace/name pair, and its generation.

use kube::{Resource, ResourceExt};

/// Returns whether the resource is considered deleted from Kubernetes' point
/// of view, i.e. `metadata.deletionTimestamp` is set. The object itself
/// still exists (and is visible to watchers) until every finalizer is
/// removed.
pub fn deleted<T>(obj: &T) -> bool
where
    T: Resource,
{
    obj.meta().deletion_timestamp.is_some()
}

/// Returns the namespace and name of the resource, for structured log
/// fields. Cluster-scoped resources carry no namespace, hence `Option`.
pub fn namespaced_name<T>(obj: &T) -> (Option<String>, String)
where
    T: ResourceExt,
{
    (obj.namespace(), obj.name_any())
}

/// Returns the resource's `metadata.generation`, if present.
pub fn generation<T>(obj: &T) -> Option<i64>
where
    T: Resource,
{
    obj.meta().generation
}
