//! # Finalizer module
//!
//! This module provides helper functions to inspect and mutate a resource's
//! `metadata.finalizers` list. [`crate::controller::Controller`] uses these
//! to drive the finalizer/generation state machine described in
//! [`crate::controller`]; they carry no state of their own.

use kube::Resource;

/// Returns whether `finalizer` is present on the resource.
pub fn contains<T>(obj: &T, finalizer: &str) -> bool
where
    T: Resource,
{
    obj.meta()
        .finalizers
        .as_ref()
        .is_some_and(|finalizers| finalizers.iter().any(|f| finalizer == f))
}

/// Returns a copy of `obj` with `finalizer` appended to `metadata.finalizers`
/// if it is not already present.
pub fn add<T>(mut obj: T, finalizer: &str) -> T
where
    T: Resource,
{
    if contains(&obj, finalizer) {
        return obj;
    }

    match &mut obj.meta_mut().finalizers {
        Some(finalizers) => finalizers.push(finalizer.to_string()),
        finalizers @ None => *finalizers = Some(vec![finalizer.to_string()]),
    }

    obj
}

/// Returns a copy of `obj` with `finalizer` removed from
/// `metadata.finalizers`, if present.
pub fn remove<T>(mut obj: T, finalizer: &str) -> T
where
    T: Resource,
{
    if let Some(finalizers) = &obj.meta().finalizers {
        obj.meta_mut().finalizers = Some(finalizers.iter().filter(|f| *f != finalizer).cloned().collect());
    }

    obj
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;

    fn with_finalizers(finalizers: Option<Vec<String>>) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                finalizers,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn contains_is_false_without_finalizers() {
        let obj = with_finalizers(None);
        assert!(!contains(&obj, "example.com/cleanup"));
    }

    #[test]
    fn add_creates_the_list_when_absent() {
        let obj = add(with_finalizers(None), "example.com/cleanup");
        assert_eq!(obj.metadata.finalizers, Some(vec!["example.com/cleanup".to_string()]));
    }

    #[test]
    fn add_appends_without_duplicating() {
        let obj = with_finalizers(Some(vec!["other/finalizer".to_string()]));
        let obj = add(obj, "example.com/cleanup");
        let obj = add(obj, "example.com/cleanup");

        assert_eq!(
            obj.metadata.finalizers,
            Some(vec!["other/finalizer".to_string(), "example.com/cleanup".to_string()])
        );
    }

    #[test]
    fn remove_filters_out_only_the_named_finalizer() {
        let obj = with_finalizers(Some(vec![
            "other/finalizer".to_string(),
            "example.com/cleanup".to_string(),
        ]));
        let obj = remove(obj, "example.com/cleanup");

        assert_eq!(obj.metadata.finalizers, Some(vec!["other/finalizer".to_string()]));
    }

    #[test]
    fn remove_on_absent_finalizer_is_a_no_op() {
        let obj = with_finalizers(Some(vec!["other/finalizer".to_string()]));
        let obj = remove(obj, "example.com/cleanup");

        assert_eq!(obj.metadata.finalizers, Some(vec!["other/finalizer".to_string()]));
    }
}
