//! # Change tracker module
//!
//! This module provides [`ChangeTracker`], which records the last
//! successfully reconciled `generation` per uid so the controller can
//! suppress redundant `addOrModify` calls.
//!
//! Kubernetes delivers `Modified` events for status updates and re-list
//! resyncs; without this gate a controller that updates status would loop
//! on its own writes.

use std::collections::HashMap;

/// Tracks `lastProcessedGen: map<uid -> generation>`. Like [`crate::queue::EventQueue`],
/// this is a plain structure guarded by the controller's single mutex, not
/// internally synchronized.
#[derive(Default)]
pub struct ChangeTracker {
    last_processed_generation: HashMap<String, i64>,
    discard_duplicate_generations: bool,
}

impl ChangeTracker {
    pub fn new(discard_duplicate_generations: bool) -> Self {
        Self {
            last_processed_generation: HashMap::new(),
            discard_duplicate_generations,
        }
    }

    /// True iff duplicate-generation discarding is enabled, a generation is
    /// present on the resource, and it is not newer than the last one we
    /// successfully processed for this uid.
    pub fn is_already_handled(&self, uid: &str, generation: Option<i64>) -> bool {
        if !self.discard_duplicate_generations {
            return false;
        }

        match generation {
            None => false,
            Some(generation) => self
                .last_processed_generation
                .get(uid)
                .is_some_and(|&last| last >= generation),
        }
    }

    /// Records `generation` as the last one successfully processed for
    /// `uid`, if present. A resource without a generation (unusual, but not
    /// forbidden by the Kubernetes API machinery) leaves the tracker
    /// unchanged for that uid.
    pub fn track_handled(&mut self, uid: &str, generation: Option<i64>) {
        if let Some(generation) = generation {
            self.last_processed_generation.insert(uid.to_string(), generation);
        }
    }

    /// Removes `uid` from the tracker entirely.
    pub fn track_deleted(&mut self, uid: &str) {
        self.last_processed_generation.remove(uid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_tracker_never_reports_already_handled() {
        let mut tracker = ChangeTracker::new(false);
        tracker.track_handled("u1", Some(5));
        assert!(!tracker.is_already_handled("u1", Some(5)));
    }

    #[test]
    fn resource_without_generation_is_never_already_handled() {
        let tracker = ChangeTracker::new(true);
        assert!(!tracker.is_already_handled("u1", None));
    }

    #[test]
    fn same_or_older_generation_is_already_handled() {
        let mut tracker = ChangeTracker::new(true);
        tracker.track_handled("u1", Some(5));

        assert!(tracker.is_already_handled("u1", Some(5)));
        assert!(tracker.is_already_handled("u1", Some(4)));
    }

    #[test]
    fn newer_generation_is_not_already_handled() {
        let mut tracker = ChangeTracker::new(true);
        tracker.track_handled("u1", Some(5));

        assert!(!tracker.is_already_handled("u1", Some(6)));
    }

    #[test]
    fn track_deleted_forgets_the_uid() {
        let mut tracker = ChangeTracker::new(true);
        tracker.track_handled("u1", Some(5));
        tracker.track_deleted("u1");

        assert!(!tracker.is_already_handled("u1", Some(5)));
    }
}
