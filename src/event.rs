//! # Event module
//!
//! This module provides the [`Event`] type delivered by a
//! [`crate::watcher::Watcher`] to its [`crate::controller::Controller`].

use kube::ResourceExt;

// -----------------------------------------------------------------------------
// Event structure

/// A single observation of a resource's state, as delivered by the watch
/// stream. Identity for queueing purposes is `resource.metadata.uid`.
#[derive(Clone, Debug)]
pub enum Event<T> {
    /// The resource was created.
    Added(T),
    /// The resource's spec, metadata or status changed (including
    /// resyncs and the controller's own writes).
    Modified(T),
    /// The API server's terminal notification that the resource is gone.
    /// Carries no actionable payload for this framework: deletion is driven
    /// by `deletionTimestamp` on a preceding `Modified` event, see
    /// [`crate::controller::Controller::process_event`].
    Deleted(T),
    /// A watch-resume token with no payload.
    Bookmark,
    /// The watch stream reported an error for this particular item.
    Error(String),
}

impl<T> Event<T>
where
    T: ResourceExt,
{
    /// Returns the resource carried by this event, if any.
    pub fn resource(&self) -> Option<&T> {
        match self {
            Self::Added(r) | Self::Modified(r) | Self::Deleted(r) => Some(r),
            Self::Bookmark | Self::Error(_) => None,
        }
    }

    /// Returns the queueing identity of this event, i.e. the resource's uid.
    /// `None` for events without a payload.
    pub fn uid(&self) -> Option<String> {
        self.resource().and_then(|r| r.uid())
    }
}
