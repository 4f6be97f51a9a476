//! EventPath: where an event was emitted in the node data model.

use crate::matter::ids::{ClusterId, EndptId, EventId};

/// EventPath identifies an emitted event.
///
/// Emitted events always carry concrete ids; wildcards only appear on the
/// request side and are resolved through [`EventPath::matches`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventPath {
    pub endpoint_id: EndptId,
    pub cluster_id: ClusterId,
    pub event_id: EventId,
    /// Whether this event should be reported urgently
    pub is_urgent: bool,
}

impl EventPath {
    /// Create a new EventPath with specific endpoint, cluster, and event.
    pub fn new(endpoint_id: EndptId, cluster_id: ClusterId, event_id: EventId) -> Self {
        Self {
            endpoint_id,
            cluster_id,
            event_id,
            is_urgent: false,
        }
    }

    /// Create an urgent event path.
    pub fn urgent(mut self) -> Self {
        self.is_urgent = true;
        self
    }

    /// Whether this path is selected by a request path; `None` components are wildcards.
    pub fn matches(
        &self,
        endpoint: Option<EndptId>,
        cluster: Option<ClusterId>,
        event: Option<EventId>,
    ) -> bool {
        endpoint.is_none_or(|e| e == self.endpoint_id)
            && cluster.is_none_or(|c| c == self.cluster_id)
            && event.is_none_or(|e| e == self.event_id)
    }
}
