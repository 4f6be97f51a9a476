//! Attribute and event request paths.
//!
//! Ids are stored raw: the wildcard sentinels (`0xFFFF` endpoint,
//! `0xFFFF_FFFF` cluster/attribute/event) are kept as given and only
//! interpreted by [`AttributePathParams::matches`] and the filter accessors.

use std::ops::Deref;

use crate::error::{NodeError, Result};
use crate::matter::ids::{
    AttrId, ClusterId, EndptId, EventId, WILDCARD_ATTRIBUTE, WILDCARD_CLUSTER, WILDCARD_ENDPOINT,
    WILDCARD_EVENT,
};

/// Maximum number of paths in one request.
pub const MAX_PATHS: usize = 16;

fn filter<T: PartialEq>(value: T, wildcard: T) -> Option<T> {
    (value != wildcard).then_some(value)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttributePathParams {
    pub endpoint: EndptId,
    pub cluster: ClusterId,
    pub attribute: AttrId,
}

impl AttributePathParams {
    pub fn new(endpoint: EndptId, cluster: ClusterId, attribute: AttrId) -> Self {
        Self {
            endpoint,
            cluster,
            attribute,
        }
    }

    pub fn endpoint_filter(&self) -> Option<EndptId> {
        filter(self.endpoint, WILDCARD_ENDPOINT)
    }

    pub fn cluster_filter(&self) -> Option<ClusterId> {
        filter(self.cluster, WILDCARD_CLUSTER)
    }

    pub fn attribute_filter(&self) -> Option<AttrId> {
        filter(self.attribute, WILDCARD_ATTRIBUTE)
    }

    pub fn is_wildcard(&self) -> bool {
        self.endpoint_filter().is_none()
            || self.cluster_filter().is_none()
            || self.attribute_filter().is_none()
    }

    /// Whether the concrete path `(endpoint, cluster, attribute)` is selected.
    pub fn matches(&self, endpoint: EndptId, cluster: ClusterId, attribute: AttrId) -> bool {
        self.endpoint_filter().is_none_or(|e| e == endpoint)
            && self.cluster_filter().is_none_or(|c| c == cluster)
            && self.attribute_filter().is_none_or(|a| a == attribute)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventPathParams {
    pub endpoint: EndptId,
    pub cluster: ClusterId,
    pub event: EventId,
    pub is_urgent: bool,
}

impl EventPathParams {
    pub fn new(endpoint: EndptId, cluster: ClusterId, event: EventId) -> Self {
        Self {
            endpoint,
            cluster,
            event,
            is_urgent: false,
        }
    }

    pub fn endpoint_filter(&self) -> Option<EndptId> {
        filter(self.endpoint, WILDCARD_ENDPOINT)
    }

    pub fn cluster_filter(&self) -> Option<ClusterId> {
        filter(self.cluster, WILDCARD_CLUSTER)
    }

    pub fn event_filter(&self) -> Option<EventId> {
        filter(self.event, WILDCARD_EVENT)
    }

    pub fn matches(&self, endpoint: EndptId, cluster: ClusterId, event: EventId) -> bool {
        self.endpoint_filter().is_none_or(|e| e == endpoint)
            && self.cluster_filter().is_none_or(|c| c == cluster)
            && self.event_filter().is_none_or(|e| e == event)
    }
}

/// Owned, bounded list of request paths.
///
/// Not `Clone`: a list belongs to exactly one request at a time.
#[derive(Debug, PartialEq, Eq)]
pub struct PathList<T> {
    paths: heapless::Vec<T, MAX_PATHS>,
}

pub type AttributePaths = PathList<AttributePathParams>;
pub type EventPaths = PathList<EventPathParams>;

impl<T> PathList<T> {
    pub fn new() -> Self {
        Self {
            paths: heapless::Vec::new(),
        }
    }

    pub fn single(path: T) -> Result<Self> {
        let mut list = Self::new();
        list.push(path)?;
        Ok(list)
    }

    pub fn push(&mut self, path: T) -> Result<()> {
        self.paths
            .push(path)
            .map_err(|_| NodeError::NoMemory("request path list is full"))
    }
}

impl<T> Default for PathList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for PathList<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.paths
    }
}

impl AttributePaths {
    /// Build paths from parallel id arrays. The arrays must have equal length.
    pub fn from_parallel(
        endpoints: &[EndptId],
        clusters: &[ClusterId],
        attributes: &[AttrId],
    ) -> Result<Self> {
        debug_assert!(endpoints.len() == clusters.len() && clusters.len() == attributes.len());
        let mut list = Self::new();
        for ((endpoint, cluster), attribute) in endpoints.iter().zip(clusters).zip(attributes) {
            list.push(AttributePathParams::new(*endpoint, *cluster, *attribute))?;
        }
        Ok(list)
    }
}

impl EventPaths {
    /// Build paths from parallel id arrays. The arrays must have equal length.
    pub fn from_parallel(
        endpoints: &[EndptId],
        clusters: &[ClusterId],
        events: &[EventId],
    ) -> Result<Self> {
        debug_assert!(endpoints.len() == clusters.len() && clusters.len() == events.len());
        let mut list = Self::new();
        for ((endpoint, cluster), event) in endpoints.iter().zip(clusters).zip(events) {
            list.push(EventPathParams::new(*endpoint, *cluster, *event))?;
        }
        Ok(list)
    }
}
