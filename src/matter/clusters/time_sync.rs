//! Minimal Time Synchronization cluster support.
//!
//! The node only needs the cluster to be present on the root endpoint (its
//! presence enables POSIX time reporting in General Diagnostics) and a way to
//! read the current UTC time.

use rs_matter::error::{Error, ErrorCode};

use crate::matter::data_model::{AttrValue, AttributeFlags, ClusterFlags, Node};
use crate::matter::ids::{EndptId, clusters};

/// Matter Cluster ID for Time Synchronization
pub const CLUSTER_ID: u32 = clusters::TIME_SYNCHRONIZATION;

/// Attribute IDs for the Time Synchronization cluster
pub mod attributes {
    /// UTC time in microseconds since Unix epoch (nullable)
    pub const UTC_TIME: u32 = 0x00;
    /// Current time granularity (enum)
    pub const GRANULARITY: u32 = 0x01;
    /// Current time source (enum)
    pub const TIME_SOURCE: u32 = 0x02;
}

/// Add the cluster to `endpoint` with an unsynchronized clock.
pub fn create(node: &Node, endpoint: EndptId) -> Result<(), Error> {
    node.create_cluster(endpoint, CLUSTER_ID, ClusterFlags::SERVER)?;
    node.create_attribute(
        endpoint,
        CLUSTER_ID,
        attributes::UTC_TIME,
        AttributeFlags::NULLABLE,
        AttrValue::Null,
    )?;
    // 0 = NoTimeGranularity until a time source is configured
    node.create_attribute(
        endpoint,
        CLUSTER_ID,
        attributes::GRANULARITY,
        AttributeFlags::empty(),
        AttrValue::U8(0),
    )?;
    // 0 = None
    node.create_attribute(
        endpoint,
        CLUSTER_ID,
        attributes::TIME_SOURCE,
        AttributeFlags::empty(),
        AttrValue::U8(0),
    )?;
    Ok(())
}

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> Result<u64, Error> {
    u64::try_from(chrono::Utc::now().timestamp_millis()).map_err(|_| ErrorCode::Failure.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matter::data_model::DataModelProvider;

    #[test]
    fn test_create_on_root() {
        let node = Node::new();
        node.add_endpoint(0, &[]).unwrap();
        create(&node, 0).unwrap();

        assert!(node.is_cluster_enabled(0, CLUSTER_ID));
        assert_eq!(
            node.read_attribute(0, CLUSTER_ID, attributes::UTC_TIME).unwrap(),
            AttrValue::Null
        );
    }

    #[test]
    fn test_epoch_millis_is_after_2020() {
        assert!(epoch_millis().unwrap() > 1_577_836_800_000);
    }
}
