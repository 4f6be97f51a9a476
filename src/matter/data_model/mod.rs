//! Node data model: endpoints, clusters, attributes and commands.
//!
//! The lifecycle manager only consumes the [`DataModelProvider`] queries; the
//! in-memory [`Node`] is the provider the runtime ships with.

use bitflags::bitflags;

use super::ids::{AttrId, ClusterId, CmdId, EndptId};

mod node;
mod value;

pub use node::Node;
pub use value::AttrValue;

bitflags! {
    /// Role of a cluster instance on an endpoint.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct ClusterFlags: u8 {
        const SERVER = 0x01;
        const CLIENT = 0x02;
    }
}

bitflags! {
    /// Access properties of an attribute.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct AttributeFlags: u8 {
        /// Clients may write it
        const WRITABLE = 0x01;
        /// Null is a legal value
        const NULLABLE = 0x02;
    }
}

bitflags! {
    /// Direction of a command relative to the server cluster.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct CommandFlags: u8 {
        /// Client to server (the server accepts it)
        const ACCEPTED = 0x01;
        /// Server to client (a response the server generates)
        const GENERATED = 0x02;
    }
}

/// Reference to a cluster instance present on an endpoint.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ClusterHandle {
    pub endpoint: EndptId,
    pub cluster: ClusterId,
    pub flags: ClusterFlags,
}

/// Reference to a command present on a cluster.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CommandHandle {
    pub endpoint: EndptId,
    pub cluster: ClusterId,
    pub command: CmdId,
    pub flags: CommandFlags,
}

/// Read-only queries the cluster lifecycle code makes against the data model.
pub trait DataModelProvider: Send + Sync {
    /// Whether `attribute` exists (is enabled) on the given cluster instance.
    fn is_attribute_enabled(&self, endpoint: EndptId, cluster: ClusterId, attribute: AttrId)
    -> bool;

    /// The cluster instance on `endpoint`, if present.
    fn get_cluster(&self, endpoint: EndptId, cluster: ClusterId) -> Option<ClusterHandle>;

    /// A command on `cluster` whose flags share at least one bit with `flags`.
    fn get_command(
        &self,
        cluster: &ClusterHandle,
        command: CmdId,
        flags: CommandFlags,
    ) -> Option<CommandHandle>;

    /// Convenience: whether `command` is accepted by the server cluster on `endpoint`.
    fn is_command_accepted(&self, endpoint: EndptId, cluster: ClusterId, command: CmdId) -> bool {
        self.get_cluster(endpoint, cluster)
            .and_then(|c| self.get_command(&c, command, CommandFlags::ACCEPTED))
            .is_some()
    }

    /// Convenience: whether a server instance of `cluster` exists on `endpoint`.
    fn is_cluster_enabled(&self, endpoint: EndptId, cluster: ClusterId) -> bool {
        self.get_cluster(endpoint, cluster)
            .is_some_and(|c| c.flags.contains(ClusterFlags::SERVER))
    }
}
