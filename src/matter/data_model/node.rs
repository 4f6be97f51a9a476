//! In-memory node: the endpoint/cluster/attribute tree of this device.

use log::{debug, warn};
use parking_lot::Mutex;
use rs_matter::dm::Dataver;
use rs_matter::error::{Error, ErrorCode};

use super::{
    AttrValue, AttributeFlags, ClusterFlags, ClusterHandle, CommandFlags, CommandHandle,
    DataModelProvider,
};
use crate::matter::ids::{AttrId, ClusterId, CmdId, EndptId, EventId};

struct Attribute {
    id: AttrId,
    flags: AttributeFlags,
    value: AttrValue,
    bounds: Option<(AttrValue, AttrValue)>,
}

impl Attribute {
    /// Store `value`, saturated into the bounds when there are any.
    fn set(&mut self, value: AttrValue) -> Result<(), Error> {
        if !self.value.same_type(&value) {
            return Err(ErrorCode::InvalidDataType.into());
        }
        if value == AttrValue::Null && !self.flags.contains(AttributeFlags::NULLABLE) {
            return Err(ErrorCode::InvalidDataType.into());
        }
        self.value = match &self.bounds {
            Some((min, max)) => value.clamp(min, max),
            None => value,
        };
        Ok(())
    }
}

struct Command {
    id: CmdId,
    flags: CommandFlags,
}

struct Cluster {
    id: ClusterId,
    flags: ClusterFlags,
    dataver: Dataver,
    attributes: Vec<Attribute>,
    commands: Vec<Command>,
    events: Vec<EventId>,
}

struct Endpoint {
    id: EndptId,
    device_types: Vec<u32>,
    clusters: Vec<Cluster>,
}

/// The endpoint tree of a node.
///
/// Endpoints and clusters keep insertion order, which is also the order
/// wildcard reads are expanded in.
pub struct Node {
    endpoints: Mutex<Vec<Endpoint>>,
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl Node {
    pub fn new() -> Self {
        Self {
            endpoints: Mutex::new(Vec::new()),
        }
    }

    /// Add an endpoint with the given device types.
    pub fn add_endpoint(&self, id: EndptId, device_types: &[u32]) -> Result<(), Error> {
        let mut endpoints = self.endpoints.lock();
        if endpoints.iter().any(|e| e.id == id) {
            return Err(ErrorCode::Duplicate.into());
        }
        endpoints.push(Endpoint {
            id,
            device_types: device_types.to_vec(),
            clusters: Vec::new(),
        });
        Ok(())
    }

    /// Create a cluster on an endpoint.
    ///
    /// An existing cluster with the same id is returned with `flags` merged in.
    pub fn create_cluster(
        &self,
        endpoint: EndptId,
        cluster: ClusterId,
        flags: ClusterFlags,
    ) -> Result<ClusterHandle, Error> {
        let mut endpoints = self.endpoints.lock();
        let ep = endpoints
            .iter_mut()
            .find(|e| e.id == endpoint)
            .ok_or(ErrorCode::EndpointNotFound)?;

        if let Some(existing) = ep.clusters.iter_mut().find(|c| c.id == cluster) {
            existing.flags |= flags;
            return Ok(ClusterHandle {
                endpoint,
                cluster,
                flags: existing.flags,
            });
        }

        ep.clusters.push(Cluster {
            id: cluster,
            flags,
            dataver: Dataver::new(rand::random()),
            attributes: Vec::new(),
            commands: Vec::new(),
            events: Vec::new(),
        });
        Ok(ClusterHandle {
            endpoint,
            cluster,
            flags,
        })
    }

    pub fn create_attribute(
        &self,
        endpoint: EndptId,
        cluster: ClusterId,
        attribute: AttrId,
        flags: AttributeFlags,
        value: AttrValue,
    ) -> Result<(), Error> {
        self.with_cluster(endpoint, cluster, |c| {
            if c.attributes.iter().any(|a| a.id == attribute) {
                return Err(ErrorCode::Duplicate.into());
            }
            c.attributes.push(Attribute {
                id: attribute,
                flags,
                value,
                bounds: None,
            });
            Ok(())
        })
    }

    /// Limit an attribute to `[min, max]`; the current value is saturated
    /// into the new range.
    pub fn add_bounds(
        &self,
        endpoint: EndptId,
        cluster: ClusterId,
        attribute: AttrId,
        min: AttrValue,
        max: AttrValue,
    ) -> Result<(), Error> {
        self.with_cluster(endpoint, cluster, |c| {
            let attr = c
                .attributes
                .iter_mut()
                .find(|a| a.id == attribute)
                .ok_or(ErrorCode::AttributeNotFound)?;
            let numeric = matches!(
                min,
                AttrValue::U8(_)
                    | AttrValue::U16(_)
                    | AttrValue::U32(_)
                    | AttrValue::U64(_)
                    | AttrValue::I64(_)
            );
            if !numeric || !min.le_numeric(&max) || !attr.value.same_type(&min) {
                warn!(
                    "Invalid bounds {}..{} for attribute 0x{:04X} on {}/0x{:04X}",
                    min, max, attribute, endpoint, cluster
                );
                return Err(ErrorCode::InvalidDataType.into());
            }
            attr.value = std::mem::replace(&mut attr.value, AttrValue::Null).clamp(&min, &max);
            attr.bounds = Some((min, max));
            Ok(())
        })
    }

    /// Create a command. An existing command with the same id is kept as is.
    pub fn create_command(
        &self,
        endpoint: EndptId,
        cluster: ClusterId,
        command: CmdId,
        flags: CommandFlags,
    ) -> Result<(), Error> {
        self.with_cluster(endpoint, cluster, |c| {
            if c.commands.iter().any(|cmd| cmd.id == command && cmd.flags.intersects(flags)) {
                warn!(
                    "Command 0x{:08X} on cluster 0x{:08X} already exists. Not creating again.",
                    command, cluster
                );
                return Ok(());
            }
            c.commands.push(Command { id: command, flags });
            Ok(())
        })
    }

    pub fn create_event(
        &self,
        endpoint: EndptId,
        cluster: ClusterId,
        event: EventId,
    ) -> Result<(), Error> {
        self.with_cluster(endpoint, cluster, |c| {
            if !c.events.contains(&event) {
                c.events.push(event);
            }
            Ok(())
        })
    }

    pub fn read_attribute(
        &self,
        endpoint: EndptId,
        cluster: ClusterId,
        attribute: AttrId,
    ) -> Result<AttrValue, Error> {
        self.with_cluster(endpoint, cluster, |c| {
            c.attributes
                .iter()
                .find(|a| a.id == attribute)
                .map(|a| a.value.clone())
                .ok_or_else(|| ErrorCode::AttributeNotFound.into())
        })
    }

    /// Replace an attribute value, keeping its data type. Values outside the
    /// attribute's bounds are saturated to the nearest bound.
    pub fn write_attribute(
        &self,
        endpoint: EndptId,
        cluster: ClusterId,
        attribute: AttrId,
        value: AttrValue,
    ) -> Result<(), Error> {
        self.update_attribute(endpoint, cluster, attribute, value, AttributeFlags::empty())
    }

    /// A write requested by a client: like [`Node::write_attribute`], but
    /// attributes without [`AttributeFlags::WRITABLE`] are refused.
    pub fn write_attribute_external(
        &self,
        endpoint: EndptId,
        cluster: ClusterId,
        attribute: AttrId,
        value: AttrValue,
    ) -> Result<(), Error> {
        self.update_attribute(endpoint, cluster, attribute, value, AttributeFlags::WRITABLE)
    }

    fn update_attribute(
        &self,
        endpoint: EndptId,
        cluster: ClusterId,
        attribute: AttrId,
        value: AttrValue,
        required: AttributeFlags,
    ) -> Result<(), Error> {
        self.with_cluster(endpoint, cluster, |c| {
            let attr = c
                .attributes
                .iter_mut()
                .find(|a| a.id == attribute)
                .ok_or(ErrorCode::AttributeNotFound)?;
            if !attr.flags.contains(required) {
                warn!(
                    "Attribute 0x{:04X} on {}/0x{:04X} is not writable",
                    attribute, endpoint, cluster
                );
                return Err(ErrorCode::UnsupportedAccess.into());
            }
            let previous = attr.value.clone();
            attr.set(value)?;
            debug!(
                "Attribute 0x{:04X} on {}/0x{:04X}: {} -> {}",
                attribute, endpoint, cluster, previous, attr.value
            );
            c.dataver.changed();
            Ok(())
        })
    }

    pub fn data_version(&self, endpoint: EndptId, cluster: ClusterId) -> Option<u32> {
        self.with_cluster(endpoint, cluster, |c| Ok(c.dataver.get()))
            .ok()
    }

    pub fn endpoint_ids(&self) -> Vec<EndptId> {
        self.endpoints.lock().iter().map(|e| e.id).collect()
    }

    pub fn device_types(&self, endpoint: EndptId) -> Vec<u32> {
        self.endpoints
            .lock()
            .iter()
            .find(|e| e.id == endpoint)
            .map(|e| e.device_types.clone())
            .unwrap_or_default()
    }

    /// Concrete `(endpoint, cluster, attribute)` triples selected by a path
    /// whose `None` components are wildcards.
    pub fn expand_attribute_path(
        &self,
        endpoint: Option<EndptId>,
        cluster: Option<ClusterId>,
        attribute: Option<AttrId>,
    ) -> Vec<(EndptId, ClusterId, AttrId)> {
        let endpoints = self.endpoints.lock();
        let mut out = Vec::new();
        for ep in endpoints.iter().filter(|e| endpoint.is_none_or(|id| id == e.id)) {
            for cl in ep.clusters.iter().filter(|c| cluster.is_none_or(|id| id == c.id)) {
                for attr in cl.attributes.iter().filter(|a| attribute.is_none_or(|id| id == a.id)) {
                    out.push((ep.id, cl.id, attr.id));
                }
            }
        }
        out
    }

    fn with_cluster<T>(
        &self,
        endpoint: EndptId,
        cluster: ClusterId,
        f: impl FnOnce(&mut Cluster) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut endpoints = self.endpoints.lock();
        let ep = endpoints
            .iter_mut()
            .find(|e| e.id == endpoint)
            .ok_or(ErrorCode::EndpointNotFound)?;
        let cl = ep
            .clusters
            .iter_mut()
            .find(|c| c.id == cluster)
            .ok_or(ErrorCode::ClusterNotFound)?;
        f(cl)
    }
}

impl DataModelProvider for Node {
    fn is_attribute_enabled(
        &self,
        endpoint: EndptId,
        cluster: ClusterId,
        attribute: AttrId,
    ) -> bool {
        self.with_cluster(endpoint, cluster, |c| {
            Ok(c.attributes.iter().any(|a| a.id == attribute))
        })
        .unwrap_or(false)
    }

    fn get_cluster(&self, endpoint: EndptId, cluster: ClusterId) -> Option<ClusterHandle> {
        self.with_cluster(endpoint, cluster, |c| {
            Ok(ClusterHandle {
                endpoint,
                cluster,
                flags: c.flags,
            })
        })
        .ok()
    }

    fn get_command(
        &self,
        cluster: &ClusterHandle,
        command: CmdId,
        flags: CommandFlags,
    ) -> Option<CommandHandle> {
        self.with_cluster(cluster.endpoint, cluster.cluster, |c| {
            c.commands
                .iter()
                .find(|cmd| cmd.id == command && cmd.flags.intersects(flags))
                .map(|cmd| CommandHandle {
                    endpoint: cluster.endpoint,
                    cluster: cluster.cluster,
                    command,
                    flags: cmd.flags,
                })
                .ok_or_else(|| ErrorCode::CommandNotFound.into())
        })
        .ok()
    }
}
