//! Read and subscribe commands.

use log::{debug, error, info};
use rs_matter::error::Error;

use super::client::{
    ClientContext, ConnectionCallback, ReadClientCallback, ReadRequest, SendFailure,
    SessionHandle, SubscribeParams,
};
use super::paths::{AttributePathParams, AttributePaths, EventPathParams, EventPaths};
use super::pool::PoolSlot;
use crate::error::{NodeError, Result};
use crate::matter::data_model::AttrValue;
use crate::matter::events::EventRecord;
use crate::matter::ids::{AttrId, ClusterId, EndptId, EventId, NodeId};

pub type AttributeCallback = Box<dyn FnMut(NodeId, &AttributePathParams, &AttrValue) + Send>;
pub type EventCallback = Box<dyn FnMut(NodeId, &EventRecord) + Send>;
pub type SubscriptionCallback = Box<dyn FnMut(NodeId, u32) + Send>;
pub type DoneCallback = Box<dyn FnOnce(NodeId, Result<()>) + Send>;

/// One read (or subscribe) interaction with one node.
///
/// Lives exactly as long as the request: it is owned by the session layer
/// while connecting, by the read client while the exchange runs, and is
/// dropped on `on_done` or on the first failure. Either way the done
/// callback runs once, with the first error reported.
pub struct ReadCommand {
    node_id: NodeId,
    attribute_paths: AttributePaths,
    event_paths: EventPaths,
    subscription: Option<SubscribeParams>,
    context: ClientContext,
    on_attribute: Option<AttributeCallback>,
    on_event: Option<EventCallback>,
    on_subscribed: Option<SubscriptionCallback>,
    on_done: Option<DoneCallback>,
    status: Result<()>,
    _slot: PoolSlot,
}

impl ReadCommand {
    pub fn new(
        slot: PoolSlot,
        node_id: NodeId,
        attribute_paths: AttributePaths,
        event_paths: EventPaths,
        context: ClientContext,
    ) -> Self {
        Self {
            node_id,
            attribute_paths,
            event_paths,
            subscription: None,
            context,
            on_attribute: None,
            on_event: None,
            on_subscribed: None,
            on_done: None,
            status: Ok(()),
            _slot: slot,
        }
    }

    /// Read of a single attribute path; any id may be a wildcard.
    pub fn single_attribute(
        slot: PoolSlot,
        node_id: NodeId,
        endpoint: EndptId,
        cluster: ClusterId,
        attribute: AttrId,
        context: ClientContext,
    ) -> Result<Self> {
        let paths = AttributePaths::single(AttributePathParams::new(endpoint, cluster, attribute))?;
        Ok(Self::new(slot, node_id, paths, EventPaths::new(), context))
    }

    /// Read of a single event path; any id may be a wildcard.
    pub fn single_event(
        slot: PoolSlot,
        node_id: NodeId,
        endpoint: EndptId,
        cluster: ClusterId,
        event: EventId,
        context: ClientContext,
    ) -> Result<Self> {
        let paths = EventPaths::single(EventPathParams::new(endpoint, cluster, event))?;
        Ok(Self::new(slot, node_id, AttributePaths::new(), paths, context))
    }

    pub fn subscribe(mut self, params: SubscribeParams) -> Self {
        self.subscription = Some(params);
        self
    }

    pub fn with_attribute_callback(mut self, callback: AttributeCallback) -> Self {
        self.on_attribute = Some(callback);
        self
    }

    pub fn with_event_callback(mut self, callback: EventCallback) -> Self {
        self.on_event = Some(callback);
        self
    }

    pub fn with_subscription_callback(mut self, callback: SubscriptionCallback) -> Self {
        self.on_subscribed = Some(callback);
        self
    }

    pub fn with_done_callback(mut self, callback: DoneCallback) -> Self {
        self.on_done = Some(callback);
        self
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn attribute_paths(&self) -> &[AttributePathParams] {
        &self.attribute_paths
    }

    pub fn event_paths(&self) -> &[EventPathParams] {
        &self.event_paths
    }

    fn fail(mut self: Box<Self>, error: Error) {
        if let Some(callback) = self.on_done.take() {
            callback(self.node_id, Err(error.into()));
        }
    }

    /// Ask for a session with the node; the read is sent once connected.
    ///
    /// On error the command has already been dropped.
    pub fn send_command(self: Box<Self>) -> Result<()> {
        let node_id = self.node_id;
        let connector = self.context.connector.clone();
        connector.connect(node_id, self).map_err(|e| {
            error!("Failed to request session with node 0x{:016X}: {}", node_id, e);
            NodeError::from(e)
        })
    }
}

impl ConnectionCallback for ReadCommand {
    fn on_connected(mut self: Box<Self>, session: SessionHandle) {
        let client = match self.context.engine.new_read_client(&session) {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to alloc memory for read client: {}", e);
                self.fail(e);
                return;
            }
        };

        let request = ReadRequest {
            attribute_paths: std::mem::take(&mut self.attribute_paths),
            event_paths: std::mem::take(&mut self.event_paths),
            subscription: self.subscription,
        };
        let node_id = self.node_id;
        if let Err(SendFailure {
            error,
            mut callback,
        }) = client.send_request(request, self)
        {
            error!("Failed to send read request to node 0x{:016X}: {}", node_id, error);
            callback.on_error(error);
            callback.on_done();
        }
    }

    fn on_connection_failure(self: Box<Self>, peer: NodeId, error: Error) {
        error!("Failed to establish secure session to node 0x{:016X}: {}", peer, error);
        self.fail(error);
    }
}

impl ReadClientCallback for ReadCommand {
    fn on_attribute_data(&mut self, path: &AttributePathParams, data: &AttrValue) {
        match self.on_attribute.as_mut() {
            Some(callback) => callback(self.node_id, path, data),
            None => info!(
                "Node 0x{:016X} endpoint {} cluster 0x{:08X} attribute 0x{:08X}: {}",
                self.node_id, path.endpoint, path.cluster, path.attribute, data
            ),
        }
    }

    fn on_event_data(&mut self, event: &EventRecord) {
        match self.on_event.as_mut() {
            Some(callback) => callback(self.node_id, event),
            None => info!(
                "Node 0x{:016X} endpoint {} cluster 0x{:08X} event 0x{:08X} #{}: {:?}",
                self.node_id,
                event.path.endpoint_id,
                event.path.cluster_id,
                event.path.event_id,
                event.event_number,
                event.data
            ),
        }
    }

    fn on_error(&mut self, error: Error) {
        error!("Read from node 0x{:016X} failed: {}", self.node_id, error);
        if self.status.is_ok() {
            self.status = Err(error.into());
        }
    }

    fn on_subscription_established(&mut self, subscription_id: u32) {
        info!(
            "Subscription 0x{:08X} established with node 0x{:016X}",
            subscription_id, self.node_id
        );
        if let Some(callback) = self.on_subscribed.as_mut() {
            callback(self.node_id, subscription_id);
        }
    }

    fn on_deallocate_paths(&mut self, request: ReadRequest) {
        debug!(
            "Releasing {} attribute and {} event path(s)",
            request.attribute_paths.len(),
            request.event_paths.len()
        );
    }

    fn on_done(mut self: Box<Self>) {
        if let Some(callback) = self.on_done.take() {
            let status = std::mem::replace(&mut self.status, Ok(()));
            callback(self.node_id, status);
        }
    }
}
