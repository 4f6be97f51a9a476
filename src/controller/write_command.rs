//! Single-attribute write command.

use std::fmt::Debug;

use log::{error, info};
use rs_matter::error::{Error, ErrorCode};

use super::client::{
    ClientContext, ConnectionCallback, SendFailure, SessionHandle, WriteClientCallback,
};
use super::paths::AttributePathParams;
use super::pool::PoolSlot;
use crate::error::{NodeError, Result};
use crate::matter::data_model::AttrValue;
use crate::matter::ids::{AttrId, ClusterId, EndptId, NodeId};

pub type WriteDoneCallback = Box<dyn FnOnce(NodeId, Result<()>) + Send>;

/// Writes one attribute of native type `T` on one node.
///
/// The done callback runs exactly once per command that reached the session
/// layer, with the first failure if there was one. Allocation, encode and
/// send failures drop the write client (when one was allocated) before the
/// command.
pub struct WriteCommand<T> {
    node_id: NodeId,
    path: AttributePathParams,
    value: T,
    context: ClientContext,
    status: Result<()>,
    on_done: Option<WriteDoneCallback>,
    _slot: PoolSlot,
}

impl<T> WriteCommand<T>
where
    T: Into<AttrValue> + Copy + Debug + Send + 'static,
{
    pub fn new(
        slot: PoolSlot,
        node_id: NodeId,
        endpoint: EndptId,
        cluster: ClusterId,
        attribute: AttrId,
        value: T,
        context: ClientContext,
    ) -> Self {
        Self {
            node_id,
            path: AttributePathParams::new(endpoint, cluster, attribute),
            value,
            context,
            status: Ok(()),
            on_done: None,
            _slot: slot,
        }
    }

    /// Called once the write completes with the first failing status, if any.
    pub fn with_done_callback(mut self, callback: WriteDoneCallback) -> Self {
        self.on_done = Some(callback);
        self
    }

    pub fn path(&self) -> AttributePathParams {
        self.path
    }

    pub fn value(&self) -> T {
        self.value
    }

    fn fail(mut self: Box<Self>, error: Error) {
        if let Some(callback) = self.on_done.take() {
            callback(self.node_id, Err(error.into()));
        }
    }

    /// Ask for a session with the node; the write is sent once connected.
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

impl<T> ConnectionCallback for WriteCommand<T>
where
    T: Into<AttrValue> + Copy + Debug + Send + 'static,
{
    fn on_connected(self: Box<Self>, session: SessionHandle) {
        let mut client = match self.context.engine.new_write_client(&session) {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to alloc memory for write client: {}", e);
                self.fail(e);
                return;
            }
        };

        if let Err(e) = client.encode_attribute(self.path, self.value.into()) {
            error!("Failed to encode attribute value {:?}: {}", self.value, e);
            drop(client);
            self.fail(e);
            return;
        }

        let node_id = self.node_id;
        if let Err(SendFailure {
            error,
            mut callback,
        }) = client.send_request(self)
        {
            error!("Failed to send write request to node 0x{:016X}: {}", node_id, error);
            callback.on_error(error);
            callback.on_done();
        }
    }

    fn on_connection_failure(self: Box<Self>, peer: NodeId, error: Error) {
        error!("Failed to establish secure session to node 0x{:016X}: {}", peer, error);
        self.fail(error);
    }
}

impl<T> WriteClientCallback for WriteCommand<T>
where
    T: Into<AttrValue> + Copy + Debug + Send + 'static,
{
    fn on_response(&mut self, path: &AttributePathParams, status: std::result::Result<(), ErrorCode>) {
        match status {
            Ok(()) => info!(
                "Wrote {:?} to node 0x{:016X} endpoint {} cluster 0x{:08X} attribute 0x{:08X}",
                self.value, self.node_id, path.endpoint, path.cluster, path.attribute
            ),
            Err(code) => {
                error!(
                    "Write to node 0x{:016X} attribute 0x{:08X} failed: {:?}",
                    self.node_id, path.attribute, code
                );
                if self.status.is_ok() {
                    self.status = Err(code.into());
                }
            }
        }
    }

    fn on_error(&mut self, error: Error) {
        error!("Write to node 0x{:016X} failed: {}", self.node_id, error);
        if self.status.is_ok() {
            self.status = Err(error.into());
        }
    }

    fn on_done(mut self: Box<Self>) {
        if let Some(callback) = self.on_done.take() {
            let status = std::mem::replace(&mut self.status, Ok(()));
            callback(self.node_id, status);
        }
    }
}
