//! The interaction-model client surface the controller commands drive.
//!
//! Ownership follows the request: a command hands itself to the session layer
//! as a [`ConnectionCallback`], then to a read or write client as its
//! callback. Whoever holds the box owns the command; dropping it is the only
//! way a command is destroyed.

use std::sync::Arc;

use rs_matter::error::{Error, ErrorCode};

use super::paths::{AttributePathParams, AttributePaths, EventPaths};
use crate::matter::data_model::AttrValue;
use crate::matter::events::EventRecord;
use crate::matter::ids::NodeId;

/// An established operational session with a peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionHandle {
    pub peer: NodeId,
    pub session_id: u16,
}

/// Receives the outcome of a session request. Exactly one method is called.
pub trait ConnectionCallback: Send {
    fn on_connected(self: Box<Self>, session: SessionHandle);

    fn on_connection_failure(self: Box<Self>, peer: NodeId, error: Error);
}

pub trait SessionConnector: Send + Sync {
    /// Queue a request for an operational session with `peer`.
    ///
    /// On `Err` the callback has been dropped without being invoked.
    fn connect(&self, peer: NodeId, callback: Box<dyn ConnectionCallback>) -> Result<(), Error>;
}

pub trait InteractionEngine: Send + Sync {
    fn new_read_client(&self, session: &SessionHandle) -> Result<Box<dyn ReadClient>, Error>;

    fn new_write_client(&self, session: &SessionHandle) -> Result<Box<dyn WriteClient>, Error>;
}

/// The collaborators every command needs to reach a peer.
#[derive(Clone)]
pub struct ClientContext {
    pub connector: Arc<dyn SessionConnector>,
    pub engine: Arc<dyn InteractionEngine>,
}

/// A send rejected before the exchange started.
///
/// The client is already gone; the callback is handed back to its owner.
pub struct SendFailure<C: ?Sized> {
    pub error: Error,
    pub callback: Box<C>,
}

/// Subscription parameters; `None` in a [`ReadRequest`] means a one-shot read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscribeParams {
    pub min_interval_floor: u16,
    pub max_interval_ceiling: u16,
    pub keep_subscriptions: bool,
}

/// Paths of a read or subscribe interaction. Returned to the callback through
/// [`ReadClientCallback::on_deallocate_paths`] once the client is done with them.
#[derive(Debug, Default)]
pub struct ReadRequest {
    pub attribute_paths: AttributePaths,
    pub event_paths: EventPaths,
    pub subscription: Option<SubscribeParams>,
}

pub trait ReadClient: Send {
    fn send_request(
        self: Box<Self>,
        request: ReadRequest,
        callback: Box<dyn ReadClientCallback>,
    ) -> Result<(), SendFailure<dyn ReadClientCallback>>;
}

pub trait ReadClientCallback: Send {
    /// `path` is always concrete.
    fn on_attribute_data(&mut self, path: &AttributePathParams, data: &AttrValue);

    fn on_event_data(&mut self, event: &EventRecord);

    fn on_error(&mut self, error: Error);

    fn on_subscription_established(&mut self, _subscription_id: u32) {}

    fn on_deallocate_paths(&mut self, request: ReadRequest);

    /// Terminal: the exchange is over and the callback is released.
    fn on_done(self: Box<Self>);
}

pub trait WriteClient: Send {
    fn encode_attribute(&mut self, path: AttributePathParams, value: AttrValue) -> Result<(), Error>;

    fn send_request(
        self: Box<Self>,
        callback: Box<dyn WriteClientCallback>,
    ) -> Result<(), SendFailure<dyn WriteClientCallback>>;
}

pub trait WriteClientCallback: Send {
    /// Per-path status of the write.
    fn on_response(&mut self, path: &AttributePathParams, status: Result<(), ErrorCode>);

    fn on_error(&mut self, error: Error);

    /// Terminal: the exchange is over and the callback is released.
    fn on_done(self: Box<Self>);
}
