//! In-process transport: the controller talking to this node's own data model.
//!
//! Every session request, report and response is queued and delivered from
//! [`LoopbackTransport::run_until_idle`], so callbacks never run inside the
//! call that triggered them.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};

use log::{debug, info, warn};
use parking_lot::Mutex;
use rs_matter::error::{Error, ErrorCode};

use super::client::{
    ConnectionCallback, InteractionEngine, ReadClient, ReadClientCallback, ReadRequest,
    SendFailure, SessionConnector, SessionHandle, WriteClient, WriteClientCallback,
};
use super::paths::{AttributePathParams, MAX_PATHS};
use crate::matter::NodeRuntime;
use crate::matter::data_model::{AttrValue, Node};
use crate::matter::events::EventLog;
use crate::matter::ids::{AttrId, ClusterId, EndptId, NodeId};
use crate::matter::registry::InteractionModelRegistry;

type Job = Box<dyn FnOnce(&Inner) + Send>;

struct Subscription {
    id: u32,
    request: ReadRequest,
    callback: Box<dyn ReadClientCallback>,
}

struct Inner {
    local_node: NodeId,
    node: Arc<Node>,
    registry: Arc<InteractionModelRegistry>,
    events: Arc<EventLog>,
    jobs: Mutex<VecDeque<Job>>,
    subscriptions: Mutex<Vec<Subscription>>,
    next_session: AtomicU16,
    next_subscription: AtomicU32,
}

impl Inner {
    fn enqueue(&self, job: Job) {
        self.jobs.lock().push_back(job);
    }

    /// Registered servers answer for their clusters; everything else comes
    /// from the attribute store.
    fn read_value(
        &self,
        endpoint: EndptId,
        cluster: ClusterId,
        attribute: AttrId,
    ) -> Result<AttrValue, Error> {
        match self.registry.server_for(endpoint, cluster) {
            Some(server) => server.read_attribute(attribute),
            None => self.node.read_attribute(endpoint, cluster, attribute),
        }
    }

    fn report(&self, request: &ReadRequest, callback: &mut dyn ReadClientCallback) {
        for path in request.attribute_paths.iter() {
            let concrete = self.node.expand_attribute_path(
                path.endpoint_filter(),
                path.cluster_filter(),
                path.attribute_filter(),
            );
            if concrete.is_empty() && !path.is_wildcard() {
                callback.on_error(ErrorCode::AttributeNotFound.into());
                continue;
            }
            for (endpoint, cluster, attribute) in concrete {
                match self.read_value(endpoint, cluster, attribute) {
                    Ok(value) => callback.on_attribute_data(
                        &AttributePathParams::new(endpoint, cluster, attribute),
                        &value,
                    ),
                    // Disabled optional attributes drop out of wildcard reads.
                    Err(e) if path.is_wildcard() => debug!(
                        "Skipping {}/0x{:04X}/0x{:04X}: {}",
                        endpoint, cluster, attribute, e
                    ),
                    Err(e) => callback.on_error(e),
                }
            }
        }

        for path in request.event_paths.iter() {
            let records = self.events.matching(
                path.endpoint_filter(),
                path.cluster_filter(),
                path.event_filter(),
            );
            for record in &records {
                callback.on_event_data(record);
            }
        }
    }

    fn publish(&self, changed: &[(EndptId, ClusterId, AttrId)]) {
        let mut subscriptions = self.subscriptions.lock();
        for sub in subscriptions.iter_mut() {
            for &(endpoint, cluster, attribute) in changed {
                let selected = sub
                    .request
                    .attribute_paths
                    .iter()
                    .any(|p| p.matches(endpoint, cluster, attribute));
                if !selected {
                    continue;
                }
                if let Ok(value) = self.read_value(endpoint, cluster, attribute) {
                    debug!("Reporting 0x{:04X} to subscription 0x{:08X}", attribute, sub.id);
                    sub.callback.on_attribute_data(
                        &AttributePathParams::new(endpoint, cluster, attribute),
                        &value,
                    );
                }
            }
        }
    }
}

/// Session layer and interaction engine for requests addressed to the local
/// node. Requests to any other node fail with `NoSession`.
///
/// Pending jobs and live subscriptions own their commands; call
/// [`LoopbackTransport::shutdown_subscriptions`] before dropping the runtime.
pub struct LoopbackTransport {
    inner: Arc<Inner>,
}

impl LoopbackTransport {
    pub fn new(runtime: &NodeRuntime, local_node: NodeId) -> Self {
        Self {
            inner: Arc::new(Inner {
                local_node,
                node: runtime.node.clone(),
                registry: runtime.registry.clone(),
                events: runtime.events.clone(),
                jobs: Mutex::new(VecDeque::new()),
                subscriptions: Mutex::new(Vec::new()),
                next_session: AtomicU16::new(1),
                next_subscription: AtomicU32::new(1),
            }),
        }
    }

    pub fn local_node(&self) -> NodeId {
        self.inner.local_node
    }

    /// Deliver queued work, including work queued by callbacks, until none is left.
    /// Returns the number of jobs run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            let job = self.inner.jobs.lock().pop_front();
            match job {
                Some(job) => {
                    job(&self.inner);
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    pub fn pending_jobs(&self) -> usize {
        self.inner.jobs.lock().len()
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.lock().len()
    }

    /// Report a change made outside a write interaction to matching subscriptions.
    pub fn attribute_changed(&self, endpoint: EndptId, cluster: ClusterId, attribute: AttrId) {
        self.inner
            .enqueue(Box::new(move |inner| inner.publish(&[(endpoint, cluster, attribute)])));
    }

    /// End every subscription; each callback gets its paths back and is done.
    pub fn shutdown_subscriptions(&self) -> usize {
        let subscriptions: Vec<Subscription> = self.inner.subscriptions.lock().drain(..).collect();
        let count = subscriptions.len();
        for sub in subscriptions {
            info!("Closing subscription 0x{:08X}", sub.id);
            let Subscription {
                request,
                mut callback,
                ..
            } = sub;
            callback.on_deallocate_paths(request);
            callback.on_done();
        }
        count
    }
}

impl SessionConnector for LoopbackTransport {
    fn connect(&self, peer: NodeId, callback: Box<dyn ConnectionCallback>) -> Result<(), Error> {
        if peer != self.inner.local_node {
            warn!("No route to node 0x{:016X}", peer);
            self.inner.enqueue(Box::new(move |_| {
                callback.on_connection_failure(peer, ErrorCode::NoSession.into())
            }));
            return Ok(());
        }

        let session = SessionHandle {
            peer,
            session_id: self.inner.next_session.fetch_add(1, Ordering::Relaxed),
        };
        self.inner
            .enqueue(Box::new(move |_| callback.on_connected(session)));
        Ok(())
    }
}

impl InteractionEngine for LoopbackTransport {
    fn new_read_client(&self, session: &SessionHandle) -> Result<Box<dyn ReadClient>, Error> {
        if session.peer != self.inner.local_node {
            return Err(ErrorCode::NoSession.into());
        }
        Ok(Box::new(LoopbackReadClient {
            inner: self.inner.clone(),
        }))
    }

    fn new_write_client(&self, session: &SessionHandle) -> Result<Box<dyn WriteClient>, Error> {
        if session.peer != self.inner.local_node {
            return Err(ErrorCode::NoSession.into());
        }
        Ok(Box::new(LoopbackWriteClient {
            inner: self.inner.clone(),
            writes: heapless::Vec::new(),
        }))
    }
}

struct LoopbackReadClient {
    inner: Arc<Inner>,
}

impl ReadClient for LoopbackReadClient {
    fn send_request(
        self: Box<Self>,
        request: ReadRequest,
        callback: Box<dyn ReadClientCallback>,
    ) -> Result<(), SendFailure<dyn ReadClientCallback>> {
        if request.attribute_paths.is_empty() && request.event_paths.is_empty() {
            return Err(SendFailure {
                error: ErrorCode::InvalidCommand.into(),
                callback,
            });
        }

        self.inner.enqueue(Box::new(move |inner| {
            let mut callback = callback;
            inner.report(&request, callback.as_mut());

            match request.subscription {
                Some(params) => {
                    let id = inner.next_subscription.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        "Subscription 0x{:08X} with intervals {}..{}s",
                        id, params.min_interval_floor, params.max_interval_ceiling
                    );
                    callback.on_subscription_established(id);
                    let mut subscriptions = inner.subscriptions.lock();
                    if !params.keep_subscriptions {
                        subscriptions.clear();
                    }
                    subscriptions.push(Subscription {
                        id,
                        request,
                        callback,
                    });
                }
                None => {
                    callback.on_deallocate_paths(request);
                    callback.on_done();
                }
            }
        }));
        Ok(())
    }
}

struct LoopbackWriteClient {
    inner: Arc<Inner>,
    writes: heapless::Vec<(AttributePathParams, AttrValue), MAX_PATHS>,
}

impl WriteClient for LoopbackWriteClient {
    fn encode_attribute(&mut self, path: AttributePathParams, value: AttrValue) -> Result<(), Error> {
        if path.is_wildcard() {
            return Err(ErrorCode::InvalidCommand.into());
        }
        self.writes
            .push((path, value))
            .map_err(|_| ErrorCode::NoMemory.into())
    }

    fn send_request(
        self: Box<Self>,
        callback: Box<dyn WriteClientCallback>,
    ) -> Result<(), SendFailure<dyn WriteClientCallback>> {
        if self.writes.is_empty() {
            return Err(SendFailure {
                error: ErrorCode::InvalidCommand.into(),
                callback,
            });
        }

        let LoopbackWriteClient { inner, writes } = *self;
        inner.enqueue(Box::new(move |inner| {
            let mut callback = callback;
            let mut changed = Vec::new();
            for (path, value) in writes {
                let status = inner
                    .node
                    .write_attribute_external(path.endpoint, path.cluster, path.attribute, value)
                    .map_err(|e| e.code());
                if status.is_ok() {
                    changed.push((path.endpoint, path.cluster, path.attribute));
                }
                callback.on_response(&path, status);
            }
            callback.on_done();
            inner.publish(&changed);
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::controller::client::{ClientContext, SubscribeParams};
    use crate::controller::dispatch::Controller;
    use crate::controller::paths::{AttributePaths, EventPaths};
    use crate::controller::read_command::ReadCommand;
    use crate::controller::write_command::WriteCommand;
    use crate::matter::clusters::faults::BootReason;
    use crate::matter::clusters::general_diagnostics;
    use crate::matter::ids::attributes::{level_control, on_off};
    use crate::matter::ids::{WILDCARD_ATTRIBUTE, WILDCARD_EVENT, clusters};

    const LOCAL: NodeId = 0x1122;

    struct Setup {
        runtime: NodeRuntime,
        transport: Arc<LoopbackTransport>,
        controller: Controller,
    }

    fn setup() -> Setup {
        let config = Config::default();
        let runtime = NodeRuntime::new(&config.node).unwrap();
        runtime.init_endpoints();
        let transport = Arc::new(LoopbackTransport::new(&runtime, LOCAL));
        let controller = Controller::new(transport.clone(), transport.clone(), &config.controller);
        Setup {
            runtime,
            transport,
            controller,
        }
    }

    type Seen = Arc<Mutex<Vec<(AttributePathParams, AttrValue)>>>;

    fn recording_read(setup: &Setup, paths: AttributePaths, seen: &Seen) -> ReadCommand {
        let seen = seen.clone();
        setup
            .controller
            .read_command(LOCAL, paths, EventPaths::new())
            .unwrap()
            .with_attribute_callback(Box::new(move |_node, path, value| {
                seen.lock().push((*path, value.clone()));
            }))
    }

    #[test]
    fn test_write_then_read_back() {
        let s = setup();
        s.controller
            .send_write_attr_command(LOCAL, 1, clusters::ON_OFF, on_off::ON_TIME, "120")
            .unwrap();
        s.transport.run_until_idle();
        assert_eq!(
            s.runtime.node.read_attribute(1, clusters::ON_OFF, on_off::ON_TIME).unwrap(),
            AttrValue::U16(120)
        );

        let seen: Seen = Arc::default();
        let paths = AttributePaths::from_parallel(&[1], &[clusters::ON_OFF], &[on_off::ON_TIME])
            .unwrap();
        Box::new(recording_read(&s, paths, &seen)).send_command().unwrap();
        assert_eq!(s.controller.pool().in_use(), 1);

        s.transport.run_until_idle();
        assert_eq!(seen.lock()[0].1, AttrValue::U16(120));
        assert_eq!(s.controller.pool().in_use(), 0);
    }

    #[test]
    fn test_wildcard_attribute_read_expands() {
        let s = setup();
        let seen: Seen = Arc::default();
        let paths =
            AttributePaths::from_parallel(&[1], &[clusters::ON_OFF], &[WILDCARD_ATTRIBUTE]).unwrap();
        Box::new(recording_read(&s, paths, &seen)).send_command().unwrap();
        s.transport.run_until_idle();

        let seen = seen.lock();
        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(|(p, _)| !p.is_wildcard()));
    }

    #[test]
    fn test_unknown_peer_fails_asynchronously() {
        let s = setup();
        s.controller
            .send_read_attr_command_single(0xDEAD, 1, clusters::ON_OFF, on_off::ON_OFF)
            .unwrap();
        assert_eq!(s.controller.pool().in_use(), 1);

        s.transport.run_until_idle();
        assert_eq!(s.controller.pool().in_use(), 0);
        assert_eq!(s.controller.pool().released_total(), 1);
    }

    #[test]
    fn test_event_read_sees_reboot() {
        let s = setup();
        s.runtime
            .general_diagnostics
            .notify_device_reboot(BootReason::SoftwareUpdateCompleted);

        let events = Arc::new(Mutex::new(Vec::new()));
        let command = s
            .controller
            .read_command(
                LOCAL,
                AttributePaths::new(),
                EventPaths::from_parallel(&[0], &[general_diagnostics::CLUSTER_ID], &[WILDCARD_EVENT])
                    .unwrap(),
            )
            .unwrap()
            .with_event_callback({
                let events = events.clone();
                Box::new(move |_node, record| events.lock().push(record.clone()))
            });
        Box::new(command).send_command().unwrap();
        s.transport.run_until_idle();

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path.event_id, general_diagnostics::events::BOOT_REASON);
    }

    #[test]
    fn test_subscription_reports_later_writes() {
        let s = setup();
        let seen: Seen = Arc::default();
        let subscribed = Arc::new(AtomicU32::new(0));
        let paths =
            AttributePaths::from_parallel(&[1], &[clusters::ON_OFF], &[on_off::OFF_WAIT_TIME]).unwrap();
        let command = recording_read(&s, paths, &seen)
            .subscribe(SubscribeParams {
                min_interval_floor: 0,
                max_interval_ceiling: 10,
                keep_subscriptions: true,
            })
            .with_subscription_callback({
                let subscribed = subscribed.clone();
                Box::new(move |_node, id| subscribed.store(id, Ordering::SeqCst))
            });
        Box::new(command).send_command().unwrap();
        s.transport.run_until_idle();

        assert_eq!(subscribed.load(Ordering::SeqCst), 1);
        assert_eq!(s.transport.subscription_count(), 1);
        assert_eq!(seen.lock().len(), 1);

        s.controller
            .send_write_attr_command(LOCAL, 1, clusters::ON_OFF, on_off::OFF_WAIT_TIME, "30")
            .unwrap();
        s.controller
            .send_write_attr_command(LOCAL, 1, clusters::ON_OFF, on_off::ON_TIME, "30")
            .unwrap();
        s.transport.run_until_idle();
        assert_eq!(seen.lock().len(), 2);
        assert_eq!(seen.lock()[1].1, AttrValue::U16(30));

        // The subscription keeps its command alive until it is closed.
        assert_eq!(s.controller.pool().in_use(), 1);
        assert_eq!(s.transport.shutdown_subscriptions(), 1);
        assert_eq!(s.controller.pool().in_use(), 0);
    }

    #[test]
    fn test_write_status_reaches_done_callback() {
        let s = setup();
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let slot = s.controller.pool().acquire().unwrap();
        let command = WriteCommand::new(
            slot,
            LOCAL,
            9,
            clusters::ON_OFF,
            on_off::ON_TIME,
            5u16,
            ClientContext {
                connector: s.transport.clone(),
                engine: s.transport.clone(),
            },
        )
        .with_done_callback({
            let statuses = statuses.clone();
            Box::new(move |_node, status| statuses.lock().push(status.is_ok()))
        });
        Box::new(command).send_command().unwrap();
        s.transport.run_until_idle();

        assert_eq!(*statuses.lock(), vec![false]);
        assert_eq!(s.controller.pool().in_use(), 0);
    }

    #[test]
    fn test_write_is_saturated_to_bounds() {
        let s = setup();
        let level = clusters::LEVEL_CONTROL;
        s.controller
            .send_write_attr_command(LOCAL, 2, level, level_control::ON_LEVEL, "255")
            .unwrap();
        s.transport.run_until_idle();
        assert_eq!(
            s.runtime.node.read_attribute(2, level, level_control::ON_LEVEL).unwrap(),
            AttrValue::U8(254)
        );
    }

    #[test]
    fn test_read_only_attribute_write_is_refused() {
        let s = setup();
        let codes = Arc::new(Mutex::new(Vec::new()));
        let slot = s.controller.pool().acquire().unwrap();
        let command = WriteCommand::new(
            slot,
            LOCAL,
            1,
            clusters::ON_OFF,
            on_off::ON_OFF,
            true,
            ClientContext {
                connector: s.transport.clone(),
                engine: s.transport.clone(),
            },
        )
        .with_done_callback({
            let codes = codes.clone();
            Box::new(move |_node, status| codes.lock().push(status.map_err(|e| e.code())))
        });
        Box::new(command).send_command().unwrap();
        s.transport.run_until_idle();

        assert_eq!(*codes.lock(), vec![Err(ErrorCode::UnsupportedAccess)]);
        assert_eq!(
            s.runtime.node.read_attribute(1, clusters::ON_OFF, on_off::ON_OFF).unwrap(),
            AttrValue::Bool(false)
        );
    }
}
