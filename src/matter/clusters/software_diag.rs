//! Software Diagnostics cluster (0x0034) servers.
//!
//! The minimal server reports heap usage as pushed by the application. The
//! watermark-tracking server is selected when ResetWatermarks is accepted or
//! CurrentHeapHighWatermark is enabled on the endpoint.

use std::sync::Arc;

use log::{info, warn};
use parking_lot::Mutex;
use rs_matter::dm::Dataver;
use rs_matter::error::{Error, ErrorCode};
use strum::FromRepr;

use super::faults::SoftwareFault;
use super::lifecycle::{ManagedCluster, ServerLifecycle, ServerVariant};
use crate::matter::data_model::{
    AttrValue, AttributeFlags, ClusterFlags, CommandFlags, DataModelProvider, Node,
};
use crate::matter::events::{EventData, EventLog, EventPath, EventPriority};
use crate::matter::ids::{AttrId, ClusterId, CmdId, EndptId, clusters};
use crate::matter::registry::ClusterServer;

/// Software Diagnostics Cluster ID
pub const CLUSTER_ID: ClusterId = clusters::SOFTWARE_DIAGNOSTICS;

/// Attribute IDs for the Software Diagnostics cluster
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u32)]
pub enum SoftwareDiagAttribute {
    /// List of thread metrics (optional)
    ThreadMetrics = 0x0000,
    /// Current free heap memory in bytes (optional)
    CurrentHeapFree = 0x0001,
    /// Current used heap memory in bytes (optional)
    CurrentHeapUsed = 0x0002,
    /// High watermark of heap usage in bytes (optional)
    CurrentHeapHighWatermark = 0x0003,
}

pub const RESET_WATERMARKS: CmdId = 0x00;

pub const SOFTWARE_FAULT_EVENT: u32 = 0x00;

/// Enablement of the cluster's optional parts on one endpoint.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SoftwareDiagnosticsSnapshot {
    pub thread_metrics: bool,
    pub heap_free: bool,
    pub heap_used: bool,
    pub heap_high_watermark: bool,
    pub reset_watermarks: bool,
}

impl SoftwareDiagnosticsSnapshot {
    fn is_enabled(&self, attr: SoftwareDiagAttribute) -> bool {
        match attr {
            SoftwareDiagAttribute::ThreadMetrics => self.thread_metrics,
            SoftwareDiagAttribute::CurrentHeapFree => self.heap_free,
            SoftwareDiagAttribute::CurrentHeapUsed => self.heap_used,
            SoftwareDiagAttribute::CurrentHeapHighWatermark => self.heap_high_watermark,
        }
    }
}

/// Notifications forwarded to the live server.
pub trait SoftwareDiagnosticsEvents: Send + Sync {
    fn on_heap_usage(&self, used: u64, free: u64);

    fn on_software_fault(&self, fault: &SoftwareFault);
}

struct HeapState {
    dataver: Dataver,
    used: u64,
    free: u64,
}

/// Handler for the Software Diagnostics cluster without watermark support.
pub struct SoftwareDiagServer {
    endpoint: EndptId,
    snapshot: SoftwareDiagnosticsSnapshot,
    events: Arc<EventLog>,
    state: Mutex<HeapState>,
}

impl SoftwareDiagServer {
    pub fn new(endpoint: EndptId, snapshot: SoftwareDiagnosticsSnapshot, events: Arc<EventLog>) -> Self {
        Self {
            endpoint,
            snapshot,
            events,
            state: Mutex::new(HeapState {
                dataver: Dataver::new(rand::random()),
                used: 0,
                free: 0,
            }),
        }
    }

    fn heap_used(&self) -> u64 {
        self.state.lock().used
    }
}

impl SoftwareDiagnosticsEvents for SoftwareDiagServer {
    fn on_heap_usage(&self, used: u64, free: u64) {
        let mut state = self.state.lock();
        if state.used != used || state.free != free {
            state.used = used;
            state.free = free;
            state.dataver.changed();
        }
    }

    fn on_software_fault(&self, fault: &SoftwareFault) {
        warn!(
            "Software fault in thread {} ({})",
            fault.id,
            fault.name.as_deref().unwrap_or("unnamed")
        );
        self.events.record(
            EventPath::new(self.endpoint, CLUSTER_ID, SOFTWARE_FAULT_EVENT),
            EventPriority::Info,
            EventData::SoftwareFault {
                id: fault.id,
                name: fault.name.clone(),
                fault_recording: fault.fault_recording.clone(),
            },
        );
    }
}

impl ClusterServer for SoftwareDiagServer {
    fn endpoint(&self) -> EndptId {
        self.endpoint
    }

    fn cluster_id(&self) -> ClusterId {
        CLUSTER_ID
    }

    fn data_version(&self) -> u32 {
        self.state.lock().dataver.get()
    }

    fn read_attribute(&self, attribute: AttrId) -> Result<AttrValue, Error> {
        let attr = SoftwareDiagAttribute::from_repr(attribute).ok_or(ErrorCode::AttributeNotFound)?;
        if !self.snapshot.is_enabled(attr) {
            return Err(ErrorCode::AttributeNotFound.into());
        }

        let state = self.state.lock();
        match attr {
            // Thread metrics are not collected
            SoftwareDiagAttribute::ThreadMetrics => Ok(AttrValue::List(Vec::new())),
            SoftwareDiagAttribute::CurrentHeapFree => Ok(AttrValue::U64(state.free)),
            SoftwareDiagAttribute::CurrentHeapUsed => Ok(AttrValue::U64(state.used)),
            SoftwareDiagAttribute::CurrentHeapHighWatermark => {
                Err(ErrorCode::AttributeNotFound.into())
            }
        }
    }

    fn invoke(&self, _command: CmdId, _args: &[AttrValue]) -> Result<Option<AttrValue>, Error> {
        Err(ErrorCode::CommandNotFound.into())
    }
}

/// Handler tracking the heap high watermark, with ResetWatermarks.
pub struct WatermarkSoftwareDiagServer {
    base: SoftwareDiagServer,
    high_watermark: Mutex<u64>,
}

impl WatermarkSoftwareDiagServer {
    pub fn new(endpoint: EndptId, snapshot: SoftwareDiagnosticsSnapshot, events: Arc<EventLog>) -> Self {
        Self {
            base: SoftwareDiagServer::new(endpoint, snapshot, events),
            high_watermark: Mutex::new(0),
        }
    }

    pub fn high_watermark(&self) -> u64 {
        *self.high_watermark.lock()
    }

    fn reset_watermarks(&self) {
        let used = self.base.heap_used();
        *self.high_watermark.lock() = used;
        self.base.state.lock().dataver.changed();
        info!("Heap high watermark reset to {} bytes", used);
    }
}

impl SoftwareDiagnosticsEvents for WatermarkSoftwareDiagServer {
    fn on_heap_usage(&self, used: u64, free: u64) {
        {
            let mut watermark = self.high_watermark.lock();
            *watermark = (*watermark).max(used);
        }
        self.base.on_heap_usage(used, free);
    }

    fn on_software_fault(&self, fault: &SoftwareFault) {
        self.base.on_software_fault(fault);
    }
}

impl ClusterServer for WatermarkSoftwareDiagServer {
    fn endpoint(&self) -> EndptId {
        self.base.endpoint()
    }

    fn cluster_id(&self) -> ClusterId {
        CLUSTER_ID
    }

    fn data_version(&self) -> u32 {
        self.base.data_version()
    }

    fn read_attribute(&self, attribute: AttrId) -> Result<AttrValue, Error> {
        if attribute == SoftwareDiagAttribute::CurrentHeapHighWatermark as AttrId
            && self.base.snapshot.heap_high_watermark
        {
            return Ok(AttrValue::U64(self.high_watermark()));
        }
        self.base.read_attribute(attribute)
    }

    fn invoke(&self, command: CmdId, args: &[AttrValue]) -> Result<Option<AttrValue>, Error> {
        match command {
            RESET_WATERMARKS if self.base.snapshot.reset_watermarks => {
                self.reset_watermarks();
                Ok(None)
            }
            _ => self.base.invoke(command, args),
        }
    }
}

/// The Software Diagnostics cluster type.
pub struct SoftwareDiagnostics;

impl ManagedCluster for SoftwareDiagnostics {
    const CLUSTER_ID: ClusterId = CLUSTER_ID;
    const NAME: &'static str = "Software Diagnostics";

    type Snapshot = SoftwareDiagnosticsSnapshot;
    type Context = Arc<EventLog>;
    type Minimal = SoftwareDiagServer;
    type Full = WatermarkSoftwareDiagServer;

    fn snapshot(provider: &dyn DataModelProvider, endpoint: EndptId) -> SoftwareDiagnosticsSnapshot {
        let enabled = |attr: SoftwareDiagAttribute| {
            provider.is_attribute_enabled(endpoint, CLUSTER_ID, attr as AttrId)
        };
        SoftwareDiagnosticsSnapshot {
            thread_metrics: enabled(SoftwareDiagAttribute::ThreadMetrics),
            heap_free: enabled(SoftwareDiagAttribute::CurrentHeapFree),
            heap_used: enabled(SoftwareDiagAttribute::CurrentHeapUsed),
            heap_high_watermark: enabled(SoftwareDiagAttribute::CurrentHeapHighWatermark),
            reset_watermarks: provider.is_command_accepted(endpoint, CLUSTER_ID, RESET_WATERMARKS),
        }
    }

    fn requires_full(snapshot: &SoftwareDiagnosticsSnapshot) -> bool {
        snapshot.reset_watermarks || snapshot.heap_high_watermark
    }

    fn build_minimal(
        endpoint: EndptId,
        snapshot: SoftwareDiagnosticsSnapshot,
        events: &Arc<EventLog>,
    ) -> SoftwareDiagServer {
        SoftwareDiagServer::new(endpoint, snapshot, events.clone())
    }

    fn build_full(
        endpoint: EndptId,
        snapshot: SoftwareDiagnosticsSnapshot,
        events: &Arc<EventLog>,
    ) -> WatermarkSoftwareDiagServer {
        WatermarkSoftwareDiagServer::new(endpoint, snapshot, events.clone())
    }
}

impl ServerLifecycle<SoftwareDiagnostics> {
    pub fn notify_heap_usage(&self, used: u64, free: u64) {
        if let Some(server) = self.software_diagnostics() {
            server.on_heap_usage(used, free);
        }
    }

    pub fn notify_software_fault(&self, fault: &SoftwareFault) {
        if let Some(server) = self.software_diagnostics() {
            server.on_software_fault(fault);
        }
    }

    fn software_diagnostics(&self) -> Option<Arc<dyn SoftwareDiagnosticsEvents>> {
        match self.active()? {
            ServerVariant::Minimal(server) => Some(server as Arc<dyn SoftwareDiagnosticsEvents>),
            ServerVariant::Full(server) => Some(server as Arc<dyn SoftwareDiagnosticsEvents>),
        }
    }
}

/// Add the cluster to `endpoint`; `watermarks` enables the high watermark
/// attribute and the ResetWatermarks command.
pub fn create(node: &Node, endpoint: EndptId, watermarks: bool) -> Result<(), Error> {
    node.create_cluster(endpoint, CLUSTER_ID, ClusterFlags::SERVER)?;
    node.create_attribute(
        endpoint,
        CLUSTER_ID,
        SoftwareDiagAttribute::ThreadMetrics as AttrId,
        AttributeFlags::empty(),
        AttrValue::List(Vec::new()),
    )?;
    node.create_attribute(
        endpoint,
        CLUSTER_ID,
        SoftwareDiagAttribute::CurrentHeapFree as AttrId,
        AttributeFlags::empty(),
        AttrValue::U64(0),
    )?;
    node.create_attribute(
        endpoint,
        CLUSTER_ID,
        SoftwareDiagAttribute::CurrentHeapUsed as AttrId,
        AttributeFlags::empty(),
        AttrValue::U64(0),
    )?;
    if watermarks {
        node.create_attribute(
            endpoint,
            CLUSTER_ID,
            SoftwareDiagAttribute::CurrentHeapHighWatermark as AttrId,
            AttributeFlags::empty(),
            AttrValue::U64(0),
        )?;
        node.create_command(endpoint, CLUSTER_ID, RESET_WATERMARKS, CommandFlags::ACCEPTED)?;
    }
    node.create_event(endpoint, CLUSTER_ID, SOFTWARE_FAULT_EVENT)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matter::ids::ROOT_ENDPOINT;
    use crate::matter::registry::InteractionModelRegistry;

    fn lifecycle(
        watermarks: bool,
    ) -> (
        ServerLifecycle<SoftwareDiagnostics>,
        Arc<InteractionModelRegistry>,
        Arc<EventLog>,
    ) {
        let node = Node::new();
        node.add_endpoint(ROOT_ENDPOINT, &[]).unwrap();
        create(&node, ROOT_ENDPOINT, watermarks).unwrap();
        let registry = Arc::new(InteractionModelRegistry::new());
        let events = Arc::new(EventLog::new(8));
        (
            ServerLifecycle::new(Arc::new(node), registry.clone(), events.clone()),
            registry,
            events,
        )
    }

    fn read(registry: &InteractionModelRegistry, attr: SoftwareDiagAttribute) -> Result<AttrValue, Error> {
        registry.read_attribute(ROOT_ENDPOINT, CLUSTER_ID, attr as AttrId)
    }

    #[test]
    fn test_minimal_reports_heap_only() {
        let (lifecycle, registry, _events) = lifecycle(false);
        lifecycle.init_callback(ROOT_ENDPOINT);
        assert!(!lifecycle.is_full());

        lifecycle.notify_heap_usage(4096, 1024);
        assert_eq!(
            read(&registry, SoftwareDiagAttribute::CurrentHeapUsed).unwrap(),
            AttrValue::U64(4096)
        );
        assert_eq!(
            read(&registry, SoftwareDiagAttribute::CurrentHeapHighWatermark)
                .unwrap_err()
                .code(),
            ErrorCode::AttributeNotFound
        );
        let err = registry
            .invoke(ROOT_ENDPOINT, CLUSTER_ID, RESET_WATERMARKS, &[])
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::CommandNotFound);
    }

    #[test]
    fn test_watermark_tracking_and_reset() {
        let (lifecycle, registry, _events) = lifecycle(true);
        lifecycle.init_callback(ROOT_ENDPOINT);
        assert!(lifecycle.is_full());

        lifecycle.notify_heap_usage(8000, 100);
        lifecycle.notify_heap_usage(3000, 5100);
        assert_eq!(
            read(&registry, SoftwareDiagAttribute::CurrentHeapHighWatermark).unwrap(),
            AttrValue::U64(8000)
        );

        registry
            .invoke(ROOT_ENDPOINT, CLUSTER_ID, RESET_WATERMARKS, &[])
            .unwrap();
        assert_eq!(
            read(&registry, SoftwareDiagAttribute::CurrentHeapHighWatermark).unwrap(),
            AttrValue::U64(3000)
        );
    }

    #[test]
    fn test_software_fault_event() {
        let (lifecycle, _registry, events) = lifecycle(false);
        let fault = SoftwareFault {
            id: 7,
            name: Some("worker".into()),
            fault_recording: vec![1, 2],
        };

        lifecycle.notify_software_fault(&fault);
        assert!(events.is_empty());

        lifecycle.init_callback(ROOT_ENDPOINT);
        lifecycle.notify_software_fault(&fault);
        let recorded = events.matching(Some(ROOT_ENDPOINT), Some(CLUSTER_ID), None);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].priority, EventPriority::Info);
    }
}
