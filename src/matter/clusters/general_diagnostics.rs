//! General Diagnostics cluster (0x0033) servers.
//!
//! Two server implementations exist. [`GeneralDiagnosticsServer`] covers the
//! attributes, the fault and boot events, and the TestEventTrigger and
//! TimeSnapshot commands. [`ConfigurableGeneralDiagnosticsServer`] is chosen
//! when PayloadTestRequest is accepted or Time Synchronization is present on
//! the endpoint, and adds those behaviors as enabled by [`FunctionsConfig`].
//!
//! Device-level notifications reach whichever variant is live through the
//! `notify_*` methods on `ServerLifecycle<GeneralDiagnostics>`.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};
use parking_lot::Mutex;
use rs_matter::dm::Dataver;
use rs_matter::error::{Error, ErrorCode};
use serde::{Deserialize, Serialize};
use strum::FromRepr;

use super::faults::{
    self, BootReason, FaultSet, HardwareFault, HardwareFaults, NetworkFault, NetworkFaults,
    RadioFault, RadioFaults,
};
use super::lifecycle::{ManagedCluster, ServerLifecycle, ServerVariant};
use super::time_sync;
use crate::matter::data_model::{
    AttrValue, AttributeFlags, ClusterFlags, CommandFlags, DataModelProvider, Node,
};
use crate::matter::events::{EventData, EventLog, EventPath, EventPriority};
use crate::matter::ids::{AttrId, ClusterId, CmdId, EndptId, EventId, clusters};
use crate::matter::registry::ClusterServer;

/// General Diagnostics Cluster ID
pub const CLUSTER_ID: ClusterId = clusters::GENERAL_DIAGNOSTICS;

/// Length of the test event trigger enable key.
pub const ENABLE_KEY_LEN: usize = 16;

/// Upper bound on the PayloadTestRequest `count` field.
pub const MAX_PAYLOAD_TEST_COUNT: u64 = 2048;

/// Attribute IDs for the General Diagnostics cluster
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u32)]
pub enum GeneralDiagAttribute {
    NetworkInterfaces = 0x00,
    RebootCount = 0x01,
    /// Seconds since the server was constructed
    UpTime = 0x02,
    /// Optional
    TotalOperationalHours = 0x03,
    /// Optional
    BootReason = 0x04,
    /// Optional
    ActiveHardwareFaults = 0x05,
    /// Optional
    ActiveRadioFaults = 0x06,
    /// Optional
    ActiveNetworkFaults = 0x07,
    TestEventTriggersEnabled = 0x08,
}

/// Command IDs for the General Diagnostics cluster
pub mod commands {
    use crate::matter::ids::CmdId;

    pub const TEST_EVENT_TRIGGER: CmdId = 0x00;
    pub const TIME_SNAPSHOT: CmdId = 0x01;
    pub const TIME_SNAPSHOT_RESPONSE: CmdId = 0x02;
    pub const PAYLOAD_TEST_REQUEST: CmdId = 0x03;
    pub const PAYLOAD_TEST_RESPONSE: CmdId = 0x04;
}

/// Event IDs for the General Diagnostics cluster
pub mod events {
    use crate::matter::ids::EventId;

    pub const HARDWARE_FAULT_CHANGE: EventId = 0x00;
    pub const RADIO_FAULT_CHANGE: EventId = 0x01;
    pub const NETWORK_FAULT_CHANGE: EventId = 0x02;
    pub const BOOT_REASON: EventId = 0x03;
}

/// Test event trigger codes understood by TestEventTrigger.
///
/// The upper 16 bits carry the cluster id.
pub mod triggers {
    pub const HARDWARE_FAULT: u64 = 0x0033_0000_0000_0000;
    pub const RADIO_FAULT: u64 = 0x0033_0000_0000_0001;
    pub const NETWORK_FAULT: u64 = 0x0033_0000_0000_0002;
    pub const CLEAR_FAULTS: u64 = 0x0033_0000_0000_0003;
}

/// Which optional attributes are enabled on the endpoint.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct OptionalAttributes {
    pub total_operational_hours: bool,
    pub boot_reason: bool,
    pub active_hardware_faults: bool,
    pub active_radio_faults: bool,
    pub active_network_faults: bool,
}

impl OptionalAttributes {
    pub fn all() -> Self {
        Self {
            total_operational_hours: true,
            boot_reason: true,
            active_hardware_faults: true,
            active_radio_faults: true,
            active_network_faults: true,
        }
    }

    /// Whether `attr` can be read. Mandatory attributes are always enabled.
    pub fn is_enabled(&self, attr: GeneralDiagAttribute) -> bool {
        match attr {
            GeneralDiagAttribute::TotalOperationalHours => self.total_operational_hours,
            GeneralDiagAttribute::BootReason => self.boot_reason,
            GeneralDiagAttribute::ActiveHardwareFaults => self.active_hardware_faults,
            GeneralDiagAttribute::ActiveRadioFaults => self.active_radio_faults,
            GeneralDiagAttribute::ActiveNetworkFaults => self.active_network_faults,
            GeneralDiagAttribute::NetworkInterfaces
            | GeneralDiagAttribute::RebootCount
            | GeneralDiagAttribute::UpTime
            | GeneralDiagAttribute::TestEventTriggersEnabled => true,
        }
    }

    fn enabled_ids(&self) -> impl Iterator<Item = AttrId> + '_ {
        [
            GeneralDiagAttribute::TotalOperationalHours,
            GeneralDiagAttribute::BootReason,
            GeneralDiagAttribute::ActiveHardwareFaults,
            GeneralDiagAttribute::ActiveRadioFaults,
            GeneralDiagAttribute::ActiveNetworkFaults,
        ]
        .into_iter()
        .filter(|attr| self.is_enabled(*attr))
        .map(|attr| attr as AttrId)
    }
}

/// Enablement of the cluster's optional parts on one endpoint.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GeneralDiagnosticsSnapshot {
    pub attributes: OptionalAttributes,
    /// PayloadTestRequest is accepted
    pub payload_test_request: bool,
    /// Time Synchronization is present on the same endpoint
    pub time_sync_present: bool,
}

impl GeneralDiagnosticsSnapshot {
    pub fn requires_full(&self) -> bool {
        self.payload_test_request || self.time_sync_present
    }
}

/// Behavior switches for the configurable server.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FunctionsConfig {
    /// Report POSIX time in TimeSnapshot. Only set when Time Synchronization
    /// is present, so unsynchronized clock values are never surfaced.
    pub enable_posix_time: bool,
    pub enable_payload_test_request: bool,
}

impl From<&GeneralDiagnosticsSnapshot> for FunctionsConfig {
    fn from(snapshot: &GeneralDiagnosticsSnapshot) -> Self {
        Self {
            enable_posix_time: snapshot.time_sync_present,
            enable_payload_test_request: snapshot.payload_test_request,
        }
    }
}

/// Node-wide inputs shared by both server variants.
pub struct DiagnosticsContext {
    pub events: Arc<EventLog>,
    pub reboot_count: u16,
    pub total_operational_hours: u32,
    /// All zeroes disables test event triggers.
    pub test_enable_key: [u8; ENABLE_KEY_LEN],
}

/// Device-level notifications forwarded to the live server.
pub trait GeneralDiagnosticsEvents: Send + Sync {
    fn on_device_reboot(&self, reason: BootReason);

    fn on_hardware_faults_detected(&self, previous: &HardwareFaults, current: &HardwareFaults);

    fn on_radio_faults_detected(&self, previous: &RadioFaults, current: &RadioFaults);

    fn on_network_faults_detected(&self, previous: &NetworkFaults, current: &NetworkFaults);

    fn active_hardware_faults(&self) -> HardwareFaults;

    fn active_radio_faults(&self) -> RadioFaults;

    fn active_network_faults(&self) -> NetworkFaults;
}

struct State {
    dataver: Dataver,
    boot_reason: BootReason,
    hardware_faults: HardwareFaults,
    radio_faults: RadioFaults,
    network_faults: NetworkFaults,
}

/// Minimal General Diagnostics server.
pub struct GeneralDiagnosticsServer {
    endpoint: EndptId,
    attributes: OptionalAttributes,
    reboot_count: u16,
    total_operational_hours: u32,
    test_enable_key: [u8; ENABLE_KEY_LEN],
    events: Arc<EventLog>,
    started: Instant,
    state: Mutex<State>,
}

impl GeneralDiagnosticsServer {
    pub fn new(endpoint: EndptId, attributes: OptionalAttributes, context: &DiagnosticsContext) -> Self {
        Self {
            endpoint,
            attributes,
            reboot_count: context.reboot_count,
            total_operational_hours: context.total_operational_hours,
            test_enable_key: context.test_enable_key,
            events: context.events.clone(),
            started: Instant::now(),
            state: Mutex::new(State {
                dataver: Dataver::new(rand::random()),
                boot_reason: BootReason::default(),
                hardware_faults: HardwareFaults::new(),
                radio_faults: RadioFaults::new(),
                network_faults: NetworkFaults::new(),
            }),
        }
    }

    pub fn test_event_triggers_enabled(&self) -> bool {
        self.test_enable_key != [0; ENABLE_KEY_LEN]
    }

    pub fn boot_reason(&self) -> BootReason {
        self.state.lock().boot_reason
    }

    fn emit(&self, event: EventId, data: EventData) -> u64 {
        let path = EventPath::new(self.endpoint, CLUSTER_ID, event).urgent();
        self.events.record(path, EventPriority::Critical, data)
    }

    fn check_enable_key(&self, key: &[u8]) -> Result<(), Error> {
        if !self.test_event_triggers_enabled() {
            return Err(ErrorCode::UnsupportedAccess.into());
        }
        if key != self.test_enable_key.as_slice() {
            return Err(ErrorCode::ConstraintError.into());
        }
        Ok(())
    }

    fn test_event_trigger(&self, args: &[AttrValue]) -> Result<Option<AttrValue>, Error> {
        let key = bytes_arg(args, 0)?;
        let trigger = uint_arg(args, 1)?;
        self.check_enable_key(key)?;

        let (hardware, radio, network) = {
            let state = self.state.lock();
            (
                state.hardware_faults.clone(),
                state.radio_faults.clone(),
                state.network_faults.clone(),
            )
        };

        info!("Test event trigger 0x{:016X} on endpoint {}", trigger, self.endpoint);
        match trigger {
            triggers::HARDWARE_FAULT => {
                self.on_hardware_faults_detected(&hardware, &single(HardwareFault::Unspecified)?)
            }
            triggers::RADIO_FAULT => {
                self.on_radio_faults_detected(&radio, &single(RadioFault::Unspecified)?)
            }
            triggers::NETWORK_FAULT => {
                self.on_network_faults_detected(&network, &single(NetworkFault::Unspecified)?)
            }
            triggers::CLEAR_FAULTS => {
                self.on_hardware_faults_detected(&hardware, &FaultSet::new());
                self.on_radio_faults_detected(&radio, &FaultSet::new());
                self.on_network_faults_detected(&network, &FaultSet::new());
            }
            _ => return Err(ErrorCode::InvalidCommand.into()),
        }
        Ok(None)
    }

    fn time_snapshot(&self, posix_time_ms: Option<u64>) -> Result<Option<AttrValue>, Error> {
        let system_time_ms = self.started.elapsed().as_millis() as u64;
        Ok(Some(AttrValue::Struct(vec![
            AttrValue::U64(system_time_ms),
            posix_time_ms.into(),
        ])))
    }
}

impl GeneralDiagnosticsEvents for GeneralDiagnosticsServer {
    fn on_device_reboot(&self, reason: BootReason) {
        {
            let mut state = self.state.lock();
            state.boot_reason = reason;
            state.dataver.changed();
        }
        info!("Device rebooted, reason {:?}", reason);
        self.emit(
            events::BOOT_REASON,
            EventData::BootReason {
                boot_reason: reason,
            },
        );
    }

    fn on_hardware_faults_detected(&self, previous: &HardwareFaults, current: &HardwareFaults) {
        let current: HardwareFaults = faults::distinct(current.as_slice());
        log_fault_change("Hardware", previous.as_slice(), current.as_slice());
        {
            let mut state = self.state.lock();
            state.hardware_faults = current.clone();
            state.dataver.changed();
        }
        self.emit(
            events::HARDWARE_FAULT_CHANGE,
            EventData::HardwareFaultChange {
                current: faults::codes(current.as_slice()),
                previous: faults::codes(previous.as_slice()),
            },
        );
    }

    fn active_hardware_faults(&self) -> HardwareFaults {
        self.state.lock().hardware_faults.clone()
    }

    fn on_radio_faults_detected(&self, previous: &RadioFaults, current: &RadioFaults) {
        let current: RadioFaults = faults::distinct(current.as_slice());
        log_fault_change("Radio", previous.as_slice(), current.as_slice());
        {
            let mut state = self.state.lock();
            state.radio_faults = current.clone();
            state.dataver.changed();
        }
        self.emit(
            events::RADIO_FAULT_CHANGE,
            EventData::RadioFaultChange {
                current: faults::codes(current.as_slice()),
                previous: faults::codes(previous.as_slice()),
            },
        );
    }

    fn active_radio_faults(&self) -> RadioFaults {
        self.state.lock().radio_faults.clone()
    }

    fn on_network_faults_detected(&self, previous: &NetworkFaults, current: &NetworkFaults) {
        let current: NetworkFaults = faults::distinct(current.as_slice());
        log_fault_change("Network", previous.as_slice(), current.as_slice());
        {
            let mut state = self.state.lock();
            state.network_faults = current.clone();
            state.dataver.changed();
        }
        self.emit(
            events::NETWORK_FAULT_CHANGE,
            EventData::NetworkFaultChange {
                current: faults::codes(current.as_slice()),
                previous: faults::codes(previous.as_slice()),
            },
        );
    }

    fn active_network_faults(&self) -> NetworkFaults {
        self.state.lock().network_faults.clone()
    }
}

impl ClusterServer for GeneralDiagnosticsServer {
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
        let attr = GeneralDiagAttribute::from_repr(attribute).ok_or(ErrorCode::AttributeNotFound)?;
        if !self.attributes.is_enabled(attr) {
            return Err(ErrorCode::AttributeNotFound.into());
        }

        let state = self.state.lock();
        let value = match attr {
            // Interfaces are owned by the network layer; none are exposed here
            GeneralDiagAttribute::NetworkInterfaces => AttrValue::List(Vec::new()),
            GeneralDiagAttribute::RebootCount => AttrValue::U16(self.reboot_count),
            GeneralDiagAttribute::UpTime => AttrValue::U64(self.started.elapsed().as_secs()),
            GeneralDiagAttribute::TotalOperationalHours => {
                let hours = (self.started.elapsed().as_secs() / 3600) as u32;
                AttrValue::U32(self.total_operational_hours.saturating_add(hours))
            }
            GeneralDiagAttribute::BootReason => AttrValue::U8(state.boot_reason.into()),
            GeneralDiagAttribute::ActiveHardwareFaults => {
                AttrValue::U8List(faults::codes(state.hardware_faults.as_slice()))
            }
            GeneralDiagAttribute::ActiveRadioFaults => {
                AttrValue::U8List(faults::codes(state.radio_faults.as_slice()))
            }
            GeneralDiagAttribute::ActiveNetworkFaults => {
                AttrValue::U8List(faults::codes(state.network_faults.as_slice()))
            }
            GeneralDiagAttribute::TestEventTriggersEnabled => {
                AttrValue::Bool(self.test_event_triggers_enabled())
            }
        };
        Ok(value)
    }

    fn invoke(&self, command: CmdId, args: &[AttrValue]) -> Result<Option<AttrValue>, Error> {
        match command {
            commands::TEST_EVENT_TRIGGER => self.test_event_trigger(args),
            commands::TIME_SNAPSHOT => self.time_snapshot(None),
            commands::PAYLOAD_TEST_REQUEST => Err(ErrorCode::InvalidCommand.into()),
            _ => Err(ErrorCode::CommandNotFound.into()),
        }
    }
}

/// General Diagnostics server with the optional functions enabled.
pub struct ConfigurableGeneralDiagnosticsServer {
    base: GeneralDiagnosticsServer,
    functions: FunctionsConfig,
}

impl ConfigurableGeneralDiagnosticsServer {
    pub fn new(
        endpoint: EndptId,
        attributes: OptionalAttributes,
        functions: FunctionsConfig,
        context: &DiagnosticsContext,
    ) -> Self {
        Self {
            base: GeneralDiagnosticsServer::new(endpoint, attributes, context),
            functions,
        }
    }

    pub fn functions(&self) -> FunctionsConfig {
        self.functions
    }

    fn payload_test_request(&self, args: &[AttrValue]) -> Result<Option<AttrValue>, Error> {
        let key = bytes_arg(args, 0)?;
        let value = uint_arg(args, 1)?;
        let count = uint_arg(args, 2)?;
        self.base.check_enable_key(key)?;

        let value = u8::try_from(value).map_err(|_| ErrorCode::ConstraintError)?;
        if count > MAX_PAYLOAD_TEST_COUNT {
            return Err(ErrorCode::ConstraintError.into());
        }
        Ok(Some(AttrValue::Bytes(vec![value; count as usize])))
    }
}

impl GeneralDiagnosticsEvents for ConfigurableGeneralDiagnosticsServer {
    fn on_device_reboot(&self, reason: BootReason) {
        self.base.on_device_reboot(reason);
    }

    fn on_hardware_faults_detected(&self, previous: &HardwareFaults, current: &HardwareFaults) {
        self.base.on_hardware_faults_detected(previous, current);
    }

    fn active_hardware_faults(&self) -> HardwareFaults {
        self.base.active_hardware_faults()
    }

    fn on_radio_faults_detected(&self, previous: &RadioFaults, current: &RadioFaults) {
        self.base.on_radio_faults_detected(previous, current);
    }

    fn active_radio_faults(&self) -> RadioFaults {
        self.base.active_radio_faults()
    }

    fn on_network_faults_detected(&self, previous: &NetworkFaults, current: &NetworkFaults) {
        self.base.on_network_faults_detected(previous, current);
    }

    fn active_network_faults(&self) -> NetworkFaults {
        self.base.active_network_faults()
    }
}

impl ClusterServer for ConfigurableGeneralDiagnosticsServer {
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
        self.base.read_attribute(attribute)
    }

    fn invoke(&self, command: CmdId, args: &[AttrValue]) -> Result<Option<AttrValue>, Error> {
        match command {
            commands::TIME_SNAPSHOT => {
                let posix_time_ms = if self.functions.enable_posix_time {
                    Some(time_sync::epoch_millis()?)
                } else {
                    None
                };
                self.base.time_snapshot(posix_time_ms)
            }
            commands::PAYLOAD_TEST_REQUEST if self.functions.enable_payload_test_request => {
                self.payload_test_request(args)
            }
            _ => self.base.invoke(command, args),
        }
    }
}

/// The General Diagnostics cluster type.
pub struct GeneralDiagnostics;

impl ManagedCluster for GeneralDiagnostics {
    const CLUSTER_ID: ClusterId = CLUSTER_ID;
    const NAME: &'static str = "General Diagnostics";

    type Snapshot = GeneralDiagnosticsSnapshot;
    type Context = DiagnosticsContext;
    type Minimal = GeneralDiagnosticsServer;
    type Full = ConfigurableGeneralDiagnosticsServer;

    fn snapshot(provider: &dyn DataModelProvider, endpoint: EndptId) -> GeneralDiagnosticsSnapshot {
        let enabled = |attr: GeneralDiagAttribute| {
            provider.is_attribute_enabled(endpoint, CLUSTER_ID, attr as AttrId)
        };
        GeneralDiagnosticsSnapshot {
            attributes: OptionalAttributes {
                total_operational_hours: enabled(GeneralDiagAttribute::TotalOperationalHours),
                boot_reason: enabled(GeneralDiagAttribute::BootReason),
                active_hardware_faults: enabled(GeneralDiagAttribute::ActiveHardwareFaults),
                active_radio_faults: enabled(GeneralDiagAttribute::ActiveRadioFaults),
                active_network_faults: enabled(GeneralDiagAttribute::ActiveNetworkFaults),
            },
            payload_test_request: provider.is_command_accepted(
                endpoint,
                CLUSTER_ID,
                commands::PAYLOAD_TEST_REQUEST,
            ),
            time_sync_present: provider.is_cluster_enabled(endpoint, time_sync::CLUSTER_ID),
        }
    }

    fn requires_full(snapshot: &GeneralDiagnosticsSnapshot) -> bool {
        snapshot.requires_full()
    }

    fn build_minimal(
        endpoint: EndptId,
        snapshot: GeneralDiagnosticsSnapshot,
        context: &DiagnosticsContext,
    ) -> GeneralDiagnosticsServer {
        GeneralDiagnosticsServer::new(endpoint, snapshot.attributes, context)
    }

    fn build_full(
        endpoint: EndptId,
        snapshot: GeneralDiagnosticsSnapshot,
        context: &DiagnosticsContext,
    ) -> ConfigurableGeneralDiagnosticsServer {
        let functions = FunctionsConfig::from(&snapshot);
        ConfigurableGeneralDiagnosticsServer::new(endpoint, snapshot.attributes, functions, context)
    }
}

impl ServerLifecycle<GeneralDiagnostics> {
    /// Record a reboot on the live server. Dropped when none is constructed.
    pub fn notify_device_reboot(&self, reason: BootReason) {
        if let Some(server) = self.diagnostics() {
            server.on_device_reboot(reason);
        }
    }

    pub fn notify_hardware_faults_detected(
        &self,
        previous: &HardwareFaults,
        current: &HardwareFaults,
    ) {
        if let Some(server) = self.diagnostics() {
            server.on_hardware_faults_detected(previous, current);
        }
    }

    pub fn notify_radio_faults_detected(&self, previous: &RadioFaults, current: &RadioFaults) {
        if let Some(server) = self.diagnostics() {
            server.on_radio_faults_detected(previous, current);
        }
    }

    pub fn notify_network_faults_detected(&self, previous: &NetworkFaults, current: &NetworkFaults) {
        if let Some(server) = self.diagnostics() {
            server.on_network_faults_detected(previous, current);
        }
    }

    /// Hardware faults the live server reports; empty when none is constructed.
    pub fn active_hardware_faults(&self) -> HardwareFaults {
        self.diagnostics()
            .map(|server| server.active_hardware_faults())
            .unwrap_or_default()
    }

    pub fn active_radio_faults(&self) -> RadioFaults {
        self.diagnostics()
            .map(|server| server.active_radio_faults())
            .unwrap_or_default()
    }

    pub fn active_network_faults(&self) -> NetworkFaults {
        self.diagnostics()
            .map(|server| server.active_network_faults())
            .unwrap_or_default()
    }

    fn diagnostics(&self) -> Option<Arc<dyn GeneralDiagnosticsEvents>> {
        match self.active()? {
            ServerVariant::Minimal(server) => Some(server as Arc<dyn GeneralDiagnosticsEvents>),
            ServerVariant::Full(server) => Some(server as Arc<dyn GeneralDiagnosticsEvents>),
        }
    }
}

/// Add the cluster to `endpoint` with the given optional parts.
pub fn create(
    node: &Node,
    endpoint: EndptId,
    optional: OptionalAttributes,
    payload_test_request: bool,
) -> Result<(), Error> {
    node.create_cluster(endpoint, CLUSTER_ID, ClusterFlags::SERVER)?;

    let mandatory = [
        (GeneralDiagAttribute::NetworkInterfaces, AttrValue::List(Vec::new())),
        (GeneralDiagAttribute::RebootCount, AttrValue::U16(0)),
        (GeneralDiagAttribute::UpTime, AttrValue::U64(0)),
        (GeneralDiagAttribute::TestEventTriggersEnabled, AttrValue::Bool(false)),
    ];
    for (attr, value) in mandatory {
        node.create_attribute(endpoint, CLUSTER_ID, attr as AttrId, AttributeFlags::empty(), value)?;
    }
    for attr in optional.enabled_ids() {
        node.create_attribute(endpoint, CLUSTER_ID, attr, AttributeFlags::NULLABLE, AttrValue::Null)?;
    }

    node.create_command(endpoint, CLUSTER_ID, commands::TEST_EVENT_TRIGGER, CommandFlags::ACCEPTED)?;
    node.create_command(endpoint, CLUSTER_ID, commands::TIME_SNAPSHOT, CommandFlags::ACCEPTED)?;
    node.create_command(
        endpoint,
        CLUSTER_ID,
        commands::TIME_SNAPSHOT_RESPONSE,
        CommandFlags::GENERATED,
    )?;
    if payload_test_request {
        node.create_command(
            endpoint,
            CLUSTER_ID,
            commands::PAYLOAD_TEST_REQUEST,
            CommandFlags::ACCEPTED,
        )?;
        node.create_command(
            endpoint,
            CLUSTER_ID,
            commands::PAYLOAD_TEST_RESPONSE,
            CommandFlags::GENERATED,
        )?;
    }

    for event in [
        events::HARDWARE_FAULT_CHANGE,
        events::RADIO_FAULT_CHANGE,
        events::NETWORK_FAULT_CHANGE,
        events::BOOT_REASON,
    ] {
        node.create_event(endpoint, CLUSTER_ID, event)?;
    }
    Ok(())
}

fn log_fault_change<T: Debug + PartialEq + Copy>(domain: &str, previous: &[T], current: &[T]) {
    let raised = faults::added(previous, current);
    let cleared = faults::removed(previous, current);
    if !raised.is_empty() {
        warn!("{} faults raised: {:?}", domain, raised);
    }
    if !cleared.is_empty() {
        info!("{} faults cleared: {:?}", domain, cleared);
    }
}

fn single<T: PartialEq, const N: usize>(fault: T) -> Result<FaultSet<T, N>, Error> {
    let mut set = FaultSet::new();
    faults::insert(&mut set, fault).map_err(|_| ErrorCode::NoMemory)?;
    Ok(set)
}

fn bytes_arg(args: &[AttrValue], index: usize) -> Result<&[u8], Error> {
    match args.get(index) {
        Some(AttrValue::Bytes(bytes)) => Ok(bytes),
        Some(_) => Err(ErrorCode::InvalidDataType.into()),
        None => Err(ErrorCode::InvalidCommand.into()),
    }
}

fn uint_arg(args: &[AttrValue], index: usize) -> Result<u64, Error> {
    let value = args.get(index).ok_or(ErrorCode::InvalidCommand)?;
    value.as_u64().ok_or_else(|| ErrorCode::InvalidDataType.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matter::ids::ROOT_ENDPOINT;
    use crate::matter::registry::InteractionModelRegistry;

    const KEY: [u8; ENABLE_KEY_LEN] = [0x5A; ENABLE_KEY_LEN];

    struct Fixture {
        lifecycle: ServerLifecycle<GeneralDiagnostics>,
        registry: Arc<InteractionModelRegistry>,
        events: Arc<EventLog>,
    }

    fn fixture(payload: bool, time_sync: bool, key: [u8; ENABLE_KEY_LEN]) -> Fixture {
        let node = Node::new();
        node.add_endpoint(ROOT_ENDPOINT, &[]).unwrap();
        create(&node, ROOT_ENDPOINT, OptionalAttributes::all(), payload).unwrap();
        if time_sync {
            time_sync::create(&node, ROOT_ENDPOINT).unwrap();
        }

        let registry = Arc::new(InteractionModelRegistry::new());
        let events = Arc::new(EventLog::new(32));
        let context = DiagnosticsContext {
            events: events.clone(),
            reboot_count: 4,
            total_operational_hours: 10,
            test_enable_key: key,
        };
        Fixture {
            lifecycle: ServerLifecycle::new(Arc::new(node), registry.clone(), context),
            registry,
            events,
        }
    }

    fn hw(faults: &[HardwareFault]) -> HardwareFaults {
        HardwareFaults::from_slice(faults).unwrap()
    }

    fn trigger_args(key: &[u8], trigger: u64) -> Vec<AttrValue> {
        vec![AttrValue::Bytes(key.to_vec()), AttrValue::U64(trigger)]
    }

    #[test]
    fn test_variant_selection_is_pure_function_of_snapshot() {
        for (payload, time_sync, full) in [
            (false, false, false),
            (true, false, true),
            (false, true, true),
            (true, true, true),
        ] {
            let snapshot = GeneralDiagnosticsSnapshot {
                attributes: OptionalAttributes::default(),
                payload_test_request: payload,
                time_sync_present: time_sync,
            };
            assert_eq!(GeneralDiagnostics::requires_full(&snapshot), full);

            let f = fixture(payload, time_sync, KEY);
            f.lifecycle.init_callback(ROOT_ENDPOINT);
            assert_eq!(f.lifecycle.is_full(), full);
        }
    }

    #[test]
    fn test_snapshot_reads_provider() {
        let node = Node::new();
        node.add_endpoint(ROOT_ENDPOINT, &[]).unwrap();
        let optional = OptionalAttributes {
            boot_reason: true,
            ..Default::default()
        };
        create(&node, ROOT_ENDPOINT, optional, true).unwrap();

        let snapshot = GeneralDiagnostics::snapshot(&node, ROOT_ENDPOINT);
        assert_eq!(snapshot.attributes, optional);
        assert!(snapshot.payload_test_request);
        assert!(!snapshot.time_sync_present);
    }

    #[test]
    fn test_notify_without_server_has_no_effect() {
        let f = fixture(false, false, KEY);
        f.lifecycle.notify_device_reboot(BootReason::PowerOnReboot);
        f.lifecycle
            .notify_hardware_faults_detected(&hw(&[]), &hw(&[HardwareFault::Radio]));
        assert!(f.events.is_empty());

        f.lifecycle.init_callback(ROOT_ENDPOINT);
        f.lifecycle.shutdown_callback(ROOT_ENDPOINT);
        f.lifecycle
            .notify_network_faults_detected(&NetworkFaults::new(), &NetworkFaults::new());
        assert!(f.events.is_empty());
    }

    #[test]
    fn test_fault_notification_updates_attribute_and_event() {
        let f = fixture(false, false, KEY);
        f.lifecycle.init_callback(ROOT_ENDPOINT);
        let before = f
            .registry
            .server_for(ROOT_ENDPOINT, CLUSTER_ID)
            .unwrap()
            .data_version();

        f.lifecycle.notify_hardware_faults_detected(
            &hw(&[HardwareFault::Radio]),
            &hw(&[HardwareFault::Radio, HardwareFault::PowerSource]),
        );

        assert_eq!(
            f.registry
                .read_attribute(ROOT_ENDPOINT, CLUSTER_ID, GeneralDiagAttribute::ActiveHardwareFaults as AttrId)
                .unwrap(),
            AttrValue::U8List(vec![1, 5])
        );
        let server = f.registry.server_for(ROOT_ENDPOINT, CLUSTER_ID).unwrap();
        assert_eq!(server.data_version(), before.wrapping_add(1));

        let recorded = f.events.matching(None, Some(CLUSTER_ID), Some(events::HARDWARE_FAULT_CHANGE));
        assert_eq!(recorded.len(), 1);
        assert_eq!(
            recorded[0].data,
            EventData::HardwareFaultChange {
                current: vec![1, 5],
                previous: vec![1],
            }
        );
    }

    #[test]
    fn test_repeated_fault_codes_are_reported_once() {
        let f = fixture(false, false, KEY);
        assert!(f.lifecycle.active_hardware_faults().is_empty());
        f.lifecycle.init_callback(ROOT_ENDPOINT);

        let mut current = HardwareFaults::new();
        for fault in [HardwareFault::Radio, HardwareFault::Radio, HardwareFault::Sensor] {
            current.push(fault).unwrap();
        }
        f.lifecycle.notify_hardware_faults_detected(&hw(&[]), &current);

        assert_eq!(
            f.registry
                .read_attribute(ROOT_ENDPOINT, CLUSTER_ID, GeneralDiagAttribute::ActiveHardwareFaults as AttrId)
                .unwrap(),
            AttrValue::U8List(vec![1, 2])
        );
        assert_eq!(
            f.lifecycle.active_hardware_faults(),
            hw(&[HardwareFault::Radio, HardwareFault::Sensor])
        );
    }

    #[test]
    fn test_active_faults_track_test_event_triggers() {
        let f = fixture(false, false, KEY);
        f.lifecycle.init_callback(ROOT_ENDPOINT);
        f.registry
            .invoke(
                ROOT_ENDPOINT,
                CLUSTER_ID,
                commands::TEST_EVENT_TRIGGER,
                &trigger_args(&KEY, triggers::RADIO_FAULT),
            )
            .unwrap();
        assert_eq!(
            f.lifecycle.active_radio_faults().as_slice(),
            &[RadioFault::Unspecified]
        );

        f.registry
            .invoke(
                ROOT_ENDPOINT,
                CLUSTER_ID,
                commands::TEST_EVENT_TRIGGER,
                &trigger_args(&KEY, triggers::CLEAR_FAULTS),
            )
            .unwrap();
        assert!(f.lifecycle.active_radio_faults().is_empty());
        assert!(f.lifecycle.active_network_faults().is_empty());

        f.lifecycle.shutdown_callback(ROOT_ENDPOINT);
        assert!(f.lifecycle.active_hardware_faults().is_empty());
    }

    #[test]
    fn test_reboot_notification() {
        let f = fixture(false, false, KEY);
        f.lifecycle.init_callback(ROOT_ENDPOINT);
        f.lifecycle.notify_device_reboot(BootReason::SoftwareReset);

        assert_eq!(
            f.registry
                .read_attribute(ROOT_ENDPOINT, CLUSTER_ID, GeneralDiagAttribute::BootReason as AttrId)
                .unwrap(),
            AttrValue::U8(6)
        );
        assert_eq!(f.events.matching(None, None, Some(events::BOOT_REASON)).len(), 1);
    }

    #[test]
    fn test_disabled_optional_attribute_not_found() {
        let server = GeneralDiagnosticsServer::new(
            ROOT_ENDPOINT,
            OptionalAttributes::default(),
            &DiagnosticsContext {
                events: Arc::new(EventLog::new(4)),
                reboot_count: 2,
                total_operational_hours: 0,
                test_enable_key: [0; ENABLE_KEY_LEN],
            },
        );

        let err = server
            .read_attribute(GeneralDiagAttribute::ActiveRadioFaults as AttrId)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::AttributeNotFound);
        assert_eq!(
            server
                .read_attribute(GeneralDiagAttribute::RebootCount as AttrId)
                .unwrap(),
            AttrValue::U16(2)
        );
        assert_eq!(
            server
                .read_attribute(GeneralDiagAttribute::TestEventTriggersEnabled as AttrId)
                .unwrap(),
            AttrValue::Bool(false)
        );
    }

    #[test]
    fn test_event_trigger_key_checks() {
        let disabled = fixture(false, false, [0; ENABLE_KEY_LEN]);
        disabled.lifecycle.init_callback(ROOT_ENDPOINT);
        let err = disabled
            .registry
            .invoke(
                ROOT_ENDPOINT,
                CLUSTER_ID,
                commands::TEST_EVENT_TRIGGER,
                &trigger_args(&[0; ENABLE_KEY_LEN], triggers::HARDWARE_FAULT),
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnsupportedAccess);

        let f = fixture(false, false, KEY);
        f.lifecycle.init_callback(ROOT_ENDPOINT);
        let err = f
            .registry
            .invoke(
                ROOT_ENDPOINT,
                CLUSTER_ID,
                commands::TEST_EVENT_TRIGGER,
                &trigger_args(&[0x11; ENABLE_KEY_LEN], triggers::HARDWARE_FAULT),
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConstraintError);

        f.registry
            .invoke(
                ROOT_ENDPOINT,
                CLUSTER_ID,
                commands::TEST_EVENT_TRIGGER,
                &trigger_args(&KEY, triggers::NETWORK_FAULT),
            )
            .unwrap();
        assert_eq!(
            f.events
                .matching(None, None, Some(events::NETWORK_FAULT_CHANGE))
                .len(),
            1
        );
    }

    #[test]
    fn test_time_snapshot_hides_posix_without_time_sync() {
        let minimal = fixture(false, false, KEY);
        minimal.lifecycle.init_callback(ROOT_ENDPOINT);
        let response = minimal
            .registry
            .invoke(ROOT_ENDPOINT, CLUSTER_ID, commands::TIME_SNAPSHOT, &[])
            .unwrap();
        let Some(AttrValue::Struct(fields)) = response else {
            panic!("expected a TimeSnapshotResponse");
        };
        assert_eq!(fields[1], AttrValue::Null);

        // Full because of the payload command, but no time source
        let payload_only = fixture(true, false, KEY);
        payload_only.lifecycle.init_callback(ROOT_ENDPOINT);
        let response = payload_only
            .registry
            .invoke(ROOT_ENDPOINT, CLUSTER_ID, commands::TIME_SNAPSHOT, &[])
            .unwrap();
        assert!(matches!(response, Some(AttrValue::Struct(ref f)) if f[1] == AttrValue::Null));

        let synced = fixture(false, true, KEY);
        synced.lifecycle.init_callback(ROOT_ENDPOINT);
        let response = synced
            .registry
            .invoke(ROOT_ENDPOINT, CLUSTER_ID, commands::TIME_SNAPSHOT, &[])
            .unwrap();
        assert!(matches!(response, Some(AttrValue::Struct(ref f)) if matches!(f[1], AttrValue::U64(_))));
    }

    #[test]
    fn test_payload_test_request() {
        let args = |count: u64| {
            vec![
                AttrValue::Bytes(KEY.to_vec()),
                AttrValue::U8(0xAB),
                AttrValue::U16(count as u16),
            ]
        };

        let minimal = fixture(false, false, KEY);
        minimal.lifecycle.init_callback(ROOT_ENDPOINT);
        let err = minimal
            .registry
            .invoke(ROOT_ENDPOINT, CLUSTER_ID, commands::PAYLOAD_TEST_REQUEST, &args(4))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidCommand);

        let full = fixture(true, false, KEY);
        full.lifecycle.init_callback(ROOT_ENDPOINT);
        assert_eq!(
            full.registry
                .invoke(ROOT_ENDPOINT, CLUSTER_ID, commands::PAYLOAD_TEST_REQUEST, &args(3))
                .unwrap(),
            Some(AttrValue::Bytes(vec![0xAB; 3]))
        );
        let err = full
            .registry
            .invoke(ROOT_ENDPOINT, CLUSTER_ID, commands::PAYLOAD_TEST_REQUEST, &args(2049))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConstraintError);
    }

    #[test]
    fn test_time_sync_only_does_not_enable_payload() {
        let f = fixture(false, true, KEY);
        f.lifecycle.init_callback(ROOT_ENDPOINT);
        let Some(ServerVariant::Full(server)) = f.lifecycle.active() else {
            panic!("expected the configurable server");
        };
        assert_eq!(
            server.functions(),
            FunctionsConfig {
                enable_posix_time: true,
                enable_payload_test_request: false,
            }
        );
    }
}
