//! Line-oriented operator console.
//!
//! Each input line is parsed as one command and executed against the node
//! runtime and the controller. Ids accept decimal, `0x` hex, or `*` for a
//! wildcard.

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::config::parse_node_id;
use crate::controller::{Controller, DeviceList, LoopbackTransport};
use crate::error::{NodeError, Result};
use crate::matter::NodeRuntime;
use crate::matter::clusters::faults::{
    self, BootReason, FaultSet, HardwareFault, NetworkFault, RadioFault,
};
use crate::matter::clusters::general_diagnostics::{self, GeneralDiagAttribute};
use crate::matter::clusters::software_diag::{self, SoftwareDiagAttribute};
use crate::matter::ids::{
    AttrId, ClusterId, EndptId, EventId, NodeId, ROOT_ENDPOINT, WILDCARD_ATTRIBUTE,
    WILDCARD_CLUSTER, WILDCARD_ENDPOINT, WILDCARD_EVENT,
};

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_help_flag = true)]
pub struct ConsoleLine {
    #[command(subcommand)]
    pub command: ConsoleCommand,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum ConsoleCommand {
    /// Read an attribute path from a node
    ReadAttr {
        #[arg(value_parser = node_id)]
        node: NodeId,
        #[arg(value_parser = endpoint_id)]
        endpoint: EndptId,
        #[arg(value_parser = cluster_id)]
        cluster: ClusterId,
        #[arg(value_parser = attribute_id)]
        attribute: AttrId,
    },
    /// Read an event path from a node
    ReadEvent {
        #[arg(value_parser = node_id)]
        node: NodeId,
        #[arg(value_parser = endpoint_id)]
        endpoint: EndptId,
        #[arg(value_parser = cluster_id)]
        cluster: ClusterId,
        #[arg(value_parser = event_id)]
        event: EventId,
    },
    /// Subscribe to an attribute path
    SubscribeAttr {
        #[arg(value_parser = node_id)]
        node: NodeId,
        #[arg(value_parser = endpoint_id)]
        endpoint: EndptId,
        #[arg(value_parser = cluster_id)]
        cluster: ClusterId,
        #[arg(value_parser = attribute_id)]
        attribute: AttrId,
    },
    /// Subscribe to an event path
    SubscribeEvent {
        #[arg(value_parser = node_id)]
        node: NodeId,
        #[arg(value_parser = endpoint_id)]
        endpoint: EndptId,
        #[arg(value_parser = cluster_id)]
        cluster: ClusterId,
        #[arg(value_parser = event_id)]
        event: EventId,
    },
    /// Write a lighting attribute (base 10 value)
    WriteAttr {
        #[arg(value_parser = node_id)]
        node: NodeId,
        #[arg(value_parser = endpoint_id)]
        endpoint: EndptId,
        #[arg(value_parser = cluster_id)]
        cluster: ClusterId,
        #[arg(value_parser = attribute_id)]
        attribute: AttrId,
        value: String,
    },
    /// Report a reboot with the given boot reason code
    Reboot {
        #[arg(default_value_t = 0)]
        reason: u8,
    },
    /// Replace the active hardware faults
    HwFaults { codes: Vec<u8> },
    /// Replace the active radio faults
    RadioFaults { codes: Vec<u8> },
    /// Replace the active network faults
    NetFaults { codes: Vec<u8> },
    /// Report heap usage in bytes
    Heap { used: u64, free: u64 },
    /// Close all subscriptions
    Unsubscribe,
    /// List known devices
    Devices,
    Quit,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Console<'a> {
    runtime: &'a NodeRuntime,
    controller: &'a Controller,
    transport: &'a LoopbackTransport,
    devices: &'a DeviceList,
}

impl<'a> Console<'a> {
    pub fn new(
        runtime: &'a NodeRuntime,
        controller: &'a Controller,
        transport: &'a LoopbackTransport,
        devices: &'a DeviceList,
    ) -> Self {
        Self {
            runtime,
            controller,
            transport,
            devices,
        }
    }

    /// Read commands until `quit` or end of input.
    pub async fn run<R: AsyncBufRead + Unpin>(&self, reader: R) -> Result<()> {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match self.execute(line) {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => error!("{}: {}", line, e),
            }
            self.transport.run_until_idle();
        }
        Ok(())
    }

    pub fn execute(&self, line: &str) -> Result<Flow> {
        let parsed = match ConsoleLine::try_parse_from(line.split_whitespace()) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("{}", e.to_string().trim_end());
                return Ok(Flow::Continue);
            }
        };

        match parsed.command {
            ConsoleCommand::ReadAttr {
                node,
                endpoint,
                cluster,
                attribute,
            } => self
                .controller
                .send_read_attr_command_single(node, endpoint, cluster, attribute)?,
            ConsoleCommand::ReadEvent {
                node,
                endpoint,
                cluster,
                event,
            } => self
                .controller
                .send_read_event_command_single(node, endpoint, cluster, event)?,
            ConsoleCommand::SubscribeAttr {
                node,
                endpoint,
                cluster,
                attribute,
            } => self
                .controller
                .send_subscribe_attr_command(node, &[endpoint], &[cluster], &[attribute])?,
            ConsoleCommand::SubscribeEvent {
                node,
                endpoint,
                cluster,
                event,
            } => self
                .controller
                .send_subscribe_event_command(node, &[endpoint], &[cluster], &[event])?,
            ConsoleCommand::WriteAttr {
                node,
                endpoint,
                cluster,
                attribute,
                value,
            } => self
                .controller
                .send_write_attr_command(node, endpoint, cluster, attribute, &value)?,
            ConsoleCommand::Reboot { reason } => {
                let reason = BootReason::from_repr(reason).ok_or_else(|| invalid(reason))?;
                self.runtime.general_diagnostics.notify_device_reboot(reason);
                self.diagnostics_changed(&[GeneralDiagAttribute::BootReason]);
            }
            ConsoleCommand::HwFaults { codes } => {
                let current = fault_set(&codes, HardwareFault::from_repr)?;
                let diagnostics = &self.runtime.general_diagnostics;
                let previous = diagnostics.active_hardware_faults();
                diagnostics.notify_hardware_faults_detected(&previous, &current);
                self.diagnostics_changed(&[GeneralDiagAttribute::ActiveHardwareFaults]);
            }
            ConsoleCommand::RadioFaults { codes } => {
                let current = fault_set(&codes, RadioFault::from_repr)?;
                let diagnostics = &self.runtime.general_diagnostics;
                let previous = diagnostics.active_radio_faults();
                diagnostics.notify_radio_faults_detected(&previous, &current);
                self.diagnostics_changed(&[GeneralDiagAttribute::ActiveRadioFaults]);
            }
            ConsoleCommand::NetFaults { codes } => {
                let current = fault_set(&codes, NetworkFault::from_repr)?;
                let diagnostics = &self.runtime.general_diagnostics;
                let previous = diagnostics.active_network_faults();
                diagnostics.notify_network_faults_detected(&previous, &current);
                self.diagnostics_changed(&[GeneralDiagAttribute::ActiveNetworkFaults]);
            }
            ConsoleCommand::Heap { used, free } => {
                self.runtime.software_diagnostics.notify_heap_usage(used, free);
                for attribute in [
                    SoftwareDiagAttribute::CurrentHeapFree,
                    SoftwareDiagAttribute::CurrentHeapUsed,
                    SoftwareDiagAttribute::CurrentHeapHighWatermark,
                ] {
                    self.transport.attribute_changed(
                        ROOT_ENDPOINT,
                        software_diag::CLUSTER_ID,
                        attribute as AttrId,
                    );
                }
            }
            ConsoleCommand::Unsubscribe => {
                let closed = self.transport.shutdown_subscriptions();
                info!("Closed {} subscription(s)", closed);
            }
            ConsoleCommand::Devices => {
                for device in self.devices.snapshot() {
                    info!(
                        "0x{:016X} {:?} endpoints={} reachable={}",
                        device.node_id,
                        device.name,
                        device.endpoints.len(),
                        device.reachable
                    );
                }
            }
            ConsoleCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn diagnostics_changed(&self, attributes: &[GeneralDiagAttribute]) {
        for &attribute in attributes {
            self.transport.attribute_changed(
                ROOT_ENDPOINT,
                general_diagnostics::CLUSTER_ID,
                attribute as AttrId,
            );
        }
    }
}

fn invalid(code: u8) -> NodeError {
    NodeError::InvalidValue {
        value: code.to_string(),
        reason: "unknown code".to_string(),
    }
}

/// Active faults named by `codes`; repeated codes count once.
fn fault_set<T: PartialEq, const N: usize>(
    codes: &[u8],
    from_repr: impl Fn(u8) -> Option<T>,
) -> Result<FaultSet<T, N>> {
    let mut set = FaultSet::new();
    for &code in codes {
        let fault = from_repr(code).ok_or_else(|| invalid(code))?;
        faults::insert(&mut set, fault)
            .map_err(|_| NodeError::NoMemory("too many active faults"))?;
    }
    Ok(set)
}

fn id_or_wildcard<T: TryFrom<u64>>(value: &str, wildcard: T) -> std::result::Result<T, String> {
    if value == "*" {
        return Ok(wildcard);
    }
    let raw = parse_node_id(value).map_err(|e| e.to_string())?;
    T::try_from(raw).map_err(|_| format!("{} is out of range", value))
}

fn node_id(value: &str) -> std::result::Result<NodeId, String> {
    parse_node_id(value).map_err(|e| e.to_string())
}

fn endpoint_id(value: &str) -> std::result::Result<EndptId, String> {
    id_or_wildcard(value, WILDCARD_ENDPOINT)
}

fn cluster_id(value: &str) -> std::result::Result<ClusterId, String> {
    id_or_wildcard(value, WILDCARD_CLUSTER)
}

fn attribute_id(value: &str) -> std::result::Result<AttrId, String> {
    id_or_wildcard(value, WILDCARD_ATTRIBUTE)
}

fn event_id(value: &str) -> std::result::Result<EventId, String> {
    id_or_wildcard(value, WILDCARD_EVENT)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::config::Config;
    use crate::controller::client::SubscribeParams;
    use crate::controller::paths::{AttributePaths, EventPaths};
    use crate::matter::clusters::faults::HardwareFaults;
    use crate::matter::data_model::AttrValue;
    use crate::matter::events::EventData;
    use crate::matter::ids::attributes::on_off;
    use crate::matter::ids::clusters;

    struct Session {
        runtime: NodeRuntime,
        transport: Arc<LoopbackTransport>,
        controller: Controller,
        devices: DeviceList,
    }

    impl Session {
        fn new() -> Self {
            let config = Config::default();
            let runtime = NodeRuntime::new(&config.node).unwrap();
            runtime.init_endpoints();
            let transport = Arc::new(LoopbackTransport::new(&runtime, config.node.node_id));
            let controller =
                Controller::new(transport.clone(), transport.clone(), &config.controller);
            Self {
                runtime,
                transport,
                controller,
                devices: DeviceList::new(),
            }
        }

        fn console(&self) -> Console<'_> {
            Console::new(&self.runtime, &self.controller, &self.transport, &self.devices)
        }

        /// Subscribe to one root endpoint attribute, recording every report.
        fn subscribe(&self, cluster: ClusterId, attribute: AttrId) -> Arc<Mutex<Vec<AttrValue>>> {
            let reports = Arc::new(Mutex::new(Vec::new()));
            let paths =
                AttributePaths::from_parallel(&[ROOT_ENDPOINT], &[cluster], &[attribute]).unwrap();
            let command = self
                .controller
                .read_command(self.transport.local_node(), paths, EventPaths::new())
                .unwrap()
                .subscribe(SubscribeParams {
                    min_interval_floor: 0,
                    max_interval_ceiling: 10,
                    keep_subscriptions: true,
                })
                .with_attribute_callback({
                    let reports = reports.clone();
                    Box::new(move |_node, _path, value| reports.lock().push(value.clone()))
                });
            Box::new(command).send_command().unwrap();
            self.transport.run_until_idle();
            reports
        }
    }

    fn parse(line: &str) -> ConsoleCommand {
        ConsoleLine::try_parse_from(line.split_whitespace())
            .unwrap()
            .command
    }

    #[test]
    fn test_parse_ids_and_wildcards() {
        assert_eq!(
            parse("read-attr 0x1122 * 0x0006 *"),
            ConsoleCommand::ReadAttr {
                node: 0x1122,
                endpoint: WILDCARD_ENDPOINT,
                cluster: 6,
                attribute: WILDCARD_ATTRIBUTE,
            }
        );
        assert_eq!(parse("hw-faults 1 2"), ConsoleCommand::HwFaults { codes: vec![1, 2] });
        assert!(ConsoleLine::try_parse_from("read-attr 1 70000 6 0".split_whitespace()).is_err());
    }

    #[test]
    fn test_console_session() {
        let config = Config::default();
        let runtime = NodeRuntime::new(&config.node).unwrap();
        runtime.init_endpoints();
        let local = config.node.node_id;
        let transport = Arc::new(LoopbackTransport::new(&runtime, local));
        let controller = Controller::new(transport.clone(), transport.clone(), &config.controller);
        let devices = DeviceList::new();
        let console = Console::new(&runtime, &controller, &transport, &devices);

        let script = format!(
            "write-attr {local} 1 6 0x4001 120\n\
             # comment\n\
             hw-faults 1 2\n\
             hw-faults 2\n\
             bogus\n\
             quit\n\
             write-attr {local} 1 6 0x4002 9\n"
        );
        tokio_test::block_on(console.run(script.as_bytes())).unwrap();

        assert_eq!(
            runtime
                .node
                .read_attribute(1, clusters::ON_OFF, on_off::ON_TIME)
                .unwrap(),
            AttrValue::U16(120)
        );
        // Nothing after quit runs.
        assert_eq!(
            runtime
                .node
                .read_attribute(1, clusters::ON_OFF, on_off::OFF_WAIT_TIME)
                .unwrap(),
            AttrValue::U16(0)
        );
        let changes = runtime.events.matching(
            None,
            Some(general_diagnostics::CLUSTER_ID),
            Some(general_diagnostics::events::HARDWARE_FAULT_CHANGE),
        );
        assert_eq!(changes.len(), 2);
        assert_eq!(controller.pool().in_use(), 0);
    }

    #[test]
    fn test_repeated_fault_codes_count_once() {
        let s = Session::new();
        let console = s.console();
        let hardware = GeneralDiagAttribute::ActiveHardwareFaults as AttrId;
        let reports = s.subscribe(general_diagnostics::CLUSTER_ID, hardware);
        assert_eq!(*reports.lock(), vec![AttrValue::U8List(Vec::new())]);

        console.execute("hw-faults 1 1").unwrap();
        s.transport.run_until_idle();

        assert_eq!(
            s.runtime
                .registry
                .read_attribute(ROOT_ENDPOINT, general_diagnostics::CLUSTER_ID, hardware)
                .unwrap(),
            AttrValue::U8List(vec![1])
        );
        // The subscription hears about the change without a write interaction
        assert_eq!(reports.lock().last(), Some(&AttrValue::U8List(vec![1])));
        assert_eq!(reports.lock().len(), 2);
        assert_eq!(s.transport.shutdown_subscriptions(), 1);
    }

    #[test]
    fn test_heap_and_reboot_reach_subscribers() {
        let s = Session::new();
        let console = s.console();
        let used = s.subscribe(
            software_diag::CLUSTER_ID,
            SoftwareDiagAttribute::CurrentHeapUsed as AttrId,
        );
        let boot = s.subscribe(
            general_diagnostics::CLUSTER_ID,
            GeneralDiagAttribute::BootReason as AttrId,
        );

        console.execute("heap 4096 1024").unwrap();
        console.execute("reboot 6").unwrap();
        s.transport.run_until_idle();

        assert_eq!(used.lock().last(), Some(&AttrValue::U64(4096)));
        assert_eq!(boot.lock().last(), Some(&AttrValue::U8(6)));
        assert_eq!(s.transport.shutdown_subscriptions(), 2);
        assert_eq!(s.controller.pool().in_use(), 0);
    }

    #[test]
    fn test_previous_faults_come_from_the_server() {
        let s = Session::new();
        let console = s.console();
        // Faults raised elsewhere, not through this console
        s.runtime.general_diagnostics.notify_hardware_faults_detected(
            &HardwareFaults::new(),
            &HardwareFaults::from_slice(&[HardwareFault::Radio]).unwrap(),
        );

        console.execute("hw-faults 2").unwrap();

        let changes = s.runtime.events.matching(
            None,
            Some(general_diagnostics::CLUSTER_ID),
            Some(general_diagnostics::events::HARDWARE_FAULT_CHANGE),
        );
        assert_eq!(changes.len(), 2);
        assert_eq!(
            changes[1].data,
            EventData::HardwareFaultChange {
                current: vec![2],
                previous: vec![1],
            }
        );
    }

    #[test]
    fn test_unknown_fault_code_is_rejected() {
        let config = Config::default();
        let runtime = NodeRuntime::new(&config.node).unwrap();
        let transport = Arc::new(LoopbackTransport::new(&runtime, 1));
        let controller = Controller::new(transport.clone(), transport.clone(), &config.controller);
        let devices = DeviceList::new();
        let console = Console::new(&runtime, &controller, &transport, &devices);

        assert!(matches!(
            console.execute("net-faults 9"),
            Err(NodeError::InvalidValue { .. })
        ));
        assert_eq!(console.execute("quit").unwrap(), Flow::Quit);
    }
}
