//! Composition root for the node: data model, registry, event log and the
//! per-cluster server lifecycles.

use std::sync::Arc;

use log::info;

use super::clusters::general_diagnostics::{self, DiagnosticsContext, GeneralDiagnostics};
use super::clusters::software_diag::{self, SoftwareDiagnostics};
use super::clusters::ServerLifecycle;
use super::data_model::{DataModelProvider, Node};
use super::device_types;
use super::events::EventLog;
use super::registry::InteractionModelRegistry;
use crate::config::NodeConfig;
use crate::error::Result;

/// Everything the node serves, wired together.
///
/// Notification sites take a reference to the lifecycle they need from here.
pub struct NodeRuntime {
    pub node: Arc<Node>,
    pub registry: Arc<InteractionModelRegistry>,
    pub events: Arc<EventLog>,
    pub general_diagnostics: ServerLifecycle<GeneralDiagnostics>,
    pub software_diagnostics: ServerLifecycle<SoftwareDiagnostics>,
}

impl NodeRuntime {
    /// Build the endpoint tree described by `config`. No servers are
    /// constructed until [`NodeRuntime::init_endpoints`].
    pub fn new(config: &NodeConfig) -> Result<Self> {
        let node = Arc::new(Node::new());
        device_types::add_root_endpoint(&node, &config.root_features())?;
        for light in &config.lights {
            device_types::add_light_endpoint(&node, light.endpoint, light.light_type)?;
        }

        let registry = Arc::new(InteractionModelRegistry::new());
        let events = Arc::new(EventLog::new(config.event_log_capacity));

        let diagnostics_context = DiagnosticsContext {
            events: events.clone(),
            reboot_count: config.reboot_count,
            total_operational_hours: config.total_operational_hours,
            test_enable_key: config.test_enable_key_bytes()?,
        };

        Ok(Self {
            general_diagnostics: ServerLifecycle::new(
                node.clone(),
                registry.clone(),
                diagnostics_context,
            ),
            software_diagnostics: ServerLifecycle::new(
                node.clone(),
                registry.clone(),
                events.clone(),
            ),
            node,
            registry,
            events,
        })
    }

    /// Run the init callbacks for every endpoint hosting a managed cluster.
    pub fn init_endpoints(&self) {
        for endpoint in self.node.endpoint_ids() {
            if self
                .node
                .is_cluster_enabled(endpoint, general_diagnostics::CLUSTER_ID)
            {
                self.general_diagnostics.init_callback(endpoint);
            }
            if self.node.is_cluster_enabled(endpoint, software_diag::CLUSTER_ID) {
                self.software_diagnostics.init_callback(endpoint);
            }
        }
        info!("{} cluster server(s) registered", self.registry.len());
    }

    /// Run the shutdown callbacks for every endpoint, in reverse order.
    pub fn shutdown_endpoints(&self) {
        for endpoint in self.node.endpoint_ids().into_iter().rev() {
            self.software_diagnostics.shutdown_callback(endpoint);
            self.general_diagnostics.shutdown_callback(endpoint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::matter::clusters::faults::BootReason;
    use crate::matter::ids::ROOT_ENDPOINT;

    #[test]
    fn test_init_and_shutdown_all_endpoints() {
        let config = Config::default();
        let runtime = NodeRuntime::new(&config.node).unwrap();
        assert!(runtime.registry.is_empty());

        runtime.init_endpoints();
        assert!(runtime.general_diagnostics.is_full());
        assert!(runtime.software_diagnostics.is_full());
        assert_eq!(runtime.registry.len(), 2);

        runtime
            .general_diagnostics
            .notify_device_reboot(BootReason::PowerOnReboot);
        assert_eq!(runtime.events.len(), 1);

        runtime.shutdown_endpoints();
        assert!(runtime.registry.is_empty());
        assert!(!runtime.general_diagnostics.is_constructed());
        assert!(
            runtime
                .registry
                .server_for(ROOT_ENDPOINT, general_diagnostics::CLUSTER_ID)
                .is_none()
        );
    }

    #[test]
    fn test_minimal_diagnostics_without_optional_functions() {
        let mut config = Config::default();
        config.node.diagnostics.time_sync = false;
        config.node.diagnostics.payload_test_request = false;
        config.node.diagnostics.heap_watermarks = false;

        let runtime = NodeRuntime::new(&config.node).unwrap();
        runtime.init_endpoints();
        assert!(!runtime.general_diagnostics.is_full());
        assert!(!runtime.software_diagnostics.is_full());
    }
}
