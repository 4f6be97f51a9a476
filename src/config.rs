use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{NodeError, Result};
use crate::matter::clusters::general_diagnostics::{ENABLE_KEY_LEN, OptionalAttributes};
use crate::matter::device_types::{LightType, RootEndpointFeatures};
use crate::matter::ids::{EndptId, NodeId};

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Find the first '=' and split there
        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            // Remove surrounding quotes if present
            if (value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\''))
            {
                value = &value[1..value.len() - 1];
            }

            // Only set if not already set (env vars take precedence)
            if std::env::var(key).is_err() {
                // SAFETY: We're single-threaded at this point (called before any async runtime)
                unsafe { std::env::set_var(key, value) };
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    pub controller: ControllerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Operational node id of this node; the loopback controller treats it
    /// as the only reachable peer.
    pub node_id: NodeId,
    pub reboot_count: u16,
    pub total_operational_hours: u32,
    /// 32 hex digits; all zeroes disables test event triggers
    pub test_enable_key: String,
    pub event_log_capacity: usize,
    pub diagnostics: DiagnosticsFeatures,
    pub lights: Vec<LightEndpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsFeatures {
    pub optional_attributes: OptionalAttributes,
    pub payload_test_request: bool,
    pub time_sync: bool,
    pub heap_watermarks: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightEndpoint {
    pub endpoint: EndptId,
    pub light_type: LightType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Upper bound on commands alive at the same time
    pub max_in_flight_commands: usize,
    /// JSON file with the known device list
    pub devices_file: Option<String>,
    pub min_interval_floor: u16,
    pub max_interval_ceiling: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node: NodeConfig {
                node_id: 0x1122,
                reboot_count: 0,
                total_operational_hours: 0,
                test_enable_key: "00112233445566778899aabbccddeeff".to_string(),
                event_log_capacity: 64,
                diagnostics: DiagnosticsFeatures {
                    optional_attributes: OptionalAttributes::all(),
                    payload_test_request: false,
                    time_sync: true,
                    heap_watermarks: true,
                },
                lights: vec![
                    LightEndpoint {
                        endpoint: 1,
                        light_type: LightType::OnOff,
                    },
                    LightEndpoint {
                        endpoint: 2,
                        light_type: LightType::Dimmable,
                    },
                    LightEndpoint {
                        endpoint: 3,
                        light_type: LightType::ExtendedColor,
                    },
                ],
            },
            controller: ControllerConfig {
                max_in_flight_commands: 8,
                devices_file: None,
                min_interval_floor: 0,
                max_interval_ceiling: 10,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(node_id) = std::env::var("NODE_ID")
            && let Ok(id) = parse_node_id(&node_id)
        {
            config.node.node_id = id;
        }
        if let Ok(count) = std::env::var("REBOOT_COUNT")
            && let Ok(c) = count.parse()
        {
            config.node.reboot_count = c;
        }
        if let Ok(hours) = std::env::var("TOTAL_OPERATIONAL_HOURS")
            && let Ok(h) = hours.parse()
        {
            config.node.total_operational_hours = h;
        }
        if let Ok(key) = std::env::var("TEST_EVENT_ENABLE_KEY") {
            config.node.test_enable_key = key;
        }
        if let Ok(capacity) = std::env::var("EVENT_LOG_CAPACITY")
            && let Ok(c) = capacity.parse()
        {
            config.node.event_log_capacity = c;
        }

        // General/Software Diagnostics optional features
        if let Ok(flag) = std::env::var("DIAG_PAYLOAD_TEST_REQUEST")
            && let Ok(f) = flag.parse()
        {
            config.node.diagnostics.payload_test_request = f;
        }
        if let Ok(flag) = std::env::var("DIAG_TIME_SYNC")
            && let Ok(f) = flag.parse()
        {
            config.node.diagnostics.time_sync = f;
        }
        if let Ok(flag) = std::env::var("DIAG_HEAP_WATERMARKS")
            && let Ok(f) = flag.parse()
        {
            config.node.diagnostics.heap_watermarks = f;
        }

        // Controller configuration
        if let Ok(max) = std::env::var("CONTROLLER_MAX_COMMANDS")
            && let Ok(m) = max.parse()
        {
            config.controller.max_in_flight_commands = m;
        }
        if let Ok(path) = std::env::var("DEVICES_FILE") {
            config.controller.devices_file = Some(path);
        }

        config
    }
}

impl NodeConfig {
    pub fn root_features(&self) -> RootEndpointFeatures {
        RootEndpointFeatures {
            diagnostics_attributes: self.diagnostics.optional_attributes,
            payload_test_request: self.diagnostics.payload_test_request,
            time_sync: self.diagnostics.time_sync,
            heap_watermarks: self.diagnostics.heap_watermarks,
        }
    }

    /// Decode `test_enable_key`.
    pub fn test_enable_key_bytes(&self) -> Result<[u8; ENABLE_KEY_LEN]> {
        let invalid = |reason: &str| NodeError::InvalidValue {
            value: self.test_enable_key.clone(),
            reason: reason.to_string(),
        };

        let hex = self.test_enable_key.trim();
        if hex.len() != ENABLE_KEY_LEN * 2 || !hex.is_ascii() {
            return Err(invalid("expected 32 hex digits"));
        }

        let mut key = [0u8; ENABLE_KEY_LEN];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| invalid("not a hex string"))?;
        }
        Ok(key)
    }
}

/// Parse a node id given in decimal or `0x` hex.
pub fn parse_node_id(value: &str) -> Result<NodeId> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => NodeId::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| NodeError::InvalidValue {
        value: value.to_string(),
        reason: e.to_string(),
    })
}
