//! Devices known to the controller.

use std::fs;
use std::path::Path;

use log::{info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::matter::ids::{EndptId, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEndpoint {
    pub endpoint_id: EndptId,
    #[serde(default)]
    pub device_type_ids: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatterDevice {
    pub node_id: NodeId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub endpoints: Vec<DeviceEndpoint>,
    #[serde(default = "default_reachable")]
    pub reachable: bool,
}

fn default_reachable() -> bool {
    true
}

/// Shared, replaceable list of devices, keyed by node id.
#[derive(Default)]
pub struct DeviceList {
    devices: Mutex<Vec<MatterDevice>>,
}

impl DeviceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let devices: Vec<MatterDevice> = serde_json::from_str(json)?;
        let list = Self::new();
        list.update(devices);
        Ok(list)
    }

    /// Load from a JSON file; a missing file gives an empty list.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(json) => {
                let list = Self::from_json(&json)?;
                info!("Loaded {} device(s) from {:?}", list.len(), path);
                Ok(list)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Device list {:?} not found, starting empty", path);
                Ok(Self::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the whole list. A later entry wins over an earlier one with the
    /// same node id.
    pub fn update(&self, devices: Vec<MatterDevice>) {
        let mut deduped: Vec<MatterDevice> = Vec::with_capacity(devices.len());
        for device in devices {
            match deduped.iter_mut().find(|d| d.node_id == device.node_id) {
                Some(existing) => *existing = device,
                None => deduped.push(device),
            }
        }
        *self.devices.lock() = deduped;
    }

    pub fn snapshot(&self) -> Vec<MatterDevice> {
        self.devices.lock().clone()
    }

    pub fn get(&self, node_id: NodeId) -> Option<MatterDevice> {
        self.devices
            .lock()
            .iter()
            .find(|d| d.node_id == node_id)
            .cloned()
    }

    /// Returns false when the node is unknown.
    pub fn set_reachable(&self, node_id: NodeId, reachable: bool) -> bool {
        let mut devices = self.devices.lock();
        match devices.iter_mut().find(|d| d.node_id == node_id) {
            Some(device) => {
                device.reachable = reachable;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, node_id: NodeId) -> Option<MatterDevice> {
        let mut devices = self.devices.lock();
        let index = devices.iter().position(|d| d.node_id == node_id)?;
        Some(devices.remove(index))
    }

    pub fn len(&self) -> usize {
        self.devices.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeError;

    const DEVICES: &str = r#"[
        {"node_id": 4386, "name": "Bridge", "endpoints": [
            {"endpoint_id": 0, "device_type_ids": [22]},
            {"endpoint_id": 1, "device_type_ids": [256]}
        ]},
        {"node_id": 7, "reachable": false},
        {"node_id": 4386, "name": "Bridge (renamed)"}
    ]"#;

    #[test]
    fn test_from_json_dedupes_and_defaults() {
        let list = DeviceList::from_json(DEVICES).unwrap();
        assert_eq!(list.len(), 2);

        let bridge = list.get(4386).unwrap();
        assert_eq!(bridge.name, "Bridge (renamed)");
        assert!(bridge.endpoints.is_empty());
        assert!(bridge.reachable);
        assert!(!list.get(7).unwrap().reachable);
    }

    #[test]
    fn test_reachable_and_remove() {
        let list = DeviceList::from_json(DEVICES).unwrap();
        assert!(list.set_reachable(7, true));
        assert!(!list.set_reachable(99, true));
        assert!(list.get(7).unwrap().reachable);

        assert_eq!(list.remove(7).map(|d| d.node_id), Some(7));
        assert!(list.remove(7).is_none());
        assert_eq!(list.snapshot().len(), 1);
    }

    #[test]
    fn test_bad_json_and_missing_file() {
        assert!(matches!(
            DeviceList::from_json("{"),
            Err(NodeError::SerdeJsonError(_))
        ));
        let list = DeviceList::load(Path::new("/nonexistent/devices.json")).unwrap();
        assert!(list.is_empty());
    }
}
