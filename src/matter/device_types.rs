//! Device type definitions and endpoint builders for the node.
//!
//! The root endpoint carries the node-wide diagnostics clusters; application
//! endpoints carry the lighting clusters the controller writes to.

use rs_matter::dm::DeviceType;
use rs_matter::error::Error;
use serde::{Deserialize, Serialize};

use super::clusters::general_diagnostics::{self, OptionalAttributes};
use super::clusters::{software_diag, time_sync};
use super::data_model::{AttrValue, AttributeFlags, ClusterFlags, CommandFlags, Node};
use super::ids::attributes::{color_control, level_control, on_off};
use super::ids::{ClusterId, CmdId, EndptId, ROOT_ENDPOINT, clusters};

/// Matter Root Node device type
///
/// Device Type ID: 0x0016 (22 decimal)
/// Device Type Revision: 3
///
/// Required clusters:
/// - GeneralDiagnostics (0x0033)
/// - Descriptor (standard)
pub const DEV_TYPE_ROOT_NODE: DeviceType = DeviceType {
    dtype: 0x0016,
    drev: 3,
};

/// Matter On/Off Light device type
///
/// Device Type ID: 0x0100 (256 decimal)
/// Device Type Revision: 2
///
/// Required clusters:
/// - OnOff (0x0006)
/// - Descriptor (standard)
pub const DEV_TYPE_ON_OFF_LIGHT: DeviceType = DeviceType {
    dtype: 0x0100,
    drev: 2,
};

/// Matter Dimmable Light device type
///
/// Device Type ID: 0x0101 (257 decimal)
/// Device Type Revision: 2
///
/// Required clusters:
/// - OnOff (0x0006)
/// - LevelControl (0x0008)
pub const DEV_TYPE_DIMMABLE_LIGHT: DeviceType = DeviceType {
    dtype: 0x0101,
    drev: 2,
};

/// Matter Extended Color Light device type
///
/// Device Type ID: 0x010D (269 decimal)
/// Device Type Revision: 2
///
/// Required clusters:
/// - OnOff (0x0006)
/// - LevelControl (0x0008)
/// - ColorControl (0x0300)
pub const DEV_TYPE_EXTENDED_COLOR_LIGHT: DeviceType = DeviceType {
    dtype: 0x010D,
    drev: 2,
};

/// Lighting endpoint flavours the node can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightType {
    OnOff,
    Dimmable,
    ExtendedColor,
}

impl LightType {
    /// Get the Matter DeviceType for this light.
    pub const fn device_type(&self) -> DeviceType {
        match self {
            Self::OnOff => DEV_TYPE_ON_OFF_LIGHT,
            Self::Dimmable => DEV_TYPE_DIMMABLE_LIGHT,
            Self::ExtendedColor => DEV_TYPE_EXTENDED_COLOR_LIGHT,
        }
    }
}

/// Optional parts of the root endpoint's clusters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootEndpointFeatures {
    pub diagnostics_attributes: OptionalAttributes,
    /// Accept General Diagnostics PayloadTestRequest
    pub payload_test_request: bool,
    /// Add Time Synchronization next to General Diagnostics
    pub time_sync: bool,
    /// Track the heap high watermark in Software Diagnostics
    pub heap_watermarks: bool,
}

/// Create the root endpoint and its node-wide clusters.
pub fn add_root_endpoint(node: &Node, features: &RootEndpointFeatures) -> Result<(), Error> {
    node.add_endpoint(ROOT_ENDPOINT, &[DEV_TYPE_ROOT_NODE.dtype as u32])?;
    general_diagnostics::create(
        node,
        ROOT_ENDPOINT,
        features.diagnostics_attributes,
        features.payload_test_request,
    )?;
    software_diag::create(node, ROOT_ENDPOINT, features.heap_watermarks)?;
    if features.time_sync {
        time_sync::create(node, ROOT_ENDPOINT)?;
    }
    Ok(())
}

/// Create a lighting endpoint with the clusters its device type requires.
pub fn add_light_endpoint(node: &Node, endpoint: EndptId, light: LightType) -> Result<(), Error> {
    node.add_endpoint(endpoint, &[light.device_type().dtype as u32])?;
    add_on_off(node, endpoint)?;
    if matches!(light, LightType::Dimmable | LightType::ExtendedColor) {
        add_level_control(node, endpoint)?;
    }
    if light == LightType::ExtendedColor {
        add_color_control(node, endpoint)?;
    }
    Ok(())
}

const RO: AttributeFlags = AttributeFlags::empty();
const RW: AttributeFlags = AttributeFlags::WRITABLE;
const RW_NULL: AttributeFlags = AttributeFlags::WRITABLE.union(AttributeFlags::NULLABLE);

/// One attribute of a cluster template; `bounds` are inclusive.
struct AttrSpec {
    id: u32,
    flags: AttributeFlags,
    value: AttrValue,
    bounds: Option<(AttrValue, AttrValue)>,
}

impl AttrSpec {
    fn new(id: u32, flags: AttributeFlags, value: impl Into<AttrValue>) -> Self {
        Self {
            id,
            flags,
            value: value.into(),
            bounds: None,
        }
    }

    fn bounded(mut self, min: impl Into<AttrValue>, max: impl Into<AttrValue>) -> Self {
        self.bounds = Some((min.into(), max.into()));
        self
    }
}

fn add_cluster(
    node: &Node,
    endpoint: EndptId,
    cluster: ClusterId,
    attributes: Vec<AttrSpec>,
    commands: &[CmdId],
) -> Result<(), Error> {
    node.create_cluster(endpoint, cluster, ClusterFlags::SERVER)?;
    for attr in attributes {
        node.create_attribute(endpoint, cluster, attr.id, attr.flags, attr.value)?;
        if let Some((min, max)) = attr.bounds {
            node.add_bounds(endpoint, cluster, attr.id, min, max)?;
        }
    }
    for command in commands {
        node.create_command(endpoint, cluster, *command, CommandFlags::ACCEPTED)?;
    }
    Ok(())
}

fn add_on_off(node: &Node, endpoint: EndptId) -> Result<(), Error> {
    add_cluster(
        node,
        endpoint,
        clusters::ON_OFF,
        vec![
            AttrSpec::new(on_off::ON_OFF, RO, false),
            AttrSpec::new(on_off::ON_TIME, RW, 0u16),
            AttrSpec::new(on_off::OFF_WAIT_TIME, RW, 0u16),
            // Off, On, Toggle
            AttrSpec::new(on_off::START_UP_ON_OFF, RW_NULL, 0u8).bounded(0u8, 2u8),
        ],
        // Off, On, Toggle
        &[0x00, 0x01, 0x02],
    )
}

fn add_level_control(node: &Node, endpoint: EndptId) -> Result<(), Error> {
    add_cluster(
        node,
        endpoint,
        clusters::LEVEL_CONTROL,
        vec![
            AttrSpec::new(level_control::CURRENT_LEVEL, AttributeFlags::NULLABLE, 254u8)
                .bounded(1u8, 254u8),
            AttrSpec::new(level_control::OPTIONS, RW, 0u8).bounded(0u8, 3u8),
            AttrSpec::new(level_control::ON_OFF_TRANSITION_TIME, RW, 0u16),
            AttrSpec::new(level_control::ON_LEVEL, RW_NULL, 254u8).bounded(1u8, 254u8),
            AttrSpec::new(level_control::ON_TRANSITION_TIME, RW_NULL, 0u16),
            AttrSpec::new(level_control::OFF_TRANSITION_TIME, RW_NULL, 0u16),
            AttrSpec::new(level_control::DEFAULT_MOVE_RATE, RW_NULL, 50u8).bounded(1u8, 254u8),
            AttrSpec::new(level_control::START_UP_CURRENT_LEVEL, RW_NULL, 254u8)
                .bounded(1u8, 254u8),
        ],
        // MoveToLevel, Move, Step, Stop, MoveToLevelWithOnOff
        &[0x00, 0x01, 0x02, 0x03, 0x04],
    )
}

fn add_color_control(node: &Node, endpoint: EndptId) -> Result<(), Error> {
    add_cluster(
        node,
        endpoint,
        clusters::COLOR_CONTROL,
        vec![
            AttrSpec::new(color_control::CURRENT_HUE, RO, 0u8).bounded(0u8, 254u8),
            AttrSpec::new(color_control::OPTIONS, RW, 0u8).bounded(0u8, 1u8),
            AttrSpec::new(color_control::WHITE_POINT_X, RW, 0x5000u16).bounded(0u16, 0xFEFFu16),
            AttrSpec::new(color_control::WHITE_POINT_Y, RW, 0x5500u16).bounded(0u16, 0xFEFFu16),
            AttrSpec::new(color_control::START_UP_COLOR_TEMPERATURE_MIREDS, RW_NULL, 250u16)
                .bounded(1u16, 0xFEFFu16),
        ],
        // MoveToHue, MoveToColorTemperature
        &[0x00, 0x0A],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matter::data_model::DataModelProvider;

    #[test]
    fn test_root_endpoint_features() {
        let node = Node::new();
        let features = RootEndpointFeatures {
            payload_test_request: true,
            time_sync: true,
            ..Default::default()
        };
        add_root_endpoint(&node, &features).unwrap();

        assert_eq!(node.device_types(ROOT_ENDPOINT), vec![0x0016]);
        assert!(node.is_cluster_enabled(ROOT_ENDPOINT, clusters::GENERAL_DIAGNOSTICS));
        assert!(node.is_cluster_enabled(ROOT_ENDPOINT, clusters::SOFTWARE_DIAGNOSTICS));
        assert!(node.is_cluster_enabled(ROOT_ENDPOINT, clusters::TIME_SYNCHRONIZATION));
        assert!(node.is_command_accepted(
            ROOT_ENDPOINT,
            clusters::GENERAL_DIAGNOSTICS,
            general_diagnostics::commands::PAYLOAD_TEST_REQUEST
        ));
    }

    #[test]
    fn test_light_endpoints() {
        let node = Node::new();
        add_light_endpoint(&node, 1, LightType::OnOff).unwrap();
        add_light_endpoint(&node, 2, LightType::ExtendedColor).unwrap();

        assert!(node.is_cluster_enabled(1, clusters::ON_OFF));
        assert!(!node.is_cluster_enabled(1, clusters::LEVEL_CONTROL));
        assert!(node.is_cluster_enabled(2, clusters::LEVEL_CONTROL));
        assert!(node.is_attribute_enabled(
            2,
            clusters::COLOR_CONTROL,
            color_control::START_UP_COLOR_TEMPERATURE_MIREDS
        ));
        assert_eq!(node.endpoint_ids(), vec![1, 2]);
    }

    #[test]
    fn test_lighting_attributes_are_bounded() {
        let node = Node::new();
        add_light_endpoint(&node, 1, LightType::Dimmable).unwrap();

        let (level, switch) = (clusters::LEVEL_CONTROL, clusters::ON_OFF);
        node.write_attribute_external(1, level, level_control::ON_LEVEL, AttrValue::U8(255))
            .unwrap();
        assert_eq!(
            node.read_attribute(1, level, level_control::ON_LEVEL).unwrap(),
            AttrValue::U8(254)
        );
        node.write_attribute_external(1, level, level_control::ON_LEVEL, AttrValue::Null)
            .unwrap();

        node.write_attribute_external(1, switch, on_off::START_UP_ON_OFF, AttrValue::U8(7))
            .unwrap();
        assert_eq!(
            node.read_attribute(1, switch, on_off::START_UP_ON_OFF).unwrap(),
            AttrValue::U8(2)
        );

        let err = node
            .write_attribute_external(1, switch, on_off::ON_OFF, AttrValue::Bool(true))
            .unwrap_err();
        assert_eq!(err.code(), rs_matter::error::ErrorCode::UnsupportedAccess);
        let err = node
            .write_attribute_external(1, level, level_control::CURRENT_LEVEL, AttrValue::U8(10))
            .unwrap_err();
        assert_eq!(err.code(), rs_matter::error::ErrorCode::UnsupportedAccess);
    }
}
