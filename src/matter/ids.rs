//! Identifiers shared by the server and controller halves of the node.

pub use rs_matter::im::{AttrId, ClusterId, CmdId, EndptId, EventId};

/// Operational node identifier.
pub type NodeId = u64;

/// The root endpoint, home of node-wide singleton clusters.
pub const ROOT_ENDPOINT: EndptId = 0;

/// Wildcard endpoint id accepted by path constructors.
pub const WILDCARD_ENDPOINT: EndptId = 0xFFFF;

/// Wildcard cluster id accepted by path constructors.
pub const WILDCARD_CLUSTER: ClusterId = 0xFFFF_FFFF;

/// Wildcard attribute id accepted by path constructors.
pub const WILDCARD_ATTRIBUTE: AttrId = 0xFFFF_FFFF;

/// Wildcard event id accepted by path constructors.
pub const WILDCARD_EVENT: EventId = 0xFFFF_FFFF;

/// Cluster IDs
pub mod clusters {
    use super::ClusterId;

    pub const ON_OFF: ClusterId = 0x0006;
    pub const LEVEL_CONTROL: ClusterId = 0x0008;
    pub const GENERAL_DIAGNOSTICS: ClusterId = 0x0033;
    pub const SOFTWARE_DIAGNOSTICS: ClusterId = 0x0034;
    pub const TIME_SYNCHRONIZATION: ClusterId = 0x0038;
    pub const COLOR_CONTROL: ClusterId = 0x0300;
}

/// Writable attribute IDs of the application clusters driven by the controller.
pub mod attributes {
    pub mod on_off {
        use crate::matter::ids::AttrId;

        pub const ON_OFF: AttrId = 0x0000;
        pub const ON_TIME: AttrId = 0x4001;
        pub const OFF_WAIT_TIME: AttrId = 0x4002;
        pub const START_UP_ON_OFF: AttrId = 0x4003;
    }

    pub mod level_control {
        use crate::matter::ids::AttrId;

        pub const CURRENT_LEVEL: AttrId = 0x0000;
        pub const OPTIONS: AttrId = 0x000F;
        pub const ON_OFF_TRANSITION_TIME: AttrId = 0x0010;
        pub const ON_LEVEL: AttrId = 0x0011;
        pub const ON_TRANSITION_TIME: AttrId = 0x0012;
        pub const OFF_TRANSITION_TIME: AttrId = 0x0013;
        pub const DEFAULT_MOVE_RATE: AttrId = 0x0014;
        pub const START_UP_CURRENT_LEVEL: AttrId = 0x4000;
    }

    pub mod color_control {
        use crate::matter::ids::AttrId;

        pub const CURRENT_HUE: AttrId = 0x0000;
        pub const OPTIONS: AttrId = 0x000F;
        pub const WHITE_POINT_X: AttrId = 0x0030;
        pub const WHITE_POINT_Y: AttrId = 0x0031;
        pub const START_UP_COLOR_TEMPERATURE_MIREDS: AttrId = 0x4010;
    }
}
