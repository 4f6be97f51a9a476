//! Command construction entry points used by the console and applications.

use std::fmt::{Debug, Display};
use std::str::FromStr;
use std::sync::Arc;

use log::error;

use super::client::{ClientContext, InteractionEngine, SessionConnector, SubscribeParams};
use super::paths::{AttributePaths, EventPaths};
use super::pool::CommandPool;
use super::read_command::ReadCommand;
use super::write_command::WriteCommand;
use crate::config::ControllerConfig;
use crate::error::{NodeError, Result};
use crate::matter::data_model::AttrValue;
use crate::matter::ids::attributes::{color_control, level_control, on_off};
use crate::matter::ids::{AttrId, ClusterId, EndptId, EventId, NodeId, clusters};

/// Issues read, subscribe and write commands to nodes.
pub struct Controller {
    context: ClientContext,
    pool: CommandPool,
    subscribe: SubscribeParams,
}

impl Controller {
    pub fn new(
        connector: Arc<dyn SessionConnector>,
        engine: Arc<dyn InteractionEngine>,
        config: &ControllerConfig,
    ) -> Self {
        Self {
            context: ClientContext { connector, engine },
            pool: CommandPool::new(config.max_in_flight_commands),
            subscribe: SubscribeParams {
                min_interval_floor: config.min_interval_floor,
                max_interval_ceiling: config.max_interval_ceiling,
                keep_subscriptions: true,
            },
        }
    }

    pub fn pool(&self) -> &CommandPool {
        &self.pool
    }

    /// A read command for the given paths, ready for callbacks to be attached.
    pub fn read_command(
        &self,
        node_id: NodeId,
        attribute_paths: AttributePaths,
        event_paths: EventPaths,
    ) -> Result<ReadCommand> {
        let slot = self.pool.acquire()?;
        Ok(ReadCommand::new(
            slot,
            node_id,
            attribute_paths,
            event_paths,
            self.context.clone(),
        ))
    }

    /// A write command for one attribute, ready for a done callback.
    pub fn write_command<T>(
        &self,
        node_id: NodeId,
        endpoint: EndptId,
        cluster: ClusterId,
        attribute: AttrId,
        value: T,
    ) -> Result<WriteCommand<T>>
    where
        T: Into<AttrValue> + Copy + Debug + Send + 'static,
    {
        let slot = self.pool.acquire()?;
        Ok(WriteCommand::new(
            slot,
            node_id,
            endpoint,
            cluster,
            attribute,
            value,
            self.context.clone(),
        ))
    }

    /// Read `(endpoints[i], clusters[i], attributes[i])` for every `i`.
    pub fn send_read_attr_command(
        &self,
        node_id: NodeId,
        endpoints: &[EndptId],
        clusters: &[ClusterId],
        attributes: &[AttrId],
    ) -> Result<()> {
        let paths = AttributePaths::from_parallel(endpoints, clusters, attributes)?;
        let command = self.read_command(node_id, paths, EventPaths::new())?;
        Box::new(command).send_command()
    }

    pub fn send_read_attr_command_single(
        &self,
        node_id: NodeId,
        endpoint: EndptId,
        cluster: ClusterId,
        attribute: AttrId,
    ) -> Result<()> {
        let slot = self.pool.acquire()?;
        let command = ReadCommand::single_attribute(
            slot,
            node_id,
            endpoint,
            cluster,
            attribute,
            self.context.clone(),
        )?;
        Box::new(command).send_command()
    }

    /// Read events on `(endpoints[i], clusters[i], events[i])` for every `i`.
    pub fn send_read_event_command(
        &self,
        node_id: NodeId,
        endpoints: &[EndptId],
        clusters: &[ClusterId],
        events: &[EventId],
    ) -> Result<()> {
        let paths = EventPaths::from_parallel(endpoints, clusters, events)?;
        let command = self.read_command(node_id, AttributePaths::new(), paths)?;
        Box::new(command).send_command()
    }

    pub fn send_read_event_command_single(
        &self,
        node_id: NodeId,
        endpoint: EndptId,
        cluster: ClusterId,
        event: EventId,
    ) -> Result<()> {
        let slot = self.pool.acquire()?;
        let command =
            ReadCommand::single_event(slot, node_id, endpoint, cluster, event, self.context.clone())?;
        Box::new(command).send_command()
    }

    pub fn send_subscribe_attr_command(
        &self,
        node_id: NodeId,
        endpoints: &[EndptId],
        clusters: &[ClusterId],
        attributes: &[AttrId],
    ) -> Result<()> {
        let paths = AttributePaths::from_parallel(endpoints, clusters, attributes)?;
        let command = self
            .read_command(node_id, paths, EventPaths::new())?
            .subscribe(self.subscribe);
        Box::new(command).send_command()
    }

    pub fn send_subscribe_event_command(
        &self,
        node_id: NodeId,
        endpoints: &[EndptId],
        clusters: &[ClusterId],
        events: &[EventId],
    ) -> Result<()> {
        let paths = EventPaths::from_parallel(endpoints, clusters, events)?;
        let command = self
            .read_command(node_id, AttributePaths::new(), paths)?
            .subscribe(self.subscribe);
        Box::new(command).send_command()
    }

    /// Write `value` (base 10) to a writable lighting attribute.
    ///
    /// Unknown clusters and attributes outside each cluster's writable set
    /// are `NotSupported`; no command is created for them.
    pub fn send_write_attr_command(
        &self,
        node_id: NodeId,
        endpoint: EndptId,
        cluster: ClusterId,
        attribute: AttrId,
        value: &str,
    ) -> Result<()> {
        match cluster {
            clusters::ON_OFF => self.write_on_off_attribute(node_id, endpoint, attribute, value),
            clusters::LEVEL_CONTROL => {
                self.write_level_control_attribute(node_id, endpoint, attribute, value)
            }
            clusters::COLOR_CONTROL => {
                self.write_color_control_attribute(node_id, endpoint, attribute, value)
            }
            _ => Err(not_supported(cluster, attribute)),
        }
    }

    fn write_on_off_attribute(
        &self,
        node_id: NodeId,
        endpoint: EndptId,
        attribute: AttrId,
        value: &str,
    ) -> Result<()> {
        let cluster = clusters::ON_OFF;
        match attribute {
            on_off::ON_TIME | on_off::OFF_WAIT_TIME => {
                self.send_write::<u16>(node_id, endpoint, cluster, attribute, value)
            }
            on_off::START_UP_ON_OFF => {
                self.send_write::<u8>(node_id, endpoint, cluster, attribute, value)
            }
            _ => Err(not_supported(cluster, attribute)),
        }
    }

    fn write_level_control_attribute(
        &self,
        node_id: NodeId,
        endpoint: EndptId,
        attribute: AttrId,
        value: &str,
    ) -> Result<()> {
        let cluster = clusters::LEVEL_CONTROL;
        match attribute {
            level_control::OPTIONS
            | level_control::ON_LEVEL
            | level_control::DEFAULT_MOVE_RATE
            | level_control::START_UP_CURRENT_LEVEL => {
                self.send_write::<u8>(node_id, endpoint, cluster, attribute, value)
            }
            level_control::ON_OFF_TRANSITION_TIME
            | level_control::ON_TRANSITION_TIME
            | level_control::OFF_TRANSITION_TIME => {
                self.send_write::<u16>(node_id, endpoint, cluster, attribute, value)
            }
            _ => Err(not_supported(cluster, attribute)),
        }
    }

    fn write_color_control_attribute(
        &self,
        node_id: NodeId,
        endpoint: EndptId,
        attribute: AttrId,
        value: &str,
    ) -> Result<()> {
        let cluster = clusters::COLOR_CONTROL;
        match attribute {
            color_control::OPTIONS => {
                self.send_write::<u8>(node_id, endpoint, cluster, attribute, value)
            }
            color_control::WHITE_POINT_X
            | color_control::WHITE_POINT_Y
            | color_control::START_UP_COLOR_TEMPERATURE_MIREDS => {
                self.send_write::<u16>(node_id, endpoint, cluster, attribute, value)
            }
            _ => Err(not_supported(cluster, attribute)),
        }
    }

    fn send_write<T>(
        &self,
        node_id: NodeId,
        endpoint: EndptId,
        cluster: ClusterId,
        attribute: AttrId,
        value: &str,
    ) -> Result<()>
    where
        T: FromStr + Into<AttrValue> + Copy + Debug + Send + 'static,
        T::Err: Display,
    {
        let parsed = parse_value::<T>(value)?;
        let command = self.write_command(node_id, endpoint, cluster, attribute, parsed)?;
        Box::new(command).send_command()
    }
}

/// Parse a base-10 value into the attribute's native width.
pub fn parse_value<T>(value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse::<T>().map_err(|e| NodeError::InvalidValue {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn not_supported(cluster: ClusterId, attribute: AttrId) -> NodeError {
    error!(
        "Write to cluster 0x{:08X} attribute 0x{:08X} is not supported",
        cluster, attribute
    );
    NodeError::NotSupported { cluster, attribute }
}
