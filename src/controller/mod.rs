//! Controller side: commands sent from this node to other nodes.

pub mod client;
pub mod device_list;
pub mod dispatch;
pub mod loopback;
pub mod paths;
pub mod pool;
pub mod read_command;
pub mod write_command;

pub use device_list::{DeviceList, MatterDevice};
pub use dispatch::Controller;
pub use loopback::LoopbackTransport;
pub use read_command::ReadCommand;
pub use write_command::WriteCommand;
