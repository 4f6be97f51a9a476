pub mod clusters;
pub mod data_model;
pub mod device_types;
pub mod events;
pub mod ids;
pub mod registry;
mod runtime;

pub use runtime::NodeRuntime;
