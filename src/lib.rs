//! Matter node runtime library.
//!
//! Hosts the server side of a Matter node (endpoint tree, diagnostics cluster
//! servers and their lifecycle) and a controller that reads, subscribes to and
//! writes attributes on other nodes.

pub mod config;
pub mod console;
pub mod controller;
pub mod error;
pub mod matter;
