use std::path::Path;
use std::sync::Arc;

use log::{error, info};
use matter_node_runtime::config::{Config, load_dotenv};
use matter_node_runtime::console::Console;
use matter_node_runtime::controller::{Controller, DeviceList, LoopbackTransport};
use matter_node_runtime::matter::NodeRuntime;
use matter_node_runtime::matter::clusters::faults::BootReason;
use tokio::io::BufReader;

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    init_logger();
    load_dotenv();
    info!("Starting Matter node runtime");

    let config = Config::from_env();
    info!("Configuration loaded:");
    info!("  Node ID: 0x{:016X}", config.node.node_id);
    info!("  Light endpoints: {}", config.node.lights.len());
    info!(
        "  Max in-flight commands: {}",
        config.controller.max_in_flight_commands
    );

    let runtime = match NodeRuntime::new(&config.node) {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to build node: {}", e);
            std::process::exit(1);
        }
    };
    runtime.init_endpoints();
    runtime
        .general_diagnostics
        .notify_device_reboot(BootReason::PowerOnReboot);

    let devices = match config.controller.devices_file.as_deref() {
        Some(path) => DeviceList::load(Path::new(path)).unwrap_or_else(|e| {
            error!("Failed to load device list: {}", e);
            DeviceList::new()
        }),
        None => DeviceList::new(),
    };

    let transport = Arc::new(LoopbackTransport::new(&runtime, config.node.node_id));
    let controller = Controller::new(transport.clone(), transport.clone(), &config.controller);
    let console = Console::new(&runtime, &controller, &transport, &devices);

    info!("Node is running; type commands, `quit` or Ctrl+D to exit");
    tokio::select! {
        result = console.run(BufReader::new(tokio::io::stdin())) => {
            if let Err(e) = result {
                error!("Console error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => info!("Received shutdown signal"),
    }

    transport.shutdown_subscriptions();
    transport.run_until_idle();
    runtime.shutdown_endpoints();
    info!("Matter node runtime stopped");
}
