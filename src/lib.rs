pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
mod logger;
pub mod negotiation;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod status;
mod utils;

#[cfg(test)]
mod testkit;

use crate::config::ClientConfig;
use crate::controller::{CallController, Collaborators};
use crate::error::StartupError;
use crate::logger::log;

async fn start() -> Result<(), StartupError> {
    let config = ClientConfig::from_env()?;
    log(&format!(
        "Signaling endpoint {}, {} ICE servers",
        config.signaling_endpoint()?,
        config.ice_servers.len()
    ));
    let controller = CallController::new(&config, Collaborators::webrtc(&config))?;
    let (handle, task) = controller.spawn();
    commands::console::run_console(handle).await?;
    let _ = task.await;
    Ok(())
}

pub fn run() {
    let runtime = tokio::runtime::Runtime::new().expect("error while starting tokio runtime");
    if let Err(e) = runtime.block_on(start()) {
        eprintln!("peercall: {e}");
        std::process::exit(1);
    }
}
