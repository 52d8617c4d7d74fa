//! Device module - display control over webOS sockets or HDMI-CEC

pub mod link;
pub mod wake;
mod webos;
mod cec;

pub use link::{DeviceLink, LinkState};
pub use webos::*;
pub use cec::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::error::DeviceError;

/// Which controller drives the display
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// LG webOS websocket API, power-on by Wake-on-LAN
    Webos,
    /// `cec-client` sub-process over HDMI-CEC
    Cec,
}

/// Device configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Controller variant to build
    pub kind: DeviceKind,
    /// Settings for the webOS controller
    pub webos: WebOsConfig,
    /// Settings for the CEC controller
    pub cec: CecConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            kind: DeviceKind::Cec,
            webos: WebOsConfig::default(),
            cec: CecConfig::default(),
        }
    }
}

/// webOS controller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebOsConfig {
    /// Hostname or IP address of the TV
    pub address: String,
    /// Websocket port of the TV API
    pub port: u16,
    /// Hardware address used for Wake-on-LAN
    pub mac_address: String,
    /// Where the wake packet is sent
    pub broadcast_address: Ipv4Addr,
    /// UDP port for the wake packet
    pub wake_port: u16,
    /// Pairing key from an earlier registration; skips the on-screen prompt
    pub client_key: Option<String>,
    /// Seconds to wait for the socket to open
    pub connect_timeout_secs: u64,
    /// Seconds to wait for each response
    pub call_timeout_secs: u64,
}

impl Default for WebOsConfig {
    fn default() -> Self {
        Self {
            address: "192.168.1.50".to_string(),
            port: 3000,
            mac_address: String::new(),
            broadcast_address: Ipv4Addr::BROADCAST,
            wake_port: 9,
            client_key: None,
            connect_timeout_secs: 5,
            call_timeout_secs: 10,
        }
    }
}

/// CEC controller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CecConfig {
    /// Control program
    pub program: String,
    /// Arguments for the control program
    pub args: Vec<String>,
    /// Logical address of the display on the CEC bus
    pub device_index: u8,
    /// Seconds before the program is killed
    pub timeout_secs: u64,
}

impl Default for CecConfig {
    fn default() -> Self {
        Self {
            program: "cec-client".to_string(),
            args: vec!["-s".to_string(), "-d".to_string(), "1".to_string()],
            device_index: 0,
            timeout_secs: 15,
        }
    }
}

/// High-level display operations
#[async_trait]
pub trait TvController: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Prepare the control channel; controllers without one succeed trivially.
    async fn connect(&self) -> Result<(), DeviceError>;

    /// Whether the screen is showing a picture.
    async fn is_screen_on(&self) -> Result<bool, DeviceError>;

    /// Switch the display on.
    async fn turn_on(&self) -> Result<(), DeviceError>;

    /// Put the display into standby.
    async fn turn_off(&self) -> Result<(), DeviceError>;

    /// Show a short on-screen notification where supported.
    async fn notify(&self, _message: &str) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Release the control channel.
    async fn disconnect(&self) {}
}

/// Pick the controller variant named by the configuration.
pub fn build_controller(config: &DeviceConfig) -> Box<dyn TvController> {
    match config.kind {
        DeviceKind::Webos => Box::new(WebOsController::new(config.webos.clone())),
        DeviceKind::Cec => Box::new(CecController::new(config.cec.clone())),
    }
}
