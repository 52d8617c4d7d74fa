// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarm-monitor

//! LG webOS controller

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::link::DeviceLink;
use super::{wake, TvController, WebOsConfig};
use crate::error::{DeviceError, LinkError};

/// webOS service URIs
pub mod commands {
    /// Screen off through the power service
    pub const TV_POWER_TURN_OFF: &str = "ssap://com.webos.service.tvpower/power/turnOff";
    /// System power off, used when the power service refuses
    pub const SYSTEM_TURN_OFF: &str = "ssap://system/turnOff";
    /// Power state query
    pub const GET_POWER_STATE: &str = "ssap://com.webos.service.tvpower/power/getPowerState";
    /// On-screen notification
    pub const CREATE_TOAST: &str = "ssap://system.notifications/createToast";
}

const PERMISSIONS: [&str; 4] = ["LAUNCH", "CONTROL", "INPUT_SOCKET", "INPUT_KEY"];

/// The `register` handshake message, with the pairing key when one is known.
pub fn registration_message(client_key: Option<&str>) -> Value {
    let mut payload = json!({
        "pairingType": "PROMPT",
        "manifest": {
            "manifestVersion": 1,
            "appVersion": env!("CARGO_PKG_VERSION"),
            "signed": {
                "created": "20240101",
                "appId": "org.alarm-monitor.display",
                "vendorId": "org.alarm-monitor",
                "localizedAppNames": { "": "Alarm Monitor" },
                "permissions": PERMISSIONS,
                "serial": "1",
            },
            "permissions": PERMISSIONS,
        }
    });

    if let Some(key) = client_key {
        payload["client-key"] = Value::String(key.to_string());
    }

    json!({
        "id": "register_0",
        "type": "register",
        "payload": payload,
    })
}

/// Read the power state answer; a missing `state` counts as on.
pub fn screen_state_is_on(response: &Value) -> bool {
    let state = response
        .get("state")
        .or_else(|| response.pointer("/payload/state"))
        .and_then(Value::as_str);

    match state {
        Some(state) => {
            let state = state.to_lowercase();
            matches!(state.as_str(), "active" | "on" | "screen on")
        }
        None => true,
    }
}

/// Controls a webOS TV over its websocket API.
///
/// Power-on goes out as a Wake-on-LAN packet because a TV in standby does not
/// accept socket connections.
pub struct WebOsController {
    config: WebOsConfig,
    link: DeviceLink,
}

impl WebOsController {
    /// Controller for the TV at `config.address`; nothing is opened yet.
    pub fn new(config: WebOsConfig) -> Self {
        let registration = registration_message(config.client_key.as_deref());
        let link = DeviceLink::new(registration, Duration::from_secs(config.call_timeout_secs));
        Self { config, link }
    }

    /// Websocket URL of the TV API
    pub fn url(&self) -> String {
        format!("ws://{}:{}/", self.config.address, self.config.port)
    }

    /// The underlying link
    pub fn link(&self) -> &DeviceLink {
        &self.link
    }

    async fn ensure_connected(&self) -> Result<(), LinkError> {
        if self.link.is_ready() {
            return Ok(());
        }
        self.link
            .connect(&self.url(), Duration::from_secs(self.config.connect_timeout_secs))
            .await
    }
}

#[async_trait]
impl TvController for WebOsController {
    fn name(&self) -> &str {
        "webos"
    }

    async fn connect(&self) -> Result<(), DeviceError> {
        self.ensure_connected().await?;
        Ok(())
    }

    async fn is_screen_on(&self) -> Result<bool, DeviceError> {
        if let Err(e) = self.ensure_connected().await {
            debug!("TV unreachable, treating screen as off: {}", e);
            return Ok(false);
        }

        match self.link.call(commands::GET_POWER_STATE, None).await {
            Ok(response) => Ok(screen_state_is_on(&response)),
            Err(e) => {
                warn!("Power state query failed, assuming screen is on: {}", e);
                Ok(true)
            }
        }
    }

    async fn turn_on(&self) -> Result<(), DeviceError> {
        info!("Waking TV {} via Wake-on-LAN", self.config.mac_address);
        wake::send_magic_packet(
            &self.config.mac_address,
            self.config.broadcast_address,
            self.config.wake_port,
        )
        .await
    }

    async fn turn_off(&self) -> Result<(), DeviceError> {
        self.ensure_connected().await?;
        info!("Turning TV off");

        match self.link.call(commands::TV_POWER_TURN_OFF, None).await {
            Ok(_) => Ok(()),
            Err(e @ LinkError::Connection(_)) => Err(e.into()),
            Err(e) => {
                debug!("tvpower turnOff failed ({}), falling back to system turnOff", e);
                self.link.call(commands::SYSTEM_TURN_OFF, None).await?;
                Ok(())
            }
        }
    }

    async fn notify(&self, message: &str) -> Result<(), DeviceError> {
        self.ensure_connected().await?;
        self.link
            .call(commands::CREATE_TOAST, Some(json!({ "message": message })))
            .await?;
        Ok(())
    }

    async fn disconnect(&self) {
        self.link.disconnect().await;
    }
}
