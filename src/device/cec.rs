// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarm-monitor

//! HDMI-CEC controller driving `cec-client` as a sub-process

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, info};

use super::{CecConfig, TvController};
use crate::error::DeviceError;

/// Power state reported by `cec-client`, or `None` when no status line is present.
pub fn parse_power_status(output: &str) -> Option<bool> {
    const MARKER: &str = "power status:";

    let lower = output.to_lowercase();
    let status = lower[lower.find(MARKER)? + MARKER.len()..]
        .lines()
        .next()
        .unwrap_or("")
        .trim();

    match status {
        "on" | "in transition from standby to on" => Some(true),
        "standby" | "in transition from on to standby" => Some(false),
        _ => None,
    }
}

/// Drives the display over HDMI-CEC
pub struct CecController {
    config: CecConfig,
}

impl CecController {
    /// Controller running `config.program` for every command
    pub fn new(config: CecConfig) -> Self {
        Self { config }
    }

    /// The line written to the control program, e.g. `standby 0`.
    pub fn command_line(&self, verb: &str) -> String {
        format!("{} {}", verb, self.config.device_index)
    }

    fn describe(&self, line: &str) -> String {
        format!("echo '{}' | {} {}", line, self.config.program, self.config.args.join(" "))
    }

    /// Feed one command line to the control program and collect its output.
    async fn run(&self, verb: &str) -> Result<String, DeviceError> {
        let line = self.command_line(verb);
        let failed = |reason: String| DeviceError::Command {
            command: self.describe(&line),
            reason,
        };

        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| failed(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(format!("{}\n", line).as_bytes())
                .await
                .map_err(|e| failed(format!("writing command: {}", e)))?;
        }

        let output = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| failed(format!("no exit within {}s", self.config.timeout_secs)))?
        .map_err(|e| failed(e.to_string()))?;

        if !output.status.success() {
            return Err(failed(format!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        debug!("{} -> {} bytes of output", self.describe(&line), output.stdout.len());
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl TvController for CecController {
    fn name(&self) -> &str {
        "cec"
    }

    async fn connect(&self) -> Result<(), DeviceError> {
        Ok(())
    }

    /// A failed sub-process reads as off; output without a status line is an error.
    async fn is_screen_on(&self) -> Result<bool, DeviceError> {
        let output = match self.run("pow").await {
            Ok(output) => output,
            Err(e) => {
                error!("CEC status query failed: {}", e);
                return Ok(false);
            }
        };

        parse_power_status(&output).ok_or_else(|| DeviceError::Command {
            command: self.describe(&self.command_line("pow")),
            reason: "no power status in output".to_string(),
        })
    }

    async fn turn_on(&self) -> Result<(), DeviceError> {
        info!("Turning display on via CEC");
        if let Err(e) = self.run("on").await {
            error!("CEC turn on had no effect: {}", e);
        }
        Ok(())
    }

    async fn turn_off(&self) -> Result<(), DeviceError> {
        info!("Turning display off via CEC");
        if let Err(e) = self.run("standby").await {
            error!("CEC standby had no effect: {}", e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(script: &str) -> CecController {
        CecController::new(CecConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            device_index: 0,
            timeout_secs: 5,
        })
    }

    #[test]
    fn test_parse_power_status() {
        let on = "opening a connection to the CEC adapter...\npower status: on\n";
        assert_eq!(parse_power_status(on), Some(true));
        assert_eq!(parse_power_status("Power Status: Standby"), Some(false));
        assert_eq!(
            parse_power_status("power status: in transition from standby to on"),
            Some(true)
        );
        assert_eq!(parse_power_status("power status: unknown"), None);
        assert_eq!(parse_power_status("no adapter found"), None);
    }

    #[test]
    fn test_command_line_format() {
        let controller = CecController::new(CecConfig {
            device_index: 4,
            ..CecConfig::default()
        });
        assert_eq!(controller.command_line("standby"), "standby 4");
        assert_eq!(controller.describe("on 4"), "echo 'on 4' | cec-client -s -d 1");
    }

    #[tokio::test]
    async fn test_is_screen_on_reads_output() {
        let controller = shell("cat >/dev/null; echo 'power status: on'");
        assert!(controller.is_screen_on().await.unwrap());

        let controller = shell("cat >/dev/null; echo 'power status: standby'");
        assert!(!controller.is_screen_on().await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_marker_is_reported() {
        let controller = shell("cat >/dev/null; echo 'nothing useful'");
        assert!(matches!(
            controller.is_screen_on().await,
            Err(DeviceError::Command { .. })
        ));
    }

    #[tokio::test]
    async fn test_receives_command_on_stdin() {
        let controller = shell("read line; [ \"$line\" = 'pow 0' ] && echo 'power status: on'");
        assert!(controller.is_screen_on().await.unwrap());
    }

    #[tokio::test]
    async fn test_process_failures_are_swallowed() {
        let missing = CecController::new(CecConfig {
            program: "/nonexistent/cec-client".to_string(),
            ..CecConfig::default()
        });
        assert!(missing.turn_on().await.is_ok());
        assert!(missing.turn_off().await.is_ok());
        assert!(!missing.is_screen_on().await.unwrap());

        let failing = shell("cat >/dev/null; exit 3");
        assert!(failing.turn_off().await.is_ok());
    }
}
