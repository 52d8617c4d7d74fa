// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarm-monitor

//! Wake-on-LAN magic packets

use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::debug;

use crate::error::DeviceError;

/// 6 bytes of 0xFF followed by the hardware address 16 times
pub const MAGIC_PACKET_LEN: usize = 6 + 16 * 6;

/// Parse `aa:bb:cc:dd:ee:ff` (also `-` or `.` separated).
pub fn parse_mac(text: &str) -> Result<[u8; 6], DeviceError> {
    let invalid = || DeviceError::InvalidMac(text.to_string());

    let octets: Vec<u8> = text
        .trim()
        .split(|c| c == ':' || c == '-' || c == '.')
        .map(|part| u8::from_str_radix(part, 16))
        .collect::<Result<_, _>>()
        .map_err(|_| invalid())?;

    octets.try_into().map_err(|_| invalid())
}

/// Build the magic packet for `mac`.
pub fn magic_packet(mac: [u8; 6]) -> [u8; MAGIC_PACKET_LEN] {
    let mut packet = [0xFF; MAGIC_PACKET_LEN];
    for chunk in packet[6..].chunks_exact_mut(6) {
        chunk.copy_from_slice(&mac);
    }
    packet
}

/// Broadcast a magic packet for `mac` to `broadcast:port`.
pub async fn send_magic_packet(mac: &str, broadcast: Ipv4Addr, port: u16) -> Result<(), DeviceError> {
    let packet = magic_packet(parse_mac(mac)?);

    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.set_broadcast(true)?;

    let target = SocketAddr::from((broadcast, port));
    socket.send_to(&packet, target).await?;

    debug!("Sent wake packet for {} to {}", mac, target);
    Ok(())
}
