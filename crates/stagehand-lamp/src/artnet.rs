use std::net::SocketAddr;
use std::time::Duration;

use stagehand_foundation::LampError;
use tokio::net::UdpSocket;
use tokio::time::interval;

use crate::types::{ChannelMap, DmxUniverse};

const ART_NET_ID: &[u8; 8] = b"Art-Net\0";
const OP_OUTPUT: u16 = 0x5000;
const PROTOCOL_VERSION: u16 = 14;
pub const DEFAULT_EMIT_INTERVAL: Duration = Duration::from_millis(40);

/// Either emit a DMX frame on every `set_channel` call, or on a fixed timer
/// tick regardless of whether anything changed, per the operator's choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitMode {
    OnChange,
    Timer,
}

/// Encodes a [`DmxUniverse`] into a standard Art-Net DMX (`OpOutput`) packet
/// and sends it via UDP, grounded in the original tracker's
/// `pyartnet.ArtNetNode`/`add_universe`/`add_channel` wrapper (`controller.py`).
pub struct ArtNetEmitter {
    socket: UdpSocket,
    target: SocketAddr,
    universe: DmxUniverse,
    channels: ChannelMap,
    sequence: u8,
}

impl ArtNetEmitter {
    pub async fn bind(
        target: SocketAddr,
        universe_id: u16,
        channels: ChannelMap,
    ) -> Result<Self, LampError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| LampError::BindFailed(e.to_string()))?;

        Ok(Self {
            socket,
            target,
            universe: DmxUniverse::new(universe_id),
            channels,
            sequence: 1,
        })
    }

    /// Sets a named channel's bytes and returns whether the universe buffer
    /// actually changed, so `OnChange` mode can decide whether to emit.
    pub fn set_channel(&mut self, name: &str, values: &[u8]) -> Result<bool, LampError> {
        let (start, width) = self
            .channels
            .lookup(name)
            .ok_or_else(|| LampError::UnknownChannel(name.to_string()))?;
        let values = &values[..values.len().min(width as usize)];

        let start_idx = (start as usize).saturating_sub(1);
        let end_idx = (start_idx + values.len()).min(self.universe.channels.len());
        let changed = self.universe.channels[start_idx..end_idx] != *values;

        self.universe.set(start, values);
        Ok(changed)
    }

    pub fn universe(&self) -> &DmxUniverse {
        &self.universe
    }

    /// Encodes the current universe buffer as an Art-Net `OpOutput` packet
    /// and sends it to the configured node.
    pub async fn emit(&mut self) -> Result<(), LampError> {
        let packet = encode_art_dmx(
            self.sequence,
            self.universe.id,
            &self.universe.channels,
        );
        self.sequence = self.sequence.wrapping_add(1).max(1);

        self.socket
            .send_to(&packet, self.target)
            .await
            .map_err(|e| LampError::SendFailed(e.to_string()))?;
        Ok(())
    }

    /// Runs a timer that emits at `period` until `shutdown` resolves.
    pub async fn run_timer(&mut self, period: Duration, shutdown: impl std::future::Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut ticker = interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.emit().await {
                        tracing::warn!(error = %err, "Art-Net emit failed");
                    }
                }
                _ = &mut shutdown => break,
            }
        }
    }
}

/// Standard Art-Net `OpOutput` packet: 8-byte ID, opcode (LE u16), protocol
/// version (BE u16), sequence, physical port (always 0 here), sub-universe
/// low byte, net high byte, data length (BE u16), then up to 512 data bytes.
fn encode_art_dmx(sequence: u8, universe_id: u16, data: &[u8; 512]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(18 + 512);
    packet.extend_from_slice(ART_NET_ID);
    packet.extend_from_slice(&OP_OUTPUT.to_le_bytes());
    packet.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
    packet.push(sequence);
    packet.push(0); // physical port
    packet.push((universe_id & 0x00FF) as u8); // sub-universe
    packet.push(((universe_id >> 8) & 0x7F) as u8); // net
    packet.extend_from_slice(&(data.len() as u16).to_be_bytes());
    packet.extend_from_slice(data);
    packet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_packet_starts_with_the_art_net_header() {
        let data = [0u8; 512];
        let packet = encode_art_dmx(1, 0, &data);
        assert_eq!(&packet[0..8], ART_NET_ID);
        assert_eq!(u16::from_le_bytes([packet[8], packet[9]]), OP_OUTPUT);
        assert_eq!(packet.len(), 18 + 512);
    }

    #[tokio::test]
    async fn set_channel_reports_whether_the_buffer_changed() {
        let emitter = ArtNetEmitter::bind(
            "127.0.0.1:6454".parse().unwrap(),
            0,
            ChannelMap::defaults(),
        )
        .await;
        let mut emitter = emitter.unwrap();

        assert!(emitter.set_channel("pan", &[10]).unwrap());
        assert!(!emitter.set_channel("pan", &[10]).unwrap());
        assert!(emitter.set_channel("pan", &[11]).unwrap());
    }

    #[tokio::test]
    async fn unknown_channel_is_rejected() {
        let mut emitter = ArtNetEmitter::bind(
            "127.0.0.1:6454".parse().unwrap(),
            0,
            ChannelMap::defaults(),
        )
        .await
        .unwrap();
        assert!(matches!(
            emitter.set_channel("strobe", &[1]),
            Err(LampError::UnknownChannel(_))
        ));
    }
}
