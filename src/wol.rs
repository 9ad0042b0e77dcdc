//! MAC address parsing, magic-packet construction and UDP broadcast

use crate::error::WolError;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use tokio::net::UdpSocket;

/// Default Wake-on-LAN destination port (the "discard" port)
pub const DEFAULT_WOL_PORT: u16 = 9;

/// Length of a Wake-on-LAN magic packet: 6 bytes of 0xFF plus 16 MAC repetitions
pub const MAGIC_PACKET_LEN: usize = 6 + 16 * 6;

/// A parsed 48-bit MAC address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddr {
    type Err = WolError;

    /// Accepts the common colon/dash/dot-delimited forms
    /// (`aa:bb:cc:dd:ee:ff`, `aa-bb-cc-dd-ee-ff`, `aabb.ccdd.eeff`) as well
    /// as a bare 12-hex-digit string. Anything that does not strip down to
    /// exactly 12 hex characters is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || WolError::InvalidMac { mac: s.to_string() };

        let hex: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.'))
            .collect();

        // from_str_radix tolerates a leading sign, so hex digits must be
        // checked explicitly before decoding pairs.
        if hex.len() != 12 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let mut octets = [0u8; 6];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|_| invalid())?;
            octets[i] = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
        }

        Ok(MacAddr(octets))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

/// A Wake-on-LAN magic packet: 6 bytes of 0xFF followed by the target MAC
/// repeated 16 times. Ephemeral; built per send.
pub struct MagicPacket {
    packet: [u8; MAGIC_PACKET_LEN],
}

impl MagicPacket {
    pub fn new(mac: &MacAddr) -> MagicPacket {
        let mut packet = [0xFFu8; MAGIC_PACKET_LEN];
        let octets = mac.octets();
        for repetition in packet[6..].chunks_mut(6) {
            repetition.copy_from_slice(&octets);
        }
        MagicPacket { packet }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.packet
    }

    /// Broadcast the packet once to `(broadcast_ip, port)`.
    ///
    /// The socket is created per call and dropped on every exit path; a
    /// transmit error surfaces as `TransmitFailure` and is not retried here.
    pub async fn send(&self, broadcast_ip: Ipv4Addr, port: u16) -> Result<(), WolError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_broadcast(true)?;
        socket.send_to(&self.packet, (broadcast_ip, port)).await?;
        Ok(())
    }
}
