//! Fire-and-forget multicast telemetry.
//!
//! Independent of command/response traffic, the daemon can publish UDP
//! datagrams to a multicast group (or any address): periodic snapshots of
//! polled state, transceive-style push notifications from the rig event
//! stream, and spectrum frames. There is no backpressure by design --
//! consumers that fall behind simply miss frames.
//!
//! Packets are single-line JSON objects tagged with a `type` field, one
//! packet per datagram.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use rigkit::transport::UdpTransport;
use rigkit::{RigEvent, Vfo};

use crate::server::SharedRig;

/// Where and how often to publish.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Destination address (typically a multicast group:port).
    pub target: SocketAddr,
    /// Snapshot polling interval.
    pub interval: Duration,
    /// Multicast TTL (1 keeps traffic on the local subnet).
    pub ttl: u32,
}

/// One telemetry datagram.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryPacket {
    /// Periodic polled state.
    Snapshot {
        #[serde(skip_serializing_if = "Option::is_none")]
        freq_hz: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        mode: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        passband_hz: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        vfo: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        ptt: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        split: Option<bool>,
    },
    /// Push notification for an asynchronous state change.
    Transceive {
        event: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        vfo: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        freq_hz: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        mode: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        on: Option<bool>,
    },
    /// A spectrum scope frame, hex-encoded.
    Spectrum { length: usize, data_hex: String },
}

impl TelemetryPacket {
    /// Map a rig event to its telemetry form.
    pub fn from_event(event: &RigEvent) -> TelemetryPacket {
        match event {
            RigEvent::FreqChanged { vfo, freq_hz } => TelemetryPacket::Transceive {
                event: "freq".into(),
                vfo: Some(vfo.to_string()),
                freq_hz: Some(*freq_hz),
                mode: None,
                on: None,
            },
            RigEvent::ModeChanged { vfo, mode, .. } => TelemetryPacket::Transceive {
                event: "mode".into(),
                vfo: Some(vfo.to_string()),
                freq_hz: None,
                mode: Some(mode.to_string()),
                on: None,
            },
            RigEvent::VfoChanged { vfo } => TelemetryPacket::Transceive {
                event: "vfo".into(),
                vfo: Some(vfo.to_string()),
                freq_hz: None,
                mode: None,
                on: None,
            },
            RigEvent::PttChanged { on } => TelemetryPacket::Transceive {
                event: "ptt".into(),
                vfo: None,
                freq_hz: None,
                mode: None,
                on: Some(*on),
            },
            RigEvent::SplitChanged { on, tx_vfo } => TelemetryPacket::Transceive {
                event: "split".into(),
                vfo: Some(tx_vfo.to_string()),
                freq_hz: None,
                mode: None,
                on: Some(*on),
            },
            RigEvent::PowerStatChanged { status } => TelemetryPacket::Transceive {
                event: "powerstat".into(),
                vfo: None,
                freq_hz: None,
                mode: None,
                on: Some(*status == rigkit::PowerStat::On),
            },
            RigEvent::SpectrumFrame { data } => TelemetryPacket::Spectrum {
                length: data.len(),
                data_hex: hex_encode(data),
            },
            RigEvent::Opened => TelemetryPacket::Transceive {
                event: "opened".into(),
                vfo: None,
                freq_hz: None,
                mode: None,
                on: None,
            },
            RigEvent::Closed => TelemetryPacket::Transceive {
                event: "closed".into(),
                vfo: None,
                freq_hz: None,
                mode: None,
                on: None,
            },
        }
    }
}

fn hex_encode(data: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(data.len() * 2);
    for b in data {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Run the publisher until cancelled.
///
/// `events` should be subscribed from the rig before it moves into the
/// shared handle.
pub async fn run(
    shared: Arc<SharedRig>,
    mut events: broadcast::Receiver<RigEvent>,
    config: PublisherConfig,
    cancel: CancellationToken,
) {
    let socket = match UdpTransport::bind("0.0.0.0:0").await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "telemetry socket bind failed, publisher disabled");
            return;
        }
    };
    if config.target.ip().is_multicast() {
        if let Err(e) = socket.set_multicast_ttl_v4(config.ttl) {
            warn!(error = %e, "could not set multicast TTL");
        }
    }

    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            _ = ticker.tick() => {
                let packet = snapshot(&shared).await;
                send(&socket, &config.target, &packet).await;
            }

            event = events.recv() => match event {
                Ok(event) => {
                    let packet = TelemetryPacket::from_event(&event);
                    send(&socket, &config.target, &packet).await;
                }
                // Consumers that fall behind miss frames; that is the
                // contract of this channel.
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(missed, "telemetry event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

/// Poll a snapshot through the cache layer. Individual failures leave
/// their field out rather than suppressing the whole packet.
async fn snapshot(shared: &SharedRig) -> TelemetryPacket {
    let mut rig = shared.lock_rig().await;

    let vfo = rig.get_vfo().await.ok();
    let freq_hz = rig.get_freq(Vfo::Current).await.ok();
    let mode = rig.get_mode(Vfo::Current).await.ok();
    let ptt = rig.get_ptt(Vfo::Current).await.ok();
    let split = rig.get_split_vfo(Vfo::Current).await.ok();

    TelemetryPacket::Snapshot {
        freq_hz,
        mode: mode.map(|(m, _)| m.to_string()),
        passband_hz: mode.map(|(_, pb)| pb),
        vfo: vfo.map(|v| v.to_string()),
        ptt,
        split: split.map(|(on, _)| on),
    }
}

async fn send(socket: &UdpTransport, target: &SocketAddr, packet: &TelemetryPacket) {
    let json = match serde_json::to_string(packet) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "telemetry serialization failed");
            return;
        }
    };
    let mut datagram = json.into_bytes();
    datagram.push(b'\n');
    if let Err(e) = socket.send_to(&datagram, *target).await {
        // Fire-and-forget: log and move on.
        debug!(error = %e, "telemetry send failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_encoding() {
        assert_eq!(hex_encode(&[0x00, 0xff, 0x14]), "00ff14");
        assert_eq!(hex_encode(&[]), "");
    }

    #[test]
    fn packets_serialize_with_type_tag() {
        let packet = TelemetryPacket::Transceive {
            event: "freq".into(),
            vfo: Some("VFOA".into()),
            freq_hz: Some(14_074_000),
            mode: None,
            on: None,
        };
        let json = serde_json::to_string(&packet).unwrap();
        assert!(json.contains("\"type\":\"transceive\""));
        assert!(json.contains("\"freq_hz\":14074000"));
        assert!(!json.contains("mode"), "absent fields are omitted");
    }

    #[test]
    fn spectrum_event_maps_to_hex() {
        let event = RigEvent::SpectrumFrame {
            data: vec![1, 2, 255],
        };
        match TelemetryPacket::from_event(&event) {
            TelemetryPacket::Spectrum { length, data_hex } => {
                assert_eq!(length, 3);
                assert_eq!(data_hex, "0102ff");
            }
            other => panic!("expected spectrum packet, got {other:?}"),
        }
    }
}
