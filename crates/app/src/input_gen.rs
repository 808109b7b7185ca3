//! Simulated downlink generation.
//!
//! When `--simulate` is given, we generate a downlink the way the satellite
//! would produce it: plausible telemetry payloads, framed into chunks and
//! interleaved with beacons, then passed through a noisy channel.
//!
//! # Design
//!
//! Generated telemetry has:
//! - Energy profiles with small event counts across the 32 energy bins
//! - Application windows with room-ish temperatures and small sensor
//!   readings on every axis
//!
//! Nothing avoids the sync value; a frame that happens to contain it is lost
//! on the receive side, as it would be on orbit.

use edbsat_core::channel::{ChannelConfig, ChannelStats, NoisyChannel};
use edbsat_core::framing::{beacon, frame_payload};
use edbsat_core::telemetry::{AppOutput, AppWindow, EnergyProfile, ProfileEvent};
use edbsat_core::{DecoderConfig, Packet, PacketType, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

/// Probability of a beacon between two telemetry frames.
const BEACON_RATE: f64 = 0.25;

/// Generate the packet sequence the satellite sends: `frames` telemetry
/// packets with beacons interleaved.
pub fn generate_packets(seed: u64, frames: usize) -> Result<Vec<Packet>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut packets = Vec::with_capacity(frames + frames / 2);

    for _ in 0..frames {
        if rng.gen_bool(BEACON_RATE) {
            packets.push(Packet::beacon());
        }

        let packet = if rng.gen_bool(0.5) {
            Packet::new(PacketType::EnergyProfile, energy_profile(&mut rng).pack()?)
        } else {
            Packet::new(PacketType::AppOutput, app_output(&mut rng).pack()?)
        };
        packets.push(packet);
    }

    Ok(packets)
}

fn energy_profile(rng: &mut ChaCha8Rng) -> EnergyProfile {
    let mut profile = EnergyProfile::default();
    for event in profile.events.iter_mut() {
        *event = ProfileEvent {
            bins: [rng.gen_range(0..32), rng.gen_range(0..32)],
            // Mostly small counts
            count: rng.gen_range(0..16) + if rng.gen_bool(0.1) { 40 } else { 0 },
        };
    }
    profile
}

fn app_output(rng: &mut ChaCha8Rng) -> AppOutput {
    let mut output = AppOutput::default();
    let base_temperature: u8 = rng.gen_range(15..=35);
    for window in output.windows.iter_mut() {
        *window = AppWindow {
            temperature: base_temperature + rng.gen_range(0..3),
            magnetometer: std::array::from_fn(|_| rng.gen_range(-8..=7)),
            accelerometer: std::array::from_fn(|_| rng.gen_range(-2..=2)),
        };
    }
    output
}

/// Serialize packets into the transmitted byte stream.
pub fn serialize(config: &DecoderConfig, packets: &[Packet]) -> Result<Vec<u8>> {
    let mut stream = Vec::new();
    for packet in packets {
        if packet.is_beacon() {
            stream.push(beacon(config));
        } else {
            stream.extend(frame_payload(config, packet.packet_type, &packet.payload)?);
        }
    }
    Ok(stream)
}

/// Generate a downlink and pass it through the channel.
///
/// Returns the received bytes and what the channel did to them.
pub fn generate_downlink(
    config: &DecoderConfig,
    frames: usize,
    channel: ChannelConfig,
) -> Result<(Vec<u8>, ChannelStats)> {
    let packets = generate_packets(channel.seed, frames)?;
    let transmitted = serialize(config, &packets)?;

    let mut link = NoisyChannel::new(channel);
    let received = link.transmit(&transmitted);
    let stats = link.stats();

    info!(
        "simulated {} packets in {} bytes: {} dropped, {} corrupted",
        packets.len(),
        transmitted.len(),
        stats.bytes_dropped,
        stats.bytes_corrupted
    );

    Ok((received, stats))
}
