//! Configuration for the edbsat-decode application.
//!
//! Handles parsing command-line arguments and generating sensible defaults
//! (including randomized simulation defaults that are reproducible with a
//! seed).
//!
//! # Philosophy
//!
//! The tool should work with ZERO arguments: it then decodes a binary
//! recording from stdin and writes one line per packet to stdout. Anything
//! randomized is derived from a single seed, which is printed so runs are
//! reproducible.

use std::path::PathBuf;

use clap::Parser;
use edbsat_core::channel::ChannelConfig;
use edbsat_core::DecoderConfig;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Decode telemetry packets from an EDBsat downlink recording.
#[derive(Parser, Debug)]
#[command(
    name = "edbsat-decode",
    version,
    about = "Decode packets from EDBsat downlink data recorded by an SDR dongle",
    long_about = r#"
Reads the received byte stream (binary, or hex text with --hex), recovers
verified packets, and prints one line per packet:

  B                                   beacon
  P: | <count> [<bin>:<bin>] ...       energy profile
  A: [temp <t> mag (x,y,z) accel ...]  application output

Diagnostics go to stderr; set RUST_LOG or --log-level to see them.

EXAMPLES:
  edbsat-decode capture.bin
  edbsat-decode --hex capture.txt -o packets.txt
  edbsat-decode --follow --output-bytes copy.bin /tmp/live.bin
  edbsat-decode --simulate --seed 42 --bit-error-rate 0.001
"#
)]
pub struct Cli {
    /// Input file with received bytes (default: stdin)
    #[arg(value_name = "INPUT", conflicts_with = "simulate")]
    pub input: Option<PathBuf>,

    /// Input is ASCII text with hex numbers separated by whitespace
    #[arg(long)]
    pub hex: bool,

    /// Output file for decoded packets, one per line (default: stdout)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Save every received byte to this file (binary)
    #[arg(long, value_name = "PATH")]
    pub output_bytes: Option<PathBuf>,

    /// At end of input, wait for more data instead of exiting
    #[arg(long, conflicts_with = "simulate")]
    pub follow: bool,

    /// Decode a generated downlink instead of reading input
    #[arg(long, conflicts_with = "hex")]
    pub simulate: bool,

    /// Random seed for the simulated downlink
    #[arg(long, requires = "simulate")]
    pub seed: Option<u64>,

    /// Number of telemetry frames to simulate
    #[arg(long, requires = "simulate")]
    pub frames: Option<usize>,

    /// Per-bit flip probability of the simulated link
    #[arg(long, requires = "simulate")]
    pub bit_error_rate: Option<f64>,

    /// Per-byte drop probability of the simulated link
    #[arg(long, requires = "simulate")]
    pub drop_rate: Option<f64>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "warn")]
    pub log_level: String,

    /// Print resolved configuration
    #[arg(long)]
    pub print_config: bool,

    /// Don't print the decoder summary
    #[arg(long)]
    pub no_metrics: bool,
}

/// Where received bytes come from.
#[derive(Debug, Clone)]
pub enum Input {
    Stdin,
    File(PathBuf),
    Simulated {
        frames: usize,
        channel: ChannelConfig,
    },
}

/// Complete configuration for a decoding run.
#[derive(Debug, Clone)]
pub struct Config {
    // === Files ===
    /// Byte source
    pub input: Input,

    /// Parse input as hex text
    pub hex: bool,

    /// Text sink (None = stdout)
    pub output_file: Option<PathBuf>,

    /// Binary copy of every received byte
    pub output_bytes: Option<PathBuf>,

    /// Poll for appended data at end of input
    pub follow: bool,

    // === Protocol ===
    pub decoder: DecoderConfig,

    // === Behavior ===
    pub log_level: String,

    /// Whether to print detailed config
    pub print_config: bool,

    /// Whether to print the metrics summary
    pub print_metrics: bool,
}

impl Config {
    /// Resolve parsed arguments into a configuration.
    ///
    /// With `--simulate` and no `--seed`, a time-based seed is chosen. Link
    /// rates not given explicitly are drawn from that seed.
    pub fn from_cli(cli: Cli) -> Result<Self, String> {
        let input = if cli.simulate {
            let seed = cli.seed.unwrap_or_else(time_seed);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);

            let channel = ChannelConfig {
                bit_error_rate: cli.bit_error_rate.unwrap_or_else(|| {
                    // Bias toward a clean link
                    let r: f64 = rng.gen();
                    r * r * 0.005
                }),
                drop_rate: cli.drop_rate.unwrap_or_else(|| rng.gen_range(0.0..0.002)),
                seed,
            };
            check_probability("bit error rate", channel.bit_error_rate)?;
            check_probability("drop rate", channel.drop_rate)?;

            Input::Simulated {
                frames: cli.frames.unwrap_or(32),
                channel,
            }
        } else {
            match cli.input {
                Some(path) => Input::File(path),
                None => Input::Stdin,
            }
        };

        let decoder = DecoderConfig::default();
        decoder.validate().map_err(|e| e.to_string())?;

        Ok(Config {
            input,
            hex: cli.hex,
            output_file: cli.output,
            output_bytes: cli.output_bytes,
            follow: cli.follow,
            decoder,
            log_level: cli.log_level,
            print_config: cli.print_config,
            print_metrics: !cli.no_metrics,
        })
    }

    /// The simulation seed, if any.
    pub fn seed(&self) -> Option<u64> {
        match &self.input {
            Input::Simulated { channel, .. } => Some(channel.seed),
            _ => None,
        }
    }

    /// Print the configuration in human-readable form to stderr.
    pub fn print(&self) {
        eprintln!("=== Configuration ===");
        match &self.input {
            Input::Stdin => eprintln!("Input:  stdin ({})", self.input_format()),
            Input::File(path) => eprintln!("Input:  {} ({})", path.display(), self.input_format()),
            Input::Simulated { frames, .. } => eprintln!("Input:  simulated downlink, {} frames", frames),
        }
        eprintln!(
            "Output: {}",
            self.output_file.as_ref().map_or("stdout".to_string(), |p| p.display().to_string())
        );
        if let Some(path) = &self.output_bytes {
            eprintln!("Byte recording: {}", path.display());
        }
        eprintln!("Follow: {}", self.follow);
        eprintln!();
        eprintln!("=== Protocol ===");
        eprintln!("Sync byte: {:#04x}", self.decoder.sync_byte);
        eprintln!(
            "CRC-16: poly {:#06x} init {:#06x} reflect in/out {}/{}",
            self.decoder.crc.poly, self.decoder.crc.init, self.decoder.crc.reflect_in, self.decoder.crc.reflect_out
        );
        eprintln!("Energy profile size: {:?}", self.decoder.energy_profile_size);
        eprintln!("App output size: {:?}", self.decoder.app_output_size);
        eprintln!();
        if let Input::Simulated { channel, .. } = &self.input {
            eprintln!("=== Link Simulation ===");
            eprintln!("Seed: {}", channel.seed);
            eprintln!("Bit error rate: {:.4}%", channel.bit_error_rate * 100.0);
            eprintln!("Drop rate: {:.4}%", channel.drop_rate * 100.0);
            eprintln!();
        }
    }

    fn input_format(&self) -> &'static str {
        if self.hex {
            "hex text"
        } else {
            "binary"
        }
    }
}

fn time_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn check_probability(name: &str, value: f64) -> Result<(), String> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("{} must be within 0.0-1.0, got {}", name, value))
    }
}

/// Install the stderr log subscriber. `RUST_LOG` overrides `level`.
pub fn init_logging(level: &str) -> Result<(), String> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|e| format!("invalid log level {:?}: {}", level, e))?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| format!("failed to init logging: {e}"))
}
