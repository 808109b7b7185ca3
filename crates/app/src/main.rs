//! edbsat-decode: print telemetry packets recovered from a downlink recording.

mod config;
mod input_gen;

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use clap::Parser;
use edbsat_core::metrics::DecoderStats;
use edbsat_core::stream::{ByteSource, HexSource, IterSource, RawSource, Receiver};
use edbsat_core::telemetry::{format, format_raw};
use edbsat_core::Result;
use tracing::{debug, error, info};

use crate::config::{init_logging, Cli, Config, Input};

/// Pause between polls of a followed input at end of data.
const FOLLOW_POLL_INTERVAL: Duration = Duration::from_secs(1);

fn main() -> ExitCode {
    let config = match Config::from_cli(Cli::parse()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };

    if let Err(e) = init_logging(&config.log_level) {
        eprintln!("error: {}", e);
        return ExitCode::from(2);
    }

    if let Some(seed) = config.seed() {
        eprintln!("Simulation seed: {} (rerun with --seed {})", seed, seed);
    }
    if config.print_config {
        config.print();
    }

    match run(&config) {
        Ok(stats) => {
            if config.print_metrics {
                stats.print_summary();
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn open_source(config: &Config) -> Result<Box<dyn ByteSource>> {
    let source: Box<dyn ByteSource> = match &config.input {
        Input::Stdin if config.hex => Box::new(hex_source(config, io::stdin().lock())),
        Input::Stdin => Box::new(RawSource::new(BufReader::new(io::stdin()))),
        Input::File(path) => {
            let file = File::open(path)?;
            if config.hex {
                Box::new(hex_source(config, BufReader::new(file)))
            } else {
                Box::new(RawSource::new(BufReader::new(file)))
            }
        }
        Input::Simulated { frames, channel } => {
            let (received, _) = input_gen::generate_downlink(&config.decoder, *frames, *channel)?;
            Box::new(IterSource::new(received))
        }
    };
    Ok(source)
}

fn hex_source<R: BufRead>(config: &Config, reader: R) -> HexSource<R> {
    if config.follow {
        HexSource::following(reader)
    } else {
        HexSource::new(reader)
    }
}

fn run(config: &Config) -> Result<DecoderStats> {
    let source = open_source(config)?;

    let mut out: Box<dyn Write> = match &config.output_file {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout()),
    };

    let mut receiver = Receiver::new(&config.decoder, source);
    if let Some(path) = &config.output_bytes {
        receiver = receiver.with_recorder(File::create(path)?);
    }

    info!("decoding started");
    loop {
        match receiver.next_packet()? {
            Some(packet) => {
                debug!("{}", format_raw(&packet));
                // A verified packet shorter than its layout is an internal fault
                let line = format(packet.packet_type, &packet.payload)?;
                writeln!(out, "{}", line)?;
                out.flush()?;
            }
            None if config.follow => thread::sleep(FOLLOW_POLL_INTERVAL),
            None => break,
        }
    }

    Ok(receiver.into_stats())
}
