//! padmix - command-line soundboard
//!
//! List audio devices, check how a file decodes, or play files through
//! the mixer with a live microphone mixed into the primary output.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use padmix_common::config::{resolve_config_path, CONFIG_ENV_VAR};
use padmix_engine::audio::{AudioHost, CpalHost, SymphoniaDecoder};
use padmix_engine::config::gain_from_percent;
use padmix_engine::mixer::OUTPUT_CHANNELS;
use padmix_engine::{AudioCache, EngineConfig, Soundboard};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often `play` checks whether the current clip finished
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Command-line arguments for padmix
#[derive(Parser, Debug)]
#[command(name = "padmix")]
#[command(about = "Soundboard mixer: clips and microphone into a virtual cable")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List audio devices and the roles they can take
    Devices,

    /// Decode a file through the cache and report what came out
    Decode {
        file: PathBuf,

        /// Target sample rate
        #[arg(long, default_value = "48000")]
        rate: u32,

        /// Target channel count
        #[arg(long, default_value = "2")]
        channels: u16,
    },

    /// Play files, one after another
    Play {
        /// Primary output device index (usually a virtual cable)
        #[arg(long)]
        out: usize,

        /// Microphone device index
        #[arg(long)]
        mic: Option<usize>,

        /// Monitor output device index
        #[arg(long)]
        monitor: Option<usize>,

        /// Clip volume on the primary output, percent
        #[arg(long, default_value = "100")]
        gain: f32,

        /// Microphone volume, percent
        #[arg(long, default_value = "100")]
        mic_gain: f32,

        /// Clip volume on the monitor output, percent
        #[arg(long, default_value = "100")]
        monitor_gain: f32,

        /// Print events as JSON lines on stdout
        #[arg(long)]
        json_events: bool,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "padmix_engine=info,padmix=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let config =
        EngineConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    match args.command {
        Command::Devices => list_devices(),
        Command::Decode {
            file,
            rate,
            channels,
        } => decode(&file, rate, channels),
        Command::Play {
            out,
            mic,
            monitor,
            gain,
            mic_gain,
            monitor_gain,
            json_events,
            files,
        } => {
            let mut board = Soundboard::new(
                Box::new(CpalHost::new()),
                Arc::new(SymphoniaDecoder::new()),
                &config,
            );

            let result = play(
                &mut board,
                PlayOptions {
                    out,
                    mic,
                    monitor,
                    gain,
                    mic_gain,
                    monitor_gain,
                    json_events,
                },
                files,
            )
            .await;

            board.shutdown();
            result
        }
    }
}

fn list_devices() -> Result<()> {
    let host = CpalHost::new();
    let devices = host.devices().context("Failed to enumerate audio devices")?;

    for device in devices {
        let mut roles = Vec::new();
        if device.can_capture() {
            roles.push("mic");
        }
        if device.can_play() {
            roles.push("out/monitor");
        }
        let loopback = if device.looks_like_loopback() {
            "  [loopback]"
        } else {
            ""
        };

        println!(
            "{:>3}  {}  (in {}, out {}, {} Hz) {}{}",
            device.index,
            device.name,
            device.max_input_channels,
            device.max_output_channels,
            device.default_sample_rate,
            roles.join(", "),
            loopback
        );
    }
    Ok(())
}

fn decode(file: &Path, rate: u32, channels: u16) -> Result<()> {
    if rate == 0 || channels == 0 {
        bail!("rate and channels must be > 0");
    }

    let cache = AudioCache::new(Arc::new(SymphoniaDecoder::new()), rate, channels);
    let buffer = cache
        .load(file)
        .with_context(|| format!("Failed to decode {}", file.display()))?;

    println!("file:     {}", file.display());
    println!("format:   {} Hz, {} ch", buffer.sample_rate(), buffer.channels());
    println!("frames:   {}", buffer.frames());
    println!("duration: {:.3} s", buffer.duration_secs());
    println!("peak:     {:.4}", buffer.peak());
    Ok(())
}

struct PlayOptions {
    out: usize,
    mic: Option<usize>,
    monitor: Option<usize>,
    gain: f32,
    mic_gain: f32,
    monitor_gain: f32,
    json_events: bool,
}

async fn play(board: &mut Soundboard, options: PlayOptions, files: Vec<PathBuf>) -> Result<()> {
    if options.json_events {
        let mut rx = board.events().subscribe();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                if let Ok(line) = serde_json::to_string(&event) {
                    println!("{}", line);
                }
            }
        });
    }

    let assignment = board.set_devices(options.mic, Some(options.out), options.monitor);
    for (role, e) in assignment.failures() {
        warn!("{} role unavailable: {}", role, e);
    }
    assignment
        .primary
        .into_result()
        .context("Primary output could not be opened")?;

    let mixer = board.mixer();
    mixer.set_clip_gain(gain_from_percent(options.gain));
    mixer.set_capture_gain(gain_from_percent(options.mic_gain));
    mixer.set_monitor_gain(gain_from_percent(options.monitor_gain));
    info!(
        "Mixing at {} Hz, {} channels out",
        mixer.sample_rate(),
        OUTPUT_CHANNELS
    );

    for file in &files {
        board.add_pad(file.clone());
    }
    board.warm_up().context("Failed to start warm-up")?;

    let bus = board.bus();
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    for index in 0..board.pads().len() {
        let pad = &board.pads()[index];
        let clip = match board.play_pad(index) {
            Ok(clip) => clip,
            Err(e) => {
                warn!("Skipping {}: {}", pad.path.display(), e);
                continue;
            }
        };
        info!("Playing {} ({})", pad.name, clip);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Interrupted, stopping");
                    bus.stop_all();
                    return Ok(());
                }
                _ = tokio::time::sleep(POLL_INTERVAL) => {
                    if bus.active_clips() == 0 {
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
